//! Scripted device double shared by the integration tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use meter_data_downloader::address::DeviceAddress;
use meter_data_downloader::device::{
    DeviceConnection, DeviceConnector, DeviceError, DeviceResult, HistoryPage, PageCursor,
    PageRequest,
};
use meter_data_downloader::{DeviceIdentity, TelemetryRecord};

pub const TEST_MAC: &str = "A8032ABE54DC";

/// Sample spacing used by generated pages
pub const SAMPLE_PERIOD: i64 = 60;

/// One scripted reply to a history call
pub enum Step {
    Page(HistoryPage),
    Fail(DeviceError),
    /// Never resolves
    Hang,
}

/// A device whose history replies are scripted in advance
pub struct ScriptedDevice {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<PageRequest>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse_connect: bool,
    identity_error: Option<DeviceError>,
}

impl ScriptedDevice {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self::build(steps, false, None))
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self::build(vec![], true, None))
    }

    pub fn failing_identity(error: DeviceError) -> Arc<Self> {
        Arc::new(Self::build(vec![], false, Some(error)))
    }

    fn build(steps: Vec<Step>, refuse_connect: bool, identity_error: Option<DeviceError>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            refuse_connect,
            identity_error,
        }
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn DeviceConnector> {
        Arc::new(ScriptedConnector(self.clone()))
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct ScriptedConnector(Arc<ScriptedDevice>);

struct ScriptedConnection(Arc<ScriptedDevice>);

#[async_trait]
impl DeviceConnector for ScriptedConnector {
    async fn connect(&self, _address: &DeviceAddress) -> DeviceResult<Box<dyn DeviceConnection>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        if self.0.refuse_connect {
            return Err(DeviceError::Connection("connection refused".to_string()));
        }
        Ok(Box::new(ScriptedConnection(self.0.clone())))
    }
}

#[async_trait]
impl DeviceConnection for ScriptedConnection {
    async fn device_identity(&self) -> DeviceResult<DeviceIdentity> {
        if let Some(error) = &self.0.identity_error {
            return Err(error.clone());
        }
        Ok(DeviceIdentity {
            mac: TEST_MAC.to_string(),
            model: "SPEM-003CEBEU".to_string(),
            firmware_id: "20240625-122451/1.3.3-gbdfd9b3".to_string(),
        })
    }

    async fn history_page(&self, request: &PageRequest) -> DeviceResult<HistoryPage> {
        self.0.requests.lock().unwrap().push(*request);
        let step = self.0.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(DeviceError::Protocol("script exhausted".to_string())),
        }
    }

    async fn close(&mut self) -> DeviceResult<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build consecutive pages of `sizes` records, one sample per minute from
/// `window_start`; every page but the last carries a `Next` cursor.
pub fn record_pages(window_start: i64, window_end: i64, sizes: &[usize]) -> Vec<Step> {
    let mut ts = window_start;
    let mut steps = Vec::with_capacity(sizes.len());

    for (index, size) in sizes.iter().enumerate() {
        let records = (0..*size)
            .map(|i| {
                TelemetryRecord::new(
                    ts + i as i64 * SAMPLE_PERIOD,
                    vec![Some(230.0 + i as f64 * 0.5), if i % 7 == 0 { None } else { Some(1.5) }],
                )
            })
            .collect::<Vec<_>>();
        ts += *size as i64 * SAMPLE_PERIOD;

        let last = index + 1 == sizes.len();
        let (next, consumed) = if last {
            (PageCursor::Done, window_end - window_start)
        } else {
            (PageCursor::Next(ts), ts - window_start)
        };

        steps.push(Step::Page(HistoryPage {
            records,
            next,
            position_consumed: consumed,
        }));
    }

    steps
}

/// Parse a log file back into `(timestamp, fields)` tuples
pub fn read_log(path: &std::path::Path) -> Vec<(i64, Vec<String>)> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let mut parts = line.split(',');
            let ts = parts.next().unwrap().parse().unwrap();
            (ts, parts.map(str::to_string).collect())
        })
        .collect()
}
