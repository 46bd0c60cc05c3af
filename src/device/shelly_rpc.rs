//! HTTP JSON-RPC transport for Gen2 metering devices
//!
//! Every call is a `POST <base>/rpc` carrying `{"id", "method", "params"}`.
//! Connecting checks `GET <base>/shelly`, which every Gen2 device answers
//! without authentication.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::rpc_parser::RpcParser;
use super::{
    ChannelSelector, DeviceConnection, DeviceConnector, DeviceError, DeviceResult, HistoryPage,
    PageRequest,
};
use crate::address::DeviceAddress;
use crate::downloader::config::{connect_timeout, request_timeout};
use crate::DeviceIdentity;

/// Identity method
pub const DEVICE_INFO_METHOD: &str = "Shelly.GetDeviceInfo";
/// Whole-meter history method
pub const EM_DATA_METHOD: &str = "EMData.GetData";
/// Single-channel history method
pub const EM1_DATA_METHOD: &str = "EM1Data.GetData";

/// Method name and component id for a history call
pub fn history_method(channel: ChannelSelector) -> (&'static str, u8) {
    match channel {
        ChannelSelector::Aggregate => (EM_DATA_METHOD, 0),
        ChannelSelector::Channel(id) => (EM1_DATA_METHOD, id),
    }
}

/// Opens [`ShellyRpcConnection`]s
#[derive(Debug, Clone)]
pub struct ShellyRpcConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for ShellyRpcConnector {
    fn default() -> Self {
        Self {
            connect_timeout: connect_timeout(),
            request_timeout: request_timeout(),
        }
    }
}

impl ShellyRpcConnector {
    /// Override the per-call timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the connection check timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl DeviceConnector for ShellyRpcConnector {
    async fn connect(&self, address: &DeviceAddress) -> DeviceResult<Box<dyn DeviceConnection>> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| DeviceError::Connection(format!("Failed to build HTTP client: {e}")))?;

        let base_url = address.base_url();
        let check_url = format!("{base_url}/shelly");
        debug!(url = %check_url, "Checking device");

        let response = client
            .get(&check_url)
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| DeviceError::Connection(format!("{address}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Connection(format!(
                "{address}: device check returned {status}"
            )));
        }

        Ok(Box::new(ShellyRpcConnection {
            client,
            base_url,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }))
    }
}

/// An open JSON-RPC connection
pub struct ShellyRpcConnection {
    client: Client,
    base_url: String,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl ShellyRpcConnection {
    async fn call(&self, method: &str, params: Value) -> DeviceResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}/rpc", self.base_url);
        trace!(id, method, %params, "RPC request");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "id": id, "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeviceError::Protocol(format!("{method} timed out"))
                } else {
                    DeviceError::Connection(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::Protocol(format!(
                "{method} returned {status}: {body}"
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DeviceError::Protocol(format!("{method} timed out"))
            } else {
                DeviceError::Protocol(format!("{method} returned invalid JSON: {e}"))
            }
        })?;

        RpcParser::parse_envelope(method, body)
    }
}

#[async_trait]
impl DeviceConnection for ShellyRpcConnection {
    async fn device_identity(&self) -> DeviceResult<DeviceIdentity> {
        let result = self.call(DEVICE_INFO_METHOD, json!({})).await?;
        RpcParser::parse_device_info(&result)
    }

    async fn history_page(&self, request: &PageRequest) -> DeviceResult<HistoryPage> {
        let (method, id) = history_method(request.channel);
        let params = json!({
            "id": id,
            "ts": request.from_ts(),
            "end_ts": request.window_end,
        });
        let result = self.call(method, params).await?;
        let page = RpcParser::parse_history_page(&result, request)?;
        debug!(
            method,
            from = request.from_ts(),
            records = page.records.len(),
            next = ?page.next,
            "History page received"
        );
        Ok(page)
    }

    async fn close(&mut self) -> DeviceResult<()> {
        // HTTP has no session to tear down; later calls are refused
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
