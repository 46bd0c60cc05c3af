//! Device session lifecycle
//!
//! A [`DeviceSession`] exclusively owns one connection. It starts idle, is
//! opened once, and is closed once; `close` is a no-op when the session never
//! opened or has already been closed, and it never fails.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    DeviceConnection, DeviceConnector, DeviceError, DeviceResult, HistoryPage, PageRequest,
};
use crate::address::DeviceAddress;
use crate::DeviceIdentity;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet connected, or the connect attempt failed
    Idle,
    /// Connection established
    Open,
    /// Connection released
    Closed,
}

/// Owns the connection to one device for the duration of one fetch
pub struct DeviceSession {
    connector: Arc<dyn DeviceConnector>,
    address: DeviceAddress,
    connection: Option<Box<dyn DeviceConnection>>,
    state: SessionState,
}

impl DeviceSession {
    /// Create an idle session; nothing is connected until [`open`](Self::open)
    pub fn new(connector: Arc<dyn DeviceConnector>, address: DeviceAddress) -> Self {
        Self {
            connector,
            address,
            connection: None,
            state: SessionState::Idle,
        }
    }

    /// Device address
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Establish the transport connection
    ///
    /// # Errors
    /// Returns [`DeviceError::Connection`] when the device is unreachable or the
    /// session has already been closed
    pub async fn open(&mut self) -> DeviceResult<()> {
        match self.state {
            SessionState::Open => return Ok(()),
            SessionState::Closed => {
                return Err(DeviceError::Connection(
                    "session has already been closed".to_string(),
                ))
            }
            SessionState::Idle => {}
        }

        info!(device = %self.address, "Connecting to device");
        let connection = self.connector.connect(&self.address).await?;
        self.connection = Some(connection);
        self.state = SessionState::Open;
        info!(device = %self.address, "Connected");
        Ok(())
    }

    /// Query the device identity
    pub async fn identity(&self) -> DeviceResult<DeviceIdentity> {
        self.connection()?.device_identity().await
    }

    /// Fetch one history page
    pub async fn history_page(&self, request: &PageRequest) -> DeviceResult<HistoryPage> {
        self.connection()?.history_page(request).await
    }

    /// Release the connection
    ///
    /// Safe to call repeatedly and on a session that never opened. Errors from
    /// the transport are logged, not returned.
    pub async fn close(&mut self) {
        match self.connection.take() {
            Some(mut connection) => {
                debug!(device = %self.address, "Closing device connection");
                match connection.close().await {
                    Ok(()) => info!(device = %self.address, "Connection closed"),
                    Err(e) => {
                        warn!(device = %self.address, error = %e, "Error during connection close")
                    }
                }
            }
            None => debug!(device = %self.address, "No active connection to close"),
        }
        self.state = SessionState::Closed;
    }

    fn connection(&self) -> DeviceResult<&dyn DeviceConnection> {
        self.connection.as_deref().ok_or(DeviceError::NotConnected)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!(device = %self.address, "Device session dropped while still open");
        }
    }
}
