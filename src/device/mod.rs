//! Device transport seam and session lifecycle
//!
//! The orchestrator never talks to the network directly. It goes through two
//! narrow traits:
//!
//! - [`DeviceConnector`] opens a connection to an address
//! - [`DeviceConnection`] issues the identity and history calls and is closed
//!   exactly once by the owning [`session::DeviceSession`]
//!
//! [`shelly_rpc`] provides the HTTP JSON-RPC implementation used by the binary.

use crate::address::DeviceAddress;
use crate::{DeviceIdentity, TelemetryRecord};
use async_trait::async_trait;
use std::fmt;

pub mod rpc_parser;
pub mod session;
pub mod shelly_rpc;

pub use session::DeviceSession;

/// Device transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level failure (refused, reset, unreachable)
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or unexpected device response, or a call that timed out
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Call issued on a session that is not open
    #[error("device session is not connected")]
    NotConnected,
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Which history a fetch reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelSelector {
    /// Whole-meter history (all phases in one record)
    #[default]
    Aggregate,
    /// History of a single measurement channel
    Channel(u8),
}

impl ChannelSelector {
    /// Build a selector from an optional channel index
    pub fn from_index(channel: Option<u8>) -> Self {
        channel.map_or(ChannelSelector::Aggregate, ChannelSelector::Channel)
    }

    /// Channel index, if a single channel is selected
    pub fn index(&self) -> Option<u8> {
        match self {
            ChannelSelector::Aggregate => None,
            ChannelSelector::Channel(id) => Some(*id),
        }
    }
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelector::Aggregate => write!(f, "all"),
            ChannelSelector::Channel(id) => write!(f, "{id}"),
        }
    }
}

/// Parameters of one history page call (epoch seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// History to read
    pub channel: ChannelSelector,
    /// Window start
    pub window_start: i64,
    /// Window end (exclusive)
    pub window_end: i64,
    /// Resume position returned by the previous page, `None` on the first call
    pub cursor: Option<i64>,
}

impl PageRequest {
    /// Timestamp this page starts from
    pub fn from_ts(&self) -> i64 {
        self.cursor.unwrap_or(self.window_start)
    }
}

/// Where paging continues after a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// More history is available starting at this timestamp
    Next(i64),
    /// The window is exhausted
    Done,
}

/// One batch of history returned by a single call
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// Records in chronological order
    pub records: Vec<TelemetryRecord>,
    /// Continuation marker
    pub next: PageCursor,
    /// Seconds of the window served so far, measured from the window start
    pub position_consumed: i64,
}

/// Opens connections to devices
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Establish a connection to `address`
    ///
    /// # Errors
    /// Returns [`DeviceError::Connection`] on timeout or refusal
    async fn connect(&self, address: &DeviceAddress) -> DeviceResult<Box<dyn DeviceConnection>>;
}

/// An open connection to one device
#[async_trait]
pub trait DeviceConnection: Send + Sync {
    /// Query the device identity (one RPC call)
    async fn device_identity(&self) -> DeviceResult<DeviceIdentity>;

    /// Fetch one page of history
    async fn history_page(&self, request: &PageRequest) -> DeviceResult<HistoryPage>;

    /// Release the transport. Must tolerate repeated calls.
    async fn close(&mut self) -> DeviceResult<()>;
}
