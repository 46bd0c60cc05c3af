//! Device address parsing and validation
//!
//! Accepts the forms users type for a metering device on the local network:
//! `HOST`, `HOST:PORT`, or a full `http://`/`https://` URL without a path.
//! IPv6 hosts are written in brackets (`[fe80::1]:8080`).

use std::fmt;
use url::{ParseError, Url};

/// Network address of a metering device
///
/// The scheme defaults to `http` and the host is normalised to lowercase.
///
/// # Examples
///
/// ```
/// use meter_data_downloader::address::DeviceAddress;
///
/// let addr = DeviceAddress::parse("192.168.1.100").unwrap();
/// assert_eq!(addr.base_url(), "http://192.168.1.100");
///
/// let addr = DeviceAddress::parse("Shelly-EM.local:8080").unwrap();
/// assert_eq!(addr.host(), "shelly-em.local");
/// assert_eq!(addr.port(), Some(8080));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    url: Url,
}

/// URL scheme used to reach the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP (device default)
    Http,
    /// HTTP over TLS
    Https,
}

impl DeviceAddress {
    /// Parse an address string
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid host, uses a scheme other
    /// than `http`/`https`, carries a path, query or credentials, or the port
    /// is not a number in `1..=65535`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let input = s.trim();
        if input.is_empty() {
            return Err(AddressError::InvalidFormat(
                "device address cannot be empty".to_string(),
            ));
        }

        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{input}")
        };

        let url = Url::parse(&candidate).map_err(|e| match e {
            ParseError::InvalidPort => AddressError::InvalidPort(input.to_string()),
            other => AddressError::InvalidFormat(format!("{input}: {other}")),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AddressError::InvalidFormat(format!(
                "unsupported scheme in device address: {input}"
            )));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(AddressError::InvalidFormat(
                "device host cannot be empty".to_string(),
            ));
        }

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(AddressError::InvalidFormat(format!(
                "device address must not contain a path: {input}"
            )));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(AddressError::InvalidFormat(format!(
                "device address must not contain credentials: {input}"
            )));
        }

        if url.port() == Some(0) {
            return Err(AddressError::InvalidPort(input.to_string()));
        }

        Ok(Self { url })
    }

    /// Host name or IP address (lowercase, IPv6 in brackets)
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Explicit non-default port, if one was given
    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// URL scheme
    pub fn scheme(&self) -> Scheme {
        match self.url.scheme() {
            "https" => Scheme::Https,
            _ => Scheme::Http,
        }
    }

    /// Base URL for RPC requests, without a trailing slash
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port() {
            Some(port) => write!(f, "{}:{}", self.host(), port),
            None => write!(f, "{}", self.host()),
        }
    }
}

/// Errors that can occur during address parsing
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    /// Invalid address format
    #[error("address error: {0}")]
    InvalidFormat(String),

    /// Port is not a valid TCP port
    #[error("address error: invalid port in '{0}'")]
    InvalidPort(String),
}
