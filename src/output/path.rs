//! Output filename templating
//!
//! A template is a path in which the literal token `[mac]` stands for the
//! device MAC address. The token is substituted once per fetch, after the
//! device identity is known and before anything is written.
//!
//! ```rust
//! use meter_data_downloader::output::OutputTemplate;
//! use meter_data_downloader::device::ChannelSelector;
//! use std::path::PathBuf;
//!
//! let template = OutputTemplate::default_for(ChannelSelector::Channel(1));
//! assert_eq!(template.render("A8032ABE54DC"), PathBuf::from("A8032ABE54DC_ch1.log"));
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::device::ChannelSelector;
use crate::downloader::config::DEFAULT_OUTPUT_TEMPLATE;

/// Placeholder replaced by the device MAC address
pub const MAC_PLACEHOLDER: &str = "[mac]";

/// Output path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate(String);

impl OutputTemplate {
    /// Wrap a user-supplied template
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Default template for a channel selection
    ///
    /// `[mac].log` for the aggregate history, `[mac]_ch<N>.log` for a single
    /// channel so per-channel runs never interleave in one file.
    pub fn default_for(channel: ChannelSelector) -> Self {
        match channel {
            ChannelSelector::Aggregate => Self::new(DEFAULT_OUTPUT_TEMPLATE),
            ChannelSelector::Channel(id) => Self(format!("{MAC_PLACEHOLDER}_ch{id}.log")),
        }
    }

    /// Template text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the template references the MAC placeholder
    pub fn has_placeholder(&self) -> bool {
        self.0.contains(MAC_PLACEHOLDER)
    }

    /// Substitute every `[mac]` token
    pub fn render(&self, mac: &str) -> PathBuf {
        PathBuf::from(self.0.replace(MAC_PLACEHOLDER, mac))
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
