//! CLI command implementations

pub mod error;
pub mod fetch;
pub mod window;

pub use error::CliError;
pub use fetch::{Cli, Commands, FetchArgs, OutputFormat};
pub use window::WindowArgs;
