pub mod config;
pub mod error;

pub use config::{redact_url, Settings};
pub use error::{NexusError, Result};
