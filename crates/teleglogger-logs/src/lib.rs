//! Container log pumping for teleglogger
//!
//! This crate provides line splitting, filtering, dispatch, per-container log
//! pumps and the manager that keeps one pump per running container.

mod dispatch;
mod error;
mod filter;
mod manager;
mod pump;
mod settings;
mod splitter;

#[cfg(test)]
mod testing;

pub use dispatch::Dispatcher;
pub use error::PumpError;
pub use filter::{DEFAULT_PATTERN, LineFilter};
pub use manager::{PumpManager, StartOutcome};
pub use pump::PumpRecord;
pub use settings::{DEFAULT_TAIL, PumpSettings, Rejection, SELF_EXCLUSION, SUPPORTED_LOG_DRIVERS};
pub use splitter::{LineSplitter, lines};

// Re-export types used in our public API
pub use teleglogger_types::{ContainerId, ContainerInfo, LogLine, Notification, StreamSource};
