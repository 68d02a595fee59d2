//! Docker runtime client for teleglogger
//!
//! This crate provides the container runtime interface the pump manager
//! consumes (listing, lifecycle events, inspection, log attachment) and its
//! Docker implementation.

mod client;
mod pipes;
mod runtime;

pub use client::DockerRuntime;
pub use pipes::{LogSinks, LogSources, PIPE_CAPACITY, log_pipes};
pub use runtime::{AttachRequest, ContainerRuntime, EventStream, RuntimeError};

// Re-export types that are used in our public API
pub use teleglogger_types::{ContainerId, ContainerInfo, EventKind, LifecycleEvent, StreamSource};
