//! Shared types for teleglogger
//!
//! This crate contains data structures used across multiple teleglogger crates.

use chrono::{DateTime, Utc};
use std::fmt;

// ============================================================================
// Container Types
// ============================================================================

/// Length every container identifier is truncated to
pub const CONTAINER_ID_LEN: usize = 12;

/// Length of the identifier prefix shown in notifications
pub const SHORT_ID_LEN: usize = 4;

/// Normalized container identity.
///
/// Docker reports full 64-character ids in some places and 12-character ids
/// in others. Every id is truncated on construction so both forms compare
/// equal and can be used as the same registry key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(truncate(id.as_ref(), CONTAINER_ID_LEN).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Four-character prefix used in notification text
    pub fn short(&self) -> &str {
        truncate(&self.0, SHORT_ID_LEN)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

fn truncate(s: &str, len: usize) -> &str {
    match s.char_indices().nth(len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Container metadata as reported by an inspection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub running: bool,
    pub tty: bool,
    pub log_driver: Option<String>,
}

impl ContainerInfo {
    pub fn new(id: impl Into<ContainerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: normalize_name(name.into()),
            running: false,
            tty: false,
            log_driver: None,
        }
    }

    pub fn running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn with_log_driver(mut self, driver: impl Into<String>) -> Self {
        self.log_driver = Some(driver.into());
        self
    }
}

/// Strip the leading slash Docker puts in front of container names
pub fn normalize_name(name: String) -> String {
    match name.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Container lifecycle event kinds the pump manager reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Restart,
    Rename,
    Die,
    Other,
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "start" => Self::Start,
            "restart" => Self::Restart,
            "rename" => Self::Rename,
            "die" => Self::Die,
            _ => Self::Other,
        }
    }
}

/// A single event from the runtime's lifecycle feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub id: ContainerId,
    pub kind: EventKind,
}

impl LifecycleEvent {
    pub fn new(id: impl Into<ContainerId>, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Synthetic start event for a container that was already running
    pub fn start(id: impl Into<ContainerId>) -> Self {
        Self::new(id, EventKind::Start)
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Which of a container's output streams a line came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line read from a container stream
#[derive(Clone, Debug)]
pub struct LogLine {
    /// Stream the line was read from
    pub source: StreamSource,

    /// Container that produced the line
    pub container_id: ContainerId,

    /// Container name at the time the line was read
    pub container_name: String,

    /// Line text without its trailing newline
    pub text: String,

    /// When the line was received
    pub received_at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(
        source: StreamSource,
        container_id: ContainerId,
        container_name: String,
        text: String,
    ) -> Self {
        Self {
            source,
            container_id,
            container_name,
            text,
            received_at: Utc::now(),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// A message handed to the notification sink
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Free-text lifecycle notice
    Lifecycle(String),

    /// A log line that matched the filter
    Line {
        container_name: String,
        short_id: String,
        source: StreamSource,
        text: String,
    },
}

impl Notification {
    /// "<name> <short-id> died"
    pub fn died(container: &ContainerInfo) -> Self {
        Self::Lifecycle(format!("{} {} died", container.name, container.id.short()))
    }

    pub fn line(line: &LogLine) -> Self {
        Self::Line {
            container_name: line.container_name.clone(),
            short_id: line.container_id.short().to_string(),
            source: line.source,
            text: line.text.clone(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(text) => f.write_str(text),
            Self::Line {
                container_name,
                short_id,
                source,
                text,
            } => write!(f, "{} {} {} {}", container_name, short_id, source, text),
        }
    }
}
