use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use teleglogger_types::ContainerInfo;

/// Containers whose name contains this are never pumped, so the tool does
/// not read its own output
pub const SELF_EXCLUSION: &str = "teleglogger";

/// Log drivers the daemon can read logs back from
pub const SUPPORTED_LOG_DRIVERS: &[&str] = &["json-file", "journald", "db"];

pub const DEFAULT_TAIL: &str = "all";

/// How pumps attach to containers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PumpSettings {
    /// Historical lines requested on attach, a number or "all"
    pub tail: String,

    /// End an idle attachment after this long and reattach
    pub inactivity_timeout: Option<Duration>,

    /// Pump containers that run with a TTY
    pub allow_tty: bool,

    /// Replay output produced before the pump first attached
    pub backlog: bool,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            tail: DEFAULT_TAIL.to_string(),
            inactivity_timeout: None,
            allow_tty: false,
            backlog: false,
        }
    }
}

/// Why a started container gets no pump
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Tty,
    SelfExcluded,
    UnsupportedLogDriver,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tty => "tty enabled",
            Self::SelfExcluded => "name excluded",
            Self::UnsupportedLogDriver => "log driver not supported",
        })
    }
}

impl PumpSettings {
    pub fn rejection(&self, container: &ContainerInfo) -> Option<Rejection> {
        if container.tty && !self.allow_tty {
            return Some(Rejection::Tty);
        }
        if container.name.contains(SELF_EXCLUSION) {
            return Some(Rejection::SelfExcluded);
        }
        let supported = container
            .log_driver
            .as_deref()
            .is_some_and(|driver| SUPPORTED_LOG_DRIVERS.contains(&driver));
        if !supported {
            return Some(Rejection::UnsupportedLogDriver);
        }
        None
    }

    /// "since" for a pump's first attachment
    pub fn initial_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.backlog {
            DateTime::UNIX_EPOCH
        } else {
            now
        }
    }
}
