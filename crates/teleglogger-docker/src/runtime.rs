use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::pipes::LogSinks;
use teleglogger_types::{ContainerId, ContainerInfo, LifecycleEvent};

/// Live feed of container lifecycle events
pub type EventStream = BoxStream<'static, Result<LifecycleEvent, RuntimeError>>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(ContainerId),

    #[error("log stream idle for {0:?}")]
    InactivityTimeout(Duration),

    #[error("failed to forward log output: {0}")]
    Sink(#[from] std::io::Error),

    #[error("docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Parameters for a single follow-mode log attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachRequest {
    pub id: ContainerId,

    /// Only lines produced at or after this instant are delivered
    pub since: DateTime<Utc>,

    /// Number of historical lines to deliver, or "all"
    pub tail: String,

    /// End the attachment when no output arrives for this long
    pub inactivity_timeout: Option<Duration>,
}

/// Operations the pump manager needs from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ids of all currently running containers
    async fn list_running(&self) -> Result<Vec<ContainerId>, RuntimeError>;

    /// Subscribe to container lifecycle events
    async fn events(&self) -> Result<EventStream, RuntimeError>;

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo, RuntimeError>;

    /// Follow a container's output, writing stdout and stderr into `sinks`.
    ///
    /// Returns `Ok(())` when the runtime closes the stream normally and
    /// `RuntimeError::InactivityTimeout` when the stream went idle.
    async fn attach_logs(
        &self,
        request: &AttachRequest,
        sinks: &mut LogSinks,
    ) -> Result<(), RuntimeError>;
}
