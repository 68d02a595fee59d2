use thiserror::Error;

use teleglogger_docker::RuntimeError;
use teleglogger_types::ContainerId;

/// Conditions that stop the pump manager
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("failed to list running containers: {0}")]
    List(#[source] RuntimeError),

    #[error("failed to subscribe to docker events: {0}")]
    Subscribe(#[source] RuntimeError),

    #[error("docker event stream failed: {0}")]
    Feed(#[source] RuntimeError),

    #[error("docker event stream closed")]
    FeedClosed,

    #[error("failed to inspect container {id}: {source}")]
    Inspect {
        id: ContainerId,
        #[source]
        source: RuntimeError,
    },
}
