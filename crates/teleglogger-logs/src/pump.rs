use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use parking_lot::RwLock;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use teleglogger_docker::{AttachRequest, ContainerRuntime, LogSinks, LogSources, RuntimeError};
use teleglogger_types::{ContainerId, ContainerInfo, LogLine, StreamSource};

use crate::dispatch::Dispatcher;
use crate::error::PumpError;
use crate::settings::PumpSettings;
use crate::splitter::lines;

/// Container metadata shared between a registry entry and its pump
pub(crate) type SharedContainer = Arc<RwLock<ContainerInfo>>;

/// Registry entry for a container that is being pumped
pub struct PumpRecord {
    container: SharedContainer,

    /// Cancelled once the pump has torn down
    stopped: CancellationToken,
}

impl PumpRecord {
    pub(crate) fn new(container: SharedContainer, stopped: CancellationToken) -> Self {
        Self { container, stopped }
    }

    pub fn container(&self) -> ContainerInfo {
        self.container.read().clone()
    }

    /// Update the name in place; lines read afterwards carry the new name
    pub(crate) fn rename(&self, name: String) {
        self.container.write().name = name;
    }

    pub(crate) fn stopped(&self) -> CancellationToken {
        self.stopped.clone()
    }
}

/// One container's log pump: the pipe write halves plus the two line readers
pub(crate) struct ContainerPump {
    id: ContainerId,
    sinks: LogSinks,
    readers: Readers,
}

impl ContainerPump {
    /// Start the stdout and stderr line readers
    pub(crate) fn spawn(
        id: ContainerId,
        container: SharedContainer,
        sinks: LogSinks,
        sources: LogSources,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let LogSources { stdout, stderr } = sources;
        let handles = vec![
            spawn_reader(
                StreamSource::Stdout,
                stdout,
                id.clone(),
                Arc::clone(&container),
                Arc::clone(&dispatcher),
            ),
            spawn_reader(StreamSource::Stderr, stderr, id.clone(), container, dispatcher),
        ];

        Self {
            id,
            sinks,
            readers: Readers { handles },
        }
    }

    /// Keep the container's logs attached until it stops running.
    ///
    /// Returns `Ok(())` once the container is gone or stopped. Any inspection
    /// failure other than not-found is returned as fatal.
    pub(crate) async fn follow(
        &mut self,
        runtime: &dyn ContainerRuntime,
        settings: &PumpSettings,
    ) -> Result<(), PumpError> {
        let mut since = settings.initial_since(Utc::now());

        loop {
            let request = AttachRequest {
                id: self.id.clone(),
                since,
                tail: settings.tail.clone(),
                inactivity_timeout: settings.inactivity_timeout,
            };
            tracing::debug!(container = %self.id, tail = %request.tail, since = %request.since, "attaching");

            let result = runtime.attach_logs(&request, &mut self.sinks).await;
            match &result {
                Ok(()) => tracing::debug!(container = %self.id, "log stream stopped"),
                Err(e) => tracing::debug!(container = %self.id, error = %e, "log stream stopped with error"),
            }
            since = next_since(&result, Utc::now());

            match runtime.inspect(&self.id).await {
                Ok(container) if container.running => continue,
                Ok(_) => return Ok(()),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(source) => {
                    return Err(PumpError::Inspect {
                        id: self.id.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Close both pipes. The readers finish once buffered output is read.
    pub(crate) async fn close(self) -> Readers {
        if let Err(e) = self.sinks.close().await {
            tracing::debug!(container = %self.id, error = %e, "failed to close log pipes");
        }
        self.readers
    }
}

/// Handles of a pump's line reader tasks
pub(crate) struct Readers {
    handles: Vec<JoinHandle<()>>,
}

impl Readers {
    /// Wait until every buffered line has been dispatched
    pub(crate) async fn finished(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::debug!(error = %e, "line reader task failed");
            }
        }
    }
}

/// "since" for the next attachment.
///
/// After an inactivity timeout the window is backdated by the timeout so
/// lines written just before the stream went idle are not lost.
pub(crate) fn next_since(
    result: &Result<(), RuntimeError>,
    ended_at: DateTime<Utc>,
) -> DateTime<Utc> {
    match result {
        Err(RuntimeError::InactivityTimeout(timeout)) => chrono::Duration::from_std(*timeout)
            .ok()
            .and_then(|timeout| ended_at.checked_sub_signed(timeout))
            .unwrap_or(DateTime::UNIX_EPOCH),
        _ => ended_at,
    }
}

fn spawn_reader(
    source: StreamSource,
    reader: DuplexStream,
    id: ContainerId,
    container: SharedContainer,
    dispatcher: Arc<Dispatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = std::pin::pin!(lines(reader));

        loop {
            match stream.try_next().await {
                Ok(Some(text)) => {
                    let name = container.read().name.clone();
                    let line = LogLine::new(source, id.clone(), name, text);
                    dispatcher.dispatch(&line).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(container = %id, source = %source, error = %e, "read failed");
                    break;
                }
            }
        }
    })
}
