//! Docker client for teleglogger

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions, LogOutput, LogsOptions};
use bollard::models::{ContainerInspectResponse, EventMessage};
use bollard::system::EventsOptions;
use futures::StreamExt;

use crate::pipes::LogSinks;
use crate::runtime::{AttachRequest, ContainerRuntime, EventStream, RuntimeError};
use teleglogger_types::{ContainerId, ContainerInfo, EventKind, LifecycleEvent, StreamSource};

/// Docker client wrapper
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon named by `DOCKER_HOST`, or the local socket
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        if let Ok(version) = docker.version().await {
            tracing::info!(version = ?version.version, api = ?version.api_version, "connected to docker");
        }
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerId>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| c.id)
            .map(ContainerId::from)
            .collect())
    }

    async fn events(&self) -> Result<EventStream, RuntimeError> {
        let options = EventsOptions::<String> {
            filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
            ..Default::default()
        };
        tracing::debug!("subscribing to container events");

        let stream = self
            .docker
            .events(Some(options))
            .filter_map(|result| async move {
                match result {
                    Ok(message) => lifecycle_event(message).map(Ok),
                    Err(e) => Some(Err(RuntimeError::Docker(e))),
                }
            })
            .boxed();

        Ok(stream)
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo, RuntimeError> {
        match self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => Ok(container_info(id, response)),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(RuntimeError::NotFound(id.clone())),
            Err(e) => Err(RuntimeError::Docker(e)),
        }
    }

    async fn attach_logs(
        &self,
        request: &AttachRequest,
        sinks: &mut LogSinks,
    ) -> Result<(), RuntimeError> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            since: request.since.timestamp(),
            tail: request.tail.clone(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(request.id.as_str(), Some(options));

        loop {
            let next = match request.inactivity_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => return Err(RuntimeError::InactivityTimeout(limit)),
                },
                None => stream.next().await,
            };

            match next {
                Some(Ok(output)) => match output {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        sinks.write(StreamSource::Stdout, &message).await?
                    }
                    LogOutput::StdErr { message } => {
                        sinks.write(StreamSource::Stderr, &message).await?
                    }
                    LogOutput::StdIn { .. } => {
                        tracing::trace!(container = %request.id, "skipping stdin frame")
                    }
                },
                Some(Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                })) => return Err(RuntimeError::NotFound(request.id.clone())),
                Some(Err(e)) => return Err(RuntimeError::Docker(e)),
                None => return Ok(()),
            }
        }
    }
}

/// Convert a daemon event into a lifecycle event, skipping events without an actor
fn lifecycle_event(message: EventMessage) -> Option<LifecycleEvent> {
    let id = message.actor.and_then(|actor| actor.id)?;
    let kind = message
        .action
        .as_deref()
        .map(EventKind::from)
        .unwrap_or(EventKind::Other);
    Some(LifecycleEvent::new(id, kind))
}

fn container_info(id: &ContainerId, response: ContainerInspectResponse) -> ContainerInfo {
    let mut info = ContainerInfo::new(
        response.id.as_deref().map(ContainerId::from).unwrap_or_else(|| id.clone()),
        response.name.unwrap_or_default(),
    );
    info.running = response
        .state
        .and_then(|state| state.running)
        .unwrap_or(false);
    info.tty = response
        .config
        .and_then(|config| config.tty)
        .unwrap_or(false);
    info.log_driver = response
        .host_config
        .and_then(|host| host.log_config)
        .and_then(|log_config| log_config.typ);
    info
}
