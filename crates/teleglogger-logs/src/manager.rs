use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use teleglogger_docker::{ContainerRuntime, log_pipes};
use teleglogger_types::{ContainerId, ContainerInfo, EventKind, LifecycleEvent, Notification};

use crate::dispatch::Dispatcher;
use crate::error::PumpError;
use crate::pump::{ContainerPump, PumpRecord};
use crate::settings::{PumpSettings, Rejection};

/// Result of handling a start or restart event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyPumping,
    Rejected(Rejection),
    /// The container could not be inspected
    Vanished,
}

/// Keeps exactly one log pump per running container
#[derive(Clone)]
pub struct PumpManager {
    runtime: Arc<dyn ContainerRuntime>,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<PumpSettings>,

    /// Active pumps by container
    pumps: Arc<Mutex<HashMap<ContainerId, PumpRecord>>>,

    /// Fatal errors raised by pump tasks
    fatal_tx: mpsc::UnboundedSender<PumpError>,
    fatal_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<PumpError>>>,
}

impl PumpManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        dispatcher: Dispatcher,
        settings: PumpSettings,
    ) -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            dispatcher: Arc::new(dispatcher),
            settings: Arc::new(settings),
            pumps: Arc::new(Mutex::new(HashMap::new())),
            fatal_tx,
            fatal_rx: Arc::new(tokio::sync::Mutex::new(fatal_rx)),
        }
    }

    /// Pump every running container, then follow the event feed.
    ///
    /// Only returns on a fatal condition: the feed ending or failing, or a
    /// pump hitting an inspection error it cannot recover from.
    pub async fn run(&self) -> Result<(), PumpError> {
        let mut fatal = self.fatal_rx.lock().await;

        if let Some(timeout) = self.settings.inactivity_timeout {
            tracing::debug!(?timeout, "using inactivity timeout");
        }

        let running = self.runtime.list_running().await.map_err(PumpError::List)?;
        for id in running {
            self.start(&id).await;
        }

        let mut events = self
            .runtime
            .events()
            .await
            .map_err(PumpError::Subscribe)?;

        loop {
            tokio::select! {
                Some(error) = fatal.recv() => return Err(error),

                next = events.next() => {
                    match next {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => return Err(PumpError::Feed(e)),
                        None => return Err(PumpError::FeedClosed),
                    }
                }
            }
        }
    }

    /// Act on one lifecycle event without waiting for the action to finish
    pub fn handle_event(&self, event: LifecycleEvent) {
        tracing::debug!(container = %event.id, kind = ?event.kind, "event");

        let manager = self.clone();
        match event.kind {
            EventKind::Start | EventKind::Restart => {
                tokio::spawn(async move {
                    manager.start(&event.id).await;
                });
            }
            EventKind::Rename => {
                tokio::spawn(async move {
                    manager.rename(&event.id).await;
                });
            }
            EventKind::Die => {
                tokio::spawn(async move {
                    manager.report_dead(&event.id).await;
                });
            }
            EventKind::Other => {}
        }
    }

    /// Start pumping a container unless it is excluded or already pumped
    pub async fn start(&self, id: &ContainerId) -> StartOutcome {
        tracing::info!(container = %id, "starting pump");

        let container = match self.runtime.inspect(id).await {
            Ok(container) => container,
            Err(e) => {
                tracing::debug!(container = %id, error = %e, "ignored: inspection failed");
                return StartOutcome::Vanished;
            }
        };

        if let Some(reason) = self.settings.rejection(&container) {
            tracing::debug!(container = %id, %reason, "ignored");
            return StartOutcome::Rejected(reason);
        }

        let container = Arc::new(RwLock::new(container));
        let stopped = CancellationToken::new();
        {
            let mut pumps = self.pumps.lock();
            match pumps.entry(id.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(container = %id, "pump exists");
                    return StartOutcome::AlreadyPumping;
                }
                Entry::Vacant(entry) => {
                    entry.insert(PumpRecord::new(Arc::clone(&container), stopped.clone()));
                }
            }
        }

        let (sinks, sources) = log_pipes();
        let pump = ContainerPump::spawn(
            id.clone(),
            container,
            sinks,
            sources,
            Arc::clone(&self.dispatcher),
        );
        tokio::spawn(self.clone().supervise(id.clone(), pump, stopped));

        StartOutcome::Started
    }

    /// Reconnect loop and teardown for one pump
    async fn supervise(self, id: ContainerId, mut pump: ContainerPump, stopped: CancellationToken) {
        let outcome = pump.follow(self.runtime.as_ref(), &self.settings).await;

        tracing::debug!(container = %id, "dead");
        let readers = pump.close().await;
        self.pumps.lock().remove(&id);
        readers.finished().await;
        stopped.cancel();

        if let Err(e) = outcome {
            tracing::error!(container = %id, error = %e, "pump failed");
            let _ = self.fatal_tx.send(e);
        }
    }

    /// Update the stored name of a pumped container
    pub async fn rename(&self, id: &ContainerId) -> bool {
        let pumping = self.pumps.lock().contains_key(id);
        if !pumping {
            tracing::debug!(container = %id, "ignored rename: pump not found");
            return false;
        }

        let container = match self.runtime.inspect(id).await {
            Ok(container) => container,
            Err(e) => {
                tracing::debug!(container = %id, error = %e, "ignored rename: inspection failed");
                return false;
            }
        };

        let pumps = self.pumps.lock();
        match pumps.get(id) {
            Some(record) => {
                tracing::debug!(container = %id, name = %container.name, "renamed");
                record.rename(container.name);
                true
            }
            None => false,
        }
    }

    /// Send a "died" notice for a container
    pub async fn report_dead(&self, id: &ContainerId) {
        tracing::info!(container = %id, "container died");
        match self.runtime.inspect(id).await {
            Ok(container) => {
                self.dispatcher
                    .notify(&Notification::died(&container))
                    .await
            }
            Err(e) => {
                tracing::debug!(container = %id, error = %e, "failed to inspect dead container");
            }
        }
    }

    pub fn is_pumping(&self, id: &ContainerId) -> bool {
        self.pumps.lock().contains_key(id)
    }

    /// Get the number of active pumps
    pub fn active_count(&self) -> usize {
        self.pumps.lock().len()
    }

    /// Last known metadata of a pumped container
    pub fn container(&self, id: &ContainerId) -> Option<ContainerInfo> {
        self.pumps.lock().get(id).map(PumpRecord::container)
    }

    /// Wait for a container's pump to tear down; returns at once if there is none
    pub async fn wait_stopped(&self, id: &ContainerId) {
        let stopped = self.pumps.lock().get(id).map(PumpRecord::stopped);
        if let Some(stopped) = stopped {
            stopped.cancelled().await;
        }
    }
}
