//! Scripted runtime and recording notifier for tests

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};

use teleglogger_docker::{AttachRequest, ContainerRuntime, EventStream, LogSinks, RuntimeError};
use teleglogger_notify::{Notifier, NotifyError};
use teleglogger_types::{ContainerId, ContainerInfo, LifecycleEvent, Notification, StreamSource};

/// Give up on a test wait after this long
pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// How a scripted attachment ends
#[derive(Clone, Debug)]
pub(crate) enum SessionEnd {
    Closed,
    Timeout(Duration),
    /// Forward emitted output until the container stops or is removed
    UntilStopped,
}

/// One scripted attachment: output written immediately, then an ending
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub output: Vec<(StreamSource, String)>,
    pub end: SessionEnd,
}

impl Session {
    pub fn new(end: SessionEnd) -> Self {
        Self {
            output: Vec::new(),
            end,
        }
    }

    pub fn write(mut self, source: StreamSource, text: &str) -> Self {
        self.output.push((source, text.to_string()));
        self
    }
}

#[derive(Default)]
struct State {
    containers: HashMap<ContainerId, ContainerInfo>,
    sessions: HashMap<ContainerId, VecDeque<Session>>,
    pending: HashMap<ContainerId, Vec<(StreamSource, String)>>,
    failing_inspect: Vec<ContainerId>,
    attaches: Vec<AttachRequest>,
}

/// In-memory container runtime driven by the test
pub(crate) struct FakeRuntime {
    state: Mutex<State>,
    changed: Notify,
    attach_count: watch::Sender<usize>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<Result<LifecycleEvent, RuntimeError>>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<LifecycleEvent, RuntimeError>>>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(State::default()),
            changed: Notify::new(),
            attach_count: watch::channel(0).0,
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl FakeRuntime {
    /// Running container with a supported log driver
    pub fn container(id: &str, name: &str) -> ContainerInfo {
        ContainerInfo::new(id, name)
            .running(true)
            .with_log_driver("json-file")
    }

    pub fn add(&self, container: ContainerInfo) {
        self.state
            .lock()
            .containers
            .insert(container.id.clone(), container);
        self.changed.notify_waiters();
    }

    pub fn script(&self, id: &str, session: Session) {
        self.state
            .lock()
            .sessions
            .entry(ContainerId::new(id))
            .or_default()
            .push_back(session);
    }

    /// Output delivered to an attachment that is waiting for the container to stop
    pub fn emit(&self, id: &str, source: StreamSource, text: &str) {
        self.state
            .lock()
            .pending
            .entry(ContainerId::new(id))
            .or_default()
            .push((source, text.to_string()));
        self.changed.notify_waiters();
    }

    pub fn rename(&self, id: &str, name: &str) {
        if let Some(container) = self.state.lock().containers.get_mut(&ContainerId::new(id)) {
            container.name = name.to_string();
        }
        self.changed.notify_waiters();
    }

    pub fn stop(&self, id: &str) {
        if let Some(container) = self.state.lock().containers.get_mut(&ContainerId::new(id)) {
            container.running = false;
        }
        self.changed.notify_waiters();
    }

    pub fn remove(&self, id: &str) {
        self.state.lock().containers.remove(&ContainerId::new(id));
        self.changed.notify_waiters();
    }

    /// Make every later inspection of `id` fail with a daemon error
    pub fn fail_inspect(&self, id: &str) {
        self.state.lock().failing_inspect.push(ContainerId::new(id));
    }

    pub fn send_event(&self, event: LifecycleEvent) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(Ok(event));
        }
    }

    /// Make the event feed yield a daemon error
    pub fn send_error(&self, error: bollard::errors::Error) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(Err(RuntimeError::Docker(error)));
        }
    }

    pub fn close_events(&self) {
        self.events_tx.lock().take();
    }

    pub fn attaches(&self) -> Vec<AttachRequest> {
        self.state.lock().attaches.clone()
    }

    pub async fn wait_for_attaches(&self, count: usize) {
        let mut rx = self.attach_count.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|n| *n >= count))
            .await
            .expect("timed out waiting for attach")
            .expect("attach counter dropped");
    }

    fn is_running(&self, id: &ContainerId) -> bool {
        self.state
            .lock()
            .containers
            .get(id)
            .is_some_and(|container| container.running)
    }

    async fn forward_until_stopped(
        &self,
        id: &ContainerId,
        sinks: &mut LogSinks,
    ) -> Result<(), RuntimeError> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let pending = self.state.lock().pending.remove(id).unwrap_or_default();
            for (source, text) in pending {
                sinks.write(source, text.as_bytes()).await?;
            }
            if !self.is_running(id) {
                return Ok(());
            }

            notified.await;
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerId>, RuntimeError> {
        let mut ids: Vec<ContainerId> = self
            .state
            .lock()
            .containers
            .values()
            .filter(|container| container.running)
            .map(|container| container.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn events(&self) -> Result<EventStream, RuntimeError> {
        let rx = self
            .events_rx
            .lock()
            .take()
            .expect("events subscribed twice");
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(stream.boxed())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo, RuntimeError> {
        let state = self.state.lock();
        if state.failing_inspect.contains(id) {
            return Err(RuntimeError::Docker(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: "daemon unavailable".to_string(),
                },
            ));
        }
        state
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))
    }

    async fn attach_logs(
        &self,
        request: &AttachRequest,
        sinks: &mut LogSinks,
    ) -> Result<(), RuntimeError> {
        let session = {
            let mut state = self.state.lock();
            state.attaches.push(request.clone());
            state
                .sessions
                .get_mut(&request.id)
                .and_then(|sessions| sessions.pop_front())
        };
        self.attach_count.send_modify(|n| *n += 1);

        let session = session.unwrap_or_else(|| Session::new(SessionEnd::UntilStopped));
        for (source, text) in &session.output {
            sinks.write(*source, text.as_bytes()).await?;
        }

        match session.end {
            SessionEnd::Closed => Ok(()),
            SessionEnd::Timeout(timeout) => Err(RuntimeError::InactivityTimeout(timeout)),
            SessionEnd::UntilStopped => self.forward_until_stopped(&request.id, sinks).await,
        }
    }
}

/// Notifier that records every message it is asked to send
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    attempts: watch::Sender<usize>,
    fail: bool,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: watch::channel(0).0,
            fail: false,
        }
    }
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.borrow()
    }

    pub async fn wait_for(&self, count: usize) {
        let mut rx = self.attempts.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|n| *n >= count))
            .await
            .expect("timed out waiting for notifications")
            .expect("notification counter dropped");
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let result = if self.fail {
            Err(NotifyError::Rejected("chat not found".to_string()))
        } else {
            self.sent.lock().push(notification.clone());
            Ok(())
        };
        self.attempts.send_modify(|n| *n += 1);
        result
    }
}
