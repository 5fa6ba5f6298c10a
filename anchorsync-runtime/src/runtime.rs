use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use anchorsync_core::{
    AnchorError, AnchorId, HostEvent, Model, Renderable, ResolveEvent, SessionSetting,
    TrackingEvent,
};
use anchorsync_sync::HostProgress;

use crate::coordinator::SessionCoordinator;
use crate::error::RuntimeError;
use crate::protocol::{
    Command, CoordinatorStatus, CoordinatorUpdate, Event, LoadReport, LoadRequest, Reply,
    SaveReport,
};

const COMMAND_CAPACITY: usize = 64;

/// Cloneable, synchronous entry point for collaborator callbacks.
///
/// Sends never block; events are dropped once the owner task is gone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("coordinator gone, dropping collaborator event");
        }
    }

    pub fn send_tracking(&self, event: TrackingEvent) {
        self.send(Event::Tracking(event));
    }

    pub fn send_host(&self, event: HostEvent) {
        self.send(Event::Host(event));
    }

    pub fn send_resolve(&self, event: ResolveEvent) {
        self.send(Event::Resolve(event));
    }
}

/// Receiving half of [`event_channel`], consumed by [`spawn`].
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Event>,
    sink: EventSink,
}

impl EventQueue {
    /// Next queued event, if any, without waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Create the collaborator event queue. Hand the sink to collaborators before
/// the coordinator is built, then pass the queue to [`spawn`].
pub fn event_channel() -> (EventSink, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = EventSink { tx };
    (sink.clone(), EventQueue { rx, sink })
}

/// Move `coordinator` onto its owner task.
///
/// The task exits on [`CoordinatorHandle::shutdown`] or once every handle is
/// dropped.
pub fn spawn(
    coordinator: SessionCoordinator,
    events: EventQueue,
) -> (CoordinatorHandle, JoinHandle<Result<(), RuntimeError>>) {
    let (command_tx, command_rx) = mpsc::channel::<Command>(COMMAND_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let handle = CoordinatorHandle {
        commands: command_tx,
        events: events.sink.clone(),
        progress: coordinator.progress_receiver(),
        updates: coordinator.updates_sender(),
        shutdown: shutdown_tx.clone(),
        poll_interval: coordinator.config().poll_interval(),
    };

    let task = {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { run(coordinator, command_rx, events.rx, shutdown_rx).await })
    };
    (handle, task)
}

async fn run(
    mut coordinator: SessionCoordinator,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RuntimeError> {
    let mut events_open = true;
    tracing::info!("coordinator started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_command = commands.recv() => {
                let Some(command) = maybe_command else { break };
                dispatch(&mut coordinator, command);
            }
            maybe_event = events.recv(), if events_open => {
                match maybe_event {
                    Some(event) => coordinator.handle_event(event),
                    None => events_open = false,
                }
            }
        }
    }

    tracing::info!(state = ?coordinator.state(), "coordinator stopped");
    Ok(())
}

fn dispatch(coordinator: &mut SessionCoordinator, command: Command) {
    match command {
        Command::Save { respond_to } => {
            let _ = respond_to.send(coordinator.save());
        }
        Command::Load {
            request,
            respond_to,
        } => {
            let _ = respond_to.send(coordinator.load(request));
        }
        Command::AddModel { model, respond_to } => {
            let _ = respond_to.send(coordinator.add_model(model));
        }
        Command::Delete {
            anchor_name,
            respond_to,
        } => {
            let _ = respond_to.send(coordinator.delete(&anchor_name));
        }
        Command::MarkForDeletion(renderable) => coordinator.mark_for_deletion(renderable),
        Command::DismissHosting => coordinator.dismiss_hosting(),
        Command::ToggleDebug(enabled) => coordinator.toggle_debug(enabled),
        Command::UpdateSettings(settings) => coordinator.update_settings(settings),
        Command::Status { respond_to } => {
            let _ = respond_to.send(coordinator.status());
        }
    }
}

/// UI-side handle to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    events: EventSink,
    progress: watch::Receiver<HostProgress>,
    updates: broadcast::Sender<CoordinatorUpdate>,
    shutdown: broadcast::Sender<()>,
    poll_interval: Duration,
}

impl CoordinatorHandle {
    pub async fn save(&self) -> Result<SaveReport, RuntimeError> {
        self.request(|respond_to| Command::Save { respond_to }).await
    }

    pub async fn load(&self, request: LoadRequest) -> Result<LoadReport, RuntimeError> {
        self.request(|respond_to| Command::Load {
            request,
            respond_to,
        })
        .await
    }

    pub async fn add_model(&self, model: Model) -> Result<AnchorId, RuntimeError> {
        self.request(|respond_to| Command::AddModel { model, respond_to })
            .await
    }

    pub async fn delete(&self, anchor_name: &str) -> Result<Option<AnchorId>, RuntimeError> {
        let anchor_name = anchor_name.to_string();
        self.request(|respond_to| Command::Delete {
            anchor_name,
            respond_to,
        })
        .await
    }

    pub async fn mark_for_deletion(&self, renderable: Renderable) -> Result<(), RuntimeError> {
        self.send(Command::MarkForDeletion(renderable)).await
    }

    pub async fn dismiss_hosting(&self) -> Result<(), RuntimeError> {
        self.send(Command::DismissHosting).await
    }

    pub async fn toggle_debug(&self, enabled: bool) -> Result<(), RuntimeError> {
        self.send(Command::ToggleDebug(enabled)).await
    }

    pub async fn update_settings(&self, settings: Vec<SessionSetting>) -> Result<(), RuntimeError> {
        self.send(Command::UpdateSettings(settings)).await
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, RuntimeError> {
        let (respond_to, rx) = oneshot::channel();
        self.send(Command::Status { respond_to }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed("status reply"))
    }

    /// Latest published hosting progress.
    pub fn progress(&self) -> HostProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorUpdate> {
        self.updates.subscribe()
    }

    /// Sink for collaborator callbacks into this coordinator.
    pub fn events(&self) -> EventSink {
        self.events.clone()
    }

    /// Wait until every record in the current pending set is hosted or failed.
    ///
    /// Returns immediately for an empty set, and when the coordinator stops.
    /// Progress is rechecked at least once per poll interval.
    pub async fn wait_until_all_resolved(&self) {
        let mut rx = self.progress.clone();
        loop {
            if rx.borrow_and_update().settled {
                return;
            }
            match tokio::time::timeout(self.poll_interval, rx.changed()).await {
                Ok(Ok(())) | Err(_) => continue,
                Ok(Err(_)) => {
                    tracing::debug!("coordinator gone while waiting for hosting");
                    return;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (respond_to, rx) = oneshot::channel();
        self.send(build(respond_to)).await?;
        let result = rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed("coordinator reply"))?;
        result.map_err(RuntimeError::from)
    }

    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::ChannelClosed("coordinator commands"))
    }
}

/// Install the fmt subscriber on stderr; `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Same as [`init_tracing`] but emitting one JSON object per line.
pub fn init_json_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Unwrap a coordinator error for callers that only care about the taxonomy.
pub fn anchor_error(err: &RuntimeError) -> Option<&AnchorError> {
    match err {
        RuntimeError::Anchor(inner) => Some(inner),
        _ => None,
    }
}
