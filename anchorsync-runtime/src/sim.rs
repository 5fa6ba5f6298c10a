//! In-process stand-ins for the tracking session and the hosting service.
//!
//! Both report back through an [`EventSink`] the way real collaborators
//! would: anchor additions immediately, remote outcomes after a delay on a
//! spawned task. The simulated service must be used inside a tokio runtime.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use anchorsync_core::{
    Anchor, AnchorId, BlobStore, CoordinatorConfig, HostEvent, HostingService, Notifier,
    RemoteAnchorId, RequestHandle, ResolveEvent, ServiceError, SessionSetting, TrackingEvent,
    TrackingSession, TrackingState, Transform, WorldMap,
};

use crate::coordinator::{CoordinatorParts, SessionCoordinator};
use crate::error::RuntimeError;
use crate::protocol::Event;
use crate::runtime::{event_channel, spawn, CoordinatorHandle, EventSink};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionState {
    anchors: Vec<Anchor>,
    next_id: u64,
    feature_points: usize,
    snapshot_available: bool,
    placement: Option<Transform>,
    settings: Vec<SessionSetting>,
    relocalized_from: Option<usize>,
    debug: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            anchors: Vec::new(),
            next_id: 0,
            feature_points: 0,
            snapshot_available: true,
            placement: Some(Transform::IDENTITY),
            settings: Vec::new(),
            relocalized_from: None,
            debug: false,
        }
    }
}

/// A tracking session that keeps anchors in memory.
#[derive(Debug)]
pub struct SimulatedSession {
    state: Arc<Mutex<SessionState>>,
    sink: EventSink,
}

/// Test-side view into a [`SimulatedSession`] after it has been boxed into a
/// coordinator.
#[derive(Debug, Clone)]
pub struct SessionControl {
    state: Arc<Mutex<SessionState>>,
    sink: EventSink,
}

impl SimulatedSession {
    pub fn new(sink: EventSink) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            sink,
        }
    }

    pub fn control(&self) -> SessionControl {
        SessionControl {
            state: Arc::clone(&self.state),
            sink: self.sink.clone(),
        }
    }
}

impl SessionControl {
    /// While unavailable, snapshots fail as they do before the session has
    /// mapped enough of its surroundings.
    pub fn set_snapshot_available(&self, available: bool) {
        lock(&self.state).snapshot_available = available;
    }

    pub fn set_placement(&self, placement: Option<Transform>) {
        lock(&self.state).placement = placement;
    }

    pub fn set_feature_points(&self, count: usize) {
        lock(&self.state).feature_points = count;
    }

    /// Report a tracking quality change, as the session would.
    pub fn set_tracking(&self, state: TrackingState) {
        self.sink
            .send_tracking(TrackingEvent::TrackingStateChanged { state });
    }

    /// Place an anchor directly, bypassing the coordinator.
    pub fn place(&self, name: &str, transform: Transform) -> AnchorId {
        add_to(&self.state, &self.sink, name, transform)
    }

    pub fn anchors(&self) -> Vec<Anchor> {
        lock(&self.state).anchors.clone()
    }

    pub fn anchor_names(&self) -> Vec<String> {
        lock(&self.state)
            .anchors
            .iter()
            .filter_map(|a| a.name.clone())
            .collect()
    }

    pub fn settings(&self) -> Vec<SessionSetting> {
        lock(&self.state).settings.clone()
    }

    /// Anchor count of the map the session last relocalized against.
    pub fn relocalized_from(&self) -> Option<usize> {
        lock(&self.state).relocalized_from
    }

    pub fn debug(&self) -> bool {
        lock(&self.state).debug
    }
}

fn add_to(
    state: &Mutex<SessionState>,
    sink: &EventSink,
    name: &str,
    transform: Transform,
) -> AnchorId {
    let anchor = {
        let mut guard = lock(state);
        guard.next_id += 1;
        let anchor = Anchor::new(
            format!("anchor-{}", guard.next_id),
            Some(name.to_string()),
            transform,
        );
        guard.anchors.push(anchor.clone());
        anchor
    };
    let id = anchor.id.clone();
    sink.send_tracking(TrackingEvent::AnchorAdded { anchor });
    id
}

impl TrackingSession for SimulatedSession {
    fn add_anchor(&mut self, name: &str, transform: Transform) -> AnchorId {
        add_to(&self.state, &self.sink, name, transform)
    }

    fn remove_anchor(&mut self, id: &AnchorId) {
        lock(&self.state).anchors.retain(|a| &a.id != id);
    }

    fn anchors(&self) -> Vec<Anchor> {
        lock(&self.state).anchors.clone()
    }

    fn current_snapshot(&mut self) -> Result<WorldMap, ServiceError> {
        let guard = lock(&self.state);
        if !guard.snapshot_available {
            return Err(ServiceError::new("insufficient features"));
        }
        Ok(WorldMap {
            anchors: guard.anchors.clone(),
            feature_points: guard.feature_points,
            payload: Vec::new(),
        })
    }

    fn placement_transform(&mut self) -> Option<Transform> {
        lock(&self.state).placement
    }

    fn configure(&mut self, settings: &[SessionSetting], map: Option<&WorldMap>) {
        let mut restored = Vec::new();
        {
            let mut guard = lock(&self.state);
            guard.settings = settings.to_vec();
            if let Some(map) = map {
                guard.relocalized_from = Some(map.anchors.len());
                guard.feature_points = map.feature_points;
                for anchor in &map.anchors {
                    if guard.anchors.iter().all(|a| a.id != anchor.id) {
                        guard.anchors.push(anchor.clone());
                        restored.push(anchor.clone());
                    }
                }
            }
        }
        // Relocalizing surfaces the map's anchors like fresh additions.
        for anchor in restored {
            self.sink
                .send_tracking(TrackingEvent::AnchorAdded { anchor });
        }
    }

    fn set_debug(&mut self, enabled: bool) {
        lock(&self.state).debug = enabled;
    }
}

// ---------------------------------------------------------------------------
// Hosting service
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CloudState {
    next_request: u64,
    next_remote: u64,
    hosted: HashMap<RemoteAnchorId, Transform>,
}

/// The shared remote store behind one or more simulated services.
#[derive(Debug, Clone)]
pub struct SimulatedCloud {
    state: Arc<Mutex<CloudState>>,
}

impl SimulatedCloud {
    /// Remote ids the cloud currently holds, sorted.
    pub fn hosted_ids(&self) -> Vec<RemoteAnchorId> {
        let mut ids: Vec<_> = lock(&self.state).hosted.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// A hosting service whose "cloud" is a shared in-memory map.
///
/// Anchors whose name is listed with [`fail_hosting`](Self::fail_hosting)
/// fail asynchronously; those listed with [`reject_hosting`](Self::reject_hosting)
/// are refused at submission.
#[derive(Debug)]
pub struct SimulatedHostingService {
    cloud: Arc<Mutex<CloudState>>,
    sink: EventSink,
    latency: Duration,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
}

impl SimulatedHostingService {
    pub fn new(sink: EventSink, latency: Duration) -> Self {
        Self {
            cloud: Arc::new(Mutex::new(CloudState::default())),
            sink,
            latency,
            failing: HashSet::new(),
            rejecting: HashSet::new(),
        }
    }

    /// A service for another device, talking to the same cloud.
    pub fn sharing(cloud: &SimulatedCloud, sink: EventSink, latency: Duration) -> Self {
        Self {
            cloud: Arc::clone(&cloud.state),
            ..Self::new(sink, latency)
        }
    }

    pub fn fail_hosting(mut self, anchor_name: impl Into<String>) -> Self {
        self.failing.insert(anchor_name.into());
        self
    }

    pub fn reject_hosting(mut self, anchor_name: impl Into<String>) -> Self {
        self.rejecting.insert(anchor_name.into());
        self
    }

    pub fn cloud(&self) -> SimulatedCloud {
        SimulatedCloud {
            state: Arc::clone(&self.cloud),
        }
    }

    fn next_request(&self) -> RequestHandle {
        let mut cloud = lock(&self.cloud);
        cloud.next_request += 1;
        RequestHandle::from(format!("request-{}", cloud.next_request))
    }

    /// Deliver `event` on a spawned task after the configured latency.
    fn deliver(&self, event: Event) {
        let sink = self.sink.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            sink.send(event);
        });
    }
}

impl HostingService for SimulatedHostingService {
    fn submit_for_hosting(&mut self, anchor: &Anchor) -> Result<RequestHandle, ServiceError> {
        let name = anchor.name.as_deref().unwrap_or(anchor.id.as_str());
        if self.rejecting.contains(name) {
            return Err(ServiceError::new(format!("hosting refused for {name}")));
        }

        let handle = self.next_request();
        let event = if self.failing.contains(name) {
            HostEvent::HostFailed {
                handle: handle.clone(),
            }
        } else {
            let mut cloud = lock(&self.cloud);
            cloud.next_remote += 1;
            let remote = RemoteAnchorId::from(format!("cloud-{}", cloud.next_remote));
            cloud.hosted.insert(remote.clone(), anchor.transform);
            HostEvent::Hosted {
                handle: handle.clone(),
                remote,
            }
        };
        self.deliver(Event::Host(event));
        Ok(handle)
    }

    fn submit_for_resolution(
        &mut self,
        remote: &RemoteAnchorId,
    ) -> Result<RequestHandle, ServiceError> {
        let handle = self.next_request();
        let transform = lock(&self.cloud).hosted.get(remote).copied();
        let event = match transform {
            Some(transform) => ResolveEvent::Resolved {
                remote: remote.clone(),
                transform,
            },
            None => ResolveEvent::ResolveFailed {
                remote: remote.clone(),
            },
        };
        self.deliver(Event::Resolve(event));
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A running coordinator wired to simulated collaborators.
pub struct SimulatedDevice {
    pub handle: CoordinatorHandle,
    pub task: JoinHandle<Result<(), RuntimeError>>,
    pub session: SessionControl,
    pub cloud: SimulatedCloud,
}

impl SimulatedDevice {
    /// Build the collaborators around one event queue and spawn the owner
    /// task. `service` receives the sink its outcomes must go through.
    pub fn launch(
        config: CoordinatorConfig,
        store: Box<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        service: impl FnOnce(EventSink) -> SimulatedHostingService,
    ) -> Self {
        let (sink, queue) = event_channel();
        let session = SimulatedSession::new(sink.clone());
        let control = session.control();
        let service = service(sink);
        let cloud = service.cloud();

        let coordinator = SessionCoordinator::new(CoordinatorParts {
            session: Box::new(session),
            service: Box::new(service),
            store,
            notifier,
            config,
        });
        let (handle, task) = spawn(coordinator, queue);
        Self {
            handle,
            task,
            session: control,
            cloud,
        }
    }
}
