//! Messages exchanged with the coordinator's owner task.
//!
//! Commands come from the UI side and carry a `oneshot` reply; events come
//! from collaborators and carry nothing back. Updates flow out to observers.

use serde::Serialize;
use tokio::sync::oneshot;

use anchorsync_core::{
    Anchor, AnchorError, AnchorId, CloudAnchorRecord, HostEvent, Model, ModelAnchor,
    PositioningEngine, Renderable, ResolveEvent, SessionSetting, TrackingEvent, TrackingState,
    WorldMap,
};
use anchorsync_sync::HostProgress;

pub type Reply<T> = oneshot::Sender<Result<T, AnchorError>>;

/// Coordinator lifecycle. Tracking quality is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    Loading,
    Active,
    Saving,
    Hosting,
    Resolving,
}

/// What to restore on [`load`](crate::SessionCoordinator::load).
///
/// Absent `map`/`records` fall back to what the blob store holds.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub engine: PositioningEngine,
    pub map: Option<WorldMap>,
    pub records: Option<Vec<CloudAnchorRecord>>,
}

impl LoadRequest {
    pub fn local() -> Self {
        Self {
            engine: PositioningEngine::Local,
            ..Self::default()
        }
    }

    pub fn cloud() -> Self {
        Self {
            engine: PositioningEngine::Cloud,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadReport {
    Map { subtitle: String, anchors: usize },
    Cloud { records: usize, submitted: usize },
}

/// Outcome of a successful save: the persisted map and the anchors handed to
/// hosting.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub map: WorldMap,
    pub anchors: Vec<Anchor>,
    pub foreign: usize,
    pub submitted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub tracking: TrackingState,
    pub loading: bool,
    pub used_models: usize,
    pub hosting: HostProgress,
    pub loaded_cloud_anchors: usize,
    pub resolving: usize,
    pub marked_for_deletion: Option<String>,
    pub debug: bool,
}

/// Pushed to subscribers whenever something observable changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorUpdate {
    StateChanged {
        state: CoordinatorState,
    },
    TrackingChanged {
        state: TrackingState,
        loading: bool,
    },
    PlaceModel {
        placement: ModelAnchor,
    },
    HostingSettled {
        hosted: Vec<CloudAnchorRecord>,
        failed: usize,
    },
    AnchorResolved {
        model_name: String,
        anchor: AnchorId,
    },
}

pub enum Command {
    Save {
        respond_to: Reply<SaveReport>,
    },
    Load {
        request: LoadRequest,
        respond_to: Reply<LoadReport>,
    },
    AddModel {
        model: Model,
        respond_to: Reply<AnchorId>,
    },
    Delete {
        anchor_name: String,
        respond_to: Reply<Option<AnchorId>>,
    },
    MarkForDeletion(Renderable),
    DismissHosting,
    ToggleDebug(bool),
    UpdateSettings(Vec<SessionSetting>),
    Status {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },
}

/// Collaborator callbacks, queued for the owner task.
#[derive(Debug, Clone)]
pub enum Event {
    Tracking(TrackingEvent),
    Host(HostEvent),
    Resolve(ResolveEvent),
}
