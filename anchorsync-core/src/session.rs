//! Collaborator capabilities consumed by the coordinator, and the events they
//! push back.
//!
//! Capabilities are called synchronously from the coordinator's owner task.
//! Events travel the other way: collaborators hand them to the runtime's
//! event sink, which queues them for that same task.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::types::{
    Anchor, AnchorId, RemoteAnchorId, RequestHandle, SessionSetting, TrackingState, Transform,
    WorldMap,
};

/// The local spatial-tracking session.
pub trait TrackingSession: Send {
    /// Add a named anchor; the session reports it back via
    /// [`TrackingEvent::AnchorAdded`].
    fn add_anchor(&mut self, name: &str, transform: Transform) -> AnchorId;

    fn remove_anchor(&mut self, id: &AnchorId);

    /// Anchors currently live in the session.
    fn anchors(&self) -> Vec<Anchor>;

    /// Current map, or an error while the session cannot produce one yet.
    fn current_snapshot(&mut self) -> Result<WorldMap, ServiceError>;

    /// Where a newly added model would land (screen-center raycast), if anywhere.
    fn placement_transform(&mut self) -> Option<Transform>;

    /// (Re)run the session with `settings`, relocalizing against `map` if given.
    fn configure(&mut self, settings: &[SessionSetting], map: Option<&WorldMap>);

    fn set_debug(&mut self, enabled: bool);
}

/// The remote anchor-hosting service.
pub trait HostingService: Send {
    fn submit_for_hosting(&mut self, anchor: &Anchor) -> Result<RequestHandle, ServiceError>;

    fn submit_for_resolution(
        &mut self,
        remote: &RemoteAnchorId,
    ) -> Result<RequestHandle, ServiceError>;
}

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, subtitle: &str);
}

/// Events pushed by the tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    AnchorAdded { anchor: Anchor },
    TrackingStateChanged { state: TrackingState },
}

/// Asynchronous outcomes of host submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Hosted {
        handle: RequestHandle,
        remote: RemoteAnchorId,
    },
    HostFailed {
        handle: RequestHandle,
    },
}

/// Asynchronous outcomes of resolve submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolveEvent {
    Resolved {
        remote: RemoteAnchorId,
        transform: Transform,
    },
    ResolveFailed {
        remote: RemoteAnchorId,
    },
}
