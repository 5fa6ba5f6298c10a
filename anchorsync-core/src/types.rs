//! Domain types for anchor synchronization.
//!
//! Identifiers are newtypes over `String`; a local [`AnchorId`] is assigned by
//! the tracking session, a [`RemoteAnchorId`] by the hosting service, and a
//! [`RequestHandle`] correlates an in-flight host request with its outcome.
//! All types are serializable via serde.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Local anchor identifier, assigned by the tracking session.
    AnchorId
);
string_newtype!(
    /// Identifier of an application content item.
    ModelId
);
string_newtype!(
    /// Durable cross-device identifier assigned by the hosting service.
    RemoteAnchorId
);
string_newtype!(
    /// Opaque handle returned by a successful host submission.
    RequestHandle
);

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Column-major 4×4 pose transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [[f32; 4]; 4]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Pure translation by `(x, y, z)`.
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY.0;
        m[3] = [x, y, z, 1.0];
        Self(m)
    }

    /// Translation component `(x, y, z)`.
    pub fn position(&self) -> [f32; 3] {
        let c = self.0[3];
        [c[0], c[1], c[2]]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why tracking quality is currently limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

/// Tracking quality reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Normal,
    Limited(LimitedReason),
    #[default]
    NotAvailable,
}

impl TrackingState {
    /// The loading indicator is shown whenever tracking is not normal.
    pub fn shows_loading(&self) -> bool {
        !matches!(self, TrackingState::Normal)
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingState::Normal => write!(f, "normal"),
            TrackingState::Limited(reason) => write!(f, "limited ({reason:?})"),
            TrackingState::NotAvailable => write!(f, "not available"),
        }
    }
}

/// Which positioning backend a load should restore anchors from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositioningEngine {
    /// Relocalize against a previously saved local map.
    #[default]
    Local,
    /// Resolve previously hosted remote anchors.
    Cloud,
    Geospatial,
}

impl fmt::Display for PositioningEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositioningEngine::Local => write!(f, "local"),
            PositioningEngine::Cloud => write!(f, "cloud"),
            PositioningEngine::Geospatial => write!(f, "geospatial"),
        }
    }
}

/// Optional tracking-session features toggled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSetting {
    PeopleOcclusion,
    SceneReconstruction,
    SceneDepth,
    PlaneDetection,
    ShowStatistics,
}

/// Interaction attached to a placed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    #[default]
    None,
    Link,
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A local spatial reference owned by the tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub transform: Transform,
}

impl Anchor {
    pub fn new(id: impl Into<AnchorId>, name: Option<String>, transform: Transform) -> Self {
        Self {
            id: id.into(),
            name,
            transform,
        }
    }
}

/// An application content item that can be placed at an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    /// Content payload (URL, text, ...) interpreted by the application.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub object_type: ObjectType,
    /// Renderable asset reference, if one has been loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// A model paired with the anchor it should be placed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnchor {
    pub anchor: Anchor,
    pub model: Model,
}

/// A placed, on-screen representation of a model, named after its anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Renderable {
    pub anchor_name: String,
}

/// Snapshot of the tracking session's map.
///
/// The core only inspects `anchors`; `payload` is opaque session data that
/// round-trips through persistence untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldMap {
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub feature_points: usize,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl WorldMap {
    /// Human-readable description used in "map loaded" notifications.
    pub fn subtitle(&self) -> String {
        format!(
            "Feature points: {}, Anchors: {}",
            self.feature_points,
            self.anchors.len()
        )
    }

    pub fn anchor_named(&self, name: &str) -> Option<&Anchor> {
        self.anchors
            .iter()
            .find(|anchor| anchor.name.as_deref() == Some(name))
    }
}

// ---------------------------------------------------------------------------
// Cloud anchor record
// ---------------------------------------------------------------------------

/// Tracking record for one anchor submitted (or expected) for hosting.
///
/// A record is pending until exactly one of [`mark_hosted`](Self::mark_hosted)
/// or [`mark_failed`](Self::mark_failed) succeeds; after that it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudAnchorRecord {
    local_id: AnchorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request: Option<RequestHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host_id: Option<RemoteAnchorId>,
    model_name: String,
    #[serde(default)]
    has_error: bool,
    created_at: DateTime<Utc>,
}

impl CloudAnchorRecord {
    /// A fresh pending record for the local anchor `local_id`.
    pub fn pending(local_id: AnchorId, model_name: impl Into<String>) -> Self {
        Self {
            local_id,
            request: None,
            host_id: None,
            model_name: model_name.into(),
            has_error: false,
            created_at: Utc::now(),
        }
    }

    /// A record that was hosted in an earlier session.
    pub fn hosted(
        local_id: AnchorId,
        model_name: impl Into<String>,
        host_id: RemoteAnchorId,
    ) -> Self {
        Self {
            host_id: Some(host_id),
            ..Self::pending(local_id, model_name)
        }
    }

    pub fn local_id(&self) -> &AnchorId {
        &self.local_id
    }

    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    pub fn host_id(&self) -> Option<&RemoteAnchorId> {
        self.host_id.as_ref()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn has_uploaded(&self) -> bool {
        self.host_id.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Hosted or failed.
    pub fn is_settled(&self) -> bool {
        self.has_uploaded() || self.has_error
    }

    /// Bind the in-flight request handle. Only a pending record without a
    /// handle accepts one.
    pub fn attach_request(&mut self, handle: RequestHandle) -> bool {
        if self.is_settled() || self.request.is_some() {
            return false;
        }
        self.request = Some(handle);
        true
    }

    /// Pending → hosted. Returns `false` (and changes nothing) if the record
    /// is already settled.
    pub fn mark_hosted(&mut self, remote: RemoteAnchorId) -> bool {
        if self.is_settled() {
            return false;
        }
        self.host_id = Some(remote);
        true
    }

    /// Pending → failed. Returns `false` (and changes nothing) if the record
    /// is already settled.
    pub fn mark_failed(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }
        self.has_error = true;
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
