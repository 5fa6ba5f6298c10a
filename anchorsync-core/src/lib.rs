//! anchorsync core library: domain types, naming convention, capabilities,
//! errors, configuration and blob storage.
//!
//! - [`types`]: newtypes, anchors, models, cloud-anchor records
//! - [`registry`]: used-model registry and the anchor naming convention
//! - [`session`]: collaborator traits and the events they emit
//! - [`error`]: [`AnchorError`] taxonomy and [`StoreError`]
//! - [`config`]: [`CoordinatorConfig`] load / save
//! - [`store`]: [`BlobStore`] and its file/memory implementations

pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod store;
pub mod types;

pub use config::CoordinatorConfig;
pub use error::{AnchorError, ServiceError, StoreError};
pub use registry::{anchor_name_for, AnchorRegistry, ANCHOR_PREFIX};
pub use session::{
    HostEvent, HostingService, Notifier, ResolveEvent, TrackingEvent, TrackingSession,
};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use types::{
    Anchor, AnchorId, CloudAnchorRecord, LimitedReason, Model, ModelAnchor, ModelId, ObjectType,
    PositioningEngine, RemoteAnchorId, Renderable, RequestHandle, SessionSetting, TrackingState,
    Transform, WorldMap,
};
