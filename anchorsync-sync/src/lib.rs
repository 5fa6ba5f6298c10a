//! # anchorsync-sync
//!
//! Hosting and resolution pipelines between a local tracking session and a
//! remote anchor-hosting service.
//!
//! [`HostingPipeline::begin_hosting`] submits a batch and owns its
//! [`PendingHostSet`]; [`ResolutionPipeline::begin_resolution`] submits
//! previously hosted records and materializes resolved anchors. [`persist`]
//! stores maps and hosted records in a blob store.

pub mod hosting;
pub mod pending;
pub mod persist;
pub mod resolution;

pub use hosting::{HostingPipeline, SubmissionReport};
pub use pending::{HostOutcome, HostProgress, PendingHostSet};
pub use resolution::{ResolutionPipeline, ResolveOutcome};
