//! Error types for anchorsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{PositioningEngine, RemoteAnchorId, RequestHandle};

/// Errors from on-disk storage: blob store, records, configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (config save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON encode/decode error for maps and records.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Failure reported by a hosting-service capability on synchronous submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The coordinator's error taxonomy.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The tracking session cannot produce a map snapshot yet.
    #[error("cannot {operation}: map snapshot unavailable ({reason})")]
    SnapshotUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// The remote service rejected a host or resolve request synchronously.
    #[error("submission rejected for {target}: {source}")]
    SubmissionRejected {
        target: String,
        #[source]
        source: ServiceError,
    },

    /// The remote service reported a host or resolve failure asynchronously.
    #[error("remote outcome failure for {target}")]
    RemoteOutcomeFailure { target: String },

    /// An outcome arrived for a handle with no matching record.
    #[error("no record for request handle {handle}")]
    UnknownCorrelation { handle: RequestHandle },

    /// A resolve outcome arrived for an id that was never submitted.
    #[error("no record for remote anchor {remote}")]
    UnknownRemote { remote: RemoteAnchorId },

    /// Writing or reading a persisted blob failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    /// A load found neither a provided nor a persisted map/record set.
    #[error("nothing to load: {what} is missing")]
    NothingToLoad { what: &'static str },

    /// The requested positioning engine has no load path.
    #[error("positioning engine not supported yet: {0}")]
    UnsupportedEngine(PositioningEngine),

    /// The session could not compute a placement transform.
    #[error("cannot place model at this position")]
    NoPlacement,
}

impl AnchorError {
    /// Title/subtitle pair for the UI notifier.
    pub fn notification(&self) -> (String, String) {
        match self {
            AnchorError::SnapshotUnavailable { operation, .. } => (
                format!("Cannot {operation}"),
                "Unable to get world map".to_string(),
            ),
            AnchorError::SubmissionRejected { target, source } => {
                (format!("Cannot submit {target}"), source.to_string())
            }
            AnchorError::RemoteOutcomeFailure { target } => {
                ("Remote anchor failed".to_string(), target.clone())
            }
            AnchorError::UnknownCorrelation { .. } | AnchorError::UnknownRemote { .. } => {
                ("Unknown anchor".to_string(), self.to_string())
            }
            AnchorError::PersistenceFailure(err) => {
                ("Cannot persist map".to_string(), err.to_string())
            }
            AnchorError::NothingToLoad { what } => {
                ("Cannot load world map".to_string(), format!("{what} is nil"))
            }
            AnchorError::UnsupportedEngine(engine) => (
                "Positioning engine not supported yet".to_string(),
                format!("Given engine {engine}"),
            ),
            AnchorError::NoPlacement => (
                "Cannot place model at this position".to_string(),
                "Center is nil".to_string(),
            ),
        }
    }
}
