use thiserror::Error;

use anchorsync_core::AnchorError;

/// Error surface for the coordinator runtime and its handle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Anchor(#[from] AnchorError),

    /// The owner task has stopped; nothing will answer.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}
