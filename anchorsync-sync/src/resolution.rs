//! Resolution pipeline: turn previously hosted records back into local anchors.

use std::collections::HashSet;

use anchorsync_core::{
    AnchorError, AnchorId, CloudAnchorRecord, HostingService, RemoteAnchorId, ResolveEvent,
    TrackingSession,
};

/// Result of applying one resolve outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A new local anchor was added for `model_name`.
    Materialized {
        model_name: String,
        anchor: AnchorId,
    },
    /// The remote service could not resolve `remote`.
    Failed {
        remote: RemoteAnchorId,
        model_name: String,
    },
    /// `remote` already materialized or already failed.
    Duplicate { remote: RemoteAnchorId },
    /// No loaded record carries `remote`.
    Unknown { remote: RemoteAnchorId },
}

/// Records loaded for resolution and which of them have come back.
#[derive(Debug, Default)]
pub struct ResolutionPipeline {
    loaded: Vec<CloudAnchorRecord>,
    outstanding: HashSet<RemoteAnchorId>,
    materialized: HashSet<RemoteAnchorId>,
}

impl ResolutionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records passed to the last [`begin_resolution`](Self::begin_resolution).
    pub fn loaded_records(&self) -> &[CloudAnchorRecord] {
        &self.loaded
    }

    /// Submit every record with a remote id. Rejections are returned for the
    /// caller to surface; the remaining records are still submitted.
    pub fn begin_resolution(
        &mut self,
        service: &mut dyn HostingService,
        records: Vec<CloudAnchorRecord>,
    ) -> Vec<AnchorError> {
        self.loaded = records;
        self.outstanding.clear();
        self.materialized.clear();

        let mut rejected = Vec::new();
        for record in &self.loaded {
            let Some(remote) = record.host_id() else {
                continue;
            };
            match service.submit_for_resolution(remote) {
                Ok(handle) => {
                    tracing::info!("resolving cloud anchor {remote} (request {handle})");
                    self.outstanding.insert(remote.clone());
                }
                Err(source) => {
                    tracing::warn!("resolve submission rejected for {remote}: {source}");
                    rejected.push(AnchorError::SubmissionRejected {
                        target: remote.to_string(),
                        source,
                    });
                }
            }
        }
        rejected
    }

    /// Every submitted record has either materialized or failed.
    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Submitted records still waiting for an outcome.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn model_name_for(&self, remote: &RemoteAnchorId) -> Option<&str> {
        self.loaded
            .iter()
            .find(|r| r.host_id() == Some(remote))
            .map(CloudAnchorRecord::model_name)
    }

    /// Apply a resolve outcome; a success adds a fresh anchor to `session`.
    pub fn on_resolve_event(
        &mut self,
        event: &ResolveEvent,
        session: &mut dyn TrackingSession,
    ) -> ResolveOutcome {
        match event {
            ResolveEvent::Resolved { remote, transform } => {
                let Some(model_name) = self.model_name_for(remote).map(str::to_string) else {
                    tracing::debug!("dropping resolve outcome for unknown remote {remote}");
                    return ResolveOutcome::Unknown {
                        remote: remote.clone(),
                    };
                };
                self.outstanding.remove(remote);
                if !self.materialized.insert(remote.clone()) {
                    return ResolveOutcome::Duplicate {
                        remote: remote.clone(),
                    };
                }
                let anchor = session.add_anchor(&model_name, *transform);
                tracing::info!("resolved {remote} into anchor {anchor} for {model_name}");
                ResolveOutcome::Materialized { model_name, anchor }
            }
            ResolveEvent::ResolveFailed { remote } => {
                let Some(model_name) = self.model_name_for(remote).map(str::to_string) else {
                    tracing::debug!("dropping resolve failure for unknown remote {remote}");
                    return ResolveOutcome::Unknown {
                        remote: remote.clone(),
                    };
                };
                if self.materialized.contains(remote) || !self.outstanding.remove(remote) {
                    return ResolveOutcome::Duplicate {
                        remote: remote.clone(),
                    };
                }
                tracing::error!("failed to resolve anchor {remote} for {model_name}");
                ResolveOutcome::Failed {
                    remote: remote.clone(),
                    model_name,
                }
            }
        }
    }
}
