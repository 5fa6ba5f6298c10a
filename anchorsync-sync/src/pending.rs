//! The pending set: records of one hosting batch and their outcomes.
//!
//! Progress counts hosted records only; a failed record settles but never
//! counts as hosted. An empty set is vacuously complete.

use serde::Serialize;

use anchorsync_core::{CloudAnchorRecord, HostEvent, RemoteAnchorId, RequestHandle};

/// Result of applying one host outcome to the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Pending → hosted.
    Hosted {
        model_name: String,
        remote: RemoteAnchorId,
    },
    /// Pending → failed.
    Failed { model_name: String },
    /// The record had already settled; nothing changed.
    AlreadySettled { model_name: String },
    /// No record carries this handle (dismissed, or replaced by a newer batch).
    Unknown { handle: RequestHandle },
}

/// Point-in-time view of hosting progress, published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostProgress {
    pub total: usize,
    pub hosted: usize,
    pub failed: usize,
    pub progress: f64,
    pub settled: bool,
    pub title: String,
    pub label: String,
}

impl Default for HostProgress {
    fn default() -> Self {
        PendingHostSet::default().snapshot()
    }
}

/// Records for the anchors selected at save time, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct PendingHostSet {
    records: Vec<CloudAnchorRecord>,
}

impl PendingHostSet {
    pub fn new(records: Vec<CloudAnchorRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CloudAnchorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn hosted_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_uploaded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_error()).count()
    }

    /// hosted / total, `1.0` for an empty set.
    pub fn progress(&self) -> f64 {
        let total = self.records.len();
        if total == 0 {
            return 1.0;
        }
        self.hosted_count() as f64 / total as f64
    }

    /// Every record is hosted or failed.
    pub fn is_settled(&self) -> bool {
        self.records.iter().all(CloudAnchorRecord::is_settled)
    }

    /// "N of M hosted", or a completion message once everything is hosted.
    pub fn summary_label(&self) -> String {
        let hosted = self.hosted_count();
        let total = self.records.len();
        if hosted == total {
            return "Anchors are hosted".to_string();
        }
        format!("{hosted} of {total} hosted")
    }

    /// Sheet title shown while the batch is in flight.
    pub fn title(&self) -> String {
        let hosted = self.hosted_count();
        let total = self.records.len();
        if hosted == total {
            return "Anchors are hosted".to_string();
        }
        format!("Hosting anchors {hosted}/{total}")
    }

    /// Apply an asynchronous host outcome. Unknown handles and already-settled
    /// records leave the set untouched.
    pub fn apply(&mut self, event: &HostEvent) -> HostOutcome {
        let handle = match event {
            HostEvent::Hosted { handle, .. } | HostEvent::HostFailed { handle } => handle,
        };
        let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.request() == Some(handle))
        else {
            return HostOutcome::Unknown {
                handle: handle.clone(),
            };
        };

        let model_name = record.model_name().to_string();
        let changed = match event {
            HostEvent::Hosted { remote, .. } => record.mark_hosted(remote.clone()),
            HostEvent::HostFailed { .. } => record.mark_failed(),
        };
        if !changed {
            return HostOutcome::AlreadySettled { model_name };
        }
        match event {
            HostEvent::Hosted { remote, .. } => HostOutcome::Hosted {
                model_name,
                remote: remote.clone(),
            },
            HostEvent::HostFailed { .. } => HostOutcome::Failed { model_name },
        }
    }

    /// Records that obtained a remote id.
    pub fn hosted_records(&self) -> Vec<CloudAnchorRecord> {
        self.records
            .iter()
            .filter(|r| r.has_uploaded())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn snapshot(&self) -> HostProgress {
        HostProgress {
            total: self.records.len(),
            hosted: self.hosted_count(),
            failed: self.failed_count(),
            progress: self.progress(),
            settled: self.is_settled(),
            title: self.title(),
            label: self.summary_label(),
        }
    }
}
