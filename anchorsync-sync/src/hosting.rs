//! Hosting pipeline: submit a batch of local anchors, then fold the
//! asynchronous outcomes into the [`PendingHostSet`].

use anchorsync_core::{
    Anchor, AnchorError, CloudAnchorRecord, HostEvent, HostingService, RequestHandle,
};

use crate::pending::{HostOutcome, PendingHostSet};

/// What happened to a batch at submission time.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    pub submitted: Vec<RequestHandle>,
    /// One entry per anchor whose submission was rejected; each such record
    /// is already marked failed.
    pub rejected: Vec<AnchorError>,
}

/// Owns the current hosting batch.
#[derive(Debug, Default)]
pub struct HostingPipeline {
    pending: PendingHostSet,
    batches: u64,
}

impl HostingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingHostSet {
        &self.pending
    }

    /// Number of batches started so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Replace the current batch with `anchors` and submit each one in order.
    ///
    /// A rejected submission fails only its own record. Any previous batch is
    /// discarded; its late outcomes will find no record.
    pub fn begin_hosting(
        &mut self,
        service: &mut dyn HostingService,
        anchors: &[Anchor],
    ) -> SubmissionReport {
        if !self.pending.is_empty() {
            tracing::info!(
                "replacing pending batch of {} record(s) with a new batch",
                self.pending.len()
            );
        }
        self.batches += 1;

        let mut report = SubmissionReport::default();
        let mut records = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let model_name = anchor
                .name
                .clone()
                .unwrap_or_else(|| anchor.id.0.clone());
            let mut record = CloudAnchorRecord::pending(anchor.id.clone(), model_name.clone());

            match service.submit_for_hosting(anchor) {
                Ok(handle) => {
                    tracing::info!("hosting anchor {} as request {handle}", anchor.id);
                    record.attach_request(handle.clone());
                    report.submitted.push(handle);
                }
                Err(source) => {
                    tracing::warn!("host submission rejected for {model_name}: {source}");
                    record.mark_failed();
                    report.rejected.push(AnchorError::SubmissionRejected {
                        target: model_name,
                        source,
                    });
                }
            }
            records.push(record);
        }

        self.pending = PendingHostSet::new(records);
        report
    }

    /// Fold one host outcome into the current batch.
    pub fn on_host_event(&mut self, event: &HostEvent) -> HostOutcome {
        let outcome = self.pending.apply(event);
        match &outcome {
            HostOutcome::Hosted { model_name, remote } => {
                tracing::info!("hosted {model_name} as {remote}");
            }
            HostOutcome::Failed { model_name } => {
                tracing::error!("failed to host {model_name}");
            }
            HostOutcome::AlreadySettled { model_name } => {
                tracing::debug!("duplicate host outcome for {model_name}");
            }
            HostOutcome::Unknown { handle } => {
                tracing::debug!("dropping host outcome for unknown request {handle}");
            }
        }
        outcome
    }

    /// Forget the current batch. The remote service is not told.
    pub fn dismiss(&mut self) {
        self.pending.clear();
    }
}
