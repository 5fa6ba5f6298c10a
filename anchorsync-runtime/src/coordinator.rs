//! Session coordinator: the state machine behind the owner task.
//!
//! Every method here runs on the owner task. Nothing in this module is
//! reachable from collaborator callbacks directly; those go through the
//! runtime's event queue first.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use anchorsync_core::{
    registry, AnchorError, AnchorId, AnchorRegistry, BlobStore, CoordinatorConfig, HostEvent,
    HostingService, Model, ModelAnchor, Notifier, PositioningEngine, Renderable, ResolveEvent,
    SessionSetting, TrackingEvent, TrackingSession, TrackingState,
};
use anchorsync_sync::{
    persist, HostOutcome, HostProgress, HostingPipeline, ResolutionPipeline, ResolveOutcome,
};

use crate::protocol::{
    CoordinatorState, CoordinatorStatus, CoordinatorUpdate, Event, LoadReport, LoadRequest,
    SaveReport,
};

const UPDATE_CAPACITY: usize = 64;

/// Collaborators a coordinator is built from.
pub struct CoordinatorParts {
    pub session: Box<dyn TrackingSession>,
    pub service: Box<dyn HostingService>,
    pub store: Box<dyn BlobStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: CoordinatorConfig,
}

pub struct SessionCoordinator {
    session: Box<dyn TrackingSession>,
    service: Box<dyn HostingService>,
    store: Box<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
    registry: AnchorRegistry,
    hosting: HostingPipeline,
    resolution: ResolutionPipeline,
    /// A saved batch has not settled or been dismissed yet.
    batch_open: bool,
    state: CoordinatorState,
    tracking: TrackingState,
    progress_tx: watch::Sender<HostProgress>,
    updates_tx: broadcast::Sender<CoordinatorUpdate>,
}

impl SessionCoordinator {
    pub fn new(parts: CoordinatorParts) -> Self {
        let (progress_tx, _) = watch::channel(HostProgress::default());
        let (updates_tx, _) = broadcast::channel(UPDATE_CAPACITY);
        let mut coordinator = Self {
            session: parts.session,
            service: parts.service,
            store: parts.store,
            notifier: parts.notifier,
            config: parts.config,
            registry: AnchorRegistry::new(),
            hosting: HostingPipeline::new(),
            resolution: ResolutionPipeline::new(),
            batch_open: false,
            state: CoordinatorState::Idle,
            tracking: TrackingState::NotAvailable,
            progress_tx,
            updates_tx,
        };
        let debug = coordinator.config.debug;
        coordinator.session.set_debug(debug);
        coordinator
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.tracking
    }

    /// Loading indicator: shown until tracking is normal.
    pub fn is_showing_loading(&self) -> bool {
        self.tracking.shows_loading()
    }

    pub fn registry(&self) -> &AnchorRegistry {
        &self.registry
    }

    pub fn hosting(&self) -> &HostingPipeline {
        &self.hosting
    }

    pub fn resolution(&self) -> &ResolutionPipeline {
        &self.resolution
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn progress_receiver(&self) -> watch::Receiver<HostProgress> {
        self.progress_tx.subscribe()
    }

    pub fn updates_sender(&self) -> broadcast::Sender<CoordinatorUpdate> {
        self.updates_tx.clone()
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            state: self.state,
            tracking: self.tracking,
            loading: self.is_showing_loading(),
            used_models: self.registry.used_models().len(),
            hosting: self.hosting.pending().snapshot(),
            loaded_cloud_anchors: self.resolution.loaded_records().len(),
            resolving: self.resolution.outstanding(),
            marked_for_deletion: self
                .registry
                .marked_for_deletion()
                .map(|r| r.anchor_name.clone()),
            debug: self.config.debug,
        }
    }

    // -----------------------------------------------------------------------
    // UI operations
    // -----------------------------------------------------------------------

    /// Capture the map, persist it, and host every model-bound anchor.
    ///
    /// A pending batch from an earlier save is replaced.
    pub fn save(&mut self) -> Result<SaveReport, AnchorError> {
        let prior = self.state;
        self.set_state(CoordinatorState::Saving);

        let map = match self.session.current_snapshot() {
            Ok(map) => map,
            Err(err) => {
                return self.abort(
                    prior,
                    AnchorError::SnapshotUnavailable {
                        operation: "save",
                        reason: err.to_string(),
                    },
                )
            }
        };

        let (anchors, foreign): (Vec<_>, Vec<_>) = map
            .anchors
            .iter()
            .cloned()
            .partition(registry::is_model_anchor);
        tracing::info!(
            model_anchors = anchors.len(),
            foreign = foreign.len(),
            "captured map for save"
        );

        if let Err(err) = persist::save_map(self.store.as_ref(), &self.config.map_key, &map) {
            return self.abort(prior, AnchorError::PersistenceFailure(err));
        }

        let submission = self.hosting.begin_hosting(self.service.as_mut(), &anchors);
        self.batch_open = true;
        for rejection in &submission.rejected {
            self.report(rejection);
        }
        self.set_state(CoordinatorState::Hosting);
        self.publish_progress();
        self.settle_hosting_if_done();

        Ok(SaveReport {
            map,
            anchors,
            foreign: foreign.len(),
            submitted: submission.submitted.len(),
            rejected: submission.rejected.len(),
        })
    }

    /// Restore anchors from a local map or from hosted cloud records.
    pub fn load(&mut self, request: LoadRequest) -> Result<LoadReport, AnchorError> {
        let prior = self.state;
        match request.engine {
            PositioningEngine::Local => {
                let map = match request.map {
                    Some(map) => map,
                    None => match persist::load_map(self.store.as_ref(), &self.config.map_key) {
                        Ok(Some(map)) => map,
                        Ok(None) => {
                            return self.abort(prior, AnchorError::NothingToLoad { what: "Map" })
                        }
                        Err(err) => return self.abort(prior, AnchorError::PersistenceFailure(err)),
                    },
                };

                self.set_state(CoordinatorState::Loading);
                self.remove_unprotected_anchors();
                tracing::info!(anchors = map.anchors.len(), "using world map");
                self.session.configure(&self.config.settings, Some(&map));
                let subtitle = map.subtitle();
                self.notifier.notify("Map is loaded", &subtitle);
                self.set_state(CoordinatorState::Active);
                Ok(LoadReport::Map {
                    subtitle,
                    anchors: map.anchors.len(),
                })
            }
            PositioningEngine::Cloud => {
                let records = match request.records {
                    Some(records) => records,
                    None => {
                        match persist::load_records(self.store.as_ref(), &self.config.records_key)
                        {
                            Ok(Some(file)) => file.records,
                            Ok(None) => {
                                return self.abort(
                                    prior,
                                    AnchorError::NothingToLoad {
                                        what: "Cloud anchors",
                                    },
                                )
                            }
                            Err(err) => {
                                return self.abort(prior, AnchorError::PersistenceFailure(err))
                            }
                        }
                    }
                };

                self.set_state(CoordinatorState::Loading);
                self.remove_unprotected_anchors();
                self.notifier.notify(
                    "Using cloud anchor",
                    &format!("Number of anchors: {}", records.len()),
                );
                self.session.configure(&self.config.settings, None);

                let total = records.len();
                let rejected = self
                    .resolution
                    .begin_resolution(self.service.as_mut(), records);
                for rejection in &rejected {
                    self.report(rejection);
                }
                let submitted = self.resolution.outstanding();
                self.set_state(CoordinatorState::Resolving);
                self.finish_resolution_if_done();
                Ok(LoadReport::Cloud {
                    records: total,
                    submitted,
                })
            }
            engine => self.abort(prior, AnchorError::UnsupportedEngine(engine)),
        }
    }

    /// Add an anchor for `model` at the session's current placement point.
    pub fn add_model(&mut self, model: Model) -> Result<AnchorId, AnchorError> {
        tracing::info!(model = %model.id, "adding model");
        let Some(transform) = self.session.placement_transform() else {
            let err = AnchorError::NoPlacement;
            self.report(&err);
            return Err(err);
        };
        let name = registry::anchor_name_for(&model.id);
        let anchor = self.session.add_anchor(&name, transform);
        self.registry.add_used_model(model);
        Ok(anchor)
    }

    /// Remove the live anchor called `anchor_name`, if there is one.
    pub fn delete(&mut self, anchor_name: &str) -> Result<Option<AnchorId>, AnchorError> {
        let map = match self.session.current_snapshot() {
            Ok(map) => map,
            Err(err) => {
                let err = AnchorError::SnapshotUnavailable {
                    operation: "delete",
                    reason: err.to_string(),
                };
                self.report(&err);
                return Err(err);
            }
        };
        let Some(anchor) = map.anchor_named(anchor_name) else {
            tracing::debug!(anchor = anchor_name, "nothing to delete");
            return Ok(None);
        };
        tracing::info!(anchor = %anchor.id, name = anchor_name, "deleting anchor");
        self.session.remove_anchor(&anchor.id);
        if self
            .registry
            .marked_for_deletion()
            .is_some_and(|r| r.anchor_name == anchor_name)
        {
            self.registry.take_marked_for_deletion();
        }
        Ok(Some(anchor.id.clone()))
    }

    pub fn mark_for_deletion(&mut self, renderable: Renderable) {
        tracing::info!(anchor = %renderable.anchor_name, "entering deletion mode");
        self.registry.mark_for_deletion(renderable);
    }

    /// Drop the pending set. Hosted remote anchors are unaffected and late
    /// outcomes for the dropped batch are ignored.
    pub fn dismiss_hosting(&mut self) {
        tracing::info!(records = self.hosting.pending().len(), "dismissing hosting batch");
        self.hosting.dismiss();
        self.batch_open = false;
        self.publish_progress();
        if self.state == CoordinatorState::Hosting {
            self.set_state(CoordinatorState::Active);
        }
    }

    pub fn toggle_debug(&mut self, enabled: bool) {
        self.config.debug = enabled;
        self.session.set_debug(enabled);
    }

    pub fn update_settings(&mut self, settings: Vec<SessionSetting>) {
        self.config.settings = settings;
        self.session.configure(&self.config.settings, None);
    }

    // -----------------------------------------------------------------------
    // Collaborator events
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tracking(event) => self.on_tracking_event(event),
            Event::Host(event) => self.on_host_event(event),
            Event::Resolve(event) => self.on_resolve_event(event),
        }
    }

    fn on_tracking_event(&mut self, event: TrackingEvent) {
        match event {
            TrackingEvent::AnchorAdded { anchor } => {
                let Some(model) = self.registry.find_for_anchor(&anchor).cloned() else {
                    return;
                };
                tracing::debug!(anchor = %anchor.id, model = %model.id, "placing model");
                self.publish(CoordinatorUpdate::PlaceModel {
                    placement: ModelAnchor { anchor, model },
                });
            }
            TrackingEvent::TrackingStateChanged { state } => {
                self.tracking = state;
                tracing::debug!(tracking = %state, "tracking state changed");
                self.publish(CoordinatorUpdate::TrackingChanged {
                    state,
                    loading: state.shows_loading(),
                });
                if matches!(self.state, CoordinatorState::Idle) {
                    self.set_state(CoordinatorState::Active);
                }
            }
        }
    }

    fn on_host_event(&mut self, event: HostEvent) {
        match self.hosting.on_host_event(&event) {
            HostOutcome::Failed { model_name } => {
                self.report(&AnchorError::RemoteOutcomeFailure { target: model_name });
            }
            HostOutcome::Unknown { handle } => {
                let err = AnchorError::UnknownCorrelation { handle };
                tracing::debug!(error = %err, "dropping host outcome");
                return;
            }
            HostOutcome::Hosted { .. } | HostOutcome::AlreadySettled { .. } => {}
        }
        self.publish_progress();
        self.settle_hosting_if_done();
    }

    fn on_resolve_event(&mut self, event: ResolveEvent) {
        match self
            .resolution
            .on_resolve_event(&event, self.session.as_mut())
        {
            ResolveOutcome::Materialized { model_name, anchor } => {
                self.notifier.notify("Found hosted anchor", &model_name);
                self.publish(CoordinatorUpdate::AnchorResolved { model_name, anchor });
            }
            ResolveOutcome::Failed { model_name, .. } => {
                self.report(&AnchorError::RemoteOutcomeFailure { target: model_name });
            }
            ResolveOutcome::Unknown { remote } => {
                let err = AnchorError::UnknownRemote { remote };
                tracing::debug!(error = %err, "dropping resolve outcome");
            }
            ResolveOutcome::Duplicate { remote } => {
                tracing::debug!(remote = %remote, "anchor already resolved");
            }
        }
        self.finish_resolution_if_done();
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn settle_hosting_if_done(&mut self) {
        if !self.batch_open || !self.hosting.pending().is_settled() {
            return;
        }
        self.batch_open = false;
        let pending = self.hosting.pending();
        let hosted = pending.hosted_records();
        let failed = pending.failed_count();
        tracing::info!(hosted = hosted.len(), failed, "hosting batch settled");

        if !hosted.is_empty() {
            if let Err(err) =
                persist::save_records(self.store.as_ref(), &self.config.records_key, &hosted)
            {
                self.report(&AnchorError::PersistenceFailure(err));
            }
        }
        self.publish(CoordinatorUpdate::HostingSettled { hosted, failed });
        if self.state == CoordinatorState::Hosting {
            self.set_state(CoordinatorState::Active);
        }
    }

    fn finish_resolution_if_done(&mut self) {
        if self.state == CoordinatorState::Resolving && self.resolution.is_complete() {
            self.set_state(CoordinatorState::Active);
        }
    }

    fn remove_unprotected_anchors(&mut self) {
        let anchors = self.session.anchors();
        let mut removed = 0usize;
        for anchor in anchors {
            if self.config.is_protected(anchor.name.as_deref()) {
                continue;
            }
            self.session.remove_anchor(&anchor.id);
            removed += 1;
        }
        tracing::info!(removed, "cleared previous anchors");
    }

    fn abort<T>(&mut self, prior: CoordinatorState, err: AnchorError) -> Result<T, AnchorError> {
        self.set_state(prior);
        self.report(&err);
        Err(err)
    }

    fn report(&self, err: &AnchorError) {
        tracing::warn!(error = %err, "reporting to user");
        let (title, subtitle) = err.notification();
        self.notifier.notify(&title, &subtitle);
    }

    fn set_state(&mut self, state: CoordinatorState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "coordinator state");
        self.state = state;
        self.publish(CoordinatorUpdate::StateChanged { state });
    }

    fn publish_progress(&self) {
        self.progress_tx.send_replace(self.hosting.pending().snapshot());
    }

    fn publish(&self, update: CoordinatorUpdate) {
        // No subscribers is fine.
        let _ = self.updates_tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use anchorsync_core::error::io_err;
    use anchorsync_core::{
        CloudAnchorRecord, MemoryBlobStore, ModelId, ObjectType, RemoteAnchorId, RequestHandle,
        ServiceError, StoreError, Transform,
    };

    use crate::notifier::RecordingNotifier;
    use crate::runtime::{event_channel, EventQueue};
    use crate::sim::{SessionControl, SimulatedSession};

    /// Hands out sequential handles and never calls back; tests inject outcomes.
    #[derive(Default)]
    struct ScriptedService {
        next: usize,
        reject: HashSet<String>,
    }

    impl HostingService for ScriptedService {
        fn submit_for_hosting(
            &mut self,
            anchor: &anchorsync_core::Anchor,
        ) -> Result<RequestHandle, ServiceError> {
            let name = anchor.name.clone().unwrap_or_default();
            if self.reject.contains(&name) {
                return Err(ServiceError::new("quota exceeded"));
            }
            self.next += 1;
            Ok(RequestHandle::from(format!("h-{}", self.next)))
        }

        fn submit_for_resolution(
            &mut self,
            remote: &RemoteAnchorId,
        ) -> Result<RequestHandle, ServiceError> {
            Ok(RequestHandle::from(format!("resolve-{remote}")))
        }
    }

    struct ReadOnlyStore(Arc<MemoryBlobStore>);

    impl BlobStore for ReadOnlyStore {
        fn write_blob(&self, key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(io_err(
                format!("{key}.bin"),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.0.read_blob(key)
        }
    }

    struct Harness {
        coordinator: SessionCoordinator,
        session: SessionControl,
        queue: EventQueue,
        store: Arc<MemoryBlobStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_service(ScriptedService::default())
        }

        fn with_service(service: ScriptedService) -> Self {
            Self::assemble(service, |store| Box::new(store))
        }

        /// Reads see `store`; every write fails.
        fn read_only() -> Self {
            Self::assemble(ScriptedService::default(), |store| Box::new(ReadOnlyStore(store)))
        }

        fn assemble(
            service: ScriptedService,
            wrap: impl FnOnce(Arc<MemoryBlobStore>) -> Box<dyn BlobStore>,
        ) -> Self {
            let (sink, queue) = event_channel();
            let session = SimulatedSession::new(sink);
            let control = session.control();
            let store = Arc::new(MemoryBlobStore::new());
            let notifier = Arc::new(RecordingNotifier::new());
            let coordinator = SessionCoordinator::new(CoordinatorParts {
                session: Box::new(session),
                service: Box::new(service),
                store: wrap(Arc::clone(&store)),
                notifier: notifier.clone(),
                config: CoordinatorConfig::default(),
            });
            Self {
                coordinator,
                session: control,
                queue,
                store,
                notifier,
            }
        }

        /// Feed queued collaborator events to the coordinator.
        fn pump(&mut self) {
            while let Some(event) = self.queue.try_next() {
                self.coordinator.handle_event(event);
            }
        }

        fn host(&mut self, handle: &str, remote: &str) {
            self.coordinator.handle_event(Event::Host(HostEvent::Hosted {
                handle: RequestHandle::from(handle),
                remote: RemoteAnchorId::from(remote),
            }));
        }

        fn fail(&mut self, handle: &str) {
            self.coordinator.handle_event(Event::Host(HostEvent::HostFailed {
                handle: RequestHandle::from(handle),
            }));
        }
    }

    fn chair() -> Model {
        Model {
            id: ModelId::from("chair"),
            name: "Chair".to_string(),
            content: String::new(),
            object_type: ObjectType::None,
            asset: None,
        }
    }

    #[test]
    fn save_without_snapshot_notifies_once_and_keeps_state() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);
        h.session.set_snapshot_available(false);

        let err = h.coordinator.save().unwrap_err();
        assert!(matches!(err, AnchorError::SnapshotUnavailable { .. }));
        assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
        assert_eq!(
            h.notifier.notifications(),
            vec![("Cannot save".to_string(), "Unable to get world map".to_string())]
        );
        assert!(h.store.keys().is_empty());
        assert_eq!(h.coordinator.hosting().batches(), 0);
    }

    #[test]
    fn save_persists_map_and_hosts_model_anchors_only() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);
        h.session.place("focus-box", Transform::IDENTITY);
        h.session.place("model-lamp", Transform::translation(1.0, 0.0, 0.0));

        let report = h.coordinator.save().unwrap();
        assert_eq!(report.map.anchors.len(), 3);
        assert_eq!(report.anchors.len(), 2);
        assert_eq!(report.foreign, 1);
        assert_eq!(report.submitted, 2);
        assert_eq!(h.coordinator.state(), CoordinatorState::Hosting);

        let saved = persist::load_map(h.store.as_ref(), "worldmap")
            .unwrap()
            .expect("map persisted");
        assert_eq!(saved.anchors.len(), 3);

        let progress = h.coordinator.progress_receiver().borrow().clone();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.hosted, 0);
        assert!(!progress.settled);
        assert_eq!(progress.title, "Hosting anchors 0/2");
    }

    #[test]
    fn two_of_three_hosted_settles_and_persists_hosted_records() {
        let mut h = Harness::new();
        for name in ["model-a", "model-b", "model-c"] {
            h.session.place(name, Transform::IDENTITY);
        }
        h.coordinator.save().unwrap();
        let mut updates = h.coordinator.updates_sender().subscribe();

        h.host("h-2", "R2");
        h.fail("h-3");
        h.host("h-1", "R1");

        let progress = h.coordinator.progress_receiver().borrow().clone();
        assert_eq!((progress.hosted, progress.failed, progress.total), (2, 1, 3));
        assert!((progress.progress - 2.0 / 3.0).abs() < 1e-9);
        assert!(progress.settled);
        assert_eq!(progress.label, "2 of 3 hosted");
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        assert_eq!(h.notifier.count_titled("Remote anchor failed"), 1);

        let file = persist::load_records(h.store.as_ref(), "cloud-anchors")
            .unwrap()
            .expect("records persisted");
        let names: Vec<_> = file.records.iter().map(|r| r.model_name()).collect();
        assert_eq!(names, vec!["model-a", "model-b"]);

        let mut settled = None;
        while let Ok(update) = updates.try_recv() {
            if let CoordinatorUpdate::HostingSettled { hosted, failed } = update {
                settled = Some((hosted.len(), failed));
            }
        }
        assert_eq!(settled, Some((2, 1)));
    }

    #[test]
    fn rejected_submission_fails_only_its_record() {
        let service = ScriptedService {
            reject: HashSet::from(["model-b".to_string()]),
            ..ScriptedService::default()
        };
        let mut h = Harness::with_service(service);
        h.session.place("model-a", Transform::IDENTITY);
        h.session.place("model-b", Transform::IDENTITY);

        let report = h.coordinator.save().unwrap();
        assert_eq!((report.submitted, report.rejected), (1, 1));
        assert_eq!(h.notifier.count_titled("Cannot submit model-b"), 1);

        h.host("h-1", "R1");
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        assert_eq!(h.coordinator.hosting().pending().failed_count(), 1);
    }

    #[test]
    fn save_with_no_model_anchors_settles_immediately() {
        let mut h = Harness::new();
        h.session.place("focus-box", Transform::IDENTITY);

        h.coordinator.save().unwrap();
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        let progress = h.coordinator.progress_receiver().borrow().clone();
        assert!(progress.settled);
        assert_eq!(progress.progress, 1.0);
        assert!(h.store.read_blob("cloud-anchors").unwrap().is_none());
    }

    #[test]
    fn late_outcome_after_dismiss_changes_nothing() {
        let mut h = Harness::new();
        h.session.place("model-a", Transform::IDENTITY);
        h.coordinator.save().unwrap();

        h.coordinator.dismiss_hosting();
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        h.host("h-1", "R1");

        assert!(h.coordinator.hosting().pending().is_empty());
        assert!(h.store.read_blob("cloud-anchors").unwrap().is_none());
        assert!(h.notifier.notifications().is_empty());
    }

    #[test]
    fn second_save_replaces_pending_batch() {
        let mut h = Harness::new();
        h.session.place("model-a", Transform::IDENTITY);
        h.coordinator.save().unwrap();
        h.session.place("model-b", Transform::IDENTITY);
        h.coordinator.save().unwrap();

        assert_eq!(h.coordinator.hosting().batches(), 2);
        assert_eq!(h.coordinator.hosting().pending().len(), 2);
        // h-1 belonged to the first batch.
        h.host("h-1", "R-old");
        assert_eq!(h.coordinator.hosting().pending().hosted_count(), 0);
    }

    #[test]
    fn local_load_without_map_leaves_anchors() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);

        let err = h.coordinator.load(LoadRequest::local()).unwrap_err();
        assert!(matches!(err, AnchorError::NothingToLoad { .. }));
        assert_eq!(h.session.anchor_names(), vec!["model-chair"]);
        assert_eq!(h.notifier.count_titled("Cannot load world map"), 1);
    }

    #[test]
    fn local_load_clears_unprotected_and_relocalizes() {
        let mut h = Harness::new();
        h.session.set_feature_points(420);
        h.session.place("model-chair", Transform::IDENTITY);
        h.coordinator.save().unwrap();

        h.session.place("focus-box", Transform::IDENTITY);
        h.session.place("model-stray", Transform::IDENTITY);

        let report = h.coordinator.load(LoadRequest::local()).unwrap();
        match report {
            LoadReport::Map { subtitle, anchors } => {
                assert_eq!(subtitle, "Feature points: 420, Anchors: 1");
                assert_eq!(anchors, 1);
            }
            other => panic!("unexpected report {other:?}"),
        }
        let mut names = h.session.anchor_names();
        names.sort();
        assert_eq!(names, vec!["focus-box", "model-chair"]);
        assert_eq!(h.session.relocalized_from(), Some(1));
        assert_eq!(h.notifier.count_titled("Map is loaded"), 1);
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
    }

    #[test]
    fn cloud_load_resolves_into_a_model_anchor() {
        let mut h = Harness::new();
        h.coordinator.add_model(chair()).unwrap();
        h.pump();
        let record = CloudAnchorRecord::hosted(
            "old-local".into(),
            "model-chair",
            RemoteAnchorId::from("R1"),
        );
        let request = LoadRequest {
            records: Some(vec![record]),
            ..LoadRequest::cloud()
        };
        let mut updates = h.coordinator.updates_sender().subscribe();

        h.coordinator.load(request).unwrap();
        assert_eq!(h.coordinator.state(), CoordinatorState::Resolving);
        assert!(h.session.anchors().is_empty());

        let resolved = Event::Resolve(ResolveEvent::Resolved {
            remote: RemoteAnchorId::from("R1"),
            transform: Transform::translation(0.0, 0.0, -1.0),
        });
        h.coordinator.handle_event(resolved.clone());
        h.coordinator.handle_event(resolved);
        h.pump();

        assert_eq!(h.session.anchor_names(), vec!["model-chair"]);
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        assert_eq!(h.notifier.count_titled("Found hosted anchor"), 1);
        assert_eq!(h.notifier.count_titled("Using cloud anchor"), 1);

        let mut placed = Vec::new();
        while let Ok(update) = updates.try_recv() {
            if let CoordinatorUpdate::PlaceModel { placement } = update {
                placed.push(placement.model.id.clone());
            }
        }
        assert_eq!(placed, vec![ModelId::from("chair")]);
    }

    #[test]
    fn cloud_load_without_records_is_nothing_to_load() {
        let mut h = Harness::new();
        let err = h.coordinator.load(LoadRequest::cloud()).unwrap_err();
        assert!(matches!(err, AnchorError::NothingToLoad { .. }));
        assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn geospatial_load_is_unsupported() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);
        let request = LoadRequest {
            engine: PositioningEngine::Geospatial,
            ..LoadRequest::default()
        };
        let err = h.coordinator.load(request).unwrap_err();
        assert!(matches!(err, AnchorError::UnsupportedEngine(_)));
        assert_eq!(h.session.anchor_names().len(), 1);
        assert_eq!(
            h.notifier.notifications(),
            vec![(
                "Positioning engine not supported yet".to_string(),
                "Given engine geospatial".to_string()
            )]
        );
    }

    #[test]
    fn add_model_without_placement_notifies() {
        let mut h = Harness::new();
        h.session.set_placement(None);
        let err = h.coordinator.add_model(chair()).unwrap_err();
        assert!(matches!(err, AnchorError::NoPlacement));
        assert_eq!(h.notifier.count_titled("Cannot place model at this position"), 1);
        assert!(h.coordinator.registry().used_models().is_empty());
    }

    #[test]
    fn tracking_change_activates_and_drives_loading_flag() {
        let mut h = Harness::new();
        assert!(h.coordinator.is_showing_loading());
        h.session.set_tracking(TrackingState::Normal);
        h.pump();
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
        assert!(!h.coordinator.is_showing_loading());
        assert!(!h.coordinator.status().loading);
    }

    #[test]
    fn delete_removes_named_anchor_and_clears_mark() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);
        h.coordinator.mark_for_deletion(Renderable {
            anchor_name: "model-chair".to_string(),
        });

        assert!(h.coordinator.delete("model-chair").unwrap().is_some());
        assert!(h.session.anchors().is_empty());
        assert!(h.coordinator.registry().marked_for_deletion().is_none());
        assert_eq!(h.coordinator.delete("model-chair").unwrap(), None);
    }

    #[test]
    fn debug_and_settings_reach_the_session() {
        let mut h = Harness::new();
        h.coordinator.toggle_debug(true);
        h.coordinator
            .update_settings(vec![SessionSetting::SceneDepth, SessionSetting::PeopleOcclusion]);
        assert!(h.session.debug());
        assert_eq!(
            h.session.settings(),
            vec![SessionSetting::SceneDepth, SessionSetting::PeopleOcclusion]
        );
        assert!(h.coordinator.status().debug);
    }

    #[test]
    fn batch_settling_after_a_load_is_still_persisted() {
        let mut h = Harness::new();
        h.session.place("model-a", Transform::IDENTITY);
        h.coordinator.save().unwrap();
        h.coordinator.load(LoadRequest::local()).unwrap();
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);

        h.host("h-1", "R1");
        let file = persist::load_records(h.store.as_ref(), "cloud-anchors")
            .unwrap()
            .expect("records persisted");
        assert_eq!(file.records.len(), 1);
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
    }

    #[test]
    fn save_that_cannot_persist_map_hosts_nothing() {
        let mut h = Harness::read_only();
        h.session.place("model-chair", Transform::IDENTITY);
        h.session.place("model-lamp", Transform::IDENTITY);

        let err = h.coordinator.save().unwrap_err();
        assert!(matches!(err, AnchorError::PersistenceFailure(_)));
        assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
        assert_eq!(h.coordinator.hosting().batches(), 0);
        assert!(h.coordinator.hosting().pending().is_empty());
        assert!(h.store.keys().is_empty());

        let notes = h.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "Cannot persist map");
    }

    #[test]
    fn local_load_of_corrupt_map_keeps_anchors() {
        let mut h = Harness::new();
        h.session.place("model-chair", Transform::IDENTITY);
        h.store.write_blob("worldmap", b"not a map").unwrap();

        let err = h.coordinator.load(LoadRequest::local()).unwrap_err();
        assert!(matches!(err, AnchorError::PersistenceFailure(_)));
        assert_eq!(h.session.anchor_names(), vec!["model-chair"]);
        assert_eq!(h.session.relocalized_from(), None);
        assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
        assert_eq!(h.notifier.notifications().len(), 1);
    }

    #[test]
    fn resolve_failures_for_unknown_or_resolved_anchors_stay_silent() {
        let mut h = Harness::new();
        let request = LoadRequest {
            records: Some(vec![CloudAnchorRecord::hosted(
                "old-local".into(),
                "model-chair",
                RemoteAnchorId::from("R1"),
            )]),
            ..LoadRequest::cloud()
        };
        h.coordinator.load(request).unwrap();
        let before = h.notifier.notifications().len();

        h.coordinator.handle_event(Event::Resolve(ResolveEvent::ResolveFailed {
            remote: RemoteAnchorId::from("R-stranger"),
        }));
        assert_eq!(h.notifier.notifications().len(), before);
        assert_eq!(h.coordinator.state(), CoordinatorState::Resolving);

        h.coordinator.handle_event(Event::Resolve(ResolveEvent::Resolved {
            remote: RemoteAnchorId::from("R1"),
            transform: Transform::IDENTITY,
        }));
        h.coordinator.handle_event(Event::Resolve(ResolveEvent::ResolveFailed {
            remote: RemoteAnchorId::from("R1"),
        }));
        assert_eq!(h.notifier.count_titled("Remote anchor failed"), 0);
        assert_eq!(h.notifier.count_titled("Found hosted anchor"), 1);
        assert_eq!(h.coordinator.state(), CoordinatorState::Active);
    }
}
