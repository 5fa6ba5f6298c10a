use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

use anchorsync_core::{
    AnchorError, BlobStore, CoordinatorConfig, MemoryBlobStore, Model, ModelId, ObjectType,
    Transform,
};
use anchorsync_runtime::{
    anchor_error, CoordinatorState, CoordinatorUpdate, EventSink, LoadRequest, RecordingNotifier,
    RuntimeError, SimulatedDevice, SimulatedHostingService,
};
use anchorsync_sync::persist;

const LATENCY: Duration = Duration::from_millis(200);

fn device(
    store: &Arc<MemoryBlobStore>,
    notifier: &Arc<RecordingNotifier>,
    service: impl FnOnce(EventSink) -> SimulatedHostingService,
) -> SimulatedDevice {
    SimulatedDevice::launch(
        CoordinatorConfig::default(),
        Box::new(Arc::clone(store)),
        notifier.clone(),
        service,
    )
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

#[tokio::test(start_paused = true)]
async fn wait_returns_once_two_of_three_hosted_and_one_failed() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dev = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY).fail_hosting("model-c")
    });
    for name in ["model-a", "model-b", "model-c"] {
        dev.session.place(name, Transform::IDENTITY);
    }

    let report = assert_ok!(dev.handle.save().await);
    assert_eq!(report.submitted, 3);
    timeout(Duration::from_secs(5), dev.handle.wait_until_all_resolved())
        .await
        .expect("hosting settles");

    let progress = dev.handle.progress();
    assert_eq!((progress.hosted, progress.failed, progress.total), (2, 1, 3));
    assert!(progress.settled);
    assert!(progress.progress < 1.0);

    let status = assert_ok!(dev.handle.status().await);
    assert_eq!(status.state, CoordinatorState::Active);
    assert_eq!(notifier.count_titled("Remote anchor failed"), 1);

    let file = persist::load_records(store.as_ref(), "cloud-anchors")
        .unwrap()
        .expect("hosted records persisted");
    assert_eq!(file.records.len(), 2);
    assert_eq!(dev.cloud.hosted_ids().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn wait_on_empty_set_returns_immediately() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dev = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY)
    });

    timeout(Duration::from_millis(1), dev.handle.wait_until_all_resolved())
        .await
        .expect("empty set is already settled");
    assert_eq!(dev.handle.progress().progress, 1.0);
}

#[tokio::test(start_paused = true)]
async fn save_before_map_is_ready_reports_once() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dev = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY)
    });
    dev.session.place("model-chair", Transform::IDENTITY);
    dev.session.set_snapshot_available(false);

    let err = assert_err!(dev.handle.save().await);
    assert!(matches!(
        anchor_error(&err),
        Some(AnchorError::SnapshotUnavailable { .. })
    ));
    assert_eq!(notifier.notifications().len(), 1);
    assert_eq!(notifier.count_titled("Cannot save"), 1);
    assert!(store.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dismissed_batch_ignores_late_outcomes() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dev = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY)
    });
    dev.session.place("model-a", Transform::IDENTITY);

    assert_ok!(dev.handle.save().await);
    assert_ok!(dev.handle.dismiss_hosting().await);
    tokio::time::sleep(LATENCY * 3).await;

    let status = assert_ok!(dev.handle.status().await);
    assert_eq!(status.hosting.total, 0);
    assert_eq!(status.state, CoordinatorState::Active);
    assert!(store.read_blob("cloud-anchors").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn hosted_anchor_resolves_on_a_second_device() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let first = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY)
    });
    assert_ok!(first.handle.add_model(chair()).await);
    assert_ok!(first.handle.save().await);
    first.handle.wait_until_all_resolved().await;
    assert_eq!(first.cloud.hosted_ids().len(), 1);

    let second_notifier = Arc::new(RecordingNotifier::new());
    let cloud = first.cloud.clone();
    let second = device(&store, &second_notifier, move |sink| {
        SimulatedHostingService::sharing(&cloud, sink, LATENCY)
    });
    assert_ok!(second.handle.add_model(chair()).await);
    let mut updates = second.handle.subscribe();
    assert_ok!(second.handle.load(LoadRequest::cloud()).await);

    let resolved = timeout(Duration::from_secs(5), async {
        loop {
            match updates.recv().await {
                Ok(CoordinatorUpdate::AnchorResolved { model_name, .. }) => break model_name,
                Ok(_) => continue,
                Err(err) => panic!("update stream closed: {err}"),
            }
        }
    })
    .await
    .expect("anchor resolves");
    assert_eq!(resolved, "model-chair");
    assert_eq!(second.session.anchor_names(), vec!["model-chair"]);
    assert_eq!(second_notifier.count_titled("Found hosted anchor"), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_owner_task() {
    let store = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dev = device(&store, &notifier, |sink| {
        SimulatedHostingService::new(sink, LATENCY)
    });

    dev.handle.shutdown();
    let joined = dev.task.await.expect("task joins");
    assert_ok!(joined);

    let err = assert_err!(dev.handle.save().await);
    assert!(matches!(err, RuntimeError::ChannelClosed(_)));
    // The waiter does not hang once the coordinator is gone.
    dev.handle.wait_until_all_resolved().await;
}
