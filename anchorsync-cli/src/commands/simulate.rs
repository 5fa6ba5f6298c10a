//! `anchorsync simulate`: run a save/host (and optionally resolve) cycle
//! against simulated collaborators, persisting into the real data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use anchorsync_core::{
    anchor_name_for, config, CoordinatorConfig, FileBlobStore, Model, ModelId, ObjectType,
    Transform,
};
use anchorsync_runtime::{
    CoordinatorState, LoadRequest, RecordingNotifier, SimulatedDevice, SimulatedHostingService,
};
use anchorsync_sync::HostProgress;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_POLL: Duration = Duration::from_millis(20);

/// Arguments for `anchorsync simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of models to place and host.
    #[arg(long, default_value_t = 3)]
    pub anchors: usize,

    /// How many of them the simulated service fails to host.
    #[arg(long, default_value_t = 0)]
    pub fail: usize,

    /// Simulated round-trip latency of the hosting service.
    #[arg(long, default_value_t = 200)]
    pub latency_ms: u64,

    /// Afterwards, resolve the hosted anchors on a second simulated device.
    #[arg(long)]
    pub resolve: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    saved_anchors: usize,
    hosting: HostProgress,
    resolved: Option<Vec<String>>,
    notifications: Vec<NotificationJson>,
}

#[derive(Debug, Serialize)]
struct NotificationJson {
    title: String,
    subtitle: String,
}

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "detail")]
    subtitle: String,
}

impl SimulateArgs {
    pub fn run(self) -> Result<()> {
        if self.fail > self.anchors {
            bail!(
                "--fail ({}) cannot exceed --anchors ({})",
                self.fail,
                self.anchors
            );
        }
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let report = runtime.block_on(simulate(&home, &self))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .context("failed to serialize simulation JSON")?
            );
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

async fn simulate(home: &Path, args: &SimulateArgs) -> Result<SimulationReport> {
    let config = config::load_at(home).context("failed to load coordinator config")?;
    let latency = Duration::from_millis(args.latency_ms);
    let notifier = Arc::new(RecordingNotifier::new());
    let failing: Vec<String> = (args.anchors - args.fail..args.anchors)
        .map(|i| anchor_name_for(&model(i).id))
        .collect();

    let device = SimulatedDevice::launch(
        config.clone(),
        Box::new(FileBlobStore::at_home(home)),
        notifier.clone(),
        move |sink| {
            failing
                .into_iter()
                .fold(SimulatedHostingService::new(sink, latency), |svc, name| {
                    svc.fail_hosting(name)
                })
        },
    );

    for i in 0..args.anchors {
        device
            .session
            .set_placement(Some(Transform::translation(i as f32, 0.0, -1.0)));
        device
            .handle
            .add_model(model(i))
            .await
            .with_context(|| format!("failed to place model {i}"))?;
    }

    let saved = device.handle.save().await.context("save failed")?;
    device.handle.wait_until_all_resolved().await;
    let hosting = device.handle.progress();

    let resolved = if args.resolve {
        Some(resolve_on_second_device(home, config, &device, latency, &notifier).await?)
    } else {
        None
    };

    device.handle.shutdown();
    device
        .task
        .await
        .context("coordinator task panicked")?
        .context("coordinator task failed")?;

    Ok(SimulationReport {
        saved_anchors: saved.anchors.len(),
        hosting,
        resolved,
        notifications: notifier
            .notifications()
            .into_iter()
            .map(|(title, subtitle)| NotificationJson { title, subtitle })
            .collect(),
    })
}

async fn resolve_on_second_device(
    home: &Path,
    config: CoordinatorConfig,
    first: &SimulatedDevice,
    latency: Duration,
    notifier: &Arc<RecordingNotifier>,
) -> Result<Vec<String>> {
    let cloud = first.cloud.clone();
    let second = SimulatedDevice::launch(
        config,
        Box::new(FileBlobStore::at_home(home)),
        notifier.clone(),
        move |sink| SimulatedHostingService::sharing(&cloud, sink, latency),
    );

    second
        .handle
        .load(LoadRequest::cloud())
        .await
        .context("cloud load failed")?;

    tokio::time::timeout(RESOLVE_TIMEOUT, async {
        loop {
            let status = second.handle.status().await?;
            if status.state != CoordinatorState::Resolving {
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(STATUS_POLL).await;
        }
    })
    .await
    .context("timed out resolving anchors")??;

    let names = second.session.anchor_names();
    second.handle.shutdown();
    Ok(names)
}

fn model(i: usize) -> Model {
    Model {
        id: ModelId::from(format!("item-{i}")),
        name: format!("Item {i}"),
        content: String::new(),
        object_type: ObjectType::None,
        asset: None,
    }
}

fn print_report(report: &SimulationReport) {
    let progress = &report.hosting;
    let headline = format!(
        "{} | {} hosted, {} failed, {} total",
        progress.label, progress.hosted, progress.failed, progress.total
    );
    if progress.failed == 0 {
        println!("{} {headline}", "✓".green().bold());
    } else {
        println!("{} {headline}", "!".yellow().bold());
    }
    println!("Saved map with {} model anchor(s)", report.saved_anchors);

    if let Some(resolved) = &report.resolved {
        println!("Resolved on second device: {}", resolved.len());
        for name in resolved {
            println!("  ·  {name}");
        }
    }

    if report.notifications.is_empty() {
        return;
    }
    let rows: Vec<NotificationRow> = report
        .notifications
        .iter()
        .map(|n| NotificationRow {
            title: n.title.clone(),
            subtitle: n.subtitle.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
