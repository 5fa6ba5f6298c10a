//! `anchorsync map`: inspect the persisted world map.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use anchorsync_core::{config, registry, FileBlobStore, WorldMap};
use anchorsync_sync::persist;

/// Arguments for `anchorsync map`.
#[derive(Args, Debug)]
pub struct MapArgs {
    /// Blob key to read instead of the configured map key.
    #[arg(long)]
    pub key: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct MapJson {
    subtitle: String,
    feature_points: usize,
    anchors: Vec<AnchorJson>,
}

#[derive(Serialize)]
struct AnchorJson {
    id: String,
    name: Option<String>,
    model: Option<String>,
    position: [f32; 3],
}

#[derive(Tabled)]
struct AnchorRow {
    #[tabled(rename = "anchor")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "model")]
    model: String,
    #[tabled(rename = "position")]
    position: String,
}

impl MapArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load coordinator config")?;
        let key = self.key.unwrap_or(config.map_key);

        let store = FileBlobStore::at_home(&home);
        let Some(map) = persist::load_map(&store, &key)
            .with_context(|| format!("failed to read map '{key}'"))?
        else {
            println!("No map saved under '{key}'. Run `anchorsync simulate` first.");
            return Ok(());
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&to_json(&map))
                    .context("failed to serialize map JSON")?
            );
            return Ok(());
        }
        print_table(&key, &map);
        Ok(())
    }
}

fn to_json(map: &WorldMap) -> MapJson {
    MapJson {
        subtitle: map.subtitle(),
        feature_points: map.feature_points,
        anchors: map
            .anchors
            .iter()
            .map(|anchor| AnchorJson {
                id: anchor.id.to_string(),
                name: anchor.name.clone(),
                model: anchor
                    .name
                    .as_deref()
                    .and_then(registry::model_id_from_anchor_name)
                    .map(|id| id.to_string()),
                position: anchor.transform.position(),
            })
            .collect(),
    }
}

fn print_table(key: &str, map: &WorldMap) {
    println!("{} {}", key.bold(), map.subtitle());
    if map.anchors.is_empty() {
        return;
    }
    let rows: Vec<AnchorRow> = map
        .anchors
        .iter()
        .map(|anchor| {
            let name = anchor.name.clone().unwrap_or_default();
            let model = registry::model_id_from_anchor_name(&name)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".bright_black().to_string());
            let [x, y, z] = anchor.transform.position();
            AnchorRow {
                id: anchor.id.to_string(),
                name,
                model,
                position: format!("{x:.2}, {y:.2}, {z:.2}"),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
