//! `anchorsync records`: list hosted cloud-anchor records.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use anchorsync_core::{config, FileBlobStore};
use anchorsync_sync::persist::{self, RecordsFile};

/// Arguments for `anchorsync records`.
#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RecordJson {
    model: String,
    local_id: String,
    host_id: Option<String>,
    created_at: String,
}

#[derive(Serialize)]
struct RecordsJson {
    saved_at: String,
    records: Vec<RecordJson>,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "model")]
    model: String,
    #[tabled(rename = "local anchor")]
    local_id: String,
    #[tabled(rename = "cloud anchor")]
    host_id: String,
    #[tabled(rename = "created")]
    created_at: String,
}

impl RecordsArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load coordinator config")?;
        let store = FileBlobStore::at_home(&home);

        let file = persist::load_records(&store, &config.records_key)
            .with_context(|| format!("failed to read records '{}'", config.records_key))?;
        let Some(file) = file else {
            if self.json {
                println!("[]");
            } else {
                println!("No hosted anchors yet.");
            }
            return Ok(());
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&to_json(&file))
                    .context("failed to serialize records JSON")?
            );
            return Ok(());
        }
        print_table(&file);
        Ok(())
    }
}

fn to_json(file: &RecordsFile) -> RecordsJson {
    RecordsJson {
        saved_at: file.saved_at.to_rfc3339(),
        records: file
            .records
            .iter()
            .map(|r| RecordJson {
                model: r.model_name().to_string(),
                local_id: r.local_id().to_string(),
                host_id: r.host_id().map(ToString::to_string),
                created_at: r.created_at().to_rfc3339(),
            })
            .collect(),
    }
}

fn print_table(file: &RecordsFile) {
    println!(
        "{} hosted anchor(s), saved {}",
        file.records.len().to_string().bold(),
        file.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let rows: Vec<RecordRow> = file
        .records
        .iter()
        .map(|r| RecordRow {
            model: r.model_name().to_string(),
            local_id: r.local_id().to_string(),
            host_id: r
                .host_id()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".red().to_string()),
            created_at: r.created_at().format("%H:%M:%S").to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
