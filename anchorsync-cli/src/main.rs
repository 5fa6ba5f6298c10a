//! anchorsync: drive and inspect the anchor synchronization coordinator.
//!
//! # Usage
//!
//! ```text
//! anchorsync simulate --anchors <n> [--fail <k>] [--latency-ms <ms>] [--resolve] [--json]
//! anchorsync map [--key <key>] [--json]
//! anchorsync records [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{map::MapArgs, records::RecordsArgs, simulate::SimulateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "anchorsync",
    version,
    about = "Save, host and restore spatial anchors",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save and host anchors against simulated collaborators.
    Simulate(SimulateArgs),

    /// Show the saved world map.
    Map(MapArgs),

    /// List persisted cloud-anchor records.
    Records(RecordsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.log_json {
        anchorsync_runtime::init_json_tracing();
    } else {
        anchorsync_runtime::init_tracing();
    }
    match cli.command {
        Commands::Simulate(args) => args.run(),
        Commands::Map(args) => args.run(),
        Commands::Records(args) => args.run(),
    }
}
