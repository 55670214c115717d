//! 'main' for the Exodus migrator process

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use exodus_module_delegation_tree::build_stake_graph;
use exodus_module_event_writer::write_events;
use exodus_module_genesis_writer::write_genesis;
use exodus_module_snapshot_reader::SnapshotReader;
use exodus_module_state_accumulator::{check_invariants, Accumulator};

mod configuration;
use configuration::MigratorConfig;

#[derive(Debug, Parser)]
#[command(name = "exodus-migrator")]
#[command(about = "One-shot migration of a legacy chain snapshot into genesis and event files")]
struct Args {
    /// Legacy snapshot file; its name maps are read from <snapshot>.map
    snapshot: PathBuf,

    /// Output directory for the genesis image and event logs
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Site configuration file, layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drop history events recorded after this block height
    #[arg(long)]
    last_block: Option<u32>,
}

fn main() -> Result<()> {
    // Standard logging using RUST_LOG for log levels
    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    Registry::default().with(fmt_layer).init();

    info!("Exodus migrator process");

    let args = Args::parse();
    let config = MigratorConfig::load(args.config.as_deref())?;
    run(&args, &config)
}

/// The whole pipeline, single-threaded, ownership moving stage to stage.
/// Any error aborts before an output file is finalized.
fn run(args: &Args, config: &MigratorConfig) -> Result<()> {
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;

    let mut reader = SnapshotReader::open(&args.snapshot, args.last_block)?;
    let maps = reader.read_maps()?;

    let mut accumulator = Accumulator::new(maps, config.currencies, config.max_witness_votes);
    while let Some(record) = reader.next_record()? {
        accumulator.accept(record)?;
    }
    let mut payloads = reader.payload_reader()?;

    let state = accumulator.into_state()?;
    check_invariants(&state)?;

    let graph = build_stake_graph(&state)?;

    let genesis_path = args.output.join("genesis.bin");
    let genesis_digest = write_genesis(&state, &graph, &genesis_path, &config.genesis)?;

    let event_digests = write_events(
        &state,
        &mut payloads,
        &args.output,
        &config.genesis,
        &config.events,
    )?;

    info!(
        genesis = %genesis_digest,
        event_files = event_digests.len(),
        "migration complete"
    );
    Ok(())
}
