//! Drone telemetry simulator command-line interface.
//!
//! Provides:
//! - `run`: simulate one fleet and print its event log
//! - `sweep`: run several seeds in parallel and compare their counters
//! - `analyze`: check a saved event log for protocol violations

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::{LevelFilter, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;

mod analyzer;
mod common;
mod simulation;

use common::{ConfigError, SimConfig, build_network, choose_fleet_size};
use simulation::{SimStats, SimulationReport};

#[derive(Parser)]
#[command(name = "drone-sim")]
#[command(author, version, about = "Discrete-event simulator for drone telemetry over a shared channel", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SetupArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for fleet size and all random delays (drawn from entropy if absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Exact number of nodes, ground station included
    #[arg(long, conflicts_with_all = ["min_nodes", "max_nodes"])]
    nodes: Option<u32>,

    /// Smallest fleet when the size is drawn at random
    #[arg(long)]
    min_nodes: Option<u32>,

    /// Largest fleet when the size is drawn at random
    #[arg(long)]
    max_nodes: Option<u32>,

    /// Virtual time to simulate, in milliseconds
    #[arg(long)]
    duration_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one fleet and print its event log
    Run {
        #[command(flatten)]
        setup: SetupArgs,

        /// Print a JSON document instead of the text log
        #[arg(long)]
        json: bool,
    },

    /// Run several seeds in parallel (seed, seed+1, ...)
    Sweep {
        #[command(flatten)]
        setup: SetupArgs,

        /// Number of independent runs
        #[arg(long, default_value = "4")]
        runs: u32,

        /// Print JSON instead of one line per run
        #[arg(long)]
        json: bool,
    },

    /// Analyze a saved event log
    Analyze {
        /// Event log file (output of `run`)
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct RunOutput<'a> {
    config: &'a SimConfig,
    #[serde(flatten)]
    report: &'a SimulationReport,
}

#[derive(Serialize)]
struct SweepLine {
    seed: u64,
    nodes: usize,
    stats: SimStats,
}

/// Load the configuration file (if any) and apply command-line overrides.
fn load_config(setup: &SetupArgs) -> Result<SimConfig> {
    let mut config = match &setup.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimConfig::load(path).with_context(|| format!("Invalid configuration in {}", path.display()))?
        }
        None => SimConfig::default(),
    };

    if let Some(min) = setup.min_nodes {
        config.fleet.min_nodes = min;
    }
    if let Some(max) = setup.max_nodes {
        config.fleet.max_nodes = max;
    }
    if let Some(duration) = setup.duration_ms {
        config.run.duration_ms = duration;
    }
    if let Some(seed) = setup.seed {
        config.run.seed = Some(seed);
    }
    if setup.nodes == Some(0) {
        return Err(ConfigError::ValidationError("--nodes must be at least 1".to_string())).context("Invalid command-line overrides");
    }
    config.validate().map_err(ConfigError::ValidationError).context("Invalid command-line overrides")?;
    Ok(config)
}

fn resolve_seed(config: &SimConfig) -> u64 {
    match config.run.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            info!("No seed given, using {} (pass --seed {} to reproduce)", seed, seed);
            seed
        }
    }
}

fn simulate_once(config: &SimConfig, nodes: Option<u32>, seed: u64) -> Result<SimulationReport> {
    let nodes = match nodes {
        Some(n) => n,
        None => choose_fleet_size(config.fleet.min_nodes, config.fleet.max_nodes, seed).context("Failed to choose fleet size")?,
    };
    let network = build_network(config, nodes, seed).context("Failed to build fleet")?;
    let report = network.simulate(config.horizon()).context("Simulation aborted")?;
    Ok(report)
}

/// Run `runs` independent simulations on seeds `base_seed, base_seed + 1, ...`.
fn sweep_reports(config: &SimConfig, nodes: Option<u32>, base_seed: u64, runs: u32) -> Vec<Result<SimulationReport>> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..runs)
            .map(|i| {
                let seed = base_seed.wrapping_add(u64::from(i));
                scope.spawn(move || simulate_once(config, nodes, seed))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|_| Err(anyhow!("Simulation thread panicked"))))
            .collect()
    })
}

fn cmd_run(setup: SetupArgs, json: bool) -> Result<()> {
    let config = load_config(&setup)?;
    let seed = resolve_seed(&config);
    let report = simulate_once(&config, setup.nodes, seed)?;

    if json {
        let output = RunOutput { config: &config, report: &report };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in report.log.lines() {
        println!("{}", line);
    }
    let stats = &report.stats;
    println!();
    println!("Seed: {}", report.seed);
    println!("Nodes: {} (1 GCS + {} drones)", report.nodes, report.drones);
    println!("Simulated: {} ms, {} events", report.horizon_ms, report.events_dispatched);
    println!(
        "DATA sent: {} (+{} retransmissions), ACKs sent: {}, ACKs accepted: {}",
        stats.data_sent, stats.data_retransmitted, stats.acks_sent, stats.acks_accepted
    );
    println!(
        "Collisions: {}, timeouts: {}, abandoned: {}, unknown destinations: {}",
        stats.collisions, stats.ack_timeouts, stats.frames_abandoned, stats.unknown_destinations
    );
    println!("Unacknowledged at end: {}", report.pending.len());
    Ok(())
}

fn cmd_sweep(setup: SetupArgs, runs: u32, json: bool) -> Result<()> {
    let config = load_config(&setup)?;
    let base_seed = resolve_seed(&config);
    info!("Sweeping {} runs from seed {}", runs, base_seed);

    let results = sweep_reports(&config, setup.nodes, base_seed, runs);

    let mut lines = Vec::with_capacity(results.len());
    for result in results {
        let report = result?;
        lines.push(SweepLine {
            seed: report.seed,
            nodes: report.nodes,
            stats: report.stats,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }
    for line in &lines {
        let s = &line.stats;
        println!(
            "seed={} nodes={} sent={} retransmitted={} acked={} collisions={} timeouts={} abandoned={}",
            line.seed, line.nodes, s.data_sent, s.data_retransmitted, s.acks_accepted, s.collisions, s.ack_timeouts, s.frames_abandoned
        );
    }
    Ok(())
}

fn cmd_analyze(file: PathBuf, json: bool) -> Result<()> {
    let parsed = analyzer::load_log_file(&file).with_context(|| format!("Failed to read log file {}", file.display()))?;
    if parsed.skipped_lines > 0 {
        info!("Skipped {} non-event lines", parsed.skipped_lines);
    }
    let report = analyzer::analyze(&parsed.entries);
    if !report.is_clean() {
        warn!("{} protocol violations in {}", report.violations.len(), file.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new().filter_level(LevelFilter::Warn).filter(Some(env!("CARGO_CRATE_NAME")), level).init();

    match cli.command {
        Commands::Run { setup, json } => cmd_run(setup, json),
        Commands::Sweep { setup, runs, json } => cmd_sweep(setup, runs, json),
        Commands::Analyze { file, json } => cmd_analyze(file, json),
    }
}
