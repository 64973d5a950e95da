//! gatematch CLI - Debug tool for gate discovery and deduplication
//!
//! Usage:
//!   gatematch-cli discover <events.json> --host-event <id>
//!   gatematch-cli dedup <events.json> --host-event <id>
//!
//! The input file is a JSON array of check-in events. The tool runs the
//! discovery pipeline (and, for `dedup`, a deduplication pass on top) and
//! prints the resulting reports and gate set as JSON, helping to understand
//! how gates are being discovered, bound, and merged.

use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;

use gatematch::{CheckInEvent, DedupConfig, DiscoveryConfig, GateDiscoveryEngine};

#[derive(Parser)]
#[command(name = "gatematch-cli")]
#[command(about = "Debug tool for gate discovery and deduplication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run gate discovery over a check-in dump
    Discover {
        /// JSON file containing an array of check-in events
        events: PathBuf,

        /// Host event id
        #[arg(long, default_value = "cli-event")]
        host_event: String,

        /// Clustering neighborhood radius in meters
        #[arg(long)]
        epsilon: Option<f64>,

        /// Minimum events to seed a cluster / create a gate
        #[arg(long)]
        min_points: Option<usize>,

        /// Maximum auto-created gates per event
        #[arg(long)]
        max_gates: Option<usize>,
    },

    /// Run discovery followed by a deduplication pass
    Dedup {
        /// JSON file containing an array of check-in events
        events: PathBuf,

        /// Host event id
        #[arg(long, default_value = "cli-event")]
        host_event: String,

        /// Deduplication radius in meters
        #[arg(long)]
        radius: Option<f64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Discover {
            events,
            host_event,
            epsilon,
            min_points,
            max_gates,
        } => run_discover(&events, &host_event, epsilon, min_points, max_gates),
        Commands::Dedup {
            events,
            host_event,
            radius,
        } => run_dedup(&events, &host_event, radius),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load_events(path: &PathBuf) -> Result<Vec<CheckInEvent>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

fn run_discover(
    path: &PathBuf,
    host_event: &str,
    epsilon: Option<f64>,
    min_points: Option<usize>,
    max_gates: Option<usize>,
) -> Result<(), String> {
    let events = load_events(path)?;
    info!("loaded {} check-in events", events.len());

    let mut config = DiscoveryConfig::default();
    if let Some(eps) = epsilon {
        config.epsilon_meters = eps;
    }
    if let Some(min) = min_points {
        config.min_points = min;
    }
    if let Some(max) = max_gates {
        config.max_gates_per_event = max;
    }

    let mut engine = GateDiscoveryEngine::with_config(host_event, config, DedupConfig::default());
    engine.add_check_ins(events);

    let report = engine.run_discovery().map_err(|e| e.to_string())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );
    println!("{}", engine.live_gates_json());
    Ok(())
}

fn run_dedup(path: &PathBuf, host_event: &str, radius: Option<f64>) -> Result<(), String> {
    let events = load_events(path)?;
    info!("loaded {} check-in events", events.len());

    let mut dedup_config = DedupConfig::default();
    if let Some(r) = radius {
        dedup_config.dedup_radius_meters = r;
    }

    let mut engine =
        GateDiscoveryEngine::with_config(host_event, DiscoveryConfig::default(), dedup_config);
    engine.add_check_ins(events);

    engine.run_discovery().map_err(|e| e.to_string())?;
    let report = engine.run_deduplication().map_err(|e| e.to_string())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );
    println!("{}", engine.live_gates_json());
    Ok(())
}
