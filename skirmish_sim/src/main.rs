//! Skirmish episode CLI.
//!
//! Run deterministic network wargame episodes against built-in scenario
//! presets.

use clap::Parser;
use skirmish_sim::{EpisodeRunner, ScenarioId};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Deterministic network wargame episode runner
#[derive(Parser, Debug)]
#[command(name = "skirmish-sim")]
#[command(about = "Run deterministic network wargame episodes", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = derive from wall clock)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario preset (enterprise, wireless_field)
    #[arg(short = 'S', long, default_value = "enterprise")]
    scenario: String,

    /// Steps to run (defaults to the scenario's full phase schedule)
    #[arg(long)]
    steps: Option<u64>,

    /// Number of consecutive seeds to sweep (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Chance that background work trips a false-positive detection
    #[arg(long, default_value = "0.05")]
    fp_rate: f64,

    /// Chance that background work falls for a phishing lure
    #[arg(long, default_value = "0.02")]
    phishing_rate: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Write the episode trace to a JSON file (single seed only)
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let scenario: ScenarioId = match args.scenario.parse() {
        Ok(scenario) => scenario,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!("Available scenarios: enterprise, wireless_field");
            std::process::exit(1);
        }
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if args.export.is_some() && args.seeds > 1 {
        eprintln!("Error: --export supports a single seed, not a sweep");
        std::process::exit(1);
    }

    let mut summaries = Vec::new();
    for offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(offset as u64);
        let mut runner = EpisodeRunner::new(seed, scenario)
            .with_rates(args.fp_rate, args.phishing_rate);
        if let Some(steps) = args.steps {
            runner = runner.with_steps(steps);
        }

        match runner.run() {
            Ok(result) => {
                if !args.json {
                    info!(
                        "✓ {} (seed={}) total reward {:.1} over {} steps",
                        scenario.name(),
                        seed,
                        result.total_reward,
                        result.steps
                    );
                }
                if let Some(path) = &args.export {
                    if let Err(err) = result.export.write_to_file(path) {
                        error!("Failed to write export: {}", err);
                        std::process::exit(1);
                    }
                    info!("Exported {} frames to {}", result.export.frames.len(), path);
                }
                summaries.push(serde_json::json!({
                    "seed": seed,
                    "steps": result.steps,
                    "total_reward": result.total_reward,
                    "final_phase": result.final_phase.to_string(),
                }));
            }
            Err(err) => {
                error!("✗ {} (seed={}) failed: {}", scenario.name(), seed, err);
                std::process::exit(1);
            }
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "scenario": scenario.name(),
            "episodes": summaries,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default()
        );
    }
}
