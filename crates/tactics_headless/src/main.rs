//! Headless tactical battle runner.
//!
//! Resolves battle scenarios with the tactical AI playing every side.
//!
//! # Usage
//!
//! ```bash
//! # Run a single battle and print a summary
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron
//!
//! # Same, with one JSON line per turn followed by the summary
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --json
//!
//! # Resolve a directory of scenarios in parallel
//! cargo run -p tactics_headless -- batch --scenarios scenarios/ --parallel 4 --output results/batch.json
//!
//! # Validate a scenario without running it
//! cargo run -p tactics_headless -- check --scenario scenarios/skirmish.ron
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tactics_headless::{
    batch::{run_batch, BatchConfig},
    runner::{run_battle, BattleResult, BattleSummary},
    scenario::{Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless tactical battle runner for AI testing")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single battle
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's round limit
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Print turn reports and the summary as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Resolve every scenario in a directory
    Batch {
        /// Directory of .ron scenario files
        #[arg(short, long, default_value = "scenarios")]
        scenarios: PathBuf,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Override every scenario's round limit
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Write results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse and validate a scenario without running it
    Check {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs to stderr; stdout carries reports
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            rounds,
            json,
        } => cmd_run(&scenario, rounds, json),
        Commands::Batch {
            scenarios,
            parallel,
            rounds,
            output,
        } => cmd_batch(scenarios, parallel, rounds, output),
        Commands::Check { scenario } => cmd_check(&scenario),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run a single battle
fn cmd_run(path: &Path, rounds: Option<u32>, json: bool) -> Result<(), ScenarioError> {
    let mut scenario = Scenario::load(path)?;
    if let Some(rounds) = rounds {
        scenario.max_rounds = rounds;
    }
    tracing::info!(name = %scenario.name, max_rounds = scenario.max_rounds, "Starting battle");

    let summary = run_battle(&scenario)?;
    if json {
        for report in &summary.reports {
            println!("{}", serde_json::to_string(report)?);
        }
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Run a directory of battles
fn cmd_batch(
    scenarios: PathBuf,
    parallel: usize,
    rounds: Option<u32>,
    output: Option<PathBuf>,
) -> Result<(), ScenarioError> {
    let config = BatchConfig {
        max_rounds: rounds,
        ..BatchConfig::new(scenarios).with_parallel(parallel)
    };
    let results = run_batch(config)?;

    for summary in &results.battles {
        println!(
            "{:<32} {:<24} rounds={:<3} shots={}",
            summary.scenario,
            describe(&summary.result),
            summary.rounds,
            summary.shots_fired()
        );
    }
    for failure in &results.failures {
        println!("{:<32} FAILED: {}", failure.path.display(), failure.message);
    }
    println!(
        "\n{} battles, {} failures in {:.2}s",
        results.battles.len(),
        results.failures.len(),
        results.duration_seconds
    );

    if let Some(output) = output {
        results.save(&output)?;
        tracing::info!(path = %output.display(), "Batch results saved");
    }
    Ok(())
}

/// Validate a scenario
fn cmd_check(path: &Path) -> Result<(), ScenarioError> {
    let scenario = Scenario::load(path)?;
    scenario.validate()?;
    println!(
        "OK: '{}' ({}x{} grid, {} stacks, {} rounds max)",
        scenario.name,
        scenario.grid_size.0,
        scenario.grid_size.1,
        scenario.stacks.len(),
        scenario.max_rounds
    );
    Ok(())
}

fn describe(result: &BattleResult) -> String {
    match result {
        BattleResult::Victory(sides) => format!("victory {sides:?}"),
        BattleResult::NoSurvivors => "no survivors".to_string(),
        BattleResult::Stalemate => "stalemate".to_string(),
        BattleResult::RoundLimit => "round limit".to_string(),
    }
}

fn print_summary(summary: &BattleSummary) {
    println!("=== {} ===", summary.scenario);
    println!("Result: {}", describe(&summary.result));
    println!("Rounds: {}", summary.rounds);
    println!("Turns:  {} ({} salvos)", summary.reports.len(), summary.shots_fired());
    if !summary.retreats.is_empty() {
        println!("Withdrew:");
        for w in &summary.retreats {
            println!("  {} {} -> system {} (round {})", w.stack, w.name, w.destination.0, w.round);
        }
    }
    println!("Survivors:");
    for s in &summary.survivors {
        println!("  {} {:<20} {:?} units={} hits={}", s.stack, s.name, s.side, s.count, s.total_hits);
    }
}
