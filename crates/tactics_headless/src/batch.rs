//! Batch battle runner.
//!
//! Resolves every scenario in a directory in parallel using rayon. Battles
//! share no state, so each one is an independent work item and the results
//! come back in file-name order regardless of scheduling.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{run_battle, BattleSummary};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory holding `*.ron` scenario files.
    pub scenario_dir: PathBuf,
    /// Worker threads (0 = use rayon default).
    pub parallel: usize,
    /// Override for every scenario's round limit.
    pub max_rounds: Option<u32>,
}

impl BatchConfig {
    /// Config for every scenario in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario_dir: dir.into(),
            parallel: 0,
            max_rounds: None,
        }
    }

    /// Set the worker count.
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }
}

/// A scenario that failed to load or run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Scenario file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Summaries of the battles that completed, in file-name order.
    pub battles: Vec<BattleSummary>,
    /// Scenarios that could not be resolved.
    pub failures: Vec<BatchFailure>,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// `*.ron` files in `dir`, sorted by name.
pub fn scenario_files(dir: &Path) -> Result<Vec<PathBuf>, ScenarioError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn run_file(path: &Path, max_rounds: Option<u32>) -> Result<BattleSummary, ScenarioError> {
    let mut scenario = Scenario::load(path)?;
    if let Some(rounds) = max_rounds {
        scenario.max_rounds = rounds;
    }
    run_battle(&scenario)
}

/// Run every scenario in `config.scenario_dir`.
///
/// A scenario that fails is recorded in [`BatchResults::failures`]; only a
/// missing directory or a worker pool failure aborts the batch.
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let files = scenario_files(&config.scenario_dir)?;
    info!(count = files.len(), dir = %config.scenario_dir.display(), "Starting batch");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel)
        .build()?;
    let outcomes: Vec<(PathBuf, Result<BattleSummary, ScenarioError>)> = pool.install(|| {
        files
            .par_iter()
            .map(|path| (path.clone(), run_file(path, config.max_rounds)))
            .collect()
    });

    let mut battles = Vec::new();
    let mut failures = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(summary) => battles.push(summary),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Scenario failed");
                failures.push(BatchFailure {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        completed = battles.len(),
        failed = failures.len(),
        duration_seconds,
        "Batch finished"
    );
    Ok(BatchResults {
        config,
        battles,
        failures,
        duration_seconds,
    })
}
