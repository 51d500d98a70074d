//! Headless battle runner for the tactical AI.
//!
//! This crate loads battle scenarios from RON files and resolves them with
//! the decision engine from `tactics_core` playing every side, against a
//! deterministic reference Combat Engine. This enables:
//!
//! - **AI testing**: watch the turn reports of a single battle
//! - **Regression runs**: resolve a directory of scenarios in parallel
//! - **Scenario authoring**: validate a file without running it
//!
//! # Example
//!
//! ```bash
//! # Run one battle, printing turn reports as JSON lines
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --json
//!
//! # Resolve every scenario in a directory
//! cargo run -p tactics_headless -- batch --scenarios scenarios/ --output results/batch.json
//!
//! # Check a scenario file
//! cargo run -p tactics_headless -- check --scenario scenarios/skirmish.ron
//! ```

pub mod batch;
pub mod diplomacy;
pub mod engine;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use diplomacy::ScenarioDiplomacy;
pub use engine::ReferenceEngine;
pub use runner::{run_battle, BattleResult, BattleSummary, Side};
pub use scenario::{Scenario, ScenarioError};
