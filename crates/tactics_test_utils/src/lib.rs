//! # Tactics Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Fixture builders for stacks and weapons
//! - A scripted Combat Engine and a table-driven Strategic layer
//! - A brute-force path oracle
//! - Determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod engine;
pub mod fixtures;
pub mod oracle;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
