//! # Tactics Core
//!
//! Tactical combat decision engine for turn-based fleet battles.
//!
//! For every AI-controlled stack in a battle this crate decides, once per
//! turn, what to shoot, where to move, in which order to fire its weapons
//! and whether to flee. It contains **only** decision logic:
//! - No rendering
//! - No IO
//! - No randomness
//! - No floating-point math (uses fixed-point)
//!
//! Damage resolution and galaxy-level queries stay outside, behind the
//! [`interfaces::CombatEngine`] and [`interfaces::StrategicLayer`] traits.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Battle grid, cells and directions
//! - [`stack`] - Combat stacks, weapons and capabilities
//! - [`battle`] - Battle state (grid plus stack arena)
//! - [`pathfinding`] - Branch-and-bound path search, attack and kiting cells
//! - [`targeting`] - Target desirability scoring
//! - [`firing`] - Weapon firing order
//! - [`retreat`] - Fight-or-flight evaluation
//! - [`turn`] - Per-stack turn state machine
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod config;
pub mod error;
pub mod firing;
pub mod grid;
pub mod interfaces;
pub mod math;
pub mod pathfinding;
pub mod retreat;
pub mod stack;
pub mod targeting;
pub mod turn;

#[cfg(test)]
mod testing;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::Battle;
    pub use crate::config::{ResolutionMode, TacticsConfig};
    pub use crate::error::{Result, TacticsError};
    pub use crate::firing::{AttackSequencer, FiringPhase, FiringRecord};
    pub use crate::grid::{BattleGrid, Direction, GridPos, Terrain};
    pub use crate::interfaces::{CombatEngine, FireOutcome, MoveCommand, Relation, StrategicLayer};
    pub use crate::math::{Fixed, WideFixed};
    pub use crate::pathfinding::{find_attack_path, find_path, find_safest_cell, FlightPath};
    pub use crate::retreat::{ForceAssessment, RetreatDecision, RetreatEvaluator, StayReason};
    pub use crate::stack::{
        Capabilities, CombatStack, Controller, EmpireId, SpecialWeapon, StackId, StackRole, StackStatus,
        SystemId, WeaponKind, WeaponSlot,
    };
    pub use crate::targeting::{TargetChoice, TargetMode, TargetSelector};
    pub use crate::turn::{SkipReason, TurnAction, TurnController, TurnOutcome, TurnReport};
}
