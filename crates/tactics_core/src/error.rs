//! Error types for the tactical decision engine.
//!
//! Only caller defects surface as errors. Decision dead-ends (no target, no
//! path, no retreat point, no legal weapon) are modelled as `None` results.

use thiserror::Error;

use crate::stack::StackId;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the decision engine.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// The stack id does not exist in the battle.
    #[error("Stack not found: {0}")]
    StackNotFound(StackId),

    /// A turn was requested for a stack that may not act.
    #[error("Stack {stack} cannot take a turn: {reason}")]
    StackNotActionable {
        /// Offending stack.
        stack: StackId,
        /// Why the request was rejected.
        reason: &'static str,
    },

    /// A stack was placed on an out-of-bounds, blocked or occupied cell.
    #[error("Invalid placement at ({x}, {y}): {reason}")]
    InvalidPlacement {
        /// Cell column.
        x: i32,
        /// Cell row.
        y: i32,
        /// Why the cell was rejected.
        reason: &'static str,
    },

    /// Tactics configuration could not be parsed.
    #[error("Failed to parse tactics config: {0}")]
    ConfigParse(String),
}
