//! Boundary traits: what the decision engine consumes from the outside.
//!
//! The Combat Engine owns the battle state and resolves every command; the
//! Strategic layer answers diplomacy and galaxy-level travel questions.

use serde::{Deserialize, Serialize};

use crate::battle::Battle;
use crate::grid::GridPos;
use crate::math::Fixed;
use crate::stack::{CombatStack, EmpireId, StackId, SystemId};

/// How a stack should be moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveCommand {
    /// Jump straight to the end of a computed path (automated resolution).
    ToPoint {
        /// Final cell.
        destination: GridPos,
        /// Movement points the path costs.
        cost: u32,
    },
    /// Advance one cell (interactive, step-by-step resolution).
    Step(GridPos),
}

/// Result of one weapon slot firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FireOutcome {
    /// Whether the slot actually fired.
    pub fired: bool,
    /// Whether the target was destroyed by this salvo.
    pub target_destroyed: bool,
}

/// Callbacks into the Combat Engine that resolves the battle.
///
/// Implementations own the [`Battle`] and apply every state change.
pub trait CombatEngine {
    /// Current battle state.
    fn battle(&self) -> &Battle;

    /// Estimated fraction of `defender` that `attacker` destroys in one
    /// exchange. May exceed one; callers cap it.
    fn kill_percentage(&self, attacker: StackId, defender: StackId) -> Fixed;

    /// Estimated population `attacker` kills on `colony` in one exchange.
    fn estimated_population_loss(&self, attacker: StackId, colony: StackId) -> Fixed;

    /// Apply movement.
    fn move_stack(&mut self, stack: StackId, command: MoveCommand);

    /// Fire one weapon slot of `stack` at `target`.
    fn fire_weapon(&mut self, stack: StackId, target: StackId, slot: usize) -> FireOutcome;

    /// Withdraw `stack` from battle toward `destination`.
    fn retreat(&mut self, stack: StackId, destination: SystemId);

    /// Record that `stack` finished its turn.
    fn turn_complete(&mut self, stack: StackId);
}

/// Diplomatic standing between two empires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Same side.
    Allied,
    /// Non-aggression treaty in force.
    Peace,
    /// Open hostilities.
    War,
}

/// Strategic-layer queries.
pub trait StrategicLayer {
    /// Standing of `empire` toward `other`.
    fn relation(&self, empire: EmpireId, other: EmpireId) -> Relation;

    /// Whether `empire` holds a grievance (incident, broken treaty) against
    /// `other`.
    fn has_grievance(&self, empire: EmpireId, other: EmpireId) -> bool;

    /// Nearest friendly system reachable from `origin` at `speed`.
    fn nearest_retreat_system(&self, empire: EmpireId, origin: SystemId, speed: u32) -> Option<SystemId>;
}

/// Whether two owners fight on the same side.
///
/// Monsters (no owner) side only with other monsters.
pub fn are_allied<S: StrategicLayer + ?Sized>(strategic: &S, a: Option<EmpireId>, b: Option<EmpireId>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b || strategic.relation(a, b) == Relation::Allied,
        _ => false,
    }
}

/// Whether `other` is an enemy of `stack` in this battle.
pub fn is_hostile<S: StrategicLayer + ?Sized>(strategic: &S, stack: &CombatStack, other: &CombatStack) -> bool {
    stack.id != other.id && !are_allied(strategic, stack.owner, other.owner)
}
