//! Fight-or-flight decisions.
//!
//! A stack first checks whether it may leave at all, then whether a treaty
//! obliges it to, and finally compares the kill power and remaining value
//! of both sides. Withdrawal needs a friendly system within travel range;
//! without one the stack keeps fighting.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::Battle;
use crate::config::TacticsConfig;
use crate::interfaces::{are_allied, CombatEngine, Relation, StrategicLayer};
use crate::math::{widen, Fixed, WideFixed};
use crate::stack::{CombatStack, StackId, SystemId};
use crate::targeting::kill_fraction;

/// Summed kill power and value of both sides, from the acting stack's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForceAssessment {
    /// Sum of each ally's best matchup kill value (the actor included).
    pub ally_kill: WideFixed,
    /// Sum of each hostile's best matchup kill value.
    pub hostile_kill: WideFixed,
    /// Remaining value of the allied side.
    pub ally_value: WideFixed,
    /// Remaining value of the hostile side.
    pub hostile_value: WideFixed,
}

impl ForceAssessment {
    /// Whether the hostile side outclasses the allied side.
    ///
    /// Hostiles that cannot kill anything never overwhelm. Allies that
    /// cannot kill anything always are overwhelmed. Otherwise the cross
    /// product `hostile_kill x hostile_value` is compared to
    /// `threshold x ally_kill x ally_value`.
    #[must_use]
    pub fn overwhelming(&self, threshold: Fixed) -> bool {
        if self.hostile_kill == WideFixed::ZERO {
            return false;
        }
        if self.ally_kill == WideFixed::ZERO {
            return true;
        }
        let threat = self.hostile_kill.saturating_mul(self.hostile_value);
        let strength = widen(threshold)
            .saturating_mul(self.ally_kill)
            .saturating_mul(self.ally_value);
        threat > strength
    }
}

/// Why a stack stays in the fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StayReason {
    /// Role or design does not allow withdrawal.
    CannotRetreat,
    /// No movement left this round.
    NoMovement,
    /// Own missiles are still flying.
    MissilesInFlight,
    /// Nothing present can hurt the stack.
    Untargetable,
    /// The odds are acceptable.
    NotOutmatched,
    /// No friendly system within travel range.
    NoRetreatSystem,
}

/// Outcome of a retreat evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetreatDecision {
    /// Keep fighting.
    Stay(StayReason),
    /// Withdraw toward the given system.
    Retreat(SystemId),
}

impl RetreatDecision {
    /// True for [`RetreatDecision::Retreat`].
    #[must_use]
    pub const fn is_retreat(&self) -> bool {
        matches!(self, Self::Retreat(_))
    }
}

/// Decides whether a stack should disengage.
pub struct RetreatEvaluator<'a, S: StrategicLayer + ?Sized> {
    strategic: &'a S,
    config: &'a TacticsConfig,
}

impl<'a, S: StrategicLayer + ?Sized> RetreatEvaluator<'a, S> {
    /// Create an evaluator bound to the strategic layer and tuning.
    pub fn new(strategic: &'a S, config: &'a TacticsConfig) -> Self {
        Self { strategic, config }
    }

    /// Kill value `attacker` can claim against `target`.
    ///
    /// Zero when the target's stand-off zone keeps every weapon of the
    /// attacker out of reach. A colony ship's value is shared between all
    /// `claimants` that could destroy it.
    pub fn matchup_kill_value<E: CombatEngine + ?Sized>(
        &self,
        engine: &E,
        attacker: &CombatStack,
        target: &CombatStack,
        claimants: &[&CombatStack],
    ) -> WideFixed {
        let kill = kill_fraction(engine, attacker, target);
        if kill == Fixed::ZERO || repelled(attacker, target) {
            return WideFixed::ZERO;
        }
        let value = widen(kill) * WideFixed::from_num(target.count) * widen(target.unit_value);
        if !target.is_colony_ship() {
            return value;
        }
        let sharing = claimants
            .iter()
            .filter(|c| kill_fraction(engine, c, target) > Fixed::ZERO && !repelled(c, target))
            .count()
            .max(1);
        value / WideFixed::from_num(sharing)
    }

    /// Compare the kill power and value of `actor`'s side against its
    /// enemies. Missile salvos take no part.
    pub fn assess_forces<E: CombatEngine + ?Sized>(&self, engine: &E, actor: &CombatStack) -> ForceAssessment {
        let battle = engine.battle();
        let (allies, hostiles): (Vec<&CombatStack>, Vec<&CombatStack>) = battle
            .active_stacks()
            .filter(|s| !s.is_missile())
            .partition(|s| s.id == actor.id || are_allied(self.strategic, actor.owner, s.owner));

        let side_kill = |side: &[&CombatStack], opponents: &[&CombatStack]| -> WideFixed {
            side.iter()
                .map(|member| {
                    opponents
                        .iter()
                        .map(|o| self.matchup_kill_value(engine, member, o, side))
                        .max()
                        .unwrap_or(WideFixed::ZERO)
                })
                .fold(WideFixed::ZERO, WideFixed::saturating_add)
        };
        let side_value = |side: &[&CombatStack]| -> WideFixed {
            side.iter()
                .map(|s| s.current_value())
                .fold(WideFixed::ZERO, WideFixed::saturating_add)
        };

        ForceAssessment {
            ally_kill: side_kill(allies.as_slice(), hostiles.as_slice()),
            hostile_kill: side_kill(hostiles.as_slice(), allies.as_slice()),
            ally_value: side_value(allies.as_slice()),
            hostile_value: side_value(hostiles.as_slice()),
        }
    }

    /// Decide whether `actor` withdraws this turn and where to.
    pub fn evaluate<E: CombatEngine + ?Sized>(&self, engine: &E, actor: StackId) -> RetreatDecision {
        let battle = engine.battle();
        let Some(actor) = battle.stack(actor) else {
            return RetreatDecision::Stay(StayReason::CannotRetreat);
        };
        if let Some(reason) = self.structural_refusal(engine, battle, actor) {
            debug!(stack = %actor.id, ?reason, "Retreat refused");
            return RetreatDecision::Stay(reason);
        }

        let wants_out = if self.treaty_bound(battle, actor) {
            info!(stack = %actor.id, "Only treaty partners present, withdrawing");
            true
        } else {
            let forces = self.assess_forces(engine, actor);
            let overwhelmed = forces.overwhelming(self.config.retreat_threshold);
            debug!(
                stack = %actor.id,
                ally_kill = %forces.ally_kill,
                hostile_kill = %forces.hostile_kill,
                ally_value = %forces.ally_value,
                hostile_value = %forces.hostile_value,
                overwhelmed,
                "Force comparison"
            );
            overwhelmed
        };
        if !wants_out {
            return RetreatDecision::Stay(StayReason::NotOutmatched);
        }

        let destination = actor
            .owner
            .and_then(|owner| self.strategic.nearest_retreat_system(owner, battle.system, actor.travel_speed));
        match destination {
            Some(system) => {
                info!(stack = %actor.id, system = system.0, "Retreat ordered");
                RetreatDecision::Retreat(system)
            }
            None => {
                warn!(stack = %actor.id, speed = actor.travel_speed, "No retreat system in range, staying");
                RetreatDecision::Stay(StayReason::NoRetreatSystem)
            }
        }
    }

    fn structural_refusal<E: CombatEngine + ?Sized>(
        &self,
        engine: &E,
        battle: &Battle,
        actor: &CombatStack,
    ) -> Option<StayReason> {
        if !actor.can_retreat() || actor.owner.is_none() {
            return Some(StayReason::CannotRetreat);
        }
        if actor.move_points == 0 {
            return Some(StayReason::NoMovement);
        }
        if battle.missiles_in_flight_from(actor.id).next().is_some() {
            return Some(StayReason::MissilesInFlight);
        }
        let threatened = battle
            .active_stacks()
            .filter(|s| !s.is_missile() && !are_allied(self.strategic, actor.owner, s.owner))
            .any(|s| kill_fraction(engine, s, actor) > Fixed::ZERO);
        if !threatened {
            return Some(StayReason::Untargetable);
        }
        None
    }

    /// Every hostile present belongs to one empire at peace with the
    /// actor's owner, and the owner has no grievance against it.
    fn treaty_bound(&self, battle: &Battle, actor: &CombatStack) -> bool {
        let Some(owner) = actor.owner else {
            return false;
        };
        let mut others = battle
            .active_stacks()
            .filter(|s| !s.is_missile() && !are_allied(self.strategic, actor.owner, s.owner))
            .map(|s| s.owner);
        let Some(Some(first)) = others.next() else {
            return false;
        };
        others.all(|o| o == Some(first))
            && self.strategic.relation(owner, first) == Relation::Peace
            && !self.strategic.has_grievance(owner, first)
    }
}

/// The target's stand-off zone covers everything the attacker could fire.
fn repelled(attacker: &CombatStack, target: &CombatStack) -> bool {
    target.can_repel()
        && !attacker.bypasses_repulsors()
        && attacker
            .reach_against(target)
            .map_or(true, |reach| reach <= target.capabilities.repulsor_radius)
}
