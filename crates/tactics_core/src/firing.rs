//! Weapon discharge ordering against a confirmed target.
//!
//! Slots fire in three phases:
//!
//! 1. offensive specials,
//! 2. ordinary weapons, with missiles only when the target is close enough
//!    that it cannot slip out of their envelope,
//! 3. everything else still able to hit, still holding back missiles that
//!    would run out of fuel before impact.
//!
//! The plan is a pure function of the two stacks; [`AttackSequencer::fire`]
//! then walks it against the Combat Engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TacticsConfig;
use crate::interfaces::CombatEngine;
use crate::stack::{CombatStack, SpecialWeapon, StackId, WeaponKind, WeaponSlot};

/// Firing phase a slot was scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FiringPhase {
    /// Offensive special devices.
    Special,
    /// Non-special weapons; missiles only at close range.
    Standard,
    /// Whatever is left that can still hit.
    Remaining,
}

/// One salvo handed to the Combat Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringRecord {
    /// Slot index in the actor's weapon list.
    pub slot: usize,
    /// Phase the slot fired in.
    pub phase: FiringPhase,
    /// The salvo destroyed the target.
    pub target_destroyed: bool,
}

/// Distance the target can open up before a projectile arrives: current
/// distance plus the target's movement allowance.
#[must_use]
pub fn movement_adjusted_distance(actor: &CombatStack, target: &CombatStack) -> u32 {
    actor
        .position
        .distance(target.position)
        .saturating_add(target.max_move_points)
}

fn phase_of(weapon: &WeaponSlot, adjusted: u32, config: &TacticsConfig) -> Option<FiringPhase> {
    match weapon.kind {
        WeaponKind::Special(SpecialWeapon::Offensive) => Some(FiringPhase::Special),
        WeaponKind::Special(SpecialWeapon::Repulsor) => None,
        WeaponKind::Special(SpecialWeapon::Stasis) => Some(FiringPhase::Remaining),
        WeaponKind::Missile { speed } => {
            if adjusted > speed {
                None
            } else if adjusted <= config.missile_close_range {
                Some(FiringPhase::Standard)
            } else {
                Some(FiringPhase::Remaining)
            }
        }
        WeaponKind::Beam | WeaponKind::Bomb => Some(FiringPhase::Standard),
    }
}

/// Slots of `actor` that may fire at `target` right now, in firing order.
///
/// Each slot appears at most once. Slots without shots, out of range or
/// unable to affect the target are left out.
#[must_use]
pub fn firing_plan(actor: &CombatStack, target: &CombatStack, config: &TacticsConfig) -> Vec<(usize, FiringPhase)> {
    let adjusted = movement_adjusted_distance(actor, target);
    let mut plan: Vec<(usize, FiringPhase)> = actor
        .weapons
        .iter()
        .enumerate()
        .filter(|(_, w)| w.can_attack(actor.position, target))
        .filter_map(|(slot, w)| phase_of(w, adjusted, config).map(|phase| (slot, phase)))
        .collect();
    // Stable sort keeps slot order within a phase.
    plan.sort_by_key(|&(_, phase)| phase);
    plan
}

/// Fires an acting stack's weapons at one target in priority order.
pub struct AttackSequencer<'a> {
    config: &'a TacticsConfig,
}

impl<'a> AttackSequencer<'a> {
    /// Create a sequencer using `config` for the missile envelope.
    #[must_use]
    pub const fn new(config: &'a TacticsConfig) -> Self {
        Self { config }
    }

    /// Fire every planned slot at `target` until it is destroyed or the
    /// plan runs out.
    ///
    /// A slot the engine refuses to fire is skipped. Returns the salvos
    /// actually fired; empty when nothing could fire.
    pub fn fire<E: CombatEngine + ?Sized>(&self, engine: &mut E, actor: StackId, target: StackId) -> Vec<FiringRecord> {
        let plan = {
            let battle = engine.battle();
            match (battle.stack(actor), battle.stack(target)) {
                (Some(a), Some(t)) if a.is_active() && t.is_active() => firing_plan(a, t, self.config)
                    .into_iter()
                    .map(|(slot, phase)| (slot, phase, a.weapons[slot].shots_remaining))
                    .collect::<Vec<_>>(),
                _ => return Vec::new(),
            }
        };

        let mut records = Vec::new();
        for (slot, phase, shots) in plan {
            debug!(actor = %actor, target = %target, slot, ?phase, shots, "Firing slot");
            for _ in 0..shots {
                let outcome = engine.fire_weapon(actor, target, slot);
                if !outcome.fired {
                    break;
                }
                records.push(FiringRecord {
                    slot,
                    phase,
                    target_destroyed: outcome.target_destroyed,
                });
                if outcome.target_destroyed {
                    debug!(actor = %actor, target = %target, "Target destroyed");
                    return records;
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPos;
    use crate::math::Fixed;
    use crate::stack::EmpireId;
    use crate::testing::MockEngine;

    fn beam(range: u32) -> WeaponSlot {
        WeaponSlot::new("Laser", WeaponKind::Beam, range, (1, 4))
    }

    fn missile(range: u32, speed: u32) -> WeaponSlot {
        WeaponSlot::new("Nuclear Missile", WeaponKind::Missile { speed }, range, (4, 4))
    }

    fn special(kind: SpecialWeapon) -> WeaponSlot {
        WeaponSlot::new("Device", WeaponKind::Special(kind), 2, (0, 0))
    }

    fn pair(weapons: Vec<WeaponSlot>, distance: i32, target_moves: u32) -> (CombatStack, CombatStack) {
        let mut actor = CombatStack::ship("Actor", EmpireId(1), 1, 10, Fixed::ONE).at(GridPos::new(0, 0));
        actor.weapons = weapons;
        let target = CombatStack::ship("Target", EmpireId(2), 1, 10, Fixed::ONE)
            .at(GridPos::new(distance, 0))
            .with_moves(target_moves);
        (actor, target)
    }

    #[test]
    fn test_specials_fire_first() {
        let config = TacticsConfig::default();
        let (actor, target) = pair(vec![beam(2), special(SpecialWeapon::Offensive)], 1, 0);
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(1, FiringPhase::Special), (0, FiringPhase::Standard)]);
    }

    #[test]
    fn test_utility_specials() {
        let config = TacticsConfig::default();
        let (actor, target) = pair(
            vec![
                special(SpecialWeapon::Stasis),
                special(SpecialWeapon::Repulsor),
                beam(2),
            ],
            1,
            0,
        );
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(2, FiringPhase::Standard), (0, FiringPhase::Remaining)]);
    }

    #[test]
    fn test_close_missile_fires_with_beams() {
        let config = TacticsConfig::default();
        let (actor, target) = pair(vec![missile(5, 4), beam(3)], 1, 1);
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(0, FiringPhase::Standard), (1, FiringPhase::Standard)]);
    }

    #[test]
    fn test_mid_range_missile_waits_for_remaining_phase() {
        let config = TacticsConfig::default();
        let (actor, target) = pair(vec![missile(5, 4), beam(3)], 2, 1);
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(1, FiringPhase::Standard), (0, FiringPhase::Remaining)]);
    }

    #[test]
    fn test_outrun_missile_never_fires() {
        let config = TacticsConfig::default();
        let (actor, target) = pair(vec![missile(5, 2), beam(3)], 2, 2);
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(1, FiringPhase::Standard)]);
    }

    #[test]
    fn test_out_of_range_and_empty_slots_skipped() {
        let config = TacticsConfig::default();
        let mut spent = beam(3);
        spent.shots_remaining = 0;
        let (actor, target) = pair(vec![beam(1), spent, beam(3)], 3, 0);
        let plan = firing_plan(&actor, &target, &config);
        assert_eq!(plan, vec![(2, FiringPhase::Standard)]);
    }

    #[test]
    fn test_fire_consumes_every_shot() {
        let config = TacticsConfig::default();
        let mut engine = MockEngine::new(8, 8);
        let actor = engine.add(
            CombatStack::ship("Actor", EmpireId(1), 1, 10, Fixed::ONE)
                .with_weapon(beam(2).with_shots(3))
                .with_weapon(special(SpecialWeapon::Offensive)),
        );
        let target = engine.add(CombatStack::ship("Target", EmpireId(2), 1, 10, Fixed::ONE).at(GridPos::new(1, 1)));
        engine.set_kill(actor, target, 0.2);

        let records = AttackSequencer::new(&config).fire(&mut engine, actor, target);
        let slots: Vec<_> = records.iter().map(|r| r.slot).collect();
        assert_eq!(slots, vec![1, 0, 0, 0]);
        assert!(!engine.stack(actor).has_shots_left());
    }

    #[test]
    fn test_fire_stops_when_target_destroyed() {
        let config = TacticsConfig::default();
        let mut engine = MockEngine::new(8, 8);
        let actor = engine.add(
            CombatStack::ship("Actor", EmpireId(1), 1, 10, Fixed::ONE)
                .with_weapon(beam(2).with_shots(2))
                .with_weapon(beam(2)),
        );
        let target = engine.add(CombatStack::ship("Target", EmpireId(2), 1, 10, Fixed::ONE).at(GridPos::new(1, 0)));
        engine.set_kill(actor, target, 1.0);

        let records = AttackSequencer::new(&config).fire(&mut engine, actor, target);
        assert_eq!(records.len(), 1);
        assert!(records[0].target_destroyed);
        assert_eq!(engine.stack(actor).weapons[0].shots_remaining, 1);
        assert_eq!(engine.stack(actor).weapons[1].shots_remaining, 1);
    }

    #[test]
    fn test_fire_at_inactive_target_does_nothing() {
        let config = TacticsConfig::default();
        let mut engine = MockEngine::new(8, 8);
        let actor = engine.add(CombatStack::ship("Actor", EmpireId(1), 1, 10, Fixed::ONE).with_weapon(beam(2)));
        let target = engine.add(CombatStack::ship("Target", EmpireId(2), 1, 10, Fixed::ONE).at(GridPos::new(1, 0)));
        engine.battle_mut().mark_destroyed(target);

        assert!(AttackSequencer::new(&config).fire(&mut engine, actor, target).is_empty());
        assert!(engine.fired.is_empty());
    }
}
