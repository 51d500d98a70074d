//! Target selection: score every hostile stack and keep the most desirable.
//!
//! Desirability = kill fraction x units x unit value x range multiplier,
//! where the range multiplier is `range_weight / distance-after-move`.
//! Pursuit scoring additionally divides by the turns needed to get into
//! firing position, so cheap kills nearby are not crowded out by expensive
//! ones across the board.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::Battle;
use crate::config::TacticsConfig;
use crate::grid::GridPos;
use crate::interfaces::{is_hostile, CombatEngine, StrategicLayer};
use crate::math::{clamp_unit, ratio, widen, Fixed, WideFixed};
use crate::pathfinding::{find_attack_path, FlightPath};
use crate::stack::{CombatStack, StackId};

/// Which candidates a selection considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetMode {
    /// Only targets the actor can fire at from where it stands. Picks what
    /// to shoot right now.
    InRange,
    /// Every reachable target, ignoring current range. Picks where to
    /// commit movement.
    Pursue,
}

/// The winning candidate of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChoice {
    /// Chosen target.
    pub target: StackId,
    /// Score the target won with.
    pub desirability: WideFixed,
    /// Capped kill fraction against the target.
    pub kill_fraction: Fixed,
    /// Path to a firing position. `None` for [`TargetMode::InRange`].
    pub path: Option<FlightPath>,
    /// Turns needed to reach the firing position.
    pub turns_to_reach: u32,
}

/// Estimated fraction of `defender` destroyed by one exchange with
/// `attacker`, capped at one.
///
/// Ships attacking a colony are scored on population killed, everything
/// else uses the Combat Engine's estimate.
pub fn kill_fraction<E: CombatEngine + ?Sized>(engine: &E, attacker: &CombatStack, defender: &CombatStack) -> Fixed {
    let raw = if defender.is_colony() && !attacker.is_colony() {
        let loss = engine.estimated_population_loss(attacker.id, defender.id);
        ratio(loss, defender.population())
    } else {
        engine.kill_percentage(attacker.id, defender.id)
    };
    clamp_unit(raw)
}

/// Desirability of a target from its kill fraction, size, value and the
/// distance that remains once both sides have moved.
#[must_use]
pub fn desirability(kill: Fixed, target: &CombatStack, distance_after_move: u32, range_weight: Fixed) -> WideFixed {
    let units = WideFixed::from_num(target.count.max(1));
    let range_multiplier = widen(range_weight) / WideFixed::from_num(distance_after_move.max(1));
    widen(kill) * units * widen(target.unit_value) * range_multiplier
}

/// Distance between `from` and where `candidate` will be once it spends its
/// movement closing on the stack `actor` protects.
///
/// A candidate about to reach the ward counts as closer, which makes
/// intercepting it more attractive.
#[must_use]
pub fn distance_after_move(battle: &Battle, actor: &CombatStack, from: GridPos, candidate: &CombatStack) -> u32 {
    let ward = actor
        .ward
        .and_then(|id| battle.stack(id))
        .filter(|w| w.is_active());
    let projected = match ward {
        Some(ward) => {
            let gap = candidate.position.distance(ward.position).saturating_sub(1);
            candidate
                .position
                .toward(ward.position, candidate.max_move_points.min(gap))
        }
        None => candidate.position,
    };
    from.distance(projected).max(1)
}

/// Turns to reach the end of `path` given the actor's remaining and
/// per-round movement.
fn turns_for(path: &FlightPath, actor: &CombatStack) -> u32 {
    if path.cost <= actor.move_points {
        return 1;
    }
    if actor.max_move_points == 0 {
        return u32::MAX;
    }
    1 + (path.cost - actor.move_points).div_ceil(actor.max_move_points)
}

/// Scores hostile stacks for an acting stack.
pub struct TargetSelector<'a, S: StrategicLayer + ?Sized> {
    strategic: &'a S,
    config: &'a TacticsConfig,
}

impl<'a, S: StrategicLayer + ?Sized> TargetSelector<'a, S> {
    /// Create a selector bound to the strategic layer and tuning.
    pub fn new(strategic: &'a S, config: &'a TacticsConfig) -> Self {
        Self { strategic, config }
    }

    /// Pick the most desirable target for `actor`.
    ///
    /// Returns `None` when the actor is unknown, unarmed, or nothing
    /// qualifies. Ties keep the first candidate found.
    ///
    /// Utility specials do not count as armament: a design carrying only
    /// stasis or repulsor devices is passive and never picks a target. Its
    /// stasis slots fire only alongside a damaging weapon.
    pub fn select<E: CombatEngine + ?Sized>(&self, engine: &E, actor: StackId, mode: TargetMode) -> Option<TargetChoice> {
        let battle = engine.battle();
        let actor = battle.stack(actor)?;
        if !actor.is_armed() {
            return None;
        }

        let mut best: Option<TargetChoice> = None;
        let candidates = battle
            .active_stacks()
            .filter(|s| is_hostile(self.strategic, actor, s) && !s.status.in_stasis && !s.is_missile());
        for candidate in candidates {
            let kill = kill_fraction(engine, actor, candidate);
            if kill == Fixed::ZERO {
                continue;
            }

            let scored = match mode {
                TargetMode::InRange => {
                    if !actor.can_fire_at(candidate) {
                        continue;
                    }
                    let distance = distance_after_move(battle, actor, actor.position, candidate);
                    TargetChoice {
                        target: candidate.id,
                        desirability: desirability(kill, candidate, distance, self.config.range_weight),
                        kill_fraction: kill,
                        path: None,
                        turns_to_reach: 1,
                    }
                }
                TargetMode::Pursue => {
                    let Some(path) = self.path_to_attack(battle, actor, candidate) else {
                        continue;
                    };
                    let turns = turns_for(&path, actor);
                    let distance = distance_after_move(battle, actor, path.destination(), candidate);
                    let value = desirability(kill, candidate, distance, self.config.range_weight)
                        / WideFixed::from_num(turns);
                    TargetChoice {
                        target: candidate.id,
                        desirability: value,
                        kill_fraction: kill,
                        path: Some(path),
                        turns_to_reach: turns,
                    }
                }
            };

            debug!(
                actor = %actor.id,
                candidate = %candidate.id,
                ?mode,
                kill = %kill,
                score = %scored.desirability,
                turns = scored.turns_to_reach,
                "Scored target"
            );

            if best.as_ref().map_or(true, |b| scored.desirability > b.desirability) {
                best = Some(scored);
            }
        }
        best
    }

    /// Firing position path: this turn's movement first, then a multi-turn
    /// pursuit across the whole grid.
    fn path_to_attack(&self, battle: &Battle, actor: &CombatStack, target: &CombatStack) -> Option<FlightPath> {
        let grid = battle.grid();
        find_attack_path(grid, actor, target, actor.move_points).or_else(|| {
            if actor.max_move_points == 0 {
                return None;
            }
            find_attack_path(grid, actor, target, grid.cell_count() as u32)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{EmpireId, SpecialWeapon, StackRole, WeaponKind, WeaponSlot};
    use crate::testing::{MockDiplomacy, MockEngine};

    fn laser(range: u32) -> WeaponSlot {
        WeaponSlot::new("Laser", WeaponKind::Beam, range, (1, 4))
    }

    fn ship(owner: u32, x: i32, y: i32, value: i32) -> CombatStack {
        CombatStack::ship("Ship", EmpireId(owner), 1, 10, Fixed::from_num(value))
            .at(GridPos::new(x, y))
            .with_moves(2)
    }

    #[test]
    fn test_desirability_formula() {
        let target = CombatStack::ship("T", EmpireId(2), 4, 10, Fixed::from_num(50));
        let score = desirability(Fixed::from_num(0.5), &target, 2, Fixed::from_num(10));
        assert_eq!(score, WideFixed::from_num(500));
    }

    #[test]
    fn test_desirability_uses_at_least_one_unit() {
        let mut target = CombatStack::ship("T", EmpireId(2), 1, 10, Fixed::from_num(50));
        target.count = 0;
        let score = desirability(Fixed::ONE, &target, 1, Fixed::from_num(10));
        assert_eq!(score, WideFixed::from_num(500));
    }

    #[test]
    fn test_in_range_prefers_valuable_target() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(ship(1, 2, 2, 10).with_weapon(laser(3)));
        let cheap = engine.add(ship(2, 4, 2, 10));
        let pricey = engine.add(ship(2, 2, 4, 100));
        engine.set_kill(actor, cheap, 0.5);
        engine.set_kill(actor, pricey, 0.5);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        let choice = selector.select(&engine, actor, TargetMode::InRange).unwrap();
        assert_eq!(choice.target, pricey);
        assert!(choice.path.is_none());
    }

    #[test]
    fn test_zero_kill_candidates_skipped() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(ship(1, 2, 2, 10).with_weapon(laser(3)));
        let armored = engine.add(ship(2, 3, 2, 1000));
        engine.set_kill(actor, armored, 0.0);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        assert!(selector.select(&engine, actor, TargetMode::InRange).is_none());
        assert!(selector.select(&engine, actor, TargetMode::Pursue).is_none());
    }

    #[test]
    fn test_stasis_only_design_is_passive() {
        let mut engine = MockEngine::new(10, 8);
        let stasis = WeaponSlot::new("Stasis Field", WeaponKind::Special(SpecialWeapon::Stasis), 3, (0, 0));
        let warden = engine.add(ship(1, 2, 2, 10).with_weapon(stasis));
        let enemy = engine.add(ship(2, 3, 2, 50));
        engine.set_kill(warden, enemy, 0.5);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        assert!(selector.select(&engine, warden, TargetMode::InRange).is_none());
        assert!(selector.select(&engine, warden, TargetMode::Pursue).is_none());
    }

    #[test]
    fn test_in_range_ignores_distant_targets() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(ship(1, 0, 0, 10).with_weapon(laser(1)));
        let far = engine.add(ship(2, 8, 0, 10));
        engine.set_kill(actor, far, 1.0);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        assert!(selector.select(&engine, actor, TargetMode::InRange).is_none());

        let pursuit = selector.select(&engine, actor, TargetMode::Pursue).unwrap();
        assert_eq!(pursuit.target, far);
        assert_eq!(pursuit.turns_to_reach, 4);
        assert_eq!(pursuit.path.unwrap().cost, 7);
    }

    #[test]
    fn test_pursuit_divides_by_turns() {
        let mut engine = MockEngine::new(12, 8);
        let actor = engine.add(ship(1, 0, 0, 10).with_weapon(laser(1)));
        let near = engine.add(ship(2, 3, 0, 40));
        let far = engine.add(ship(2, 11, 0, 100));
        engine.set_kill(actor, near, 1.0);
        engine.set_kill(actor, far, 1.0);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        let choice = selector.select(&engine, actor, TargetMode::Pursue).unwrap();
        assert_eq!(choice.target, near);
        assert_eq!(choice.turns_to_reach, 1);
    }

    #[test]
    fn test_allies_and_stasis_are_not_candidates() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(ship(1, 2, 2, 10).with_weapon(laser(3)));
        let friend = engine.add(ship(3, 3, 2, 10));
        let frozen = engine.add(ship(2, 2, 3, 10));
        engine.set_kill(actor, friend, 1.0);
        engine.set_kill(actor, frozen, 1.0);
        engine.battle_mut().stack_mut(frozen).unwrap().status.in_stasis = true;

        let mut diplomacy = MockDiplomacy::at_war();
        diplomacy.ally(EmpireId(1), EmpireId(3));
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        assert!(selector.select(&engine, actor, TargetMode::InRange).is_none());
    }

    #[test]
    fn test_colony_scored_on_population_loss() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(
            ship(1, 2, 2, 10).with_weapon(WeaponSlot::new("Bomb", WeaponKind::Bomb, 1, (5, 10))),
        );
        let colony = engine.add(
            CombatStack::colony("Colony", EmpireId(2), Fixed::from_num(40), 100, Fixed::from_num(200))
                .at(GridPos::new(3, 3)),
        );
        engine.set_population_loss(actor, colony, 10.0);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        let choice = selector.select(&engine, actor, TargetMode::InRange).unwrap();
        assert_eq!(choice.target, colony);
        assert_eq!(choice.kill_fraction, Fixed::from_num(0.25));
    }

    #[test]
    fn test_kill_fraction_is_capped() {
        let mut engine = MockEngine::new(10, 8);
        let actor = engine.add(ship(1, 2, 2, 10).with_weapon(laser(3)));
        let target = engine.add(ship(2, 3, 2, 10));
        engine.set_kill(actor, target, 3.0);
        let battle = engine.battle();
        let k = kill_fraction(&engine, battle.stack(actor).unwrap(), battle.stack(target).unwrap());
        assert_eq!(k, Fixed::ONE);
    }

    #[test]
    fn test_ward_threat_raises_desirability() {
        let mut engine = MockEngine::new(12, 8);
        let mut guard = ship(1, 5, 4, 10).with_weapon(laser(9));
        let escorted = engine.add(CombatStack {
            role: StackRole::Ship { colony_ship: true },
            ..ship(1, 6, 4, 10)
        });
        guard.ward = Some(escorted);
        let guard = engine.add(guard);
        let raider = engine.add(ship(2, 10, 4, 10).with_moves(3));
        let bystander = engine.add(ship(2, 1, 4, 10).with_moves(0));
        engine.set_kill(guard, raider, 1.0);
        engine.set_kill(guard, bystander, 1.0);

        let diplomacy = MockDiplomacy::at_war();
        let config = TacticsConfig::default();
        let selector = TargetSelector::new(&diplomacy, &config);
        let choice = selector.select(&engine, guard, TargetMode::InRange).unwrap();
        assert_eq!(choice.target, raider);
    }
}
