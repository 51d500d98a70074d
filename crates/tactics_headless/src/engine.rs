//! Deterministic reference Combat Engine.
//!
//! Every salvo deals its average damage, so a battle resolved twice plays
//! out identically. Missiles strike on launch instead of flying as separate
//! stacks.

use tracing::{debug, trace, warn};

use tactics_core::battle::Battle;
use tactics_core::interfaces::{CombatEngine, FireOutcome, MoveCommand};
use tactics_core::math::{clamp_unit, ratio, Fixed};
use tactics_core::stack::{CombatStack, SpecialWeapon, StackId, SystemId, WeaponKind, WeaponSlot};

/// Bomb damage needed to kill one million colonists.
pub const DAMAGE_PER_POPULATION: u32 = 10;

/// Expected-damage Combat Engine over one [`Battle`].
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    battle: Battle,
    round: u32,
    retreats: Vec<(StackId, SystemId)>,
}

/// Average damage of one salvo from `weapon` fired by `count` units.
fn salvo_damage(weapon: &WeaponSlot, count: u32) -> Fixed {
    weapon.average_damage() * Fixed::saturating_from_num(weapon.mounts) * Fixed::saturating_from_num(count)
}

/// Damage `attacker` deals to `defender` if every usable slot fires its
/// whole magazine.
fn exchange_damage(attacker: &CombatStack, defender: &CombatStack, bombs: bool) -> Fixed {
    attacker
        .weapons
        .iter()
        .filter(|w| !w.is_utility() && w.is_compatible_with(defender) && w.is_bomb() == bombs)
        .map(|w| salvo_damage(w, attacker.count) * Fixed::saturating_from_num(w.shots_per_turn))
        .fold(Fixed::ZERO, Fixed::saturating_add)
}

impl ReferenceEngine {
    /// Engine resolving `battle`, starting at round one.
    #[must_use]
    pub fn new(battle: Battle) -> Self {
        Self {
            battle,
            round: 1,
            retreats: Vec::new(),
        }
    }

    /// Current round number.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Stacks that withdrew, with their destinations, in order.
    #[must_use]
    pub fn retreats(&self) -> &[(StackId, SystemId)] {
        &self.retreats
    }

    /// Give the battle state back.
    #[must_use]
    pub fn into_battle(self) -> Battle {
        self.battle
    }

    /// Start the next round: movement and shots restored, stasis lifted,
    /// acted flags cleared.
    pub fn new_round(&mut self) {
        self.round += 1;
        let ids: Vec<StackId> = self.battle.active_stacks().map(|s| s.id).collect();
        for id in ids {
            if let Some(stack) = self.battle.stack_mut(id) {
                stack.move_points = stack.max_move_points;
                stack.status.acted = false;
                stack.status.in_stasis = false;
                for weapon in &mut stack.weapons {
                    weapon.shots_remaining = weapon.shots_per_turn;
                }
            }
        }
        debug!(round = self.round, "New round");
    }

    /// Remove whole units, carrying damage over from the lead unit.
    ///
    /// Returns `true` if the stack lost its last unit.
    fn apply_damage(&mut self, target: StackId, damage: u32) -> bool {
        let Some(stack) = self.battle.stack_mut(target) else {
            return false;
        };
        let mut remaining = damage;
        while remaining > 0 && stack.count > 0 {
            if remaining >= stack.hits {
                remaining -= stack.hits;
                stack.count -= 1;
                stack.hits = stack.max_hits;
            } else {
                stack.hits -= remaining;
                remaining = 0;
            }
        }
        trace!(stack = %target, damage, count = stack.count, hits = stack.hits, "Damage applied");
        if stack.count == 0 {
            self.battle.mark_destroyed(target);
            return true;
        }
        false
    }

    /// Kill colonists. Returns `true` once nobody is left.
    fn bombard(&mut self, colony: StackId, damage: Fixed) -> bool {
        let Some(stack) = self.battle.stack_mut(colony) else {
            return false;
        };
        let tactics_core::stack::StackRole::Colony { population } = &mut stack.role else {
            return false;
        };
        *population = (*population - damage / Fixed::from_num(DAMAGE_PER_POPULATION)).max(Fixed::ZERO);
        if *population == Fixed::ZERO {
            self.battle.mark_destroyed(colony);
            return true;
        }
        false
    }
}

impl CombatEngine for ReferenceEngine {
    fn battle(&self) -> &Battle {
        &self.battle
    }

    fn kill_percentage(&self, attacker: StackId, defender: StackId) -> Fixed {
        let (Some(a), Some(d)) = (self.battle.stack(attacker), self.battle.stack(defender)) else {
            return Fixed::ZERO;
        };
        let hits = Fixed::saturating_from_num(d.total_hits());
        clamp_unit(ratio(exchange_damage(a, d, false), hits))
    }

    fn estimated_population_loss(&self, attacker: StackId, colony: StackId) -> Fixed {
        let (Some(a), Some(c)) = (self.battle.stack(attacker), self.battle.stack(colony)) else {
            return Fixed::ZERO;
        };
        if !c.is_colony() {
            return Fixed::ZERO;
        }
        let loss = exchange_damage(a, c, true) / Fixed::from_num(DAMAGE_PER_POPULATION);
        loss.min(c.population())
    }

    fn move_stack(&mut self, stack: StackId, command: MoveCommand) {
        let (to, cost) = match command {
            MoveCommand::ToPoint { destination, cost } => (destination, cost),
            MoveCommand::Step(cell) => (cell, 1),
        };
        if !self.battle.relocate_stack(stack, to) {
            warn!(%stack, %to, "Move rejected, destination not free");
            return;
        }
        if let Some(s) = self.battle.stack_mut(stack) {
            s.move_points = s.move_points.saturating_sub(cost);
        }
        trace!(%stack, %to, cost, "Moved");
    }

    fn fire_weapon(&mut self, stack: StackId, target: StackId, slot: usize) -> FireOutcome {
        let Some(attacker) = self.battle.stack(stack).filter(|s| s.is_active()) else {
            return FireOutcome::default();
        };
        let Some(defender) = self.battle.stack(target).filter(|t| t.is_active()) else {
            return FireOutcome::default();
        };
        let Some(weapon) = attacker
            .weapons
            .get(slot)
            .filter(|w| w.can_attack(attacker.position, defender))
        else {
            return FireOutcome::default();
        };
        let kind = weapon.kind;
        let damage = salvo_damage(weapon, attacker.count);

        if let Some(w) = self.battle.stack_mut(stack).and_then(|s| s.weapons.get_mut(slot)) {
            w.shots_remaining -= 1;
        }

        let target_destroyed = match kind {
            WeaponKind::Special(SpecialWeapon::Stasis) => {
                if let Some(t) = self.battle.stack_mut(target) {
                    t.status.in_stasis = true;
                }
                false
            }
            WeaponKind::Bomb => self.bombard(target, damage),
            _ => self.apply_damage(target, damage.saturating_to_num::<u32>()),
        };
        debug!(%stack, %target, slot, ?kind, damage = %damage, target_destroyed, "Salvo resolved");
        FireOutcome {
            fired: true,
            target_destroyed,
        }
    }

    fn retreat(&mut self, stack: StackId, destination: SystemId) {
        self.battle.mark_retreated(stack);
        self.retreats.push((stack, destination));
        debug!(%stack, ?destination, round = self.round, "Stack withdrew");
    }

    fn turn_complete(&mut self, stack: StackId) {
        if let Some(s) = self.battle.stack_mut(stack) {
            s.status.acted = true;
        }
    }
}
