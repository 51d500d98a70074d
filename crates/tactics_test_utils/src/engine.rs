//! Scripted boundary implementations.
//!
//! [`ScriptedEngine`] answers kill estimates from a lookup table and records
//! every command it receives; [`TableDiplomacy`] answers strategic queries
//! from in-memory tables. Both use ordered maps so iteration never depends
//! on hasher state.

use std::collections::{BTreeMap, BTreeSet};

use tactics_core::battle::Battle;
use tactics_core::grid::BattleGrid;
use tactics_core::interfaces::{CombatEngine, FireOutcome, MoveCommand, Relation, StrategicLayer};
use tactics_core::math::Fixed;
use tactics_core::stack::{CombatStack, EmpireId, StackId, SystemId};
use tracing::trace;

/// A command received by [`ScriptedEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    /// `move_stack`.
    Move {
        /// Moving stack.
        stack: StackId,
        /// Command issued.
        command: MoveCommand,
    },
    /// `fire_weapon` that actually fired.
    Fire {
        /// Firing stack.
        stack: StackId,
        /// Target stack.
        target: StackId,
        /// Slot index.
        slot: usize,
    },
    /// `retreat`.
    Retreat {
        /// Withdrawing stack.
        stack: StackId,
        /// Destination system.
        destination: SystemId,
    },
    /// `turn_complete`.
    TurnComplete(StackId),
}

/// Combat Engine driven by a kill table.
///
/// A salvo destroys its target when the table's kill entry for the pair is
/// at least one (or, against a colony, when the population loss entry
/// covers the whole population). Anything else leaves the target intact.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    battle: Battle,
    kills: BTreeMap<(StackId, StackId), Fixed>,
    population_loss: BTreeMap<(StackId, StackId), Fixed>,
    calls: Vec<EngineCall>,
}

impl ScriptedEngine {
    /// Engine over an existing battle.
    #[must_use]
    pub fn new(battle: Battle) -> Self {
        Self {
            battle,
            kills: BTreeMap::new(),
            population_loss: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    /// Engine over an empty battle on a `width` x `height` grid.
    #[must_use]
    pub fn on_grid(width: u32, height: u32) -> Self {
        Self::new(Battle::new(SystemId(1), BattleGrid::new(width, height)))
    }

    /// Add a stack to the battle.
    ///
    /// # Panics
    ///
    /// Panics if the stack's cell is invalid.
    pub fn add(&mut self, stack: CombatStack) -> StackId {
        match self.battle.add_stack(stack) {
            Ok(id) => id,
            Err(e) => panic!("fixture placement failed: {e}"),
        }
    }

    /// Set the kill fraction of `attacker` against `defender`.
    pub fn set_kill(&mut self, attacker: StackId, defender: StackId, kill: Fixed) -> &mut Self {
        self.kills.insert((attacker, defender), kill);
        self
    }

    /// Set the population `attacker` kills on `colony` per exchange.
    pub fn set_population_loss(&mut self, attacker: StackId, colony: StackId, loss: Fixed) -> &mut Self {
        self.population_loss.insert((attacker, colony), loss);
        self
    }

    /// Mutable battle access for setup.
    pub fn battle_mut(&mut self) -> &mut Battle {
        &mut self.battle
    }

    /// Look up a stack.
    ///
    /// # Panics
    ///
    /// Panics on unknown ids.
    #[must_use]
    pub fn stack(&self, id: StackId) -> &CombatStack {
        match self.battle.stack(id) {
            Some(stack) => stack,
            None => panic!("unknown stack {id}"),
        }
    }

    /// Every command received, in order.
    #[must_use]
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// `(stack, slot)` of every salvo fired.
    #[must_use]
    pub fn fired(&self) -> Vec<(StackId, usize)> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                EngineCall::Fire { stack, slot, .. } => Some((stack, slot)),
                _ => None,
            })
            .collect()
    }

    /// Every movement command issued.
    #[must_use]
    pub fn moves(&self) -> Vec<MoveCommand> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                EngineCall::Move { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Start a new round: shots and movement restored, acted flags cleared.
    pub fn new_round(&mut self) {
        let ids: Vec<StackId> = self.battle.all_stacks().iter().map(|s| s.id).collect();
        for id in ids {
            if let Some(stack) = self.battle.stack_mut(id) {
                stack.move_points = stack.max_move_points;
                stack.status.acted = false;
                for weapon in &mut stack.weapons {
                    weapon.shots_remaining = weapon.shots_per_turn;
                }
            }
        }
    }
}

impl CombatEngine for ScriptedEngine {
    fn battle(&self) -> &Battle {
        &self.battle
    }

    fn kill_percentage(&self, attacker: StackId, defender: StackId) -> Fixed {
        self.kills
            .get(&(attacker, defender))
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    fn estimated_population_loss(&self, attacker: StackId, colony: StackId) -> Fixed {
        self.population_loss
            .get(&(attacker, colony))
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    fn move_stack(&mut self, stack: StackId, command: MoveCommand) {
        let (to, cost) = match command {
            MoveCommand::ToPoint { destination, cost } => (destination, cost),
            MoveCommand::Step(cell) => (cell, 1),
        };
        if self.battle.relocate_stack(stack, to) {
            if let Some(s) = self.battle.stack_mut(stack) {
                s.move_points = s.move_points.saturating_sub(cost);
            }
        }
        trace!(%stack, ?command, "Scripted move");
        self.calls.push(EngineCall::Move { stack, command });
    }

    fn fire_weapon(&mut self, stack: StackId, target: StackId, slot: usize) -> FireOutcome {
        let Some(weapon) = self
            .battle
            .stack_mut(stack)
            .and_then(|s| s.weapons.get_mut(slot))
            .filter(|w| w.has_shots())
        else {
            return FireOutcome::default();
        };
        weapon.shots_remaining -= 1;
        self.calls.push(EngineCall::Fire { stack, target, slot });

        let Some(defender) = self.battle.stack(target).filter(|t| t.is_active()) else {
            return FireOutcome {
                fired: true,
                target_destroyed: false,
            };
        };
        let lethal = if defender.is_colony() {
            self.estimated_population_loss(stack, target) >= defender.population()
        } else {
            self.kill_percentage(stack, target) >= Fixed::ONE
        };
        if lethal {
            self.battle.mark_destroyed(target);
        }
        FireOutcome {
            fired: true,
            target_destroyed: lethal,
        }
    }

    fn retreat(&mut self, stack: StackId, destination: SystemId) {
        self.battle.mark_retreated(stack);
        self.calls.push(EngineCall::Retreat { stack, destination });
    }

    fn turn_complete(&mut self, stack: StackId) {
        if let Some(s) = self.battle.stack_mut(stack) {
            s.status.acted = true;
        }
        self.calls.push(EngineCall::TurnComplete(stack));
    }
}

/// Strategic layer backed by tables. Unlisted pairs of different empires
/// are at war.
#[derive(Debug, Clone, Default)]
pub struct TableDiplomacy {
    relations: BTreeMap<(EmpireId, EmpireId), Relation>,
    grievances: BTreeSet<(EmpireId, EmpireId)>,
    retreat_systems: BTreeMap<EmpireId, (SystemId, u32)>,
}

impl TableDiplomacy {
    /// Everyone at war with everyone.
    #[must_use]
    pub fn at_war() -> Self {
        Self::default()
    }

    fn key(a: EmpireId, b: EmpireId) -> (EmpireId, EmpireId) {
        (a.min(b), a.max(b))
    }

    /// Make `a` and `b` allies.
    #[must_use]
    pub fn allied(mut self, a: EmpireId, b: EmpireId) -> Self {
        self.relations.insert(Self::key(a, b), Relation::Allied);
        self
    }

    /// Put `a` and `b` under a non-aggression treaty.
    #[must_use]
    pub fn at_peace(mut self, a: EmpireId, b: EmpireId) -> Self {
        self.relations.insert(Self::key(a, b), Relation::Peace);
        self
    }

    /// Give `holder` a grievance against `against`.
    #[must_use]
    pub fn with_grievance(mut self, holder: EmpireId, against: EmpireId) -> Self {
        self.grievances.insert((holder, against));
        self
    }

    /// Give `empire` a retreat system reachable at `min_speed` or faster.
    #[must_use]
    pub fn with_retreat(mut self, empire: EmpireId, system: SystemId, min_speed: u32) -> Self {
        self.retreat_systems.insert(empire, (system, min_speed));
        self
    }
}

impl StrategicLayer for TableDiplomacy {
    fn relation(&self, empire: EmpireId, other: EmpireId) -> Relation {
        if empire == other {
            return Relation::Allied;
        }
        self.relations
            .get(&Self::key(empire, other))
            .copied()
            .unwrap_or(Relation::War)
    }

    fn has_grievance(&self, empire: EmpireId, other: EmpireId) -> bool {
        self.grievances.contains(&(empire, other))
    }

    fn nearest_retreat_system(&self, empire: EmpireId, _origin: SystemId, speed: u32) -> Option<SystemId> {
        self.retreat_systems
            .get(&empire)
            .filter(|(_, min_speed)| speed >= *min_speed)
            .map(|(system, _)| *system)
    }
}
