//! In-crate test doubles for the boundary traits.

use std::collections::{HashMap, HashSet};

use crate::battle::Battle;
use crate::grid::BattleGrid;
use crate::interfaces::{CombatEngine, FireOutcome, MoveCommand, Relation, StrategicLayer};
use crate::math::Fixed;
use crate::stack::{CombatStack, EmpireId, StackId, SystemId};

/// Combat Engine with a fixed kill table. A salvo whose kill entry is at
/// least one destroys the target outright.
pub struct MockEngine {
    battle: Battle,
    kills: HashMap<(StackId, StackId), Fixed>,
    population_loss: HashMap<(StackId, StackId), Fixed>,
    pub fired: Vec<(StackId, StackId, usize)>,
    pub moves: Vec<(StackId, MoveCommand)>,
    pub retreats: Vec<(StackId, SystemId)>,
    pub completed: Vec<StackId>,
}

impl MockEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            battle: Battle::new(SystemId(1), BattleGrid::new(width, height)),
            kills: HashMap::new(),
            population_loss: HashMap::new(),
            fired: Vec::new(),
            moves: Vec::new(),
            retreats: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn add(&mut self, stack: CombatStack) -> StackId {
        self.battle.add_stack(stack).unwrap()
    }

    pub fn battle_mut(&mut self) -> &mut Battle {
        &mut self.battle
    }

    pub fn stack(&self, id: StackId) -> &CombatStack {
        self.battle.stack(id).unwrap()
    }

    pub fn set_kill(&mut self, attacker: StackId, defender: StackId, kill: f64) {
        self.kills.insert((attacker, defender), Fixed::from_num(kill));
    }

    pub fn set_population_loss(&mut self, attacker: StackId, colony: StackId, loss: f64) {
        self.population_loss.insert((attacker, colony), Fixed::from_num(loss));
    }
}

impl CombatEngine for MockEngine {
    fn battle(&self) -> &Battle {
        &self.battle
    }

    fn kill_percentage(&self, attacker: StackId, defender: StackId) -> Fixed {
        self.kills.get(&(attacker, defender)).copied().unwrap_or(Fixed::ZERO)
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
            let s = self.battle.stack_mut(stack).unwrap();
            s.move_points = s.move_points.saturating_sub(cost);
        }
        self.moves.push((stack, command));
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
        self.fired.push((stack, target, slot));

        let defender = self.stack(target);
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
        self.retreats.push((stack, destination));
    }

    fn turn_complete(&mut self, stack: StackId) {
        if let Some(s) = self.battle.stack_mut(stack) {
            s.status.acted = true;
        }
        self.completed.push(stack);
    }
}

/// Strategic layer backed by in-memory tables. Unlisted pairs of
/// different empires are at war.
#[derive(Default)]
pub struct MockDiplomacy {
    relations: HashMap<(EmpireId, EmpireId), Relation>,
    grievances: HashSet<(EmpireId, EmpireId)>,
    retreat_to: Option<SystemId>,
}

impl MockDiplomacy {
    pub fn at_war() -> Self {
        Self::default()
    }

    fn key(a: EmpireId, b: EmpireId) -> (EmpireId, EmpireId) {
        (a.min(b), a.max(b))
    }

    pub fn ally(&mut self, a: EmpireId, b: EmpireId) {
        self.relations.insert(Self::key(a, b), Relation::Allied);
    }

    pub fn peace(&mut self, a: EmpireId, b: EmpireId) {
        self.relations.insert(Self::key(a, b), Relation::Peace);
    }

    pub fn grievance(&mut self, holder: EmpireId, against: EmpireId) {
        self.grievances.insert((holder, against));
    }

    pub fn with_retreat(mut self, system: SystemId) -> Self {
        self.retreat_to = Some(system);
        self
    }
}

impl StrategicLayer for MockDiplomacy {
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

    fn nearest_retreat_system(&self, _empire: EmpireId, _origin: SystemId, _speed: u32) -> Option<SystemId> {
        self.retreat_to
    }
}
