//! Combat stacks: groups of identical units acting as one combat entity.
//!
//! Role differences (ship, colony, missile, monster) are a tagged variant
//! plus a small set of capability queries. The decision algorithms only
//! ever ask those queries, never the concrete role.

use serde::{Deserialize, Serialize};

use crate::grid::GridPos;
use crate::math::{fixed_serde, ratio, widen, Fixed, WideFixed};

/// Unique identifier of a stack within one battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId(pub u32);

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Empire (faction) identifier. Monsters have no empire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmpireId(pub u32);

/// Star system identifier used for retreat destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

/// Special-purpose weapon devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialWeapon {
    /// Projects a stand-off zone that enemies cannot enter. Never attacks.
    Repulsor,
    /// Freezes the target in place. Crowd control, not damage.
    Stasis,
    /// Offensive special (stream projectors, black hole generators...).
    Offensive,
}

/// Weapon classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Direct-fire energy weapon.
    Beam,
    /// Slow projectile that travels `speed` cells per turn.
    Missile {
        /// Cells travelled per turn.
        speed: u32,
    },
    /// Ground-only weapon (bombs, bio-weapons). Only hits colonies.
    Bomb,
    /// Special device.
    Special(SpecialWeapon),
}

/// One weapon slot of a stack's design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSlot {
    /// Display name.
    pub name: String,
    /// Classification.
    pub kind: WeaponKind,
    /// Weapons of this type per unit.
    pub mounts: u32,
    /// Maximum firing range in cells.
    pub range: u32,
    /// Shots restored at the start of every round.
    pub shots_per_turn: u32,
    /// Shots left this round. Never negative.
    pub shots_remaining: u32,
    /// Minimum damage per hit.
    pub damage_min: u32,
    /// Maximum damage per hit.
    pub damage_max: u32,
}

impl WeaponSlot {
    /// Create a weapon slot with full shots.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: WeaponKind, range: u32, damage: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            kind,
            mounts: 1,
            range,
            shots_per_turn: 1,
            shots_remaining: 1,
            damage_min: damage.0,
            damage_max: damage.1,
        }
    }

    /// Set the number of mounts per unit.
    #[must_use]
    pub fn with_mounts(mut self, mounts: u32) -> Self {
        self.mounts = mounts;
        self
    }

    /// Set shots per round (and refill).
    #[must_use]
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots_per_turn = shots;
        self.shots_remaining = shots;
        self
    }

    /// True for special devices.
    #[must_use]
    pub const fn is_special(&self) -> bool {
        matches!(self.kind, WeaponKind::Special(_))
    }

    /// True for slow projectiles.
    #[must_use]
    pub const fn is_missile(&self) -> bool {
        matches!(self.kind, WeaponKind::Missile { .. })
    }

    /// True for ground-only weapons.
    #[must_use]
    pub const fn is_bomb(&self) -> bool {
        matches!(self.kind, WeaponKind::Bomb)
    }

    /// True for the stand-off device.
    #[must_use]
    pub const fn is_repulsor(&self) -> bool {
        matches!(self.kind, WeaponKind::Special(SpecialWeapon::Repulsor))
    }

    /// True for defensive or utility specials that never deal damage.
    #[must_use]
    pub const fn is_utility(&self) -> bool {
        matches!(
            self.kind,
            WeaponKind::Special(SpecialWeapon::Repulsor | SpecialWeapon::Stasis)
        )
    }

    /// True while shots remain this round.
    #[must_use]
    pub const fn has_shots(&self) -> bool {
        self.shots_remaining > 0
    }

    /// Average damage per hit.
    #[must_use]
    pub fn average_damage(&self) -> Fixed {
        Fixed::from_num(self.damage_min + self.damage_max) / Fixed::from_num(2)
    }

    /// Distance a fired missile can close before it runs out of fuel.
    ///
    /// Zero for every non-missile weapon.
    #[must_use]
    pub const fn closing_range(&self) -> u32 {
        match self.kind {
            WeaponKind::Missile { speed } => speed,
            _ => 0,
        }
    }

    /// Whether this slot can be used on `target` at all, ignoring range
    /// and shots.
    #[must_use]
    pub fn is_compatible_with(&self, target: &CombatStack) -> bool {
        match self.kind {
            WeaponKind::Beam | WeaponKind::Missile { .. } => true,
            WeaponKind::Bomb => target.is_colony(),
            WeaponKind::Special(SpecialWeapon::Repulsor) => false,
            WeaponKind::Special(SpecialWeapon::Stasis | SpecialWeapon::Offensive) => {
                !target.is_colony()
            }
        }
    }

    /// Whether this slot can fire at `target` from `from` right now.
    #[must_use]
    pub fn can_attack(&self, from: GridPos, target: &CombatStack) -> bool {
        self.has_shots()
            && self.is_compatible_with(target)
            && from.distance(target.position) <= self.range
    }
}

/// What kind of entity a stack is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StackRole {
    /// A group of ships of one design.
    Ship {
        /// Unarmed colonisation or transport ship.
        colony_ship: bool,
    },
    /// A planetary defense installation with a population to protect.
    Colony {
        /// Population in millions.
        #[serde(with = "fixed_serde")]
        population: Fixed,
    },
    /// A missile salvo in flight.
    Missile {
        /// Stack that launched the salvo.
        launched_by: StackId,
        /// Stack the salvo is homing on.
        target: StackId,
    },
    /// A space monster; hostile to every empire.
    Monster,
}

/// Device-level capabilities of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Has a cloaking device.
    pub cloak: bool,
    /// Has a combat teleporter.
    pub teleport: bool,
    /// Stand-off radius projected by a repulsor beam (0 = none).
    pub repulsor_radius: u32,
    /// Design allows withdrawing from battle.
    pub retreat: bool,
}

/// Status flags of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackStatus {
    /// All units destroyed.
    pub destroyed: bool,
    /// Frozen by a stasis field.
    pub in_stasis: bool,
    /// Withdrew from the battle.
    pub retreated: bool,
    /// Already took its turn this round.
    pub acted: bool,
}

/// Who decides the stack's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Controller {
    /// Decided by this engine.
    #[default]
    Ai,
    /// Decided by a human through the manual combat surface.
    Manual,
}

/// A group of identical units acting as one combat entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStack {
    /// Identifier, assigned by [`crate::battle::Battle::add_stack`].
    pub id: StackId,
    /// Owning empire. `None` for monsters.
    pub owner: Option<EmpireId>,
    /// Display name.
    pub name: String,
    /// Ship, colony, missile or monster.
    pub role: StackRole,
    /// Current cell.
    pub position: GridPos,
    /// Movement points left this round.
    pub move_points: u32,
    /// Movement points restored each round.
    pub max_move_points: u32,
    /// Galactic travel speed, used to find retreat destinations.
    pub travel_speed: u32,
    /// Number of units.
    pub count: u32,
    /// Hit points of the lead (damaged) unit.
    pub hits: u32,
    /// Hit points of an undamaged unit.
    pub max_hits: u32,
    /// Design cost of one unit.
    #[serde(with = "fixed_serde")]
    pub unit_value: Fixed,
    /// Weapon slots in firing-table order.
    pub weapons: Vec<WeaponSlot>,
    /// Device capabilities.
    pub capabilities: Capabilities,
    /// Status flags.
    pub status: StackStatus,
    /// Who controls this stack.
    pub controller: Controller,
    /// Stack this one is obligated to protect.
    pub ward: Option<StackId>,
}

impl CombatStack {
    /// Create an unarmed, undamaged warship stack.
    #[must_use]
    pub fn ship(name: impl Into<String>, owner: EmpireId, count: u32, max_hits: u32, unit_value: Fixed) -> Self {
        Self {
            id: StackId(0),
            owner: Some(owner),
            name: name.into(),
            role: StackRole::Ship { colony_ship: false },
            position: GridPos::default(),
            move_points: 1,
            max_move_points: 1,
            travel_speed: 1,
            count,
            hits: max_hits,
            max_hits,
            unit_value,
            weapons: Vec::new(),
            capabilities: Capabilities {
                retreat: true,
                ..Capabilities::default()
            },
            status: StackStatus::default(),
            controller: Controller::Ai,
            ward: None,
        }
    }

    /// Create a planetary defense stack.
    #[must_use]
    pub fn colony(name: impl Into<String>, owner: EmpireId, population: Fixed, max_hits: u32, value: Fixed) -> Self {
        Self {
            role: StackRole::Colony { population },
            move_points: 0,
            max_move_points: 0,
            travel_speed: 0,
            capabilities: Capabilities::default(),
            ..Self::ship(name, owner, 1, max_hits, value)
        }
    }

    /// Create a monster stack.
    #[must_use]
    pub fn monster(name: impl Into<String>, max_hits: u32, value: Fixed) -> Self {
        Self {
            owner: None,
            role: StackRole::Monster,
            capabilities: Capabilities::default(),
            ..Self::ship(name, EmpireId(0), 1, max_hits, value)
        }
    }

    /// Place the stack at `position`.
    #[must_use]
    pub fn at(mut self, position: GridPos) -> Self {
        self.position = position;
        self
    }

    /// Set movement points per round (and refill).
    #[must_use]
    pub fn with_moves(mut self, moves: u32) -> Self {
        self.max_move_points = moves;
        self.move_points = moves;
        self
    }

    /// Add a weapon slot.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponSlot) -> Self {
        self.weapons.push(weapon);
        self
    }

    /// Replace capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// True while the stack is still part of the battle.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.destroyed && !self.status.retreated
    }

    /// Has at least one weapon that can deal damage.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.weapons.iter().any(|w| !w.is_utility())
    }

    /// Planetary defense installation.
    #[must_use]
    pub const fn is_colony(&self) -> bool {
        matches!(self.role, StackRole::Colony { .. })
    }

    /// Unarmed, non-combat colonisation ship.
    #[must_use]
    pub fn is_colony_ship(&self) -> bool {
        matches!(self.role, StackRole::Ship { colony_ship: true }) && !self.is_armed()
    }

    /// Missile salvo in flight.
    #[must_use]
    pub const fn is_missile(&self) -> bool {
        matches!(self.role, StackRole::Missile { .. })
    }

    /// Space monster.
    #[must_use]
    pub const fn is_monster(&self) -> bool {
        matches!(self.role, StackRole::Monster)
    }

    /// Design allows withdrawing. Colonies, missiles and monsters never can.
    #[must_use]
    pub const fn can_retreat(&self) -> bool {
        matches!(self.role, StackRole::Ship { .. }) && self.capabilities.retreat
    }

    /// Projects a stand-off zone.
    #[must_use]
    pub const fn can_repel(&self) -> bool {
        self.capabilities.repulsor_radius > 0
    }

    /// Has a cloaking device.
    #[must_use]
    pub const fn can_cloak(&self) -> bool {
        self.capabilities.cloak
    }

    /// Has a combat teleporter.
    #[must_use]
    pub const fn can_teleport(&self) -> bool {
        self.capabilities.teleport
    }

    /// Stand-off zones of other stacks do not apply to this one.
    #[must_use]
    pub const fn bypasses_repulsors(&self) -> bool {
        self.can_cloak() || self.can_teleport()
    }

    /// Colony population, zero for every other role.
    #[must_use]
    pub fn population(&self) -> Fixed {
        match self.role {
            StackRole::Colony { population } => population,
            _ => Fixed::ZERO,
        }
    }

    /// Total remaining hit points across all units.
    #[must_use]
    pub fn total_hits(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        (self.count - 1) * self.max_hits + self.hits
    }

    /// Fraction of the lead unit's hit points left.
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        ratio(Fixed::from_num(self.hits), Fixed::from_num(self.max_hits))
    }

    /// Current combat value: units x health fraction x design cost.
    #[must_use]
    pub fn current_value(&self) -> WideFixed {
        WideFixed::from_num(self.count) * widen(self.health_fraction()) * widen(self.unit_value)
    }

    /// Highest range of a weapon that could damage `target`, if any.
    ///
    /// Stacks carrying ground weapons close to point-blank range against a
    /// colony, since bombs are what actually hurt the population.
    #[must_use]
    pub fn firing_range_against(&self, target: &CombatStack) -> Option<u32> {
        self.range_against(target, true)
    }

    /// Like [`CombatStack::firing_range_against`] but ignoring spent shots:
    /// what the design could reach with a full magazine.
    #[must_use]
    pub fn reach_against(&self, target: &CombatStack) -> Option<u32> {
        self.range_against(target, false)
    }

    fn range_against(&self, target: &CombatStack, loaded_only: bool) -> Option<u32> {
        let usable = |w: &&WeaponSlot| {
            (!loaded_only || w.has_shots()) && !w.is_utility() && w.is_compatible_with(target)
        };
        if target.is_colony() && self.weapons.iter().filter(usable).any(WeaponSlot::is_bomb) {
            return Some(1);
        }
        self.weapons.iter().filter(usable).map(|w| w.range).max()
    }

    /// Some damaging weapon can fire at `target` from the current cell.
    #[must_use]
    pub fn can_fire_at(&self, target: &CombatStack) -> bool {
        self.weapons
            .iter()
            .any(|w| !w.is_utility() && w.can_attack(self.position, target))
    }

    /// At least one damaging weapon still has shots.
    #[must_use]
    pub fn has_shots_left(&self) -> bool {
        self.weapons.iter().any(|w| !w.is_utility() && w.has_shots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laser() -> WeaponSlot {
        WeaponSlot::new("Laser", WeaponKind::Beam, 1, (1, 4))
    }

    #[test]
    fn test_total_hits_counts_lead_unit() {
        let mut stack = CombatStack::ship("Scout", EmpireId(1), 3, 10, Fixed::ONE);
        stack.hits = 4;
        assert_eq!(stack.total_hits(), 24);
        assert_eq!(stack.health_fraction(), Fixed::from_num(4) / Fixed::from_num(10));
    }

    #[test]
    fn test_current_value() {
        let mut stack = CombatStack::ship("Frigate", EmpireId(1), 4, 20, Fixed::from_num(50));
        stack.hits = 10;
        assert_eq!(stack.current_value(), WideFixed::from_num(100));
    }

    #[test]
    fn test_current_value_of_huge_fleet() {
        let armada = CombatStack::ship("Armada", EmpireId(1), 100_000, 10, Fixed::from_num(100_000));
        assert_eq!(armada.current_value(), WideFixed::from_num(10_000_000_000_u64));
    }

    #[test]
    fn test_capability_queries() {
        let colony = CombatStack::colony("Sol", EmpireId(1), Fixed::from_num(50), 100, Fixed::from_num(500));
        assert!(colony.is_colony());
        assert!(!colony.can_retreat());
        assert!(!colony.is_armed());

        let mut settler = CombatStack::ship("Settler", EmpireId(1), 1, 5, Fixed::from_num(30));
        settler.role = StackRole::Ship { colony_ship: true };
        assert!(settler.is_colony_ship());
        assert!(settler.can_retreat());

        let monster = CombatStack::monster("Amoeba", 500, Fixed::from_num(1000));
        assert!(monster.is_monster());
        assert_eq!(monster.owner, None);
        assert!(!monster.can_retreat());
    }

    #[test]
    fn test_bombs_only_hit_colonies() {
        let bomb = WeaponSlot::new("Fusion Bomb", WeaponKind::Bomb, 1, (4, 16));
        let colony = CombatStack::colony("Sol", EmpireId(1), Fixed::from_num(50), 100, Fixed::ONE);
        let ship = CombatStack::ship("Scout", EmpireId(1), 1, 3, Fixed::ONE);
        assert!(bomb.is_compatible_with(&colony));
        assert!(!bomb.is_compatible_with(&ship));
    }

    #[test]
    fn test_repulsor_never_attacks() {
        let repulsor = WeaponSlot::new(
            "Repulsor Beam",
            WeaponKind::Special(SpecialWeapon::Repulsor),
            1,
            (0, 0),
        );
        let ship = CombatStack::ship("Scout", EmpireId(1), 1, 3, Fixed::ONE);
        assert!(repulsor.is_utility());
        assert!(!repulsor.can_attack(GridPos::new(0, 0), &ship.at(GridPos::new(1, 0))));
    }

    #[test]
    fn test_firing_range_closes_in_to_bomb() {
        let bomber = CombatStack::ship("Bomber", EmpireId(1), 2, 10, Fixed::ONE)
            .with_weapon(WeaponSlot::new("Mass Driver", WeaponKind::Beam, 3, (2, 5)))
            .with_weapon(WeaponSlot::new("Nuclear Bomb", WeaponKind::Bomb, 1, (3, 12)));
        let colony = CombatStack::colony("Sol", EmpireId(2), Fixed::from_num(50), 100, Fixed::ONE);
        let ship = CombatStack::ship("Scout", EmpireId(2), 1, 3, Fixed::ONE);
        assert_eq!(bomber.firing_range_against(&colony), Some(1));
        assert_eq!(bomber.firing_range_against(&ship), Some(3));
    }

    #[test]
    fn test_exhausted_weapons_have_no_range() {
        let mut stack = CombatStack::ship("Scout", EmpireId(1), 1, 3, Fixed::ONE).with_weapon(laser());
        let target = CombatStack::ship("Scout", EmpireId(2), 1, 3, Fixed::ONE);
        assert_eq!(stack.firing_range_against(&target), Some(1));
        stack.weapons[0].shots_remaining = 0;
        assert_eq!(stack.firing_range_against(&target), None);
        assert_eq!(stack.reach_against(&target), Some(1));
        assert!(!stack.has_shots_left());
    }
}
