//! Scenario loading and validation.
//!
//! A scenario describes one battle: the grid, the diplomatic situation of
//! the empires involved and every stack's starting placement. Scenarios are
//! hand-written RON files, so fixed-point quantities are plain decimals.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tactics_core::battle::Battle;
use tactics_core::config::TacticsConfig;
use tactics_core::error::TacticsError;
use tactics_core::grid::{BattleGrid, GridPos, Terrain};
use tactics_core::interfaces::Relation;
use tactics_core::math::{decimal_serde, Fixed};
use tactics_core::stack::{
    Capabilities, CombatStack, Controller, EmpireId, StackId, StackRole, SystemId, WeaponKind, WeaponSlot,
};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Grid has a zero dimension.
    #[error("Grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid {
        /// Columns.
        width: u32,
        /// Rows.
        height: u32,
    },
    /// A blocked cell lies outside the grid.
    #[error("Blocked cell ({x}, {y}) is outside the grid")]
    BlockedOutOfBounds {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// A stack names a ward index that does not exist or is itself.
    #[error("Stack '{stack}' guards unknown stack index {ward}")]
    UnknownWard {
        /// Name of the guarding stack.
        stack: String,
        /// Offending index.
        ward: usize,
    },
    /// Fewer than two stacks, so there is nothing to fight.
    #[error("Scenario needs at least two stacks, found {0}")]
    TooFewStacks(usize),
    /// Round limit of zero.
    #[error("Round limit must be positive")]
    NoRounds,
    /// Rejected by the decision engine (placement or turn preconditions).
    #[error("Tactical engine error: {0}")]
    Tactics(#[from] TacticsError),
    /// Report serialization failed.
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    /// Batch worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Standing between two empires, listed once per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    /// First empire.
    pub a: u32,
    /// Second empire.
    pub b: u32,
    /// Standing in both directions.
    pub relation: Relation,
}

/// A friendly system an empire's ships may withdraw to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatRoute {
    /// Owning empire.
    pub empire: u32,
    /// Destination system.
    pub system: u32,
    /// Galactic distance from the battle, used to pick the nearest route.
    #[serde(default)]
    pub distance: u32,
    /// Slowest travel speed that can make the trip.
    #[serde(default)]
    pub min_speed: u32,
}

/// What kind of stack to place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum PlacementRole {
    /// Warship stack.
    #[default]
    Ship,
    /// Unarmed colonisation ship.
    ColonyShip,
    /// Planetary defenses.
    Colony {
        /// Population in millions.
        #[serde(with = "decimal_serde")]
        population: Fixed,
    },
    /// Space monster, hostile to everyone.
    Monster,
}

/// One weapon slot as written in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Display name.
    pub name: String,
    /// Classification.
    pub kind: WeaponKind,
    /// Range in cells.
    pub range: u32,
    /// Damage per hit, `(min, max)`.
    pub damage: (u32, u32),
    /// Mounts per unit.
    #[serde(default = "one")]
    pub mounts: u32,
    /// Shots per round.
    #[serde(default = "one")]
    pub shots: u32,
}

impl WeaponSpec {
    /// Build the engine-side slot with a full magazine.
    #[must_use]
    pub fn to_slot(&self) -> WeaponSlot {
        WeaponSlot::new(self.name.clone(), self.kind, self.range, self.damage)
            .with_mounts(self.mounts)
            .with_shots(self.shots)
    }
}

/// A stack's starting placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackPlacement {
    /// Display name.
    pub name: String,
    /// Owning empire. Ignored for monsters.
    #[serde(default)]
    pub owner: Option<u32>,
    /// Stack kind.
    #[serde(default)]
    pub role: PlacementRole,
    /// Starting cell `(x, y)`.
    pub at: (i32, i32),
    /// Number of units.
    #[serde(default = "one")]
    pub count: u32,
    /// Hit points per unit.
    pub hits: u32,
    /// Design cost per unit.
    #[serde(with = "decimal_serde")]
    pub value: Fixed,
    /// Combat movement points per round.
    #[serde(default = "one")]
    pub moves: u32,
    /// Galactic travel speed.
    #[serde(default = "one")]
    pub speed: u32,
    /// Weapon slots in firing-table order.
    #[serde(default)]
    pub weapons: Vec<WeaponSpec>,
    /// Has a cloaking device.
    #[serde(default)]
    pub cloak: bool,
    /// Has a combat teleporter.
    #[serde(default)]
    pub teleport: bool,
    /// Stand-off radius of a repulsor beam.
    #[serde(default)]
    pub repulsor_radius: u32,
    /// Design forbids withdrawing.
    #[serde(default)]
    pub no_retreat: bool,
    /// Left to a human in interactive resolution.
    #[serde(default)]
    pub manual: bool,
    /// Index of the placement this stack protects.
    #[serde(default)]
    pub ward: Option<usize>,
}

impl StackPlacement {
    /// Build the combat stack (without id or ward, which depend on the
    /// battle it joins).
    #[must_use]
    pub fn to_stack(&self) -> CombatStack {
        let owner = EmpireId(self.owner.unwrap_or(0));
        let mut stack = match self.role {
            PlacementRole::Ship | PlacementRole::ColonyShip => {
                CombatStack::ship(self.name.clone(), owner, self.count, self.hits, self.value)
            }
            PlacementRole::Colony { population } => {
                CombatStack::colony(self.name.clone(), owner, population, self.hits, self.value)
            }
            PlacementRole::Monster => CombatStack::monster(self.name.clone(), self.hits, self.value),
        };
        if self.role == PlacementRole::ColonyShip {
            stack.role = StackRole::Ship { colony_ship: true };
        }
        if !stack.is_colony() {
            stack = stack.with_moves(self.moves);
            stack.travel_speed = self.speed;
            if self.role == PlacementRole::Monster {
                stack.count = self.count;
            }
        }
        stack.weapons = self.weapons.iter().map(WeaponSpec::to_slot).collect();
        stack.capabilities = Capabilities {
            cloak: self.cloak,
            teleport: self.teleport,
            repulsor_radius: self.repulsor_radius,
            retreat: !self.no_retreat && stack.capabilities.retreat,
        };
        stack.controller = if self.manual { Controller::Manual } else { Controller::Ai };
        stack.at(GridPos::new(self.at.0, self.at.1))
    }
}

const fn one() -> u32 {
    1
}

const fn default_rounds() -> u32 {
    20
}

/// A complete battle scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid dimensions `(width, height)` in cells.
    pub grid_size: (u32, u32),
    /// Impassable cells.
    #[serde(default)]
    pub blocked: Vec<(i32, i32)>,
    /// Star system the battle is fought in.
    #[serde(default)]
    pub system: u32,
    /// Non-default standings. Unlisted pairs are at war.
    #[serde(default)]
    pub relations: Vec<RelationEntry>,
    /// `(holder, against)` grievance pairs.
    #[serde(default)]
    pub grievances: Vec<(u32, u32)>,
    /// Friendly systems per empire.
    #[serde(default)]
    pub retreat_routes: Vec<RetreatRoute>,
    /// Stack placements, in turn order.
    pub stacks: Vec<StackPlacement>,
    /// Tactical AI tuning.
    #[serde(default)]
    pub tactics: TacticsConfig,
    /// Rounds before the battle is called off.
    #[serde(default = "default_rounds")]
    pub max_rounds: u32,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        debug!(name = %scenario.name, path = %path.display(), "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Check everything that RON parsing alone cannot, including that every
    /// stack can be placed.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.build_battle().map(|_| ())
    }

    /// Build the initial battle state.
    pub fn build_battle(&self) -> Result<Battle, ScenarioError> {
        let (width, height) = self.grid_size;
        if width == 0 || height == 0 {
            return Err(ScenarioError::EmptyGrid { width, height });
        }
        if self.stacks.len() < 2 {
            return Err(ScenarioError::TooFewStacks(self.stacks.len()));
        }
        if self.max_rounds == 0 {
            return Err(ScenarioError::NoRounds);
        }

        let mut grid = BattleGrid::new(width, height);
        for &(x, y) in &self.blocked {
            if !grid.set_terrain(GridPos::new(x, y), Terrain::Blocked) {
                return Err(ScenarioError::BlockedOutOfBounds { x, y });
            }
        }

        let mut battle = Battle::new(SystemId(self.system), grid);
        let mut ids = Vec::with_capacity(self.stacks.len());
        for placement in &self.stacks {
            ids.push(battle.add_stack(placement.to_stack())?);
        }

        for (index, placement) in self.stacks.iter().enumerate() {
            let Some(ward) = placement.ward else {
                continue;
            };
            let ward_id: Option<StackId> = ids.get(ward).copied().filter(|_| ward != index);
            let Some(ward_id) = ward_id else {
                return Err(ScenarioError::UnknownWard {
                    stack: placement.name.clone(),
                    ward,
                });
            };
            if let Some(stack) = battle.stack_mut(ids[index]) {
                stack.ward = Some(ward_id);
            }
        }
        Ok(battle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUEL: &str = r#"(
        name: "Duel",
        grid_size: (10, 8),
        blocked: [(4, 4)],
        system: 7,
        stacks: [
            (
                name: "Frigates",
                owner: Some(1),
                at: (1, 3),
                count: 3,
                hits: 10,
                value: 25.5,
                moves: 2,
                weapons: [(name: "Laser", kind: Beam, range: 1, damage: (1, 4))],
            ),
            (
                name: "Outpost",
                owner: Some(2),
                role: Colony(population: 40.0),
                at: (8, 3),
                hits: 100,
                value: 200.0,
                weapons: [(name: "Missile Base", kind: Missile(speed: 4), range: 6, damage: (4, 4), mounts: 2)],
            ),
        ],
    )"#;

    #[test]
    fn test_parse_applies_defaults() {
        let scenario = Scenario::from_ron_str(DUEL).unwrap();
        assert_eq!(scenario.max_rounds, 20);
        assert!(scenario.relations.is_empty());
        assert_eq!(scenario.stacks[0].value, Fixed::from_num(25.5));
        assert_eq!(scenario.stacks[1].weapons[0].mounts, 2);
        assert_eq!(scenario.stacks[1].weapons[0].shots, 1);
        assert_eq!(scenario.tactics, TacticsConfig::default());
    }

    #[test]
    fn test_build_battle_places_stacks() {
        let battle = Scenario::from_ron_str(DUEL).unwrap().build_battle().unwrap();
        assert_eq!(battle.system, SystemId(7));
        assert!(!battle.grid().is_passable(GridPos::new(4, 4)));

        let frigates = battle.stack(StackId(0)).unwrap();
        assert_eq!(frigates.count, 3);
        assert_eq!(frigates.max_move_points, 2);
        assert!(frigates.can_retreat());

        let outpost = battle.stack(StackId(1)).unwrap();
        assert!(outpost.is_colony());
        assert_eq!(outpost.population(), Fixed::from_num(40));
        assert_eq!(outpost.max_move_points, 0);
        assert_eq!(outpost.weapons[0].kind, WeaponKind::Missile { speed: 4 });
    }

    #[test]
    fn test_validation_errors() {
        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.stacks[1].at = (1, 3);
        assert!(matches!(scenario.validate(), Err(ScenarioError::Tactics(_))));

        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.blocked.push((20, 0));
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::BlockedOutOfBounds { x: 20, y: 0 })
        ));

        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.stacks[0].ward = Some(0);
        assert!(matches!(scenario.validate(), Err(ScenarioError::UnknownWard { ward: 0, .. })));

        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.grid_size = (0, 8);
        assert!(matches!(scenario.validate(), Err(ScenarioError::EmptyGrid { .. })));

        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.stacks.truncate(1);
        assert!(matches!(scenario.validate(), Err(ScenarioError::TooFewStacks(1))));
    }

    #[test]
    fn test_ward_links_stacks() {
        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.stacks[0].owner = Some(2);
        scenario.stacks[0].ward = Some(1);
        let battle = scenario.build_battle().unwrap();
        assert_eq!(battle.stack(StackId(0)).unwrap().ward, Some(StackId(1)));
    }

    #[test]
    fn test_bad_ron_is_a_parse_error() {
        assert!(matches!(
            Scenario::from_ron_str("(name: \"Broken\""),
            Err(ScenarioError::ParseError(_))
        ));
    }
}
