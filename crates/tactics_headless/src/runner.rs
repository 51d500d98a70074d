//! Round-by-round battle resolution.
//!
//! Every round, each stack still in the battle and not yet acted takes one
//! turn in id order. The battle ends when no two remaining stacks are
//! hostile, when a whole round passes without anyone moving or firing, or
//! when the scenario's round limit runs out.

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use tactics_core::battle::Battle;
use tactics_core::interfaces::{is_hostile, CombatEngine, StrategicLayer};
use tactics_core::stack::{EmpireId, StackId, SystemId};
use tactics_core::turn::{TurnController, TurnOutcome, TurnReport};

use crate::diplomacy::ScenarioDiplomacy;
use crate::engine::ReferenceEngine;
use crate::scenario::{Scenario, ScenarioError};

/// A participant's allegiance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// An empire's forces.
    Empire(EmpireId),
    /// Space monsters.
    Monsters,
}

impl From<Option<EmpireId>> for Side {
    fn from(owner: Option<EmpireId>) -> Self {
        owner.map_or(Self::Monsters, Self::Empire)
    }
}

/// How the battle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleResult {
    /// Only mutually friendly stacks remain.
    Victory(Vec<Side>),
    /// Every stack was destroyed or withdrew.
    NoSurvivors,
    /// A full round passed with nobody moving or firing.
    Stalemate,
    /// The round limit was reached with hostilities ongoing.
    RoundLimit,
}

/// A stack still on the field at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survivor {
    /// Stack id.
    pub stack: StackId,
    /// Display name.
    pub name: String,
    /// Allegiance.
    pub side: Side,
    /// Units left.
    pub count: u32,
    /// Hit points left across all units.
    pub total_hits: u32,
}

/// A stack that withdrew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Stack id.
    pub stack: StackId,
    /// Display name.
    pub name: String,
    /// Round it left in.
    pub round: u32,
    /// Destination system.
    pub destination: SystemId,
}

/// Everything one battle produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Scenario name.
    pub scenario: String,
    /// How it ended.
    pub result: BattleResult,
    /// Rounds played.
    pub rounds: u32,
    /// Stacks left on the field.
    pub survivors: Vec<Survivor>,
    /// Stacks that withdrew, in order.
    pub retreats: Vec<Withdrawal>,
    /// Every turn, in play order.
    pub reports: Vec<TurnReport>,
}

impl BattleSummary {
    /// Winning sides, empty unless the battle was decided.
    #[must_use]
    pub fn winners(&self) -> &[Side] {
        match &self.result {
            BattleResult::Victory(sides) => sides,
            _ => &[],
        }
    }

    /// Salvos fired over the whole battle.
    #[must_use]
    pub fn shots_fired(&self) -> usize {
        self.reports.iter().map(TurnReport::shots_fired).sum()
    }
}

/// Sides still present, or `None` while two hostile stacks remain.
fn settled<S: StrategicLayer + ?Sized>(battle: &Battle, strategic: &S) -> Option<Vec<Side>> {
    let active: Vec<_> = battle.active_stacks().filter(|s| !s.is_missile()).collect();
    for (i, a) in active.iter().enumerate() {
        if active[i + 1..].iter().any(|b| is_hostile(strategic, a, b)) {
            return None;
        }
    }
    let mut sides: Vec<Side> = active.iter().map(|s| Side::from(s.owner)).collect();
    sides.sort();
    sides.dedup();
    Some(sides)
}

fn verdict(sides: Vec<Side>) -> BattleResult {
    if sides.is_empty() {
        BattleResult::NoSurvivors
    } else {
        BattleResult::Victory(sides)
    }
}

/// Resolve `scenario` to completion against the reference engine.
pub fn run_battle(scenario: &Scenario) -> Result<BattleSummary, ScenarioError> {
    let _span = info_span!("battle", scenario = %scenario.name).entered();
    let battle = scenario.build_battle()?;
    let diplomacy = ScenarioDiplomacy::from_scenario(scenario);
    let controller = TurnController::new(&diplomacy, &scenario.tactics);
    let mut engine = ReferenceEngine::new(battle);

    let mut reports = Vec::new();
    let mut retreats = Vec::new();
    let mut rounds = 0;
    let mut result = BattleResult::RoundLimit;

    while rounds < scenario.max_rounds {
        if let Some(sides) = settled(engine.battle(), &diplomacy) {
            result = verdict(sides);
            break;
        }
        rounds += 1;

        let order: Vec<StackId> = engine.battle().active_stacks().map(|s| s.id).collect();
        let mut progress = false;
        for id in order {
            let ready = engine
                .battle()
                .stack(id)
                .is_some_and(|s| s.is_active() && !s.status.acted);
            if !ready {
                continue;
            }
            let report = controller.take_turn(&mut engine, id)?;
            if let TurnOutcome::Retreated(destination) = report.outcome {
                let name = engine.battle().stack(id).map(|s| s.name.clone()).unwrap_or_default();
                retreats.push(Withdrawal {
                    stack: id,
                    name,
                    round: rounds,
                    destination,
                });
            }
            progress |= !report.actions.is_empty();
            reports.push(report);
        }

        if !progress {
            result = settled(engine.battle(), &diplomacy).map_or(BattleResult::Stalemate, verdict);
            break;
        }
        engine.new_round();
    }

    if result == BattleResult::RoundLimit {
        if let Some(sides) = settled(engine.battle(), &diplomacy) {
            result = verdict(sides);
        }
    }

    let survivors = engine
        .battle()
        .active_stacks()
        .filter(|s| !s.is_missile())
        .map(|s| Survivor {
            stack: s.id,
            name: s.name.clone(),
            side: Side::from(s.owner),
            count: s.count,
            total_hits: s.total_hits(),
        })
        .collect();

    info!(?result, rounds, turns = reports.len(), "Battle finished");
    Ok(BattleSummary {
        scenario: scenario.name.clone(),
        result,
        rounds,
        survivors,
        retreats,
        reports,
    })
}
