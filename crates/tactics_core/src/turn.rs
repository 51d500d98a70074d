//! One stack's turn as an explicit state machine.
//!
//! ```text
//! SelectTarget -> EvaluateRetreat -> Move -> Fire -> Kite -> SelectTarget
//!                        |                               |
//!                        +------------> Done <-----------+
//! ```
//!
//! The loop ends once neither the position nor the pursued target changed
//! over an iteration, when the stack has nothing left to fire, or when the
//! iteration cap from [`TacticsConfig::iteration_cap`] is reached.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::config::{ResolutionMode, TacticsConfig};
use crate::error::{Result, TacticsError};
use crate::firing::AttackSequencer;
use crate::grid::GridPos;
use crate::interfaces::{is_hostile, CombatEngine, MoveCommand, StrategicLayer};
use crate::pathfinding::{find_safest_cell, FlightPath};
use crate::retreat::{RetreatDecision, RetreatEvaluator};
use crate::stack::{CombatStack, Controller, StackId, SystemId};
use crate::targeting::{TargetChoice, TargetMode, TargetSelector};

/// States of the per-stack turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// Pick the pursuit and in-range targets; opportunistic fire.
    SelectTarget,
    /// Decide whether to withdraw.
    EvaluateRetreat,
    /// Advance along the pursuit path.
    Move,
    /// Fire at whatever is in range from the new position.
    Fire,
    /// Reposition out of reach once short-range options are spent, then
    /// check for progress.
    Kite,
    /// Turn over.
    Done,
}

/// Why a stack did not act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Already destroyed.
    Destroyed,
    /// A missile salvo; the Combat Engine flies it.
    Missile,
    /// Frozen by a stasis field.
    InStasis,
    /// Left to the player in interactive resolution.
    ManualControl,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// The stack was not eligible to act.
    Skipped(SkipReason),
    /// Nothing useful to do.
    Idle,
    /// Moved and/or fired.
    Engaged,
    /// Ended the turn by repositioning to the safest cell.
    Kited,
    /// Withdrew from the battle.
    Retreated(SystemId),
}

/// A command the turn issued to the Combat Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnAction {
    /// One weapon salvo.
    Fired {
        /// Target stack.
        target: StackId,
        /// Weapon slot index.
        slot: usize,
        /// The salvo destroyed the target.
        destroyed: bool,
    },
    /// Movement toward a target.
    Moved {
        /// Start cell.
        from: GridPos,
        /// End cell.
        to: GridPos,
        /// Movement points spent.
        cost: u32,
    },
    /// Movement away from every hostile.
    Kited {
        /// Start cell.
        from: GridPos,
        /// End cell.
        to: GridPos,
    },
    /// Withdrawal.
    Retreated {
        /// Destination system.
        destination: SystemId,
    },
}

/// Everything one turn did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Acting stack.
    pub stack: StackId,
    /// How the turn ended.
    pub outcome: TurnOutcome,
    /// Commands issued, in order.
    pub actions: Vec<TurnAction>,
    /// Loop iterations used.
    pub iterations: u32,
}

impl TurnReport {
    fn skipped(stack: StackId, reason: SkipReason) -> Self {
        Self {
            stack,
            outcome: TurnOutcome::Skipped(reason),
            actions: Vec::new(),
            iterations: 0,
        }
    }

    /// Number of salvos fired.
    #[must_use]
    pub fn shots_fired(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, TurnAction::Fired { .. }))
            .count()
    }

    /// Whether the stack changed cell.
    #[must_use]
    pub fn moved(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, TurnAction::Moved { .. } | TurnAction::Kited { .. }))
    }
}

/// Mutable bookkeeping of a turn in progress.
struct TurnProgress {
    stack: StackId,
    cap: u32,
    iterations: u32,
    actions: Vec<TurnAction>,
    pursuit: Option<TargetChoice>,
    previous: Option<(GridPos, Option<StackId>)>,
    outcome: Option<TurnOutcome>,
}

/// Plays turns for AI-controlled stacks.
pub struct TurnController<'a, S: StrategicLayer + ?Sized> {
    strategic: &'a S,
    config: &'a TacticsConfig,
}

impl<'a, S: StrategicLayer + ?Sized> TurnController<'a, S> {
    /// Create a controller bound to the strategic layer and tuning.
    pub fn new(strategic: &'a S, config: &'a TacticsConfig) -> Self {
        Self { strategic, config }
    }

    /// Play one full turn for `stack`.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::StackNotFound`] for unknown stacks and
    /// [`TacticsError::StackNotActionable`] for stacks that already
    /// retreated or acted this round. Both indicate a caller defect.
    pub fn take_turn<E: CombatEngine + ?Sized>(&self, engine: &mut E, stack: StackId) -> Result<TurnReport> {
        let (cap, skip) = {
            let battle = engine.battle();
            let actor = battle.require(stack).map_err(|e| {
                error!(stack = %stack, "Turn requested for unknown stack");
                e
            })?;
            if let Some(reason) = not_actionable(actor) {
                error!(stack = %stack, reason, "Turn requested for stack that cannot act");
                return Err(TacticsError::StackNotActionable { stack, reason });
            }
            let cap = self
                .config
                .iteration_cap(actor.weapons.len(), battle.grid().diameter());
            (cap, self.skip_reason(actor))
        };

        if let Some(reason) = skip {
            debug!(stack = %stack, ?reason, "Turn skipped");
            if reason != SkipReason::ManualControl {
                engine.turn_complete(stack);
            }
            return Ok(TurnReport::skipped(stack, reason));
        }

        let mut progress = TurnProgress {
            stack,
            cap,
            iterations: 0,
            actions: Vec::new(),
            pursuit: None,
            previous: None,
            outcome: None,
        };

        let mut state = TurnState::SelectTarget;
        while state != TurnState::Done {
            trace!(stack = %stack, ?state, iteration = progress.iterations, "Turn state");
            state = match state {
                TurnState::SelectTarget => self.select_targets(engine, &mut progress),
                TurnState::EvaluateRetreat => self.evaluate_retreat(engine, &mut progress),
                TurnState::Move => self.advance(engine, &mut progress),
                TurnState::Fire => self.fire_in_range(engine, &mut progress),
                TurnState::Kite => self.kite_or_continue(engine, &mut progress),
                TurnState::Done => TurnState::Done,
            };
        }

        let outcome = progress.outcome.unwrap_or(if progress.actions.is_empty() {
            TurnOutcome::Idle
        } else {
            TurnOutcome::Engaged
        });
        engine.turn_complete(stack);
        info!(
            stack = %stack,
            ?outcome,
            actions = progress.actions.len(),
            iterations = progress.iterations,
            "Turn complete"
        );

        Ok(TurnReport {
            stack,
            outcome,
            actions: progress.actions,
            iterations: progress.iterations,
        })
    }

    fn skip_reason(&self, actor: &CombatStack) -> Option<SkipReason> {
        if actor.status.destroyed {
            Some(SkipReason::Destroyed)
        } else if actor.is_missile() {
            Some(SkipReason::Missile)
        } else if actor.status.in_stasis {
            Some(SkipReason::InStasis)
        } else if actor.controller == Controller::Manual && self.config.resolution == ResolutionMode::Interactive {
            Some(SkipReason::ManualControl)
        } else {
            None
        }
    }

    fn select_targets<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress) -> TurnState {
        progress.iterations += 1;
        if progress.iterations > progress.cap {
            debug!(stack = %progress.stack, cap = progress.cap, "Iteration cap reached");
            return TurnState::Done;
        }
        let Some(actor) = engine.battle().stack(progress.stack).filter(|s| s.is_active()) else {
            return TurnState::Done;
        };

        let selector = TargetSelector::new(self.strategic, self.config);
        progress.pursuit = if actor.is_colony() {
            None
        } else {
            selector.select(&*engine, progress.stack, TargetMode::Pursue)
        };
        let in_range = selector.select(&*engine, progress.stack, TargetMode::InRange);

        if let Some(attack) = in_range {
            let pursued = progress.pursuit.as_ref().map(|p| p.target);
            if pursued != Some(attack.target) {
                debug!(stack = %progress.stack, target = %attack.target, "Opportunity fire before moving");
                self.fire_at(engine, progress, attack.target);
            }
        }
        TurnState::EvaluateRetreat
    }

    fn evaluate_retreat<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress) -> TurnState {
        let decision = RetreatEvaluator::new(self.strategic, self.config).evaluate(&*engine, progress.stack);
        let RetreatDecision::Retreat(destination) = decision else {
            return TurnState::Move;
        };

        let parting_shot = TargetSelector::new(self.strategic, self.config).select(&*engine, progress.stack, TargetMode::InRange);
        if let Some(choice) = parting_shot {
            self.fire_at(engine, progress, choice.target);
        }
        engine.retreat(progress.stack, destination);
        progress.actions.push(TurnAction::Retreated { destination });
        progress.outcome = Some(TurnOutcome::Retreated(destination));
        TurnState::Done
    }

    fn advance<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress) -> TurnState {
        let Some(path) = progress.pursuit.as_ref().and_then(|c| c.path.as_ref()) else {
            return TurnState::Fire;
        };
        let Some(moves) = engine.battle().stack(progress.stack).map(|s| s.move_points) else {
            return TurnState::Done;
        };
        let path = path.truncated(moves);
        if let Some((from, to)) = self.apply_move(engine, progress.stack, &path) {
            debug!(stack = %progress.stack, %from, %to, cost = path.cost, "Moved toward target");
            progress.actions.push(TurnAction::Moved {
                from,
                to,
                cost: path.cost,
            });
        }
        TurnState::Fire
    }

    fn fire_in_range<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress) -> TurnState {
        let choice = TargetSelector::new(self.strategic, self.config).select(&*engine, progress.stack, TargetMode::InRange);
        if let Some(choice) = choice {
            self.fire_at(engine, progress, choice.target);
        }
        TurnState::Kite
    }

    fn kite_or_continue<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress) -> TurnState {
        let (escape, current, armed) = {
            let battle = engine.battle();
            let Some(actor) = battle.stack(progress.stack).filter(|s| s.is_active()) else {
                return TurnState::Done;
            };
            let escape = if should_kite(actor) {
                let hostiles: Vec<GridPos> = battle
                    .active_stacks()
                    .filter(|s| !s.is_missile() && is_hostile(self.strategic, actor, s))
                    .map(|s| s.position)
                    .collect();
                if hostiles.is_empty() {
                    None
                } else {
                    find_safest_cell(battle.grid(), actor, &hostiles)
                }
            } else {
                None
            };
            let current = (actor.position, progress.pursuit.as_ref().map(|c| c.target));
            (escape, current, actor.has_shots_left())
        };

        if let Some(path) = escape {
            if let Some((from, to)) = self.apply_move(engine, progress.stack, &path) {
                debug!(stack = %progress.stack, %from, %to, "Kiting to safest cell");
                progress.actions.push(TurnAction::Kited { from, to });
                progress.outcome = Some(TurnOutcome::Kited);
                return TurnState::Done;
            }
        }

        if progress.previous == Some(current) || !armed {
            return TurnState::Done;
        }
        progress.previous = Some(current);
        TurnState::SelectTarget
    }

    fn fire_at<E: CombatEngine + ?Sized>(&self, engine: &mut E, progress: &mut TurnProgress, target: StackId) {
        let records = AttackSequencer::new(self.config).fire(engine, progress.stack, target);
        progress
            .actions
            .extend(records.into_iter().map(|r| TurnAction::Fired {
                target,
                slot: r.slot,
                destroyed: r.target_destroyed,
            }));
    }

    /// Issue the movement commands for `path` and report where the stack
    /// ended up, if it moved at all.
    fn apply_move<E: CombatEngine + ?Sized>(
        &self,
        engine: &mut E,
        stack: StackId,
        path: &FlightPath,
    ) -> Option<(GridPos, GridPos)> {
        if path.is_stationary() {
            return None;
        }
        let from = engine.battle().stack(stack)?.position;
        match self.config.resolution {
            ResolutionMode::Auto => engine.move_stack(
                stack,
                MoveCommand::ToPoint {
                    destination: path.destination(),
                    cost: path.cost,
                },
            ),
            ResolutionMode::Interactive => {
                for cell in &path.steps {
                    engine.move_stack(stack, MoveCommand::Step(*cell));
                }
            }
        }
        let to = engine.battle().stack(stack)?.position;
        (to != from).then_some((from, to))
    }
}

fn not_actionable(actor: &CombatStack) -> Option<&'static str> {
    if actor.status.retreated {
        Some("already retreated")
    } else if actor.status.acted {
        Some("already acted this round")
    } else {
        None
    }
}

/// Every direct-fire weapon is spent and the stack carries something that
/// works at a distance, so standing next to the enemy gains nothing.
fn should_kite(actor: &CombatStack) -> bool {
    let mut primaries = actor
        .weapons
        .iter()
        .filter(|w| !w.is_bomb() && !w.is_utility())
        .peekable();
    let has_primaries = primaries.peek().is_some();
    let spent = primaries.all(|w| !w.has_shots());
    let stand_off = actor.can_repel() || actor.weapons.iter().any(|w| w.is_repulsor() || w.is_missile());
    has_primaries && spent && stand_off && actor.move_points > 0
}
