//! Battle state: the grid plus the arena of participating stacks.
//!
//! Stacks are never physically removed. Destruction and retreat are status
//! flags; [`Battle::active_stacks`] filters them out and the grid cell is
//! released so other stacks may pass.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TacticsError};
use crate::grid::{BattleGrid, GridPos};
use crate::stack::{CombatStack, StackId, SystemId};

/// One battle instance. Battles share nothing with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battle {
    /// Star system the battle takes place in.
    pub system: SystemId,
    grid: BattleGrid,
    stacks: Vec<CombatStack>,
}

impl Battle {
    /// Create an empty battle on `grid`.
    #[must_use]
    pub fn new(system: SystemId, grid: BattleGrid) -> Self {
        Self {
            system,
            grid,
            stacks: Vec::new(),
        }
    }

    /// The battle grid.
    #[must_use]
    pub const fn grid(&self) -> &BattleGrid {
        &self.grid
    }

    /// Mutable access to the grid (terrain edits during setup).
    pub fn grid_mut(&mut self) -> &mut BattleGrid {
        &mut self.grid
    }

    /// Add a stack at its `position`, assigning its id.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::InvalidPlacement`] if the cell is out of
    /// bounds, blocked or already occupied.
    pub fn add_stack(&mut self, mut stack: CombatStack) -> Result<StackId> {
        let pos = stack.position;
        let reason = if !self.grid.in_bounds(pos) {
            Some("out of bounds")
        } else if !self.grid.is_passable(pos) {
            Some("blocked terrain")
        } else if self.grid.occupant(pos).is_some() {
            Some("cell occupied")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(TacticsError::InvalidPlacement {
                x: pos.x,
                y: pos.y,
                reason,
            });
        }

        let id = StackId(self.stacks.len() as u32);
        stack.id = id;
        self.grid.place(pos, id);
        debug!(stack = %id, name = %stack.name, %pos, "Stack joined battle");
        self.stacks.push(stack);
        Ok(id)
    }

    /// Look up a stack by id.
    #[must_use]
    pub fn stack(&self, id: StackId) -> Option<&CombatStack> {
        self.stacks.get(id.0 as usize)
    }

    /// Mutable lookup by id.
    pub fn stack_mut(&mut self, id: StackId) -> Option<&mut CombatStack> {
        self.stacks.get_mut(id.0 as usize)
    }

    /// Look up a stack, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::StackNotFound`] for unknown ids.
    pub fn require(&self, id: StackId) -> Result<&CombatStack> {
        self.stack(id).ok_or(TacticsError::StackNotFound(id))
    }

    /// Every stack that ever joined, including destroyed and retreated ones.
    #[must_use]
    pub fn all_stacks(&self) -> &[CombatStack] {
        &self.stacks
    }

    /// Stacks still in the battle, in id order.
    pub fn active_stacks(&self) -> impl Iterator<Item = &CombatStack> + '_ {
        self.stacks.iter().filter(|s| s.is_active())
    }

    /// Move a stack to `to`, updating occupancy. Movement points are not
    /// touched; the caller charges them.
    ///
    /// Returns `false` if the destination is not free.
    pub fn relocate_stack(&mut self, id: StackId, to: GridPos) -> bool {
        let Some(stack) = self.stacks.get_mut(id.0 as usize) else {
            return false;
        };
        if !self.grid.relocate(stack.position, to) {
            return false;
        }
        stack.position = to;
        true
    }

    /// Take a stack off the grid and flag it destroyed.
    pub fn mark_destroyed(&mut self, id: StackId) {
        if let Some(stack) = self.stacks.get_mut(id.0 as usize) {
            stack.status.destroyed = true;
            stack.count = 0;
            stack.hits = 0;
            self.grid.vacate(stack.position);
        }
    }

    /// Take a stack off the grid and flag it withdrawn.
    pub fn mark_retreated(&mut self, id: StackId) {
        if let Some(stack) = self.stacks.get_mut(id.0 as usize) {
            stack.status.retreated = true;
            self.grid.vacate(stack.position);
        }
    }

    /// Missile salvos launched by `launcher` that are still flying.
    pub fn missiles_in_flight_from(&self, launcher: StackId) -> impl Iterator<Item = &CombatStack> + '_ {
        self.active_stacks().filter(move |s| {
            matches!(s.role, crate::stack::StackRole::Missile { launched_by, .. } if launched_by == launcher)
        })
    }
}
