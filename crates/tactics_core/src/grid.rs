//! Battle grid: a bounded 2D board with terrain and stack occupancy.
//!
//! Distances on the grid are Chebyshev distances: a diagonal step costs one
//! movement point, the same as an orthogonal one. Weapon ranges use the same
//! metric.

use serde::{Deserialize, Serialize};

use crate::stack::StackId;

/// A cell coordinate on the battle grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column, growing east.
    pub x: i32,
    /// Row, growing south.
    pub y: i32,
}

impl GridPos {
    /// Create a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance in movement points.
    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx.max(dy)
    }

    /// The neighbouring cell in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True when `other` is one of the eight neighbours of this cell.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        self != other && self.distance(other) == 1
    }

    /// Move up to `steps` cells straight toward `goal`, one axis unit per step.
    #[must_use]
    pub fn toward(self, goal: Self, steps: u32) -> Self {
        let dx = goal.x - self.x;
        let dy = goal.y - self.y;
        let steps = steps as i32;
        Self {
            x: self.x + dx.signum() * dx.abs().min(steps),
            y: self.y + dy.signum() * dy.abs().min(steps),
        }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions, clockwise from East.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +x.
    East,
    /// +x +y.
    SouthEast,
    /// +y.
    South,
    /// -x +y.
    SouthWest,
    /// -x.
    West,
    /// -x -y.
    NorthWest,
    /// -y.
    North,
    /// +x -y.
    NorthEast,
}

impl Direction {
    /// All directions in clockwise order starting at East.
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
    ];

    /// Cell offset for one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
        }
    }

    /// Position of this direction in [`Direction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The direction 45 degrees clockwise.
    #[must_use]
    pub const fn clockwise(self) -> Self {
        Self::ALL[(self.index() + 1) % 8]
    }

    /// The direction 45 degrees counter-clockwise.
    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        Self::ALL[(self.index() + 7) % 8]
    }

    /// True for the four diagonal directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }

    /// The direction whose offset matches the signs of `(dx, dy)`.
    ///
    /// Returns `None` for `(0, 0)`.
    #[must_use]
    pub fn from_heading(dx: i32, dy: i32) -> Option<Self> {
        let signs = (dx.signum(), dy.signum());
        Self::ALL.into_iter().find(|d| d.offset() == signs)
    }
}

/// Terrain of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open space.
    #[default]
    Open,
    /// Asteroids or other impassable terrain.
    Blocked,
}

/// Fixed-size battle grid with terrain and occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleGrid {
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Terrain stored in row-major order.
    terrain: Vec<Terrain>,
    /// Occupying stack per cell, row-major.
    occupancy: Vec<Option<StackId>>,
}

impl BattleGrid {
    /// Create a new grid with every cell open and empty.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "BattleGrid width must be positive");
        assert!(height > 0, "BattleGrid height must be positive");

        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            terrain: vec![Terrain::Open; cell_count],
            occupancy: vec![None; cell_count],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells on the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.terrain.len()
    }

    /// Longest Chebyshev distance between two cells.
    #[must_use]
    pub fn diameter(&self) -> u32 {
        self.width.max(self.height) - 1
    }

    /// Row-major index of an in-bounds cell.
    #[inline]
    #[must_use]
    pub fn index(&self, pos: GridPos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y as usize) * (self.width as usize) + (pos.x as usize))
        } else {
            None
        }
    }

    /// Cell coordinate for a row-major index.
    #[must_use]
    pub fn pos_of(&self, index: usize) -> GridPos {
        let width = self.width as usize;
        GridPos::new((index % width) as i32, (index / width) as i32)
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Terrain at `pos`, or `None` when out of bounds.
    #[must_use]
    pub fn terrain(&self, pos: GridPos) -> Option<Terrain> {
        self.index(pos).map(|i| self.terrain[i])
    }

    /// Set terrain at `pos`. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, pos: GridPos, terrain: Terrain) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.terrain[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// In bounds and not blocked by terrain. Occupancy is ignored.
    #[must_use]
    pub fn is_passable(&self, pos: GridPos) -> bool {
        self.terrain(pos) == Some(Terrain::Open)
    }

    /// Stack occupying `pos`, if any.
    #[must_use]
    pub fn occupant(&self, pos: GridPos) -> Option<StackId> {
        self.index(pos).and_then(|i| self.occupancy[i])
    }

    /// A valid cell: in bounds, passable and unoccupied.
    #[must_use]
    pub fn is_free(&self, pos: GridPos) -> bool {
        self.is_passable(pos) && self.occupant(pos).is_none()
    }

    /// Whether a single step from `from` in `direction` is legal.
    ///
    /// The destination must be free, and a diagonal step may not squeeze
    /// between two orthogonal cells that are both impassable.
    #[must_use]
    pub fn step_allowed(&self, from: GridPos, direction: Direction) -> bool {
        let to = from.step(direction);
        if !self.is_free(to) {
            return false;
        }
        if direction.is_diagonal() {
            let (dx, dy) = direction.offset();
            let side_a = GridPos::new(from.x + dx, from.y);
            let side_b = GridPos::new(from.x, from.y + dy);
            if !self.is_free(side_a) && !self.is_free(side_b) {
                return false;
            }
        }
        true
    }

    /// In-bounds neighbours of `pos`, clockwise from East.
    pub fn neighbors(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        Direction::ALL
            .into_iter()
            .map(move |d| pos.step(d))
            .filter(move |p| self.in_bounds(*p))
    }

    /// Every cell coordinate in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.cell_count()).map(move |i| self.pos_of(i))
    }

    /// Put `stack` on `pos`. Returns `false` if the cell is not free.
    pub fn place(&mut self, pos: GridPos, stack: StackId) -> bool {
        if !self.is_free(pos) {
            return false;
        }
        if let Some(i) = self.index(pos) {
            self.occupancy[i] = Some(stack);
        }
        true
    }

    /// Clear `pos`, returning whoever occupied it.
    pub fn vacate(&mut self, pos: GridPos) -> Option<StackId> {
        self.index(pos).and_then(|i| self.occupancy[i].take())
    }

    /// Move the occupant of `from` to `to`.
    ///
    /// Returns `false` (and changes nothing) when `from` is empty or `to`
    /// is not free.
    pub fn relocate(&mut self, from: GridPos, to: GridPos) -> bool {
        if from == to {
            return self.occupant(from).is_some();
        }
        let Some(stack) = self.occupant(from) else {
            return false;
        };
        if !self.is_free(to) {
            return false;
        }
        self.vacate(from);
        self.place(to, stack)
    }
}

impl Default for BattleGrid {
    /// The classic 10x8 combat board.
    fn default() -> Self {
        Self::new(10, 8)
    }
}
