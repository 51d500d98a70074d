//! Proptest strategies for grids, endpoints and kill estimates.

use proptest::collection::vec;
use proptest::prelude::*;
use tactics_core::grid::{BattleGrid, GridPos, Terrain};
use tactics_core::math::Fixed;

/// A search problem: grid, origin, destination and movement budget.
#[derive(Debug, Clone)]
pub struct PathCase {
    /// Grid with random obstacles. Origin and destination are open.
    pub grid: BattleGrid,
    /// Start cell.
    pub origin: GridPos,
    /// Goal cell.
    pub destination: GridPos,
    /// Movement budget.
    pub budget: u32,
}

fn build_grid(width: u32, height: u32, blocked: &[bool]) -> BattleGrid {
    let mut grid = BattleGrid::new(width, height);
    for (i, &is_blocked) in blocked.iter().enumerate() {
        if is_blocked {
            let pos = grid.pos_of(i);
            grid.set_terrain(pos, Terrain::Blocked);
        }
    }
    grid
}

/// Grid of up to `max_width` x `max_height` cells with roughly a quarter
/// of them blocked.
pub fn battle_grid(max_width: u32, max_height: u32) -> impl Strategy<Value = BattleGrid> {
    (3..=max_width, 3..=max_height).prop_flat_map(|(w, h)| {
        vec(prop::bool::weighted(0.25), (w * h) as usize).prop_map(move |blocked| build_grid(w, h, &blocked))
    })
}

/// Random path problem on a grid of up to `max_width` x `max_height`.
pub fn path_case(max_width: u32, max_height: u32) -> impl Strategy<Value = PathCase> {
    battle_grid(max_width, max_height).prop_flat_map(|grid| {
        let cells = grid.cell_count();
        let reach = grid.width() + grid.height();
        (Just(grid), 0..cells, 0..cells, 0..=reach).prop_map(|(mut grid, from, to, budget)| {
            let origin = grid.pos_of(from);
            let destination = grid.pos_of(to);
            grid.set_terrain(origin, Terrain::Open);
            grid.set_terrain(destination, Terrain::Open);
            PathCase {
                grid,
                origin,
                destination,
                budget,
            }
        })
    })
}

/// Kill fraction in `[0, 1]` with three decimal places.
pub fn kill_fraction() -> impl Strategy<Value = Fixed> {
    (0u32..=1000).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(1000))
}
