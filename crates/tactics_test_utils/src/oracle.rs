//! Brute-force reference answers for property tests.

use std::collections::VecDeque;

use tactics_core::grid::{BattleGrid, Direction, GridPos};

/// Shortest walkable distance from `origin` to `destination` by plain
/// breadth-first search, or `None` if it exceeds `budget`.
///
/// Uses the same step rule as the real search ([`BattleGrid::step_allowed`]).
#[must_use]
pub fn bfs_distance(grid: &BattleGrid, origin: GridPos, destination: GridPos, budget: u32) -> Option<u32> {
    if origin == destination {
        return Some(0);
    }
    if !grid.in_bounds(origin) || !grid.is_free(destination) {
        return None;
    }
    let mut seen = vec![false; grid.cell_count()];
    seen[grid.index(origin)?] = true;
    let mut queue = VecDeque::from([(origin, 0u32)]);

    while let Some((pos, depth)) = queue.pop_front() {
        if depth >= budget {
            continue;
        }
        for direction in Direction::ALL {
            if !grid.step_allowed(pos, direction) {
                continue;
            }
            let next = pos.step(direction);
            if next == destination {
                return Some(depth + 1);
            }
            let Some(i) = grid.index(next) else {
                continue;
            };
            if !seen[i] {
                seen[i] = true;
                queue.push_back((next, depth + 1));
            }
        }
    }
    None
}
