//! Grid path search for combat movement.
//!
//! Three queries live here:
//!
//! - [`find_path`]: shortest walkable path between two cells under a
//!   movement budget. Depth-first branch-and-bound with an explicit frontier,
//!   neighbours visited in an order biased toward the straight-line heading.
//! - [`find_attack_path`]: the closest cell from which the actor can fire
//!   at a target, honouring stand-off zones and bombing runs.
//! - [`find_safest_cell`]: the reachable cell furthest from every hostile,
//!   used for kiting.
//!
//! All three are pure functions of the grid and the stacks passed in.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::grid::{BattleGrid, Direction, GridPos};
use crate::stack::CombatStack;

/// An ordered walk across the grid.
///
/// `steps` excludes the origin. Consecutive cells are 8-adjacent except for
/// teleport jumps, which are a single step to a distant cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPath {
    /// Starting cell.
    pub origin: GridPos,
    /// Cells entered, in order.
    pub steps: Vec<GridPos>,
    /// Movement points consumed.
    pub cost: u32,
    /// The path is a teleport jump rather than a walk.
    pub teleport: bool,
}

impl FlightPath {
    /// A path that stays put.
    #[must_use]
    pub fn stationary(origin: GridPos) -> Self {
        Self {
            origin,
            steps: Vec::new(),
            cost: 0,
            teleport: false,
        }
    }

    /// A teleport jump straight to `destination`.
    #[must_use]
    pub fn jump(origin: GridPos, destination: GridPos) -> Self {
        Self {
            origin,
            steps: vec![destination],
            cost: 1,
            teleport: true,
        }
    }

    fn walk(origin: GridPos, steps: Vec<GridPos>) -> Self {
        let cost = steps.len() as u32;
        Self {
            origin,
            steps,
            cost,
            teleport: false,
        }
    }

    /// Final cell (the origin for a stationary path).
    #[must_use]
    pub fn destination(&self) -> GridPos {
        self.steps.last().copied().unwrap_or(self.origin)
    }

    /// True when the path does not move.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.steps.is_empty()
    }

    /// The prefix of this path affordable with `budget` movement points.
    #[must_use]
    pub fn truncated(&self, budget: u32) -> Self {
        if self.cost <= budget {
            return self.clone();
        }
        if self.teleport {
            return Self::stationary(self.origin);
        }
        Self::walk(self.origin, self.steps[..budget as usize].to_vec())
    }

    /// Whole turns needed to complete the path at `moves_per_turn`.
    ///
    /// A path that needs no movement still takes one turn to act on.
    #[must_use]
    pub fn turns_to_complete(&self, moves_per_turn: u32) -> u32 {
        if self.cost == 0 || self.teleport {
            return 1;
        }
        if moves_per_turn == 0 {
            return u32::MAX;
        }
        self.cost.div_ceil(moves_per_turn)
    }
}

/// Neighbour visiting order for a search standing at `from` heading for `to`.
///
/// The exact heading comes first, then alternately the clockwise and
/// counter-clockwise neighbours of it, ending with the reverse direction.
/// With no heading (`from == to`) the plain clockwise order is used.
#[must_use]
pub fn direction_priority(from: GridPos, to: GridPos) -> [Direction; 8] {
    let Some(heading) = Direction::from_heading(to.x - from.x, to.y - from.y) else {
        return Direction::ALL;
    };
    let h = heading.index();
    let mut order = [heading; 8];
    let offsets = [0usize, 1, 7, 2, 6, 3, 5, 4];
    for (slot, offset) in order.iter_mut().zip(offsets) {
        *slot = Direction::ALL[(h + offset) % 8];
    }
    order
}

/// One level of the depth-first frontier.
struct Frame {
    pos: GridPos,
    order: [Direction; 8],
    next: usize,
    /// Flank cells this frame's entering step reserved.
    flanks: [Option<usize>; 2],
}

/// State shared by every branch of one search.
struct SearchContext<'g> {
    grid: &'g BattleGrid,
    destination: GridPos,
    budget: u32,
    /// Per-cell reservation count: cells on the current branch plus the
    /// flank cells of every step taken on it.
    reserved: Vec<u16>,
    /// Shallowest depth at which each cell has been entered so far.
    best_depth: Vec<u32>,
    best: Option<Vec<GridPos>>,
    discovered: u32,
}

impl<'g> SearchContext<'g> {
    fn new(grid: &'g BattleGrid, destination: GridPos, budget: u32) -> Self {
        Self {
            grid,
            destination,
            budget,
            reserved: vec![0; grid.cell_count()],
            best_depth: vec![u32::MAX; grid.cell_count()],
            best: None,
            discovered: 0,
        }
    }

    fn reserve(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            self.reserved[i] += 1;
        }
    }

    fn release(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            self.reserved[i] -= 1;
        }
    }

    fn bound(&self) -> u32 {
        self.best.as_ref().map_or(u32::MAX, |p| p.len() as u32)
    }

    /// Whether entering `to` at `depth` can still lead to a better path.
    fn worth_entering(&self, to: GridPos, index: usize, depth: u32) -> bool {
        if self.reserved[index] > 0 || depth >= self.best_depth[index] {
            return false;
        }
        let lower_bound = depth + to.distance(self.destination);
        lower_bound <= self.budget && lower_bound < self.bound()
    }

    fn search(mut self, origin: GridPos) -> Option<FlightPath> {
        let origin_index = self.grid.index(origin);
        self.reserve(origin_index);

        let mut path: Vec<GridPos> = Vec::new();
        let mut frontier = vec![Frame {
            pos: origin,
            order: direction_priority(origin, self.destination),
            next: 0,
            flanks: [None, None],
        }];

        while let Some(top) = frontier.last_mut() {
            if top.next >= top.order.len() {
                let (done, flanks) = (top.pos, top.flanks);
                frontier.pop();
                self.release(self.grid.index(done));
                for flank in flanks {
                    self.release(flank);
                }
                if !frontier.is_empty() {
                    path.pop();
                }
                continue;
            }

            let direction = top.order[top.next];
            top.next += 1;
            let from = top.pos;

            if !self.grid.step_allowed(from, direction) {
                continue;
            }
            let to = from.step(direction);
            let Some(index) = self.grid.index(to) else {
                continue;
            };
            let depth = path.len() as u32 + 1;
            if !self.worth_entering(to, index, depth) {
                continue;
            }
            self.best_depth[index] = depth;

            if to == self.destination {
                let mut found = path.clone();
                found.push(to);
                self.discovered += 1;
                self.best = Some(found);
                continue;
            }

            // The two cells flanking this step are adjacent to `from`, so
            // any continuation through them is beaten by a sibling branch.
            let flanks = [
                self.grid.index(from.step(direction.clockwise())),
                self.grid.index(from.step(direction.counter_clockwise())),
            ];
            self.reserve(Some(index));
            for flank in flanks {
                self.reserve(flank);
            }
            path.push(to);
            frontier.push(Frame {
                pos: to,
                order: direction_priority(to, self.destination),
                next: 0,
                flanks,
            });
        }

        trace!(
            %origin,
            destination = %self.destination,
            discovered = self.discovered,
            "Path search finished"
        );
        self.best.map(|steps| FlightPath::walk(origin, steps))
    }
}

/// Find the shortest walkable path from `origin` to `destination` costing
/// at most `budget` movement points.
///
/// The destination must be free; the origin may be occupied (normally by
/// the moving stack itself). Among equally short paths the one whose steps
/// best follow the heading toward the destination wins.
#[must_use]
pub fn find_path(grid: &BattleGrid, origin: GridPos, destination: GridPos, budget: u32) -> Option<FlightPath> {
    if origin == destination {
        return Some(FlightPath::stationary(origin));
    }
    if !grid.in_bounds(origin) || !grid.is_free(destination) {
        return None;
    }
    if origin.distance(destination) > budget {
        return None;
    }
    SearchContext::new(grid, destination, budget).search(origin)
}

/// Closest distance `actor` may stand from `target`.
///
/// A repulsor keeps attackers outside its radius unless they can cloak or
/// teleport past it.
#[must_use]
pub fn minimum_attack_range(actor: &CombatStack, target: &CombatStack) -> u32 {
    if target.can_repel() && !actor.bypasses_repulsors() {
        target.capabilities.repulsor_radius + 1
    } else {
        1
    }
}

/// Free cells exactly `range` away from `center`, nearest to `near` first.
fn ring_cells(grid: &BattleGrid, center: GridPos, range: u32, near: GridPos) -> Vec<GridPos> {
    let r = range as i32;
    let mut cells: Vec<GridPos> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| GridPos::new(center.x + dx, center.y + dy)))
        .filter(|p| p.distance(center) == range && grid.is_free(*p))
        .collect();
    cells.sort_by_key(|p| (p.distance(near), p.y, p.x));
    cells
}

/// Find the cheapest path that puts `actor` within firing range of
/// `target`, spending at most `budget` movement points.
///
/// Ranges are tried from the closest allowed distance outward up to the
/// actor's effective firing range; the first range with any reachable cell
/// wins. Returns a stationary path when the actor can already fire, and
/// `None` when no firing position is reachable.
#[must_use]
pub fn find_attack_path(grid: &BattleGrid, actor: &CombatStack, target: &CombatStack, budget: u32) -> Option<FlightPath> {
    // Rings past the grid's diameter hold no cells.
    let max_range = actor.firing_range_against(target)?.min(grid.diameter());
    let min_range = minimum_attack_range(actor, target);
    if min_range > max_range {
        return None;
    }

    let origin = actor.position;
    let current = origin.distance(target.position);
    if current >= min_range && current <= max_range {
        return Some(FlightPath::stationary(origin));
    }
    if budget == 0 {
        return None;
    }

    if actor.can_teleport() {
        return (min_range..=max_range)
            .find_map(|r| ring_cells(grid, target.position, r, origin).first().copied())
            .map(|dest| FlightPath::jump(origin, dest));
    }

    for range in min_range..=max_range {
        let mut best: Option<FlightPath> = None;
        for cell in ring_cells(grid, target.position, range, origin) {
            let limit = best.as_ref().map_or(budget, |p| p.cost.saturating_sub(1));
            if origin.distance(cell) > limit {
                // Rings are sorted by distance, nothing further can beat it.
                break;
            }
            if let Some(path) = find_path(grid, origin, cell, limit) {
                best = Some(path);
            }
        }
        if best.is_some() {
            return best;
        }
    }
    None
}

/// Every cell reachable from `origin` within `budget`, with its cost.
///
/// Breadth-first over the same step rules as [`find_path`]. The origin is
/// included at cost zero.
#[must_use]
pub fn reachable_cells(grid: &BattleGrid, origin: GridPos, budget: u32) -> Vec<(GridPos, u32)> {
    let Some(origin_index) = grid.index(origin) else {
        return Vec::new();
    };
    let mut cost = vec![u32::MAX; grid.cell_count()];
    cost[origin_index] = 0;
    let mut queue = VecDeque::from([origin]);
    let mut reached = vec![(origin, 0)];

    while let Some(pos) = queue.pop_front() {
        let here = cost[grid.index(pos).unwrap_or(origin_index)];
        if here >= budget {
            continue;
        }
        for direction in Direction::ALL {
            if !grid.step_allowed(pos, direction) {
                continue;
            }
            let next = pos.step(direction);
            let Some(i) = grid.index(next) else {
                continue;
            };
            if cost[i] == u32::MAX {
                cost[i] = here + 1;
                reached.push((next, here + 1));
                queue.push_back(next);
            }
        }
    }
    reached
}

/// Find the reachable cell maximising the summed distance to `hostiles`.
///
/// Ties prefer the cheaper move. Returns `None` when staying put is already
/// the safest option.
#[must_use]
pub fn find_safest_cell(grid: &BattleGrid, actor: &CombatStack, hostiles: &[GridPos]) -> Option<FlightPath> {
    let origin = actor.position;
    let danger = |cell: GridPos| -> u32 { hostiles.iter().map(|h| cell.distance(*h)).sum() };

    let candidates: Vec<(GridPos, u32)> = if actor.can_teleport() && actor.move_points > 0 {
        let mut all: Vec<(GridPos, u32)> = grid.cells().filter(|c| grid.is_free(*c)).map(|c| (c, 1)).collect();
        all.push((origin, 0));
        all
    } else {
        reachable_cells(grid, origin, actor.move_points)
    };

    let (best, _) = candidates
        .into_iter()
        .map(|(cell, cost)| (cell, (danger(cell), std::cmp::Reverse(cost))))
        .fold(None::<(GridPos, (u32, std::cmp::Reverse<u32>))>, |acc, item| match acc {
            Some(current) if current.1 >= item.1 => Some(current),
            _ => Some(item),
        })?;

    if best == origin || danger(best) <= danger(origin) {
        return None;
    }
    if actor.can_teleport() {
        return Some(FlightPath::jump(origin, best));
    }
    find_path(grid, origin, best, actor.move_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Terrain;
    use crate::math::Fixed;
    use crate::stack::{Capabilities, EmpireId, StackId, WeaponKind, WeaponSlot};

    fn assert_walkable(grid: &BattleGrid, path: &FlightPath) {
        let mut prev = path.origin;
        for step in &path.steps {
            assert!(prev.is_adjacent(*step), "{prev} -> {step} is not a single step");
            assert!(grid.is_free(*step), "{step} is not free");
            prev = *step;
        }
        assert_eq!(path.cost as usize, path.steps.len());
    }

    fn gunship(pos: GridPos, range: u32) -> CombatStack {
        CombatStack::ship("Gunship", EmpireId(1), 1, 10, Fixed::ONE)
            .at(pos)
            .with_moves(3)
            .with_weapon(WeaponSlot::new("Laser", WeaponKind::Beam, range, (1, 4)))
    }

    fn target_at(pos: GridPos) -> CombatStack {
        let mut t = CombatStack::ship("Target", EmpireId(2), 1, 10, Fixed::ONE).at(pos);
        t.id = StackId(9);
        t
    }

    #[test]
    fn test_direction_priority_leads_with_heading() {
        let order = direction_priority(GridPos::new(0, 0), GridPos::new(5, 0));
        assert_eq!(order[0], Direction::East);
        assert_eq!(order[1], Direction::SouthEast);
        assert_eq!(order[2], Direction::NorthEast);
        assert_eq!(order[7], Direction::West);

        let order = direction_priority(GridPos::new(3, 3), GridPos::new(0, 0));
        assert_eq!(order[0], Direction::NorthWest);
    }

    #[test]
    fn test_straight_path() {
        let grid = BattleGrid::new(10, 8);
        let path = find_path(&grid, GridPos::new(0, 0), GridPos::new(5, 0), 10).unwrap();
        assert_eq!(path.cost, 5);
        assert_eq!(path.destination(), GridPos::new(5, 0));
        assert!(path.steps.iter().all(|p| p.y == 0));
        assert_walkable(&grid, &path);
    }

    #[test]
    fn test_diagonal_path_costs_chebyshev() {
        let grid = BattleGrid::new(10, 8);
        let path = find_path(&grid, GridPos::new(0, 0), GridPos::new(4, 6), 10).unwrap();
        assert_eq!(path.cost, 6);
        assert_walkable(&grid, &path);
    }

    #[test]
    fn test_path_around_wall() {
        let mut grid = BattleGrid::new(10, 8);
        for y in 0..6 {
            grid.set_terrain(GridPos::new(4, y), Terrain::Blocked);
        }
        let path = find_path(&grid, GridPos::new(2, 0), GridPos::new(6, 0), 20).unwrap();
        assert_walkable(&grid, &path);
        assert!(path.steps.contains(&GridPos::new(4, 6)) || path.steps.contains(&GridPos::new(4, 7)));
        assert_eq!(path.cost, 12);
    }

    #[test]
    fn test_budget_limits_path() {
        let grid = BattleGrid::new(10, 8);
        assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(5, 0), 4).is_none());
        assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(5, 0), 5).is_some());
    }

    #[test]
    fn test_zero_budget_only_stays() {
        let grid = BattleGrid::new(10, 8);
        assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(1, 0), 0).is_none());
        let stay = find_path(&grid, GridPos::new(0, 0), GridPos::new(0, 0), 0).unwrap();
        assert!(stay.is_stationary());
    }

    #[test]
    fn test_occupied_destination_unreachable() {
        let mut grid = BattleGrid::new(10, 8);
        grid.place(GridPos::new(3, 3), StackId(4));
        assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(3, 3), 10).is_none());
    }

    #[test]
    fn test_enclosed_destination_unreachable() {
        let mut grid = BattleGrid::new(10, 8);
        for p in grid.neighbors(GridPos::new(5, 5)).collect::<Vec<_>>() {
            grid.set_terrain(p, Terrain::Blocked);
        }
        assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(5, 5), 30).is_none());
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut grid = BattleGrid::new(10, 8);
        grid.set_terrain(GridPos::new(3, 2), Terrain::Blocked);
        grid.set_terrain(GridPos::new(3, 3), Terrain::Blocked);
        let a = find_path(&grid, GridPos::new(0, 3), GridPos::new(8, 3), 20);
        let b = find_path(&grid, GridPos::new(0, 3), GridPos::new(8, 3), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_and_turns() {
        let grid = BattleGrid::new(10, 8);
        let path = find_path(&grid, GridPos::new(0, 0), GridPos::new(7, 0), 10).unwrap();
        let first_leg = path.truncated(3);
        assert_eq!(first_leg.cost, 3);
        assert_eq!(first_leg.destination(), path.steps[2]);
        assert_eq!(path.turns_to_complete(3), 3);
        assert_eq!(FlightPath::stationary(GridPos::new(0, 0)).turns_to_complete(3), 1);
    }

    #[test]
    fn test_attack_path_stationary_when_in_range() {
        let grid = BattleGrid::new(10, 8);
        let actor = gunship(GridPos::new(0, 0), 3);
        let target = target_at(GridPos::new(3, 1));
        let path = find_attack_path(&grid, &actor, &target, 3).unwrap();
        assert!(path.is_stationary());
    }

    #[test]
    fn test_attack_path_closes_to_nearest_ring() {
        let mut grid = BattleGrid::new(10, 8);
        let target = target_at(GridPos::new(8, 0));
        grid.place(target.position, target.id);
        let actor = gunship(GridPos::new(0, 0), 1);
        let path = find_attack_path(&grid, &actor, &target, 10).unwrap();
        assert_eq!(path.destination().distance(target.position), 1);
        assert_eq!(path.cost, 7);
    }

    #[test]
    fn test_attack_path_respects_repulsor() {
        let mut grid = BattleGrid::new(10, 8);
        let mut target = target_at(GridPos::new(6, 3));
        target.capabilities.repulsor_radius = 1;
        grid.place(target.position, target.id);

        let short = gunship(GridPos::new(0, 3), 1);
        assert!(find_attack_path(&grid, &short, &target, 10).is_none());

        let long = gunship(GridPos::new(0, 3), 2);
        let path = find_attack_path(&grid, &long, &target, 10).unwrap();
        assert_eq!(path.destination().distance(target.position), 2);

        let cloaked = short.clone().with_capabilities(Capabilities {
            cloak: true,
            retreat: true,
            ..Capabilities::default()
        });
        let path = find_attack_path(&grid, &cloaked, &target, 10).unwrap();
        assert_eq!(path.destination().distance(target.position), 1);
    }

    #[test]
    fn test_attack_path_with_extreme_range_gives_up() {
        let mut grid = BattleGrid::new(8, 8);
        let mut target = target_at(GridPos::new(4, 4));
        target.capabilities.repulsor_radius = 2;
        grid.place(target.position, target.id);

        let actor = gunship(GridPos::new(4, 3), 20_000);
        assert!(find_attack_path(&grid, &actor, &target, 1).is_none());
    }

    #[test]
    fn test_teleporter_jumps_next_to_target() {
        let mut grid = BattleGrid::new(10, 8);
        let target = target_at(GridPos::new(9, 7));
        grid.place(target.position, target.id);
        let actor = gunship(GridPos::new(0, 0), 1).with_capabilities(Capabilities {
            teleport: true,
            ..Capabilities::default()
        });
        let path = find_attack_path(&grid, &actor, &target, 1).unwrap();
        assert!(path.teleport);
        assert_eq!(path.destination().distance(target.position), 1);
    }

    #[test]
    fn test_reachable_cells_respects_budget() {
        let grid = BattleGrid::new(10, 8);
        let cells = reachable_cells(&grid, GridPos::new(5, 4), 1);
        assert_eq!(cells.len(), 9);
        assert!(cells.iter().all(|(_, c)| *c <= 1));
    }

    #[test]
    fn test_safest_cell_moves_away() {
        let mut grid = BattleGrid::new(10, 8);
        let actor = gunship(GridPos::new(4, 4), 1);
        grid.place(actor.position, StackId(0));
        let hostile = GridPos::new(6, 4);
        grid.place(hostile, StackId(1));

        let path = find_safest_cell(&grid, &actor, &[hostile]).unwrap();
        assert!(path.destination().distance(hostile) > actor.position.distance(hostile));
        assert!(path.cost <= actor.move_points);
    }

    #[test]
    fn test_safest_cell_none_when_cornered_already() {
        let mut grid = BattleGrid::new(10, 8);
        let actor = gunship(GridPos::new(0, 0), 1).with_moves(1);
        grid.place(actor.position, StackId(0));
        let hostile = GridPos::new(9, 7);
        assert!(find_safest_cell(&grid, &actor, &[hostile]).is_none());
    }
}
