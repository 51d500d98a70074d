//! Property tests for the grid path search.

use tactics_core::grid::{BattleGrid, GridPos, Terrain};
use tactics_core::pathfinding::{find_path, find_safest_cell, reachable_cells};
use tactics_core::stack::CombatStack;
use tactics_test_utils::fixtures::warship;
use tactics_test_utils::oracle::bfs_distance;
use tactics_test_utils::proptest::prelude::*;
use tactics_test_utils::strategies::path_case;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_paths_are_walkable(case in path_case(12, 10)) {
        if let Some(path) = find_path(&case.grid, case.origin, case.destination, case.budget) {
            prop_assert!(path.cost <= case.budget);
            prop_assert_eq!(path.cost as usize, path.steps.len());
            prop_assert_eq!(path.destination(), case.destination);
            let mut prev = case.origin;
            for step in &path.steps {
                prop_assert!(prev.is_adjacent(*step), "{} -> {} is not one step", prev, step);
                prop_assert!(case.grid.is_free(*step), "{} is blocked", step);
                prev = *step;
            }
        }
    }

    #[test]
    fn test_paths_match_breadth_first_search(case in path_case(12, 10)) {
        let found = find_path(&case.grid, case.origin, case.destination, case.budget).map(|p| p.cost);
        let oracle = bfs_distance(&case.grid, case.origin, case.destination, case.budget);
        prop_assert_eq!(found, oracle);
    }

    #[test]
    fn test_search_is_repeatable(case in path_case(10, 8)) {
        let first = find_path(&case.grid, case.origin, case.destination, case.budget);
        let second = find_path(&case.grid, case.origin, case.destination, case.budget);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_reachable_cells_agree_with_oracle(case in path_case(8, 8)) {
        for (cell, cost) in reachable_cells(&case.grid, case.origin, case.budget) {
            prop_assert!(cost <= case.budget);
            prop_assert_eq!(bfs_distance(&case.grid, case.origin, cell, case.budget), Some(cost));
        }
    }
}

#[test]
fn test_zero_budget_never_leaves_origin() {
    let grid = BattleGrid::new(6, 6);
    assert!(find_path(&grid, GridPos::new(0, 0), GridPos::new(1, 0), 0).is_none());
    let stay = find_path(&grid, GridPos::new(2, 2), GridPos::new(2, 2), 0).unwrap();
    assert!(stay.is_stationary());
}

#[test]
fn test_kiting_increases_total_distance() {
    let mut grid = BattleGrid::new(10, 8);
    grid.set_terrain(GridPos::new(1, 3), Terrain::Blocked);
    let actor: CombatStack = warship(1, 3, 3).with_moves(3);
    let hostiles = [GridPos::new(5, 3), GridPos::new(5, 5)];
    let before: u32 = hostiles.iter().map(|h| actor.position.distance(*h)).sum();

    let path = find_safest_cell(&grid, &actor, &hostiles).unwrap();
    let after: u32 = hostiles.iter().map(|h| path.destination().distance(*h)).sum();
    assert!(after > before);
    assert!(path.cost <= 3);
}
