//! Test fixtures and helpers.
//!
//! Stock weapons and stack configurations for consistent testing.

use fixed::types::I32F32;
use tactics_core::grid::GridPos;
use tactics_core::stack::{
    Capabilities, CombatStack, EmpireId, SpecialWeapon, StackRole, WeaponKind, WeaponSlot,
};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: decision code never uses floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Short-range beam weapon.
#[must_use]
pub fn laser(range: u32) -> WeaponSlot {
    WeaponSlot::new("Laser", WeaponKind::Beam, range, (1, 4))
}

/// Missile rack with the given range and fuel.
#[must_use]
pub fn missile(range: u32, speed: u32) -> WeaponSlot {
    WeaponSlot::new("Nuclear Missile", WeaponKind::Missile { speed }, range, (4, 4))
}

/// Ground bomb.
#[must_use]
pub fn bomb() -> WeaponSlot {
    WeaponSlot::new("Fusion Bomb", WeaponKind::Bomb, 1, (4, 16))
}

/// Stand-off projector.
#[must_use]
pub fn repulsor() -> WeaponSlot {
    WeaponSlot::new("Repulsor Beam", WeaponKind::Special(SpecialWeapon::Repulsor), 1, (0, 0))
}

/// Crowd-control special.
#[must_use]
pub fn stasis_field() -> WeaponSlot {
    WeaponSlot::new("Stasis Field", WeaponKind::Special(SpecialWeapon::Stasis), 1, (0, 0))
}

/// Offensive special.
#[must_use]
pub fn stream_projector() -> WeaponSlot {
    WeaponSlot::new("Stream Projector", WeaponKind::Special(SpecialWeapon::Offensive), 2, (0, 0))
}

/// Armed warship stack of one unit with a range-1 laser.
#[must_use]
pub fn warship(owner: u32, x: i32, y: i32) -> CombatStack {
    CombatStack::ship("Warship", EmpireId(owner), 1, 10, fixed(20))
        .at(GridPos::new(x, y))
        .with_moves(2)
        .with_weapon(laser(1))
}

/// Unarmed colony ship.
#[must_use]
pub fn colony_ship(owner: u32, x: i32, y: i32) -> CombatStack {
    let mut stack = CombatStack::ship("Colony Ship", EmpireId(owner), 1, 5, fixed(30))
        .at(GridPos::new(x, y))
        .with_moves(1);
    stack.role = StackRole::Ship { colony_ship: true };
    stack
}

/// Planetary defense installation.
#[must_use]
pub fn colony(owner: u32, x: i32, y: i32, population: i32) -> CombatStack {
    CombatStack::colony("Colony", EmpireId(owner), fixed(population), 100, fixed(200)).at(GridPos::new(x, y))
}

/// Stack that projects a stand-off zone of `radius`.
#[must_use]
pub fn fortress(owner: u32, x: i32, y: i32, radius: u32) -> CombatStack {
    warship(owner, x, y)
        .with_weapon(repulsor())
        .with_capabilities(Capabilities {
            repulsor_radius: radius,
            retreat: true,
            ..Capabilities::default()
        })
}
