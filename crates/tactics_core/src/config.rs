//! Tuning constants for the tactical AI.
//!
//! Defaults reproduce the stock behaviour; scenarios may override any of
//! them through RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::math::{decimal_serde, Fixed};

/// How commands are applied to the Combat Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionMode {
    /// Batch / auto-resolve: moves jump straight to their destination and
    /// manually controlled stacks are played by the AI too.
    #[default]
    Auto,
    /// Interactive: moves are applied one cell at a time and manually
    /// controlled stacks are left to the player.
    Interactive,
}

/// Tactical AI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Numerator of the range multiplier `range_weight / distance`.
    #[serde(with = "decimal_serde")]
    pub range_weight: Fixed,
    /// Largest movement-adjusted distance at which missiles are fired in
    /// the second firing phase.
    pub missile_close_range: u32,
    /// Threat ratio above which a stack disengages.
    #[serde(with = "decimal_serde")]
    pub retreat_threshold: Fixed,
    /// Command application mode.
    pub resolution: ResolutionMode,
    /// Hard cap on turn-loop iterations. `None` derives the cap from the
    /// stack's weapon count and the grid size.
    pub max_turn_iterations: Option<u32>,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            range_weight: Fixed::from_num(10),
            missile_close_range: 2,
            retreat_threshold: Fixed::ONE,
            resolution: ResolutionMode::Auto,
            max_turn_iterations: None,
        }
    }
}

impl TacticsConfig {
    /// Parse a config from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::ConfigParse`] on malformed input.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| TacticsError::ConfigParse(e.to_string()))
    }

    /// Load a config from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::ConfigParse`] if the file cannot be read or
    /// parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TacticsError::ConfigParse(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&contents)
    }

    /// Builder-style resolution mode override.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = resolution;
        self
    }

    /// Iteration cap for a stack with `weapon_slots` slots on a grid of
    /// `grid_diameter`.
    #[must_use]
    pub fn iteration_cap(&self, weapon_slots: usize, grid_diameter: u32) -> u32 {
        self.max_turn_iterations
            .unwrap_or(weapon_slots as u32 + grid_diameter + 1)
            .max(1)
    }
}
