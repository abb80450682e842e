//! Tuning constants for a simulation run.
//!
//! Everything a designer might want to tweak lives here rather than in the
//! behaviours. Decimal values are written as plain numbers in RON files and
//! converted to fixed-point on load.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticalError};
use crate::math::{fixed_decimal, Fixed};
use crate::unit::STAT_CEILING;

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the random source.
    pub seed: u64,
    /// Whether tile costs affect movement speed.
    pub terrain_effects: bool,
    /// Upper end of the stat scale.
    pub max_stat_score: u32,
    /// Distance within which units can attack, in tiles.
    #[serde(with = "fixed_decimal")]
    pub engagement_range: Fixed,
    /// How far inside the engagement range a fighter backs off, in tiles.
    #[serde(with = "fixed_decimal")]
    pub reposition_margin: Fixed,
    /// Seconds a rest lasts.
    #[serde(with = "fixed_decimal")]
    pub rest_duration: Fixed,
    /// HP restored by each completed rest.
    pub rest_recovery: u32,
    /// Seconds a unit waits after teleporting.
    #[serde(with = "fixed_decimal")]
    pub teleport_cooldown: Fixed,
    /// Random tiles tried before a teleport gives up.
    pub teleport_attempts: u32,
    /// Attack cooldown is this many seconds divided by dexterity.
    #[serde(with = "fixed_decimal")]
    pub attack_tempo: Fixed,
    /// Fraction of the max stat score a looter's greed is compared against
    /// when allies already head for the same pile.
    #[serde(with = "fixed_decimal")]
    pub loot_greed_fraction: Fixed,
    /// Flee window in seconds for a unit of maximum bravery. Scales inversely
    /// with bravery.
    #[serde(with = "fixed_decimal")]
    pub flee_recovery_time: Fixed,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            terrain_effects: true,
            max_stat_score: 100,
            engagement_range: Fixed::from_num(1.5),
            reposition_margin: Fixed::from_num(2),
            rest_duration: Fixed::ONE,
            rest_recovery: 1,
            teleport_cooldown: Fixed::from_num(2),
            teleport_attempts: 64,
            attack_tempo: Fixed::from_num(50),
            loot_greed_fraction: Fixed::from_num(0.7),
            flee_recovery_time: Fixed::from_num(5),
        }
    }
}

impl SimConfig {
    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable terrain costs.
    #[must_use]
    pub fn with_terrain_effects(mut self, enabled: bool) -> Self {
        self.terrain_effects = enabled;
        self
    }

    /// Set the teleport retry cap.
    #[must_use]
    pub fn with_teleport_attempts(mut self, attempts: u32) -> Self {
        self.teleport_attempts = attempts;
        self
    }

    /// Check values the rules divide by or scale with.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::InvalidConfig`] if `max_stat_score` is zero
    /// or above [`STAT_CEILING`].
    pub fn validate(&self) -> Result<()> {
        if self.max_stat_score == 0 || self.max_stat_score > STAT_CEILING {
            return Err(TacticalError::InvalidConfig(format!(
                "max_stat_score must be in 1..={STAT_CEILING}, got {}",
                self.max_stat_score
            )));
        }
        Ok(())
    }

    /// Max stat score as a fixed-point number.
    #[must_use]
    pub fn max_stat(&self) -> Fixed {
        Fixed::from_num(self.max_stat_score)
    }
}
