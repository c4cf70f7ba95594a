//! Match configuration.
//!
//! A flat record of caps and counts. Callers usually supply a
//! [`PartialGameConfig`] (for example parsed from JSON) and merge it over the
//! defaults.

use crate::error::{EngineError, EngineResult};
use rocket::serde::json::serde_json;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

pub const DEFAULT_INITIAL_DICE_COUNT: usize = 8;
pub const DEFAULT_INITIAL_HANDS_COUNT: usize = 5;
pub const DEFAULT_MAX_DICE_COUNT: usize = 16;
pub const DEFAULT_MAX_HANDS_COUNT: usize = 10;
pub const DEFAULT_MAX_ROUNDS_COUNT: u32 = 15;
pub const DEFAULT_MAX_SUMMONS_COUNT: usize = 4;
pub const DEFAULT_MAX_SUPPORTS_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct GameConfig {
    pub initial_dice_count: usize,
    pub initial_hands_count: usize,
    pub max_dice_count: usize,
    pub max_hands_count: usize,
    pub max_rounds_count: u32,
    pub max_summons_count: usize,
    pub max_supports_count: usize,
    pub random_seed: u64,
}

impl GameConfig {
    /// Defaults with an explicit seed, handy for reproducible matches.
    pub fn with_seed(random_seed: u64) -> Self {
        GameConfig {
            initial_dice_count: DEFAULT_INITIAL_DICE_COUNT,
            initial_hands_count: DEFAULT_INITIAL_HANDS_COUNT,
            max_dice_count: DEFAULT_MAX_DICE_COUNT,
            max_hands_count: DEFAULT_MAX_HANDS_COUNT,
            max_rounds_count: DEFAULT_MAX_ROUNDS_COUNT,
            max_summons_count: DEFAULT_MAX_SUMMONS_COUNT,
            max_supports_count: DEFAULT_MAX_SUPPORTS_COUNT,
            random_seed,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::with_seed(rand::random::<u64>())
    }
}

/// Every field optional; absent fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", default)]
pub struct PartialGameConfig {
    pub initial_dice_count: Option<usize>,
    pub initial_hands_count: Option<usize>,
    pub max_dice_count: Option<usize>,
    pub max_hands_count: Option<usize>,
    pub max_rounds_count: Option<u32>,
    pub max_summons_count: Option<usize>,
    pub max_supports_count: Option<usize>,
    pub random_seed: Option<u64>,
}

impl PartialGameConfig {
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::data(format!("invalid config: {}", e)))
    }

    pub fn merge_with_default(self) -> GameConfig {
        let seed = self.random_seed.unwrap_or_else(rand::random::<u64>);
        let base = GameConfig::with_seed(seed);
        GameConfig {
            initial_dice_count: self.initial_dice_count.unwrap_or(base.initial_dice_count),
            initial_hands_count: self
                .initial_hands_count
                .unwrap_or(base.initial_hands_count),
            max_dice_count: self.max_dice_count.unwrap_or(base.max_dice_count),
            max_hands_count: self.max_hands_count.unwrap_or(base.max_hands_count),
            max_rounds_count: self.max_rounds_count.unwrap_or(base.max_rounds_count),
            max_summons_count: self.max_summons_count.unwrap_or(base.max_summons_count),
            max_supports_count: self.max_supports_count.unwrap_or(base.max_supports_count),
            random_seed: seed,
        }
    }
}

/// Per-player switches that relax the rules, mostly for testing and sandboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", default)]
pub struct PlayerConfig {
    /// Every rolled die comes up Omni.
    pub always_omni: bool,
    /// Elemental tuning may spend any die, including Omni.
    pub allow_tuning_any_dice: bool,
}
