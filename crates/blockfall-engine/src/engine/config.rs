use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, core::Board};

use super::{difficulty::Difficulty, piece_generator::PieceSeed, speed::DEFAULT_BASE_INTERVAL};

/// How a locked WEIGHT piece crushes the rows under it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Empty only the row directly below the piece.
    #[display("single_row")]
    SingleRow,
    /// Empty every row below the piece.
    #[default]
    #[display("all_rows_below")]
    AllRowsBelow,
}

/// Settings of a [`GameEngine`](super::GameEngine).
///
/// Every field has a default, so a JSON config only needs the fields it changes:
///
/// ```
/// use blockfall_engine::{Difficulty, EngineConfig};
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "difficulty": "item" }"#).unwrap();
/// assert_eq!(config.difficulty, Difficulty::Item);
/// assert!(config.item_mode_enabled());
/// assert_eq!((config.width, config.height), (10, 20));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,
    pub difficulty: Difficulty,
    /// Overrides whether item pieces are generated; follows the difficulty when unset.
    pub item_mode: Option<bool>,
    pub weight_mode: WeightMode,
    pub base_interval_seconds: f64,
    /// Fixed piece-generation seed; random when unset.
    pub seed: Option<PieceSeed>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: Board::STANDARD_WIDTH,
            height: Board::STANDARD_HEIGHT,
            difficulty: Difficulty::default(),
            item_mode: None,
            weight_mode: WeightMode::default(),
            base_interval_seconds: DEFAULT_BASE_INTERVAL.as_secs_f64(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Default settings for the given game mode.
    #[must_use]
    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Whether item pieces are on, after the override.
    #[must_use]
    pub fn item_mode_enabled(&self) -> bool {
        self.item_mode.unwrap_or(self.difficulty.has_items())
    }

    /// The validated starting drop interval.
    pub fn base_interval(&self) -> Result<Duration, ConfigError> {
        drop_interval_from_seconds(self.base_interval_seconds)
    }

    /// Checks every field without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Board::new(self.width, self.height)?;
        self.base_interval()?;
        Ok(())
    }
}

/// Converts a drop interval in seconds, rejecting zero, negative and non-finite values.
pub fn drop_interval_from_seconds(seconds: f64) -> Result<Duration, ConfigError> {
    if seconds.is_nan() || seconds <= 0.0 {
        return Err(ConfigError::InvalidDropInterval { seconds });
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidDropInterval { seconds })
}
