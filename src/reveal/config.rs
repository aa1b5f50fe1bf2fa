//! Pacing configuration.
//!
//! Two knobs control the pace:
//!
//! - **Stack time**: total budget to reveal one newly arrived batch.
//! - **Max word time**: cap on the delay of any single part.
//!
//! The per-part delay of a batch of `D` parts is
//! `min(max_word_time, stack_time / D)`. Disabled animation, or a
//! non-positive knob, makes the delay zero (immediate reveal).

use crate::error::RevealError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named pacing presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationSpeed {
    /// Comfortable reading pace.
    #[default]
    Normal,
    /// Half the budgets of `Normal`.
    Fast,
    /// Reveal everything as soon as it arrives.
    Disabled,
}

/// Configuration for the reveal scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Total time budget to reveal one batch, in milliseconds.
    pub stack_time_ms: i64,
    /// Upper bound on one part's reveal delay, in milliseconds.
    pub max_word_time_ms: i64,
    /// Reveal every part immediately.
    pub animation_disabled: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self::preset(AnimationSpeed::Normal)
    }
}

impl RevealConfig {
    /// Stack time of the `Normal` preset.
    pub const NORMAL_STACK_TIME_MS: i64 = 500;
    /// Max word time of the `Normal` preset.
    pub const NORMAL_MAX_WORD_TIME_MS: i64 = 50;

    /// Create a config with explicit knobs and animation enabled.
    pub const fn new(stack_time_ms: i64, max_word_time_ms: i64) -> Self {
        Self {
            stack_time_ms,
            max_word_time_ms,
            animation_disabled: false,
        }
    }

    /// Config for a named preset.
    pub const fn preset(speed: AnimationSpeed) -> Self {
        match speed {
            AnimationSpeed::Normal => {
                Self::new(Self::NORMAL_STACK_TIME_MS, Self::NORMAL_MAX_WORD_TIME_MS)
            }
            AnimationSpeed::Fast => Self::new(
                Self::NORMAL_STACK_TIME_MS / 2,
                Self::NORMAL_MAX_WORD_TIME_MS / 2,
            ),
            AnimationSpeed::Disabled => Self {
                stack_time_ms: Self::NORMAL_STACK_TIME_MS,
                max_word_time_ms: Self::NORMAL_MAX_WORD_TIME_MS,
                animation_disabled: true,
            },
        }
    }

    /// Config with animation turned off.
    pub const fn disabled() -> Self {
        Self::preset(AnimationSpeed::Disabled)
    }

    /// Parse a config from TOML.
    ///
    /// Accepts either explicit knobs or a `speed` preset; explicit knobs
    /// override the preset.
    ///
    /// ```toml
    /// speed = "fast"
    /// max_word_time_ms = 40
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, RevealError> {
        let doc: ConfigDocument = toml::from_str(source)?;
        let mut config = Self::preset(doc.speed.unwrap_or_default());
        if let Some(stack) = doc.stack_time_ms {
            config.stack_time_ms = stack;
        }
        if let Some(word) = doc.max_word_time_ms {
            config.max_word_time_ms = word;
        }
        if let Some(disabled) = doc.animation_disabled {
            config.animation_disabled = disabled;
        }
        Ok(config)
    }

    /// Whether this config reveals immediately.
    pub const fn is_instant(&self) -> bool {
        self.animation_disabled || self.stack_time_ms <= 0 || self.max_word_time_ms <= 0
    }

    /// Delay between consecutive reveals for a batch of `batch_len` parts.
    ///
    /// Returns [`Duration::ZERO`] for an empty batch or an instant config.
    pub fn per_part_time(&self, batch_len: usize) -> Duration {
        if batch_len == 0 || self.is_instant() {
            return Duration::ZERO;
        }

        let stack = Duration::from_millis(self.stack_time_ms.unsigned_abs());
        let max_word = Duration::from_millis(self.max_word_time_ms.unsigned_abs());
        let divisor = u32::try_from(batch_len).unwrap_or(u32::MAX);

        max_word.min(stack / divisor)
    }
}

/// On-disk shape: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    speed: Option<AnimationSpeed>,
    stack_time_ms: Option<i64>,
    max_word_time_ms: Option<i64>,
    animation_disabled: Option<bool>,
}
