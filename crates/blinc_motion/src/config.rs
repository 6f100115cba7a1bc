//! Motion engine configuration (motion.toml)

use crate::error::ConfigError;
use blinc_animation::Easing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level engine configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MotionConfig {
    /// Fallbacks for transition fields nobody set
    pub transition: TransitionDefaults,
    /// Number of events the journal keeps before dropping the oldest
    pub journal_capacity: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            transition: TransitionDefaults::default(),
            journal_capacity: default_journal_capacity(),
        }
    }
}

fn default_journal_capacity() -> usize {
    512
}

/// Default timing applied when a transition leaves a field unset
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TransitionDefaults {
    /// Seconds for a two-keyframe animation
    pub duration: f32,
    /// Seconds for an animation through three or more keyframes
    pub keyframes_duration: f32,
    pub easing: Easing,
}

impl Default for TransitionDefaults {
    fn default() -> Self {
        Self {
            duration: 0.3,
            keyframes_duration: 0.8,
            easing: Easing::EaseInOut,
        }
    }
}

impl MotionConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
