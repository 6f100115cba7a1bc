//! Motion error types

use crate::tree::NodeId;
use blinc_animation::{AnimateError, KeyframeError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, scheduling or running animations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// A label was not found in the node's variant registry
    #[error("unknown variant '{label}'")]
    UnknownVariant { label: String },

    /// A property's `times` does not fit its keyframes
    #[error("invalid times for '{property}': {source}")]
    InvalidTimesSpec {
        property: String,
        #[source]
        source: KeyframeError,
    },

    /// The interpolator for one property failed
    #[error("animation of '{property}' failed: {source}")]
    PropertyAnimationFailed {
        property: String,
        #[source]
        source: AnimateError,
    },

    /// The animation was stopped before it completed
    #[error("animation cancelled before completion")]
    Cancelled,

    /// The node is not (or no longer) mounted
    #[error("node {0:?} is not mounted")]
    NodeNotFound(NodeId),
}

/// Errors loading a [`MotionConfig`](crate::config::MotionConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse motion config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for motion operations
pub type Result<T> = std::result::Result<T, MotionError>;
