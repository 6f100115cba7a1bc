//! Animation error types

use thiserror::Error;

/// Problems with a keyframe track or its `times` offsets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyframeError {
    /// A track needs at least one value
    #[error("keyframe track has no values")]
    Empty,

    /// `times` must have one entry per keyframe
    #[error("times has {found} entries but the track has {expected} keyframes")]
    TimesLength { expected: usize, found: usize },

    /// Offsets must never go backwards
    #[error("times entry {index} ({value}) is smaller than the previous entry")]
    Unordered { index: usize, value: f32 },

    /// Offsets are normalized progress values
    #[error("times entry {index} ({value}) is outside [0, 1]")]
    OutOfRange { index: usize, value: f32 },
}

/// Failure reported by a value animator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimateError {
    /// A keyframe value cannot be interpolated
    #[error("keyframe {index} has non-finite value {value}")]
    NonFinite { index: usize, value: f32 },

    #[error(transparent)]
    Keyframes(#[from] KeyframeError),

    /// Animator-specific failure
    #[error("{0}")]
    Other(String),
}
