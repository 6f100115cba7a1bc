//! Blinc Animation System
//!
//! Per-value interpolation used by the motion orchestrator.
//!
//! # Features
//!
//! - **Easing**: CSS beziers plus circular, back and anticipate curves
//! - **Keyframe Tracks**: multi-value tracks with optional `times` offsets
//! - **Tweens**: duration-based animators with loop, reverse and mirror repeats

pub mod easing;
pub mod error;
pub mod keyframe;
pub mod tween;

pub use easing::Easing;
pub use error::{AnimateError, KeyframeError};
pub use keyframe::{equidistant_times, validate_times, KeyframeTrack, KeyframeValues};
pub use tween::{
    Frame, Repeat, RepeatType, Tween, TweenAnimator, ValueAnimation, ValueAnimator,
    ValueTransition,
};
