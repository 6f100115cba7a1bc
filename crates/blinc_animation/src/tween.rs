//! Value animators
//!
//! The orchestration layer never interpolates values on its own. It passes a
//! keyframe list and a [`ValueTransition`] to a [`ValueAnimator`]. It then
//! samples the returned [`ValueAnimation`] once per frame with the time
//! elapsed since the animation started. Sampling by elapsed time means that
//! sampling the same frame twice gives the same value.

use crate::easing::Easing;
use crate::error::AnimateError;
use crate::keyframe::{KeyframeTrack, KeyframeValues};
use serde::{Deserialize, Serialize};

/// How many extra times an animation plays after the first pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Repeat {
    Count(u32),
    Infinite,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Count(0)
    }
}

/// What each repetition does with the keyframes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatType {
    /// Start over from the first keyframe
    #[default]
    Loop,
    /// Play every other pass backwards in time
    Reverse,
    /// Play every other pass with the keyframes swapped end to end
    Mirror,
}

/// Fully resolved timing for a single value
#[derive(Clone, Debug, PartialEq)]
pub struct ValueTransition {
    /// Seconds for one pass through the keyframes
    pub duration: f32,
    pub easing: Easing,
    /// Normalized keyframe offsets, `None` for even spacing
    pub times: Option<KeyframeValues>,
    pub repeat: Repeat,
    pub repeat_type: RepeatType,
    /// Seconds to hold between passes
    pub repeat_delay: f32,
}

impl Default for ValueTransition {
    fn default() -> Self {
        Self {
            duration: 0.3,
            easing: Easing::default(),
            times: None,
            repeat: Repeat::default(),
            repeat_type: RepeatType::default(),
            repeat_delay: 0.0,
        }
    }
}

/// One sampled frame of a value animation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub value: f32,
    pub finished: bool,
}

/// Creates per-value animations
pub trait ValueAnimator {
    fn animate(
        &self,
        keyframes: &[f32],
        transition: &ValueTransition,
    ) -> Result<Box<dyn ValueAnimation>, AnimateError>;
}

/// A running per-value animation
pub trait ValueAnimation {
    /// Sample the animation `elapsed` seconds after it started
    fn sample(&mut self, elapsed: f32) -> Result<Frame, AnimateError>;
}

/// Duration-based keyframe animator
#[derive(Clone, Copy, Debug, Default)]
pub struct TweenAnimator;

impl ValueAnimator for TweenAnimator {
    fn animate(
        &self,
        keyframes: &[f32],
        transition: &ValueTransition,
    ) -> Result<Box<dyn ValueAnimation>, AnimateError> {
        if let Some((index, &value)) = keyframes.iter().enumerate().find(|(_, v)| !v.is_finite())
        {
            tracing::debug!("Rejecting keyframe {} with non-finite value {}", index, value);
            return Err(AnimateError::NonFinite { index, value });
        }

        let mut track = KeyframeTrack::new(keyframes.iter().copied())?.with_easing(transition.easing);
        if let Some(times) = &transition.times {
            track = track.with_times(times)?;
        }

        Ok(Box::new(Tween::new(track, transition)))
    }
}

/// A keyframe track played over time with optional repeats
#[derive(Clone, Debug)]
pub struct Tween {
    track: KeyframeTrack,
    mirrored: Option<KeyframeTrack>,
    duration: f32,
    repeat: Repeat,
    repeat_type: RepeatType,
    repeat_delay: f32,
}

impl Tween {
    pub fn new(track: KeyframeTrack, transition: &ValueTransition) -> Self {
        let mirrored = (transition.repeat_type == RepeatType::Mirror).then(|| track.mirrored());
        Self {
            track,
            mirrored,
            duration: transition.duration.max(0.0),
            repeat: transition.repeat,
            repeat_type: transition.repeat_type,
            repeat_delay: transition.repeat_delay.max(0.0),
        }
    }

    /// Total playing time, `None` when repeating forever
    pub fn total_duration(&self) -> Option<f32> {
        match self.repeat {
            Repeat::Count(n) => Some(self.duration * (n + 1) as f32 + self.repeat_delay * n as f32),
            Repeat::Infinite => None,
        }
    }

    /// Value at `elapsed` seconds after the start
    pub fn value_at(&self, elapsed: f32) -> Frame {
        let elapsed = elapsed.max(0.0);

        if self.duration <= 0.0 {
            let passes = match self.repeat {
                Repeat::Count(n) => n,
                Repeat::Infinite => 0,
            };
            return Frame {
                value: self.sample_pass(passes, 1.0),
                finished: true,
            };
        }

        if let (Some(total), Repeat::Count(n)) = (self.total_duration(), self.repeat) {
            if elapsed >= total {
                return Frame {
                    value: self.sample_pass(n, 1.0),
                    finished: true,
                };
            }
        }

        let period = self.duration + self.repeat_delay;
        let pass = (elapsed / period).floor();
        let local = elapsed - pass * period;
        let progress = (local / self.duration).min(1.0);

        Frame {
            value: self.sample_pass(pass as u32, progress),
            finished: false,
        }
    }

    fn sample_pass(&self, pass: u32, progress: f32) -> f32 {
        let odd = pass % 2 == 1;
        match (self.repeat_type, odd, &self.mirrored) {
            (RepeatType::Reverse, true, _) => self.track.sample(1.0 - progress),
            (RepeatType::Mirror, true, Some(mirrored)) => mirrored.sample(progress),
            _ => self.track.sample(progress),
        }
    }
}

impl ValueAnimation for Tween {
    fn sample(&mut self, elapsed: f32) -> Result<Frame, AnimateError> {
        Ok(self.value_at(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(duration: f32) -> ValueTransition {
        ValueTransition {
            duration,
            easing: Easing::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn test_times_hit_keyframe_at_offset() {
        let transition = ValueTransition {
            times: Some(smallvec::smallvec![0.0, 0.2, 1.0]),
            ..linear(2.0)
        };
        let mut anim = TweenAnimator.animate(&[0.0, 5.0, 0.0], &transition).unwrap();

        let at_fifth = anim.sample(0.4).unwrap();
        assert!((at_fifth.value - 5.0).abs() < 1e-4);
        assert!(!at_fifth.finished);

        let end = anim.sample(2.0).unwrap();
        assert_eq!(end.value, 0.0);
        assert!(end.finished);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let mut anim = TweenAnimator.animate(&[3.0, 9.0], &linear(0.0)).unwrap();
        assert_eq!(
            anim.sample(0.0).unwrap(),
            Frame {
                value: 9.0,
                finished: true
            }
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = TweenAnimator
            .animate(&[0.0, f32::NAN], &linear(1.0))
            .err()
            .unwrap();
        assert!(matches!(err, AnimateError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn test_bad_times_rejected() {
        let transition = ValueTransition {
            times: Some(smallvec::smallvec![0.0, 1.0]),
            ..linear(1.0)
        };
        assert!(TweenAnimator.animate(&[0.0, 1.0, 2.0], &transition).is_err());
    }

    #[test]
    fn test_reverse_repeat() {
        let transition = ValueTransition {
            repeat: Repeat::Count(1),
            repeat_type: RepeatType::Reverse,
            ..linear(1.0)
        };
        let tween = Tween::new(KeyframeTrack::new([0.0, 10.0]).unwrap(), &transition);

        assert!((tween.value_at(0.5).value - 5.0).abs() < 1e-4);
        assert!((tween.value_at(1.25).value - 7.5).abs() < 1e-4);
        let end = tween.value_at(2.0);
        assert!(end.finished);
        assert_eq!(end.value, 0.0);
    }

    #[test]
    fn test_mirror_repeat_with_delay() {
        let transition = ValueTransition {
            repeat: Repeat::Count(1),
            repeat_type: RepeatType::Mirror,
            repeat_delay: 0.5,
            ..linear(1.0)
        };
        let tween = Tween::new(KeyframeTrack::new([0.0, 10.0]).unwrap(), &transition);

        // Holding at the end of the first pass during the repeat delay
        assert_eq!(tween.value_at(1.2).value, 10.0);
        assert_eq!(tween.total_duration(), Some(2.5));
        assert_eq!(tween.value_at(2.5).value, 0.0);
    }

    #[test]
    fn test_infinite_never_finishes() {
        let transition = ValueTransition {
            repeat: Repeat::Infinite,
            ..linear(0.5)
        };
        let tween = Tween::new(KeyframeTrack::new([0.0, 1.0]).unwrap(), &transition);
        assert!(!tween.value_at(1000.25).finished);
    }
}
