//! Keyframe tracks
//!
//! A track is an ordered list of values paired with normalized offsets
//! (`times`). Without explicit offsets the keyframes are spaced evenly.
//! The easing applies to every segment between two neighbouring keyframes.

use crate::easing::Easing;
use crate::error::KeyframeError;
use smallvec::SmallVec;

/// Inline storage for keyframe values and offsets
pub type KeyframeValues = SmallVec<[f32; 4]>;

/// A sampled single-value keyframe track
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeTrack {
    values: KeyframeValues,
    times: KeyframeValues,
    easing: Easing,
}

impl KeyframeTrack {
    /// Create a track with evenly spaced keyframes and linear easing
    pub fn new(values: impl IntoIterator<Item = f32>) -> Result<Self, KeyframeError> {
        let values: KeyframeValues = values.into_iter().collect();
        if values.is_empty() {
            return Err(KeyframeError::Empty);
        }
        let times = equidistant_times(values.len());
        Ok(Self {
            values,
            times,
            easing: Easing::Linear,
        })
    }

    /// Replace the offsets of each keyframe
    pub fn with_times(mut self, times: &[f32]) -> Result<Self, KeyframeError> {
        validate_times(self.values.len(), times)?;
        self.times = times.iter().copied().collect();
        Ok(self)
    }

    /// Builder: set the per-segment easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// The value the track ends on
    pub fn last(&self) -> f32 {
        self.values[self.values.len() - 1]
    }

    /// The same track played with its values in reverse order
    pub fn mirrored(&self) -> Self {
        Self {
            values: self.values.iter().rev().copied().collect(),
            times: self.times.iter().rev().map(|t| 1.0 - t).collect(),
            easing: self.easing,
        }
    }

    /// Sample the track at a progress value (0.0 to 1.0)
    pub fn sample(&self, progress: f32) -> f32 {
        let progress = progress.clamp(0.0, 1.0);
        if self.values.len() == 1 || progress <= self.times[0] {
            return self.values[0];
        }

        for i in 0..self.values.len() - 1 {
            let (t0, t1) = (self.times[i], self.times[i + 1]);
            if progress > t1 {
                continue;
            }
            let span = t1 - t0;
            if span <= f32::EPSILON {
                return self.values[i + 1];
            }
            let local = (progress - t0) / span;
            let eased = self.easing.apply(local);
            let (v0, v1) = (self.values[i], self.values[i + 1]);
            return v0 + (v1 - v0) * eased;
        }

        self.last()
    }
}

/// Evenly spaced offsets for `count` keyframes
pub fn equidistant_times(count: usize) -> KeyframeValues {
    match count {
        0 => KeyframeValues::new(),
        1 => smallvec::smallvec![0.0],
        n => (0..n).map(|i| i as f32 / (n - 1) as f32).collect(),
    }
}

/// Check that `times` can drive a track of `count` keyframes
pub fn validate_times(count: usize, times: &[f32]) -> Result<(), KeyframeError> {
    if times.len() != count {
        return Err(KeyframeError::TimesLength {
            expected: count,
            found: times.len(),
        });
    }
    let mut previous = 0.0_f32;
    for (index, &value) in times.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(KeyframeError::OutOfRange { index, value });
        }
        if value < previous {
            return Err(KeyframeError::Unordered { index, value });
        }
        previous = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_place_middle_keyframe() {
        let track = KeyframeTrack::new([0.0, 5.0, 0.0])
            .unwrap()
            .with_times(&[0.0, 0.2, 1.0])
            .unwrap();

        assert_eq!(track.sample(0.0), 0.0);
        assert!((track.sample(0.1) - 2.5).abs() < 1e-4);
        assert_eq!(track.sample(0.2), 5.0);
        assert!((track.sample(0.6) - 2.5).abs() < 1e-4);
        assert_eq!(track.sample(1.0), 0.0);
    }

    #[test]
    fn test_equidistant_default() {
        let track = KeyframeTrack::new([0.0, 10.0, 20.0]).unwrap();
        assert_eq!(track.times(), &[0.0, 0.5, 1.0]);
        assert!((track.sample(0.25) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_times_length_mismatch_rejected() {
        let err = KeyframeTrack::new([0.0, 1.0, 2.0])
            .unwrap()
            .with_times(&[0.0, 1.0])
            .unwrap_err();
        assert_eq!(
            err,
            KeyframeError::TimesLength {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_unordered_and_out_of_range() {
        assert_eq!(
            validate_times(3, &[0.0, 0.6, 0.4]),
            Err(KeyframeError::Unordered {
                index: 2,
                value: 0.4
            })
        );
        assert_eq!(
            validate_times(2, &[0.0, 1.5]),
            Err(KeyframeError::OutOfRange {
                index: 1,
                value: 1.5
            })
        );
    }

    #[test]
    fn test_empty_track() {
        assert_eq!(
            KeyframeTrack::new(std::iter::empty()).unwrap_err(),
            KeyframeError::Empty
        );
    }

    #[test]
    fn test_mirrored_track() {
        let track = KeyframeTrack::new([0.0, 10.0])
            .unwrap()
            .with_times(&[0.0, 1.0])
            .unwrap();
        let mirrored = track.mirrored();
        assert_eq!(mirrored.values(), &[10.0, 0.0]);
        assert_eq!(mirrored.sample(0.0), 10.0);
        assert_eq!(mirrored.sample(1.0), 0.0);
    }
}
