//! Target resolution
//!
//! Resolution happens in two steps. [`resolve`] turns a definition into one
//! concrete [`TargetDefinition`] by looking up labels. [`materialize`] runs
//! when the node's run actually starts: it reads live values to fill
//! placeholders and picks the timing for every property.

use crate::config::MotionConfig;
use crate::error::MotionError;
use crate::target::{TargetDefinition, TargetValue};
use crate::transition::Transition;
use crate::variant::{Custom, Definition, Variants};
use blinc_animation::{validate_times, KeyframeValues, ValueTransition};
use smallvec::SmallVec;
use tracing::warn;

/// Resolve a definition against a registry
///
/// Labels are merged left to right, so the last label wins for any property
/// or transition field defined more than once.
pub fn resolve(
    definition: &Definition,
    variants: &Variants,
    custom: Option<&Custom>,
) -> Result<TargetDefinition, MotionError> {
    match definition {
        Definition::Target(target) => Ok(target.clone()),
        Definition::Labels(labels) => {
            let mut resolved = TargetDefinition::default();
            for label in labels.iter() {
                let variant = variants
                    .get(label)
                    .ok_or_else(|| MotionError::UnknownVariant {
                        label: label.to_string(),
                    })?;
                resolved.merge(&variant.resolve(custom));
            }
            Ok(resolved)
        }
    }
}

/// One property ready for the runner
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTrack {
    pub property: String,
    pub keyframes: KeyframeValues,
    /// Seconds after the run starts before this property moves
    pub delay: f32,
    pub transition: ValueTransition,
}

/// Output of [`materialize`]
#[derive(Debug, Default)]
pub struct Materialized {
    pub tracks: Vec<ResolvedTrack>,
    /// Configuration problems that were worked around
    pub diagnostics: Vec<MotionError>,
}

/// Build per-property tracks using the live values at this moment
pub fn materialize<F>(
    definition: &TargetDefinition,
    transition: &Transition,
    config: &MotionConfig,
    live: F,
) -> Materialized
where
    F: Fn(&str) -> Option<f32>,
{
    let mut out = Materialized::default();
    let defaults = &config.transition;

    for (property, value) in definition.target.iter() {
        let current = live(property);
        let keyframes: KeyframeValues = match value {
            TargetValue::Current => continue,
            TargetValue::Value(v) => smallvec::smallvec![current.unwrap_or(*v), *v],
            TargetValue::Keyframes(entries) => match fill_placeholders(entries, current) {
                Some(keyframes) => keyframes,
                None => continue,
            },
        };

        let timing = transition.for_property(property);
        let mut times = timing.times.clone();
        if let Some(offsets) = &times {
            if let Err(source) = validate_times(keyframes.len(), offsets) {
                warn!(
                    "Ignoring times for '{}', falling back to even spacing: {}",
                    property, source
                );
                out.diagnostics.push(MotionError::InvalidTimesSpec {
                    property: property.to_string(),
                    source,
                });
                times = None;
            }
        }

        let duration = timing.duration.unwrap_or(if keyframes.len() > 2 {
            defaults.keyframes_duration
        } else {
            defaults.duration
        });

        out.tracks.push(ResolvedTrack {
            property: property.to_string(),
            delay: timing.delay.unwrap_or(0.0).max(0.0),
            transition: ValueTransition {
                duration: duration.max(0.0),
                easing: timing.easing.unwrap_or(defaults.easing),
                times: times.map(|t| t.into_iter().collect()),
                repeat: timing.repeat.unwrap_or_default(),
                repeat_type: timing.repeat_type.unwrap_or_default(),
                repeat_delay: timing.repeat_delay.unwrap_or(0.0),
            },
            keyframes,
        });
    }

    out
}

/// The values a definition ends on, for instant application
pub fn final_values<F>(definition: &TargetDefinition, live: F) -> Vec<(String, f32)>
where
    F: Fn(&str) -> Option<f32>,
{
    let mut values = Vec::with_capacity(definition.target.len());
    for (property, value) in definition.target.iter() {
        let end = match value {
            TargetValue::Value(v) => Some(*v),
            TargetValue::Keyframes(entries) => entries
                .last()
                .copied()
                .flatten()
                .or_else(|| live(property)),
            TargetValue::Current => None,
        };
        if let Some(end) = end {
            values.push((property.to_string(), end));
        }
    }
    values.extend(
        definition
            .transition_end
            .iter()
            .map(|(property, value)| (property.clone(), *value)),
    );
    values
}

/// Replace `None` entries with the live value
///
/// Without a live value the first concrete keyframe stands in. Returns `None`
/// when there is nothing concrete to animate between.
fn fill_placeholders(entries: &[Option<f32>], live: Option<f32>) -> Option<KeyframeValues> {
    let fallback = live.or_else(|| entries.iter().flatten().next().copied())?;
    let filled: SmallVec<[f32; 4]> = entries.iter().map(|e| e.unwrap_or(fallback)).collect();
    (!filled.is_empty()).then_some(filled)
}
