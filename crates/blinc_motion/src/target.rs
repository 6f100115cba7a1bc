//! Animation targets

use crate::transition::Transition;
use indexmap::IndexMap;
use smallvec::SmallVec;

/// What a single property should animate to
#[derive(Clone, Debug, PartialEq)]
pub enum TargetValue {
    /// Animate from the live value to this value
    Value(f32),
    /// Animate through keyframes; `None` entries stand for the live value
    Keyframes(SmallVec<[Option<f32>; 4]>),
    /// Leave the property where it is
    Current,
}

impl TargetValue {
    pub fn keyframes(values: impl IntoIterator<Item = Option<f32>>) -> Self {
        TargetValue::Keyframes(values.into_iter().collect())
    }
}

impl From<f32> for TargetValue {
    fn from(value: f32) -> Self {
        TargetValue::Value(value)
    }
}

impl From<Vec<f32>> for TargetValue {
    fn from(values: Vec<f32>) -> Self {
        TargetValue::Keyframes(values.into_iter().map(Some).collect())
    }
}

/// Property name to target value, in insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationTarget {
    values: IndexMap<String, TargetValue>,
}

impl AnimationTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a property target
    pub fn with(mut self, property: impl Into<String>, value: impl Into<TargetValue>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    /// Builder: set a keyframe sequence, `None` meaning "current value"
    pub fn keyframes(
        mut self,
        property: impl Into<String>,
        values: impl IntoIterator<Item = Option<f32>>,
    ) -> Self {
        self.values
            .insert(property.into(), TargetValue::keyframes(values));
        self
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<TargetValue>) {
        self.values.insert(property.into(), value.into());
    }

    pub fn get(&self, property: &str) -> Option<&TargetValue> {
        self.values.get(property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Layer `other` on top; its properties replace ours
    pub fn merge(&mut self, other: &AnimationTarget) {
        for (property, value) in &other.values {
            self.values.insert(property.clone(), value.clone());
        }
    }
}

/// A concrete target with the transition used to reach it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetDefinition {
    pub target: AnimationTarget,
    pub transition: Option<Transition>,
    /// Values applied instantly once the animation completes
    pub transition_end: IndexMap<String, f32>,
}

impl TargetDefinition {
    pub fn new(target: AnimationTarget) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_transition_end(mut self, property: impl Into<String>, value: f32) -> Self {
        self.transition_end.insert(property.into(), value);
        self
    }

    /// Nothing to animate and nothing to apply
    pub fn is_empty(&self) -> bool {
        self.target.is_empty() && self.transition_end.is_empty()
    }

    /// Layer `other` on top; last writer wins per property and per field
    pub fn merge(&mut self, other: &TargetDefinition) {
        self.target.merge(&other.target);
        if let Some(transition) = &other.transition {
            self.transition
                .get_or_insert_with(Transition::default)
                .merge(transition);
        }
        for (property, value) in &other.transition_end {
            self.transition_end.insert(property.clone(), *value);
        }
    }
}

impl From<AnimationTarget> for TargetDefinition {
    fn from(target: AnimationTarget) -> Self {
        TargetDefinition::new(target)
    }
}
