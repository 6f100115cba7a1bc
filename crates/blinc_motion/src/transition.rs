//! Transition specifications
//!
//! A [`Transition`] describes how a target is reached: per-value timing
//! (easing, duration, delay, keyframe offsets, repeats) and orchestration of
//! the node's variant children (`when`, `delay_children`, `stagger_children`).
//! Every field is optional so that transitions from several sources can be
//! layered with [`Transition::merge`]; unset fields fall back to
//! [`TransitionDefaults`](crate::config::TransitionDefaults).

use blinc_animation::{Easing, Repeat, RepeatType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordering of a node's own animation relative to its children
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum When {
    /// Node and children start together
    #[default]
    Simultaneous,
    /// Children are dispatched once the node's own animation completes
    BeforeChildren,
    /// The node starts once every child subtree has completed
    AfterChildren,
}

/// Order in which staggered children start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaggerDirection {
    /// First child to last
    #[default]
    Forward,
    /// Last child to first
    Reverse,
    /// Middle child first, spreading outward
    FromCenter,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Transition {
    pub easing: Option<Easing>,
    /// Seconds
    pub duration: Option<f32>,
    /// Seconds before the value starts moving
    pub delay: Option<f32>,
    /// Normalized keyframe offsets
    pub times: Option<Vec<f32>>,
    pub repeat: Option<Repeat>,
    pub repeat_type: Option<RepeatType>,
    pub repeat_delay: Option<f32>,

    pub when: Option<When>,
    pub delay_children: Option<f32>,
    pub stagger_children: Option<f32>,
    pub stagger_direction: Option<StaggerDirection>,
    /// Children past this index share the last stagger slot
    pub stagger_limit: Option<usize>,

    /// Overrides for individual properties
    pub properties: IndexMap<String, Transition>,
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.delay = Some(seconds);
        self
    }

    pub fn times(mut self, times: impl Into<Vec<f32>>) -> Self {
        self.times = Some(times.into());
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn repeat_type(mut self, repeat_type: RepeatType) -> Self {
        self.repeat_type = Some(repeat_type);
        self
    }

    pub fn repeat_delay(mut self, seconds: f32) -> Self {
        self.repeat_delay = Some(seconds);
        self
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }

    pub fn delay_children(mut self, seconds: f32) -> Self {
        self.delay_children = Some(seconds);
        self
    }

    pub fn stagger_children(mut self, seconds: f32) -> Self {
        self.stagger_children = Some(seconds);
        self
    }

    pub fn stagger_direction(mut self, direction: StaggerDirection) -> Self {
        self.stagger_direction = Some(direction);
        self
    }

    pub fn stagger_limit(mut self, limit: usize) -> Self {
        self.stagger_limit = Some(limit);
        self
    }

    /// Override timing for a single property
    pub fn property(mut self, name: impl Into<String>, transition: Transition) -> Self {
        self.properties.insert(name.into(), transition);
        self
    }

    /// Layer `other` on top of `self`; fields set in `other` win
    pub fn merge(&mut self, other: &Transition) {
        fn take<T: Clone>(slot: &mut Option<T>, over: &Option<T>) {
            if over.is_some() {
                slot.clone_from(over);
            }
        }

        take(&mut self.easing, &other.easing);
        take(&mut self.duration, &other.duration);
        take(&mut self.delay, &other.delay);
        take(&mut self.times, &other.times);
        take(&mut self.repeat, &other.repeat);
        take(&mut self.repeat_type, &other.repeat_type);
        take(&mut self.repeat_delay, &other.repeat_delay);
        take(&mut self.when, &other.when);
        take(&mut self.delay_children, &other.delay_children);
        take(&mut self.stagger_children, &other.stagger_children);
        take(&mut self.stagger_direction, &other.stagger_direction);
        take(&mut self.stagger_limit, &other.stagger_limit);

        for (name, transition) in &other.properties {
            self.properties
                .entry(name.clone())
                .or_default()
                .merge(transition);
        }
    }

    /// The effective transition for one property, overrides applied
    pub fn for_property(&self, name: &str) -> Transition {
        let mut base = Transition {
            properties: IndexMap::new(),
            ..self.clone()
        };
        if let Some(overrides) = self.properties.get(name) {
            base.merge(overrides);
            base.properties.clear();
        }
        base
    }
}
