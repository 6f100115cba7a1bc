//! Node props
//!
//! What a node is given when it is mounted, and what `animate` can be set to
//! afterwards.

use crate::controls::AnimationControls;
use crate::target::{AnimationTarget, TargetDefinition};
use crate::transition::Transition;
use crate::variant::{Custom, Definition, Labels, Variants};
use std::rc::Rc;

/// A node's explicit animate prop
#[derive(Clone, Debug, PartialEq)]
pub enum Animate {
    /// Animate to this definition whenever it changes
    Definition(Definition),
    /// Animate only when the controls are told to
    Controls(AnimationControls),
}

impl Animate {
    pub fn definition(&self) -> Option<&Definition> {
        match self {
            Animate::Definition(definition) => Some(definition),
            Animate::Controls(_) => None,
        }
    }

    pub fn controls(&self) -> Option<&AnimationControls> {
        match self {
            Animate::Controls(controls) => Some(controls),
            Animate::Definition(_) => None,
        }
    }
}

impl From<Definition> for Animate {
    fn from(definition: Definition) -> Self {
        Animate::Definition(definition)
    }
}

impl From<&str> for Animate {
    fn from(label: &str) -> Self {
        Animate::Definition(label.into())
    }
}

impl From<Labels> for Animate {
    fn from(labels: Labels) -> Self {
        Animate::Definition(labels.into())
    }
}

impl From<AnimationTarget> for Animate {
    fn from(target: AnimationTarget) -> Self {
        Animate::Definition(target.into())
    }
}

impl From<TargetDefinition> for Animate {
    fn from(definition: TargetDefinition) -> Self {
        Animate::Definition(definition.into())
    }
}

impl From<AnimationControls> for Animate {
    fn from(controls: AnimationControls) -> Self {
        Animate::Controls(controls)
    }
}

impl From<&AnimationControls> for Animate {
    fn from(controls: &AnimationControls) -> Self {
        Animate::Controls(controls.clone())
    }
}

/// Where a node's values start when it mounts
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Initial {
    /// Use the nearest ancestor's initial state
    #[default]
    Inherit,
    /// Jump straight to the animate target
    Skip,
    /// Start from this definition's values
    Definition(Definition),
}

/// Props for [`MotionEngine::mount`](crate::MotionEngine::mount)
#[derive(Clone, Debug, Default)]
pub struct MotionProps {
    pub initial: Option<Definition>,
    pub skip_initial_animation: bool,
    /// `None` makes the node inherit labels from its parent
    pub animate: Option<Animate>,
    pub variants: Rc<Variants>,
    pub custom: Option<Custom>,
    /// Default transition for this node, layered under the target's own
    pub transition: Option<Transition>,
}

impl MotionProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, initial: impl Into<Definition>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    pub fn skip_initial_animation(mut self) -> Self {
        self.skip_initial_animation = true;
        self
    }

    pub fn animate(mut self, animate: impl Into<Animate>) -> Self {
        self.animate = Some(animate.into());
        self
    }

    pub fn variants(mut self, variants: Variants) -> Self {
        self.variants = Rc::new(variants);
        self
    }

    /// Share one registry between many nodes
    pub fn shared_variants(mut self, variants: Rc<Variants>) -> Self {
        self.variants = variants;
        self
    }

    pub fn custom(mut self, custom: impl Into<Custom>) -> Self {
        self.custom = Some(custom.into());
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub(crate) fn initial_state(&self) -> Initial {
        if self.skip_initial_animation {
            Initial::Skip
        } else {
            self.initial
                .clone()
                .map_or(Initial::Inherit, Initial::Definition)
        }
    }
}
