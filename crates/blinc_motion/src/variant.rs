//! Variants and animation definitions
//!
//! A variant is a named target. Static variants hold a [`TargetDefinition`];
//! dynamic variants compute one from the node's custom data when resolved.

use crate::target::{AnimationTarget, TargetDefinition};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// Per-node data handed to dynamic variants and per-node control functions
pub type Custom = serde_json::Value;

/// A variant computed from custom data
pub type DynamicVariant = Rc<dyn Fn(Option<&Custom>) -> TargetDefinition>;

#[derive(Clone)]
pub enum Variant {
    Static(TargetDefinition),
    Dynamic(DynamicVariant),
}

impl Variant {
    /// Produce the concrete definition for a node's custom data
    pub fn resolve(&self, custom: Option<&Custom>) -> TargetDefinition {
        match self {
            Variant::Static(definition) => definition.clone(),
            Variant::Dynamic(compute) => compute(custom),
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Static(definition) => f.debug_tuple("Static").field(definition).finish(),
            Variant::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Label to variant registry
#[derive(Clone, Debug, Default)]
pub struct Variants {
    entries: FxHashMap<String, Variant>,
}

impl Variants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a static variant
    pub fn with(mut self, label: impl Into<String>, definition: impl Into<TargetDefinition>) -> Self {
        self.insert(label, Variant::Static(definition.into()));
        self
    }

    /// Builder: add a variant computed from custom data
    pub fn with_dynamic<F>(mut self, label: impl Into<String>, compute: F) -> Self
    where
        F: Fn(Option<&Custom>) -> TargetDefinition + 'static,
    {
        self.insert(label, Variant::Dynamic(Rc::new(compute)));
        self
    }

    /// Add or replace a variant
    pub fn insert(&mut self, label: impl Into<String>, variant: Variant) {
        self.entries.insert(label.into(), variant);
    }

    pub fn get(&self, label: &str) -> Option<&Variant> {
        self.entries.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One or more variant labels, resolved left to right
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Labels(SmallVec<[String; 2]>);

impl Labels {
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Labels(labels.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(label)?;
        }
        Ok(())
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels::new([label])
    }
}

/// What a node animates to
#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    /// A literal target
    Target(TargetDefinition),
    /// Variant labels resolved against the node's registry
    Labels(Labels),
}

impl Definition {
    pub fn label(label: impl Into<String>) -> Self {
        Definition::Labels(Labels::new([label.into()]))
    }

    pub fn labels(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Definition::Labels(Labels::new(labels))
    }

    pub fn target(target: impl Into<TargetDefinition>) -> Self {
        Definition::Target(target.into())
    }

    /// The labels this definition propagates, if any
    pub fn as_labels(&self) -> Option<&Labels> {
        match self {
            Definition::Labels(labels) => Some(labels),
            Definition::Target(_) => None,
        }
    }
}

impl From<&str> for Definition {
    fn from(label: &str) -> Self {
        Definition::label(label)
    }
}

impl From<Labels> for Definition {
    fn from(labels: Labels) -> Self {
        Definition::Labels(labels)
    }
}

impl From<AnimationTarget> for Definition {
    fn from(target: AnimationTarget) -> Self {
        Definition::Target(target.into())
    }
}

impl From<TargetDefinition> for Definition {
    fn from(definition: TargetDefinition) -> Self {
        Definition::Target(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetValue;

    #[test]
    fn test_dynamic_variant_reads_custom() {
        let variants = Variants::new().with_dynamic("visible", |custom| {
            let index = custom.and_then(Custom::as_f64).unwrap_or(0.0) as f32;
            AnimationTarget::new().with("x", index * 10.0).into()
        });

        let variant = variants.get("visible").unwrap();
        let with = variant.resolve(Some(&Custom::from(3)));
        let without = variant.resolve(None);

        assert_eq!(with.target.get("x"), Some(&TargetValue::Value(30.0)));
        assert_eq!(without.target.get("x"), Some(&TargetValue::Value(0.0)));
    }

    #[test]
    fn test_labels_display() {
        let definition = Definition::labels(["hover", "pressed"]);
        assert_eq!(definition.as_labels().unwrap().to_string(), "hover,pressed");
        assert_eq!(Definition::from("open"), Definition::label("open"));
    }
}
