//! Propagation tree
//!
//! Nodes live in a slotmap arena. Parents are stored as keys and children as
//! ordered key lists, so inheritance lookups walk keys upward while
//! ownership stays strictly top-down.
//!
//! A node with an explicit animate prop is a propagation boundary. A node
//! without one inherits the labels of its nearest explicit ancestor.

use crate::error::{MotionError, Result};
use crate::orchestrator::OrchestrationId;
use crate::props::{Animate, Initial, MotionProps};
use crate::transition::Transition;
use crate::variant::{Custom, Labels, Variants};
use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::rc::Rc;
use tracing::trace;

new_key_type! {
    /// Handle to a mounted node
    pub struct NodeId;
}

/// Children lists for typical trees stay inline
pub type NodeList = SmallVec<[NodeId; 8]>;

/// A mounted node
#[derive(Debug)]
pub struct MotionNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: NodeList,
    pub(crate) animate: Option<Animate>,
    pub(crate) initial: Initial,
    pub(crate) variants: Rc<Variants>,
    pub(crate) custom: Option<Custom>,
    pub(crate) transition: Option<Transition>,
    /// Labels this node currently resolves, own or inherited
    pub(crate) labels: Option<Labels>,
    pub(crate) values: IndexMap<String, f32>,
    /// The animate prop changed and has not been committed yet
    pub(crate) dirty: bool,
    pub(crate) orchestration: Option<OrchestrationId>,
}

impl MotionNode {
    pub(crate) fn from_props(parent: Option<NodeId>, props: MotionProps) -> Self {
        let initial = props.initial_state();
        Self {
            parent,
            children: NodeList::new(),
            animate: props.animate,
            initial,
            variants: props.variants,
            custom: props.custom,
            transition: props.transition,
            labels: None,
            values: IndexMap::new(),
            dirty: false,
            orchestration: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn animate(&self) -> Option<&Animate> {
        self.animate.as_ref()
    }

    /// Has its own animate prop and does not inherit
    pub fn is_explicit(&self) -> bool {
        self.animate.is_some()
    }

    pub fn variants(&self) -> &Rc<Variants> {
        &self.variants
    }

    pub fn custom(&self) -> Option<&Custom> {
        self.custom.as_ref()
    }

    pub fn labels(&self) -> Option<&Labels> {
        self.labels.as_ref()
    }

    pub fn value(&self, property: &str) -> Option<f32> {
        self.values.get(property).copied()
    }

    pub fn values(&self) -> &IndexMap<String, f32> {
        &self.values
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug, Default)]
pub struct MotionTree {
    nodes: SlotMap<NodeId, MotionNode>,
    roots: NodeList,
}

impl MotionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node as the last child of `parent`, or as a new root
    pub fn insert(&mut self, parent: Option<NodeId>, node: MotionNode) -> Result<NodeId> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(MotionError::NodeNotFound(parent));
            }
        }

        let id = self.nodes.insert(node);
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&MotionNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut MotionNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Remove a node and its descendants, children before parents
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<(NodeId, MotionNode)> {
        let Some(parent) = self.nodes.get(id).map(|n| n.parent) else {
            return Vec::new();
        };
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.retain(|c| *c != id),
            None => self.roots.retain(|c| *c != id),
        }

        let mut order = self.subtree(id);
        order.reverse();
        order
            .into_iter()
            .filter_map(|n| self.nodes.remove(n).map(|node| (n, node)))
            .collect()
    }

    /// Store a new animate prop
    ///
    /// Returns whether the prop differs from the previous one. Definition
    /// props that changed mark the node dirty.
    pub fn set_target(&mut self, id: NodeId, animate: Option<Animate>) -> Result<bool> {
        let node = self.nodes.get_mut(id).ok_or(MotionError::NodeNotFound(id))?;
        if node.animate == animate {
            return Ok(false);
        }
        node.dirty = matches!(animate, Some(Animate::Definition(_)));
        node.animate = animate;
        Ok(true)
    }

    /// Copy a node's labels to every inheriting descendant
    ///
    /// Depth-first, pre-order, in child insertion order. Explicit descendants
    /// and everything below them are left alone. Visited nodes lose their
    /// dirty flag since the new labels supersede it.
    pub fn propagate(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let labels = node.labels.clone();
        let mut visited = Vec::new();
        let mut stack: NodeList = node.children.iter().rev().copied().collect();

        while let Some(child) = stack.pop() {
            let Some(node) = self.nodes.get_mut(child) else {
                continue;
            };
            if node.is_explicit() {
                continue;
            }
            node.labels.clone_from(&labels);
            node.dirty = false;
            stack.extend(node.children.iter().rev().copied());
            visited.push(child);
        }

        trace!("Propagated {:?} to {} nodes", labels, visited.len());
        visited
    }

    /// Direct children that inherit from `id`, in insertion order
    pub fn variant_children(&self, id: NodeId) -> NodeList {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|c| self.nodes.get(*c).is_some_and(|n| !n.is_explicit()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every node, pre-order from the roots
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            order.extend(self.subtree(*root));
        }
        order
    }

    /// `id` and its descendants, pre-order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(next) {
                order.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// The initial state a node starts from
    ///
    /// A node without its own initial takes the nearest ancestor's initial
    /// if that is a skip or a label list. Literal targets are not inherited.
    pub fn effective_initial(&self, id: NodeId) -> Initial {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            match &node.initial {
                Initial::Inherit => cursor = node.parent,
                own if current == id => return own.clone(),
                Initial::Skip => return Initial::Skip,
                Initial::Definition(definition) => {
                    return definition
                        .as_labels()
                        .map_or(Initial::Inherit, |labels| {
                            Initial::Definition(labels.clone().into())
                        });
                }
            }
        }
        Initial::Inherit
    }
}
