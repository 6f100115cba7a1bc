//! Motion engine
//!
//! The engine owns the tree, the runner and the orchestrator and drives them
//! from an external frame clock. Each [`MotionEngine::tick`] runs, in order:
//!
//! 1. advance the clock
//! 2. drain commands queued on bound controls, dated to the previous frame
//!    so their first sample already covers `dt`
//! 3. commit dirty nodes, parents before children
//! 4. settle: dispatch due intents and sample runs until nothing changes

use crate::config::MotionConfig;
use crate::controls::{AnimationControls, BatchLedger, ControlsCommand, ControlsId};
use crate::error::{MotionError, Result};
use crate::events::{Journal, MotionEvent};
use crate::orchestrator::{Context, Orchestrator, StartRequest};
use crate::props::{Animate, Initial, MotionProps};
use crate::resolver;
use crate::runner::{Outcome, Runner};
use crate::tree::{MotionNode, MotionTree, NodeId};
use crate::variant::{Custom, Definition, Labels, Variants};
use blinc_animation::{TweenAnimator, ValueAnimator};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Upper bound on dispatch-and-sample passes in one frame
const MAX_SETTLE_PASSES: usize = 256;

pub struct MotionEngine {
    config: MotionConfig,
    animator: Box<dyn ValueAnimator>,
    tree: MotionTree,
    runner: Runner,
    orchestrator: Orchestrator,
    batches: BatchLedger,
    /// Controls bound to at least one node
    controls: IndexMap<ControlsId, AnimationControls>,
    journal: Journal,
    /// Absolute time; per-run elapsed time is narrowed to `f32` only when sampled
    now: f64,
}

macro_rules! context {
    ($engine:ident) => {
        Context {
            tree: &mut $engine.tree,
            runner: &mut $engine.runner,
            batches: &mut $engine.batches,
            journal: &mut $engine.journal,
            config: &$engine.config,
            animator: &*$engine.animator,
            now: $engine.now,
        }
    };
}

impl MotionEngine {
    pub fn new(config: MotionConfig) -> Self {
        let journal = Journal::new(config.journal_capacity);
        Self {
            config,
            animator: Box::new(TweenAnimator),
            tree: MotionTree::new(),
            runner: Runner::new(),
            orchestrator: Orchestrator::new(),
            batches: BatchLedger::default(),
            controls: IndexMap::new(),
            journal,
            now: 0.0,
        }
    }

    /// Replace the value animator used for new runs
    pub fn with_animator(mut self, animator: impl ValueAnimator + 'static) -> Self {
        self.animator = Box::new(animator);
        self
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn tree(&self) -> &MotionTree {
        &self.tree
    }

    /// Engine time in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Mount a node as the last child of `parent`
    ///
    /// The node starts from its effective initial state. A node whose target
    /// differs from where it starts is marked dirty and animates on the next
    /// frame.
    pub fn mount(&mut self, parent: Option<NodeId>, props: MotionProps) -> Result<NodeId> {
        let id = self
            .tree
            .insert(parent, MotionNode::from_props(parent, props))?;

        let animate = self.tree.get(id).and_then(|n| n.animate.clone());
        if let Some(controls) = animate.as_ref().and_then(Animate::controls) {
            self.bind_controls(id, controls.clone());
        }

        let target = match &animate {
            Some(Animate::Definition(definition)) => Some(definition.clone()),
            Some(Animate::Controls(_)) => None,
            None => self.parent_labels(id).map(Definition::Labels),
        };

        match self.tree.effective_initial(id) {
            Initial::Skip => {
                if let Some(target) = &target {
                    self.apply_static(id, target, false);
                }
            }
            Initial::Definition(initial) => {
                self.apply_static(id, &initial, false);
                if target.as_ref().is_some_and(|t| *t != initial) {
                    self.mark_dirty(id);
                }
            }
            Initial::Inherit => {
                if target.is_some() {
                    self.mark_dirty(id);
                }
            }
        }

        if let Some(labels) = target.as_ref().and_then(Definition::as_labels) {
            if let Some(node) = self.tree.get_mut(id) {
                node.labels = Some(labels.clone());
            }
        }

        debug!("Mounted {:?} under {:?}", id, parent);
        Ok(id)
    }

    /// Remove a node and its subtree, cancelling their animations
    pub fn unmount(&mut self, node: NodeId) -> Result<()> {
        if !self.tree.contains(node) {
            return Err(MotionError::NodeNotFound(node));
        }

        let subtree = self.tree.subtree(node);
        {
            let mut cx = context!(self);
            for id in &subtree {
                self.orchestrator.cancel_node(&mut cx, *id);
                cx.runner.cancel_node(*id);
            }
        }

        for (id, removed) in self.tree.remove_subtree(node) {
            if let Some(controls) = removed.animate.as_ref().and_then(Animate::controls) {
                self.unbind_controls(id, controls);
            }
        }
        debug!("Unmounted {} nodes from {:?}", subtree.len(), node);
        Ok(())
    }

    /// Give a node an explicit animate prop
    pub fn set_target(&mut self, node: NodeId, animate: impl Into<Animate>) -> Result<()> {
        self.retarget(node, Some(animate.into()))
    }

    /// Drop a node's animate prop so it inherits from its parent again
    pub fn clear_target(&mut self, node: NodeId) -> Result<()> {
        self.retarget(node, None)
    }

    fn retarget(&mut self, node: NodeId, animate: Option<Animate>) -> Result<()> {
        let previous = self
            .tree
            .get(node)
            .ok_or(MotionError::NodeNotFound(node))?
            .animate
            .clone();
        if !self.tree.set_target(node, animate.clone())? {
            return Ok(());
        }

        if let Some(controls) = previous.as_ref().and_then(Animate::controls) {
            self.unbind_controls(node, controls);
        }
        match animate {
            Some(Animate::Controls(controls)) => {
                self.halt(node);
                self.bind_controls(node, controls);
            }
            Some(Animate::Definition(_)) => {}
            None => {
                let labels = self.parent_labels(node);
                if labels.is_none() {
                    self.halt(node);
                }
                if let Some(target) = self.tree.get_mut(node) {
                    target.dirty = labels.is_some();
                    target.labels = labels;
                }
            }
        }
        trace!("Retargeted {:?}", node);
        Ok(())
    }

    /// Replace a node's variant registry
    ///
    /// Takes effect the next time the node resolves labels; nothing is
    /// restarted.
    pub fn bind_variants(&mut self, node: NodeId, variants: impl Into<Rc<Variants>>) -> Result<()> {
        let target = self
            .tree
            .get_mut(node)
            .ok_or(MotionError::NodeNotFound(node))?;
        target.variants = variants.into();
        Ok(())
    }

    pub fn set_custom(&mut self, node: NodeId, custom: Option<Custom>) -> Result<()> {
        let target = self
            .tree
            .get_mut(node)
            .ok_or(MotionError::NodeNotFound(node))?;
        target.custom = custom;
        Ok(())
    }

    pub fn create_controls(&self) -> AnimationControls {
        AnimationControls::new()
    }

    /// Advance the clock by `dt` seconds and run one frame
    pub fn tick(&mut self, dt: f32) {
        let issued = self.now;
        self.now += f64::from(dt.max(0.0));
        self.run_frame(issued);
    }

    /// Run one frame without advancing the clock
    pub fn flush(&mut self) {
        self.run_frame(self.now);
    }

    /// `issued` is when commands queued since the last frame take effect
    fn run_frame(&mut self, issued: f64) {
        self.process_controls(issued);
        self.commit_dirty();
        self.settle();
    }

    pub fn value(&self, node: NodeId, property: &str) -> Option<f32> {
        self.tree.get(node)?.value(property)
    }

    pub fn values(&self, node: NodeId) -> Option<&IndexMap<String, f32>> {
        self.tree.get(node).map(MotionNode::values)
    }

    pub fn labels(&self, node: NodeId) -> Option<&Labels> {
        self.tree.get(node)?.labels()
    }

    /// The node is orchestrating or running
    pub fn is_animating(&self, node: NodeId) -> bool {
        self.tree
            .get(node)
            .is_some_and(|n| n.orchestration.is_some())
            || self.runner.run_for(node).is_some()
    }

    /// Anything left for future frames to do
    pub fn has_active_animations(&self) -> bool {
        self.runner.has_active_animations()
            || !self.orchestrator.is_empty()
            || self
                .controls
                .values()
                .any(|c| c.pending_commands() > 0)
    }

    pub fn events(&self) -> impl Iterator<Item = &MotionEvent> {
        self.journal.iter()
    }

    pub fn drain_events(&mut self) -> Vec<MotionEvent> {
        self.journal.drain()
    }

    fn process_controls(&mut self, issued: f64) {
        let bound: Vec<AnimationControls> = self.controls.values().cloned().collect();
        for controls in bound {
            for command in controls.take_commands() {
                self.run_command(&controls, command, issued);
            }
        }
    }

    fn run_command(&mut self, controls: &AnimationControls, command: ControlsCommand, issued: f64) {
        let nodes = controls.bound_nodes();
        match command {
            ControlsCommand::Start {
                definition,
                completion,
            } => {
                debug!(
                    "Controls {:?} starting on {} nodes",
                    controls.id(),
                    nodes.len()
                );
                let batch = self.batches.open(controls.id(), nodes.len(), completion);
                let mut cx = context!(self);
                for node in nodes {
                    let custom = cx.tree.get(node).and_then(|n| n.custom.clone());
                    let request = StartRequest {
                        node,
                        definition: definition.for_node(custom.as_ref()),
                        origin: issued,
                        parent: None,
                        controls: Some(controls.id()),
                        batch,
                    };
                    if self.orchestrator.start(&mut cx, request).is_none() {
                        if let Some(batch) = batch {
                            cx.batches.settle(batch, Outcome::Completed);
                        }
                    }
                }
            }
            ControlsCommand::Set(definition) => {
                for node in nodes {
                    let custom = self.tree.get(node).and_then(|n| n.custom.clone());
                    self.apply_static(node, &definition.for_node(custom.as_ref()), true);
                }
            }
            ControlsCommand::Stop => {
                let mut cx = context!(self);
                self.orchestrator.cancel_controls(&mut cx, controls.id());
            }
        }
    }

    fn commit_dirty(&mut self) {
        for id in self.tree.depth_first() {
            let Some(node) = self.tree.get_mut(id) else {
                continue;
            };
            if !node.dirty {
                continue;
            }
            node.dirty = false;

            let definition = match &node.animate {
                Some(Animate::Definition(definition)) => Some(definition.clone()),
                Some(Animate::Controls(_)) => None,
                None => node.labels.clone().map(Definition::Labels),
            };
            let Some(definition) = definition else {
                continue;
            };

            let mut cx = context!(self);
            let origin = cx.now;
            self.orchestrator.start(
                &mut cx,
                StartRequest {
                    node: id,
                    definition,
                    origin,
                    parent: None,
                    controls: None,
                    batch: None,
                },
            );
        }
    }

    fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_PASSES {
            let mut cx = context!(self);
            let dispatched = self.orchestrator.dispatch_due(&mut cx);
            let reports = cx.runner.advance(cx.tree, cx.now);
            let finished = !reports.is_empty();
            for report in reports {
                self.orchestrator.on_run_settled(&mut cx, report);
            }
            if !dispatched && !finished {
                return;
            }
        }
        warn!(
            "Frame at {:.3} still busy after {} passes",
            self.now, MAX_SETTLE_PASSES
        );
    }

    /// Jump a node to a definition's end values, cancelling its animation
    ///
    /// With `descend`, label definitions also reach inheriting descendants,
    /// which jump to their own variants for the same labels.
    fn apply_static(&mut self, node: NodeId, definition: &Definition, descend: bool) {
        let resolved = match self.tree.get(node) {
            Some(target) => resolver::resolve(definition, &target.variants, target.custom.as_ref()),
            None => return,
        };

        self.halt(node);
        let mut cx = context!(self);
        match resolved {
            Ok(resolved) => {
                if let Some(target) = cx.tree.get_mut(node) {
                    let values = resolver::final_values(&resolved, |p| target.value(p));
                    target.values.extend(values);
                }
            }
            Err(error) => cx.report(node, error),
        }

        let Some(labels) = definition.as_labels() else {
            return;
        };
        if let Some(target) = self.tree.get_mut(node) {
            target.labels = Some(labels.clone());
        }
        if descend {
            let labels = Definition::Labels(labels.clone());
            for child in self.tree.propagate(node) {
                self.apply_static(child, &labels, false);
            }
        }
    }

    /// Cancel a node's orchestration and run, leaving values where they are
    fn halt(&mut self, node: NodeId) {
        let mut cx = context!(self);
        self.orchestrator.cancel_node(&mut cx, node);
        cx.runner.cancel_node(node);
    }

    fn mark_dirty(&mut self, node: NodeId) {
        if let Some(target) = self.tree.get_mut(node) {
            target.dirty = true;
        }
    }

    fn parent_labels(&self, node: NodeId) -> Option<Labels> {
        let parent = self.tree.get(node)?.parent?;
        self.tree.get(parent)?.labels.clone()
    }

    fn bind_controls(&mut self, node: NodeId, controls: AnimationControls) {
        controls.bind(node);
        self.controls.entry(controls.id()).or_insert(controls);
    }

    fn unbind_controls(&mut self, node: NodeId, controls: &AnimationControls) {
        controls.unbind(node);
        if !controls.is_bound() {
            self.controls.shift_remove(&controls.id());
        }
    }
}

impl Default for MotionEngine {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}
