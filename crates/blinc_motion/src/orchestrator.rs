//! Orchestration
//!
//! Every active node animation has one [`Orchestration`] entry. The entry
//! owns the node's own run, the child intents that have not been dispatched
//! yet, and the child orchestrations that were dispatched from it. An entry
//! settles when all three are empty, and its outcome then flows to its
//! parent entry.
//!
//! Child timing is planned up front by [`Schedule::build`]. Intents count
//! down from the moment the entry is released: immediately for
//! `simultaneous` and `after-children`, or once the own run has settled for
//! `before-children`.

use crate::config::MotionConfig;
use crate::controls::{BatchId, BatchLedger, ControlsId};
use crate::error::MotionError;
use crate::events::{Journal, MotionEvent};
use crate::resolver;
use crate::runner::{Outcome, RunId, RunReport, Runner};
use crate::target::TargetDefinition;
use crate::transition::{StaggerDirection, Transition, When};
use crate::tree::{MotionTree, NodeId};
use crate::variant::{Definition, Labels};
use blinc_animation::ValueAnimator;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use smallvec::SmallVec;
use std::mem;
use tracing::{debug, trace, warn};

new_key_type! {
    /// Handle to an active orchestration
    pub struct OrchestrationId;
}

/// Intents due within this many seconds of `now` are dispatched
const DUE_EPSILON: f64 = 1e-6;

/// Child start offsets
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stagger {
    /// Seconds before the first child starts
    pub delay_children: f32,
    /// Seconds between consecutive children
    pub stagger_children: f32,
    pub direction: StaggerDirection,
    /// Children past this step share its delay
    pub limit: Option<usize>,
}

impl Stagger {
    pub fn from_transition(transition: &Transition) -> Self {
        Self {
            delay_children: transition.delay_children.unwrap_or(0.0).max(0.0),
            stagger_children: transition.stagger_children.unwrap_or(0.0).max(0.0),
            direction: transition.stagger_direction.unwrap_or_default(),
            limit: transition.stagger_limit,
        }
    }

    /// Calculate delay for a specific child index
    pub fn delay_for_index(&self, index: usize, total: usize) -> f32 {
        let step = match self.direction {
            StaggerDirection::Forward => index,
            StaggerDirection::Reverse => total.saturating_sub(1).saturating_sub(index),
            StaggerDirection::FromCenter => {
                let center = total / 2;
                center.abs_diff(index)
            }
        };
        let step = self.limit.map_or(step, |limit| step.min(limit));
        self.delay_children + self.stagger_children * step as f32
    }
}

/// A child waiting to be started
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartIntent {
    pub child: NodeId,
    /// Position among the variant children
    pub index: usize,
    /// Seconds after release
    pub delay: f32,
}

/// The start plan for a node's variant children
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    intents: SmallVec<[StartIntent; 8]>,
}

impl Schedule {
    pub fn build(children: &[NodeId], transition: &Transition) -> Self {
        let stagger = Stagger::from_transition(transition);
        let total = children.len();
        Self {
            intents: children
                .iter()
                .enumerate()
                .map(|(index, &child)| StartIntent {
                    child,
                    index,
                    delay: stagger.delay_for_index(index, total),
                })
                .collect(),
        }
    }

    pub fn intents(&self) -> &[StartIntent] {
        &self.intents
    }

    pub fn delays(&self) -> impl Iterator<Item = f32> + '_ {
        self.intents.iter().map(|i| i.delay)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Everything an orchestration step may touch
pub(crate) struct Context<'a> {
    pub tree: &'a mut MotionTree,
    pub runner: &'a mut Runner,
    pub batches: &'a mut BatchLedger,
    pub journal: &'a mut Journal,
    pub config: &'a MotionConfig,
    pub animator: &'a dyn ValueAnimator,
    pub now: f64,
}

impl Context<'_> {
    /// Record a problem that was worked around
    pub fn report(&mut self, node: NodeId, error: MotionError) {
        warn!("Node {:?}: {}", node, error);
        self.journal.record(MotionEvent::Diagnostic { node, error });
    }
}

/// A request to animate one node
pub(crate) struct StartRequest {
    pub node: NodeId,
    pub definition: Definition,
    /// Engine time the start is scheduled for
    pub origin: f64,
    pub parent: Option<OrchestrationId>,
    pub controls: Option<ControlsId>,
    pub batch: Option<BatchId>,
}

#[derive(Debug)]
enum OwnAnimation {
    /// Resolved, waiting for its barrier
    Pending(TargetDefinition),
    Running(RunId),
    Done,
}

#[derive(Debug)]
pub(crate) struct Orchestration {
    node: NodeId,
    when: When,
    transition: Transition,
    labels: Option<Labels>,
    own: OwnAnimation,
    pending: SmallVec<[StartIntent; 8]>,
    /// When child delays started counting
    released_at: Option<f64>,
    children: SmallVec<[OrchestrationId; 8]>,
    parent: Option<OrchestrationId>,
    controls: Option<ControlsId>,
    batch: Option<BatchId>,
    outcome: Outcome,
    cancelled: bool,
}

impl Orchestration {
    fn is_settled(&self) -> bool {
        matches!(self.own, OwnAnimation::Done) && self.pending.is_empty() && self.children.is_empty()
    }
}

#[derive(Default)]
pub struct Orchestrator {
    entries: SlotMap<OrchestrationId, Orchestration>,
    runs: SecondaryMap<RunId, OrchestrationId>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start orchestrating a node, superseding whatever it was doing
    pub(crate) fn start(
        &mut self,
        cx: &mut Context<'_>,
        request: StartRequest,
    ) -> Option<OrchestrationId> {
        let existing = cx.tree.get(request.node)?.orchestration;
        if let Some(existing) = existing {
            self.supersede(cx, existing);
        }

        let labels = request.definition.as_labels().cloned();
        if let Some(node) = cx.tree.get_mut(request.node) {
            node.labels.clone_from(&labels);
        }
        if labels.is_some() {
            cx.tree.propagate(request.node);
        }

        let (resolved, mut transition) = {
            let node = cx.tree.get(request.node)?;
            (
                resolver::resolve(&request.definition, &node.variants, node.custom.as_ref()),
                node.transition.clone().unwrap_or_default(),
            )
        };
        let own = match resolved {
            Ok(definition) => {
                if let Some(own_transition) = &definition.transition {
                    transition.merge(own_transition);
                }
                OwnAnimation::Pending(definition)
            }
            Err(error) => {
                cx.report(request.node, error);
                OwnAnimation::Done
            }
        };

        let pending = if labels.is_some() {
            let children = cx.tree.variant_children(request.node);
            Schedule::build(&children, &transition).intents
        } else {
            SmallVec::new()
        };

        let when = transition.when.unwrap_or_default();
        let id = self.entries.insert(Orchestration {
            node: request.node,
            when,
            transition,
            labels,
            own,
            pending,
            released_at: None,
            children: SmallVec::new(),
            parent: request.parent,
            controls: request.controls,
            batch: request.batch,
            outcome: Outcome::Completed,
            cancelled: false,
        });

        if let Some(node) = cx.tree.get_mut(request.node) {
            node.orchestration = Some(id);
        }
        if let Some(parent) = request.parent.and_then(|p| self.entries.get_mut(p)) {
            parent.children.push(id);
        }

        cx.journal.record(MotionEvent::OrchestrationStarted {
            node: request.node,
            at: request.origin,
            when,
        });
        debug!(
            "Orchestration {:?} started on {:?} at {:.3} ({:?})",
            id, request.node, request.origin, when
        );

        match when {
            When::Simultaneous => {
                self.start_own(cx, id, request.origin);
                self.release(id, request.origin);
            }
            When::BeforeChildren => self.start_own(cx, id, request.origin),
            When::AfterChildren => self.release(id, request.origin),
        }

        self.advance_phase(cx, id);
        self.try_settle(cx, id);
        Some(id)
    }

    /// Dispatch every child intent that has come due
    ///
    /// Intents are taken earliest first. Returns whether anything was
    /// dispatched.
    pub(crate) fn dispatch_due(&mut self, cx: &mut Context<'_>) -> bool {
        let mut dispatched = false;

        loop {
            let mut next: Option<(OrchestrationId, usize, f64)> = None;
            for (id, entry) in self.entries.iter() {
                let Some(released) = entry.released_at else {
                    continue;
                };
                for (position, intent) in entry.pending.iter().enumerate() {
                    let due = released + f64::from(intent.delay);
                    if due > cx.now + DUE_EPSILON {
                        continue;
                    }
                    if next.map_or(true, |(_, _, earliest)| due < earliest) {
                        next = Some((id, position, due));
                    }
                }
            }

            let Some((id, position, at)) = next else {
                break;
            };
            let Some(entry) = self.entries.get_mut(id) else {
                break;
            };
            let intent = entry.pending.remove(position);
            let labels = entry.labels.clone();
            let controls = entry.controls;

            self.dispatch(cx, id, intent, labels, controls, at);
            dispatched = true;
        }

        dispatched
    }

    fn dispatch(
        &mut self,
        cx: &mut Context<'_>,
        parent: OrchestrationId,
        intent: StartIntent,
        labels: Option<Labels>,
        controls: Option<ControlsId>,
        at: f64,
    ) {
        let inheriting = cx
            .tree
            .get(intent.child)
            .is_some_and(|node| !node.is_explicit());

        match labels {
            Some(labels) if inheriting => {
                cx.journal.record(MotionEvent::IntentDispatched {
                    node: intent.child,
                    index: intent.index,
                    delay: intent.delay,
                    at,
                });
                trace!(
                    "Dispatching child {} ({:?}) with {} at {:.3}",
                    intent.index,
                    intent.child,
                    labels,
                    at
                );
                self.start(
                    cx,
                    StartRequest {
                        node: intent.child,
                        definition: Definition::Labels(labels),
                        origin: at,
                        parent: Some(parent),
                        controls,
                        batch: None,
                    },
                );
            }
            _ => trace!("Skipping child {:?}, no longer inheriting", intent.child),
        }

        self.advance_phase(cx, parent);
        self.try_settle(cx, parent);
    }

    /// A run left the runner
    pub(crate) fn on_run_settled(&mut self, cx: &mut Context<'_>, report: RunReport) {
        cx.journal.record(MotionEvent::RunFinished {
            node: report.node,
            at: cx.now,
            outcome: report.outcome.clone(),
        });
        debug!(
            "Run on {:?} finished at {:.3}: {:?}",
            report.node, cx.now, report.outcome
        );

        let Some(id) = self.runs.remove(report.run) else {
            return;
        };
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.own = OwnAnimation::Done;
        entry.outcome.merge(report.outcome);

        self.advance_phase(cx, id);
        self.try_settle(cx, id);
    }

    /// Cancel a node's orchestration and everything it dispatched
    pub(crate) fn cancel_node(&mut self, cx: &mut Context<'_>, node: NodeId) {
        if let Some(id) = cx.tree.get(node).and_then(|n| n.orchestration) {
            self.cancel(cx, id);
        }
    }

    /// Cancel every orchestration a controls instance started
    pub(crate) fn cancel_controls(&mut self, cx: &mut Context<'_>, controls: ControlsId) {
        let roots: Vec<OrchestrationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.controls == Some(controls))
            .filter(|(_, entry)| {
                entry
                    .parent
                    .and_then(|p| self.entries.get(p))
                    .map_or(true, |parent| parent.controls != Some(controls))
            })
            .map(|(id, _)| id)
            .collect();

        debug!(
            "Stopping {} orchestrations for controls {:?}",
            roots.len(),
            controls
        );
        for id in roots {
            self.cancel(cx, id);
        }
    }

    fn start_own(&mut self, cx: &mut Context<'_>, id: OrchestrationId, at: f64) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        let OwnAnimation::Pending(definition) = mem::replace(&mut entry.own, OwnAnimation::Done)
        else {
            return;
        };
        let node = entry.node;

        let materialized = {
            let values = cx.tree.get(node).map(|n| &n.values);
            resolver::materialize(&definition, &entry.transition, cx.config, |property| {
                values.and_then(|v| v.get(property).copied())
            })
        };
        for diagnostic in materialized.diagnostics {
            cx.report(node, diagnostic);
        }

        if materialized.tracks.is_empty() {
            if let Some(target) = cx.tree.get_mut(node) {
                for (property, value) in definition.transition_end {
                    target.values.insert(property, value);
                }
            }
            trace!("Nothing to animate on {:?}", node);
            return;
        }

        let run = cx.runner.start(
            node,
            materialized.tracks,
            definition.transition_end,
            at,
            cx.animator,
        );
        entry.own = OwnAnimation::Running(run);
        self.runs.insert(run, id);
        cx.journal.record(MotionEvent::RunStarted { node, at });
    }

    fn release(&mut self, id: OrchestrationId, at: f64) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.released_at = Some(at);
        }
    }

    /// Move an entry past whichever barrier it is waiting on
    fn advance_phase(&mut self, cx: &mut Context<'_>, id: OrchestrationId) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        if entry.cancelled {
            return;
        }
        match entry.when {
            When::Simultaneous => {}
            When::BeforeChildren => {
                if entry.released_at.is_none() && matches!(entry.own, OwnAnimation::Done) {
                    trace!("{:?} released children at {:.3}", entry.node, cx.now);
                    self.release(id, cx.now);
                }
            }
            When::AfterChildren => {
                if matches!(entry.own, OwnAnimation::Pending(_))
                    && entry.pending.is_empty()
                    && entry.children.is_empty()
                {
                    trace!("{:?} children settled, starting own run", entry.node);
                    self.start_own(cx, id, cx.now);
                }
            }
        }
    }

    fn try_settle(&mut self, cx: &mut Context<'_>, id: OrchestrationId) {
        if !self.entries.get(id).is_some_and(Orchestration::is_settled) {
            return;
        }
        let Some(entry) = self.entries.remove(id) else {
            return;
        };

        if let Some(node) = cx.tree.get_mut(entry.node) {
            if node.orchestration == Some(id) {
                node.orchestration = None;
            }
        }
        cx.journal.record(MotionEvent::OrchestrationSettled {
            node: entry.node,
            at: cx.now,
            outcome: entry.outcome.clone(),
        });
        debug!(
            "Orchestration {:?} on {:?} settled: {:?}",
            id, entry.node, entry.outcome
        );

        if let Some(batch) = entry.batch {
            cx.batches.settle(batch, entry.outcome.clone());
        }
        if let Some(parent) = entry.parent {
            self.on_child_settled(cx, parent, id, entry.outcome);
        }
    }

    fn on_child_settled(
        &mut self,
        cx: &mut Context<'_>,
        parent: OrchestrationId,
        child: OrchestrationId,
        outcome: Outcome,
    ) {
        let Some(entry) = self.entries.get_mut(parent) else {
            return;
        };
        entry.children.retain(|c| *c != child);
        entry.outcome.merge(outcome);

        self.advance_phase(cx, parent);
        self.try_settle(cx, parent);
    }

    /// Replace an entry with a newer one for the same node
    ///
    /// Undispatched intents are dropped and the own run is cancelled.
    /// Dispatched children are detached and keep running.
    fn supersede(&mut self, cx: &mut Context<'_>, id: OrchestrationId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.cancelled = true;
        let dropped = entry.pending.len();
        entry.pending.clear();
        let children = mem::take(&mut entry.children);
        if let OwnAnimation::Running(run) = mem::replace(&mut entry.own, OwnAnimation::Done) {
            cx.runner.cancel(run);
            self.runs.remove(run);
        }
        entry.outcome.merge(Outcome::Cancelled);
        debug!(
            "Superseding {:?} on {:?}, dropping {} intents",
            id, entry.node, dropped
        );

        for child in children {
            if let Some(child) = self.entries.get_mut(child) {
                child.parent = None;
            }
        }
        self.try_settle(cx, id);
    }

    /// Cancel an entry and its attached children
    fn cancel(&mut self, cx: &mut Context<'_>, id: OrchestrationId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.cancelled = true;
        entry.pending.clear();
        if let OwnAnimation::Running(run) = mem::replace(&mut entry.own, OwnAnimation::Done) {
            cx.runner.cancel(run);
            self.runs.remove(run);
        }
        entry.outcome.merge(Outcome::Cancelled);

        let children = entry.children.clone();
        for child in children {
            self.cancel(cx, child);
        }
        self.try_settle(cx, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn nodes(n: u64) -> Vec<NodeId> {
        (1..=n).map(|i| KeyData::from_ffi(i).into()).collect()
    }

    fn stagger(seconds: f32) -> Stagger {
        Stagger {
            stagger_children: seconds,
            ..Default::default()
        }
    }

    #[test]
    fn test_stagger_delay_forward() {
        let config = stagger(0.05);

        assert_eq!(config.delay_for_index(0, 5), 0.0);
        assert_eq!(config.delay_for_index(1, 5), 0.05);
        assert_eq!(config.delay_for_index(2, 5), 0.1);
        assert_eq!(config.delay_for_index(4, 5), 0.2);
    }

    #[test]
    fn test_stagger_delay_reverse() {
        let config = Stagger {
            direction: StaggerDirection::Reverse,
            ..stagger(0.05)
        };

        assert_eq!(config.delay_for_index(0, 5), 0.2);
        assert_eq!(config.delay_for_index(1, 5), 0.15);
        assert_eq!(config.delay_for_index(4, 5), 0.0);
    }

    #[test]
    fn test_stagger_delay_from_center() {
        let config = Stagger {
            direction: StaggerDirection::FromCenter,
            ..stagger(0.05)
        };

        // Distances from center: [2, 1, 0, 1, 2]
        assert_eq!(config.delay_for_index(0, 5), 0.1);
        assert_eq!(config.delay_for_index(1, 5), 0.05);
        assert_eq!(config.delay_for_index(2, 5), 0.0);
        assert_eq!(config.delay_for_index(3, 5), 0.05);
        assert_eq!(config.delay_for_index(4, 5), 0.1);
    }

    #[test]
    fn test_stagger_delay_with_limit() {
        let config = Stagger {
            limit: Some(3),
            ..stagger(0.05)
        };

        assert_eq!(config.delay_for_index(0, 10), 0.0);
        assert_eq!(config.delay_for_index(3, 10), 0.15);
        assert_eq!(config.delay_for_index(5, 10), 0.15);
        assert_eq!(config.delay_for_index(9, 10), 0.15);
    }

    #[test]
    fn test_schedule_three_children() {
        let children = nodes(3);
        let schedule = Schedule::build(&children, &Transition::new().stagger_children(0.3));

        assert_eq!(schedule.delays().collect::<Vec<_>>(), vec![0.0, 0.3, 0.6]);
        let order: Vec<_> = schedule.intents().iter().map(|i| i.child).collect();
        assert_eq!(order, children);
    }

    #[test]
    fn test_schedule_delay_children_offsets_all() {
        let schedule = Schedule::build(
            &nodes(2),
            &Transition::new().delay_children(0.5).stagger_children(0.25),
        );
        assert_eq!(schedule.delays().collect::<Vec<_>>(), vec![0.5, 0.75]);
    }

    #[test]
    fn test_empty_schedule() {
        assert!(Schedule::build(&[], &Transition::new().stagger_children(0.1)).is_empty());
    }
}
