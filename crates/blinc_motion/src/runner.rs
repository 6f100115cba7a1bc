//! Animation runner
//!
//! Owns every active per-node run and advances them against absolute engine
//! time. Each property is an independent value animation, so a property whose
//! animator fails stops on its own while the rest of the run carries on.

use crate::error::MotionError;
use crate::resolver::ResolvedTrack;
use crate::tree::{MotionTree, NodeId};
use blinc_animation::{AnimateError, ValueAnimation, ValueAnimator};
use indexmap::IndexMap;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::{trace, warn};

new_key_type! {
    /// Handle to one run on one node
    pub struct RunId;
}

/// How a run or orchestration ended
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Outcome {
    #[default]
    Completed,
    /// At least one property failed; the first failure is kept
    Failed {
        property: String,
        source: AnimateError,
    },
    Cancelled,
}

impl Outcome {
    /// Combine two outcomes; cancelled beats failed beats completed
    pub fn merge(&mut self, other: Outcome) {
        if other.rank() > self.rank() {
            *self = other;
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed { .. } => 1,
            Outcome::Cancelled => 2,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn into_result(self) -> Result<(), MotionError> {
        match self {
            Outcome::Completed => Ok(()),
            Outcome::Failed { property, source } => {
                Err(MotionError::PropertyAnimationFailed { property, source })
            }
            Outcome::Cancelled => Err(MotionError::Cancelled),
        }
    }
}

enum TrackState {
    Running(Box<dyn ValueAnimation>),
    Finished,
    Failed,
}

struct PropertyTrack {
    property: String,
    delay: f32,
    state: TrackState,
}

/// One node's set of property animations
pub struct AnimationRun {
    node: NodeId,
    started_at: f64,
    tracks: Vec<PropertyTrack>,
    transition_end: IndexMap<String, f32>,
    failure: Option<(String, AnimateError)>,
    cancelled: bool,
}

impl AnimationRun {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn fail(&mut self, property: &str, source: AnimateError) {
        warn!("Animation of '{}' failed: {}", property, source);
        if self.failure.is_none() {
            self.failure = Some((property.to_string(), source));
        }
    }

    fn outcome(&mut self) -> Outcome {
        if self.cancelled {
            return Outcome::Cancelled;
        }
        match self.failure.take() {
            Some((property, source)) => Outcome::Failed { property, source },
            None => Outcome::Completed,
        }
    }
}

/// A run that left the runner
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub run: RunId,
    pub node: NodeId,
    pub outcome: Outcome,
}

#[derive(Default)]
pub struct Runner {
    runs: SlotMap<RunId, AnimationRun>,
    by_node: SecondaryMap<NodeId, RunId>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run, cancelling whatever the node was running before
    pub fn start(
        &mut self,
        node: NodeId,
        tracks: Vec<ResolvedTrack>,
        transition_end: IndexMap<String, f32>,
        at: f64,
        animator: &dyn ValueAnimator,
    ) -> RunId {
        self.cancel_node(node);

        let mut run = AnimationRun {
            node,
            started_at: at,
            tracks: Vec::with_capacity(tracks.len()),
            transition_end,
            failure: None,
            cancelled: false,
        };

        for track in tracks {
            let state = match animator.animate(&track.keyframes, &track.transition) {
                Ok(animation) => TrackState::Running(animation),
                Err(source) => {
                    run.fail(&track.property, source);
                    TrackState::Failed
                }
            };
            run.tracks.push(PropertyTrack {
                property: track.property,
                delay: track.delay,
                state,
            });
        }

        let id = self.runs.insert(run);
        self.by_node.insert(node, id);
        trace!("Run {:?} started on {:?} at {:.3}", id, node, at);
        id
    }

    /// Mark a run cancelled; it is torn down on the next advance
    pub fn cancel(&mut self, id: RunId) {
        let Some(run) = self.runs.get_mut(id) else {
            return;
        };
        run.cancelled = true;
        if self.by_node.get(run.node) == Some(&id) {
            self.by_node.remove(run.node);
        }
    }

    pub fn cancel_node(&mut self, node: NodeId) {
        if let Some(id) = self.by_node.get(node).copied() {
            self.cancel(id);
        }
    }

    /// Sample every run at `now` and write values into the tree
    ///
    /// Returns the runs that ended during this pass.
    pub fn advance(&mut self, tree: &mut MotionTree, now: f64) -> Vec<RunReport> {
        let mut ended = Vec::new();

        for (id, run) in self.runs.iter_mut() {
            if run.cancelled {
                ended.push(id);
                continue;
            }
            let Some(node) = tree.get_mut(run.node) else {
                run.cancelled = true;
                ended.push(id);
                continue;
            };

            let mut running = false;
            let mut failures = Vec::new();
            for track in &mut run.tracks {
                let TrackState::Running(animation) = &mut track.state else {
                    continue;
                };
                let elapsed = now - run.started_at - f64::from(track.delay);
                if elapsed < 0.0 {
                    running = true;
                    continue;
                }
                match animation.sample(elapsed as f32) {
                    Ok(frame) => {
                        node.values.insert(track.property.clone(), frame.value);
                        if frame.finished {
                            track.state = TrackState::Finished;
                        } else {
                            running = true;
                        }
                    }
                    Err(source) => {
                        failures.push((track.property.clone(), source));
                        track.state = TrackState::Failed;
                    }
                }
            }
            for (property, source) in failures {
                run.fail(&property, source);
            }

            if !running {
                if run.failure.is_none() {
                    for (property, value) in &run.transition_end {
                        node.values.insert(property.clone(), *value);
                    }
                }
                ended.push(id);
            }
        }

        ended
            .into_iter()
            .filter_map(|id| {
                let mut run = self.runs.remove(id)?;
                if self.by_node.get(run.node) == Some(&id) {
                    self.by_node.remove(run.node);
                }
                Some(RunReport {
                    run: id,
                    node: run.node,
                    outcome: run.outcome(),
                })
            })
            .collect()
    }

    pub fn get(&self, id: RunId) -> Option<&AnimationRun> {
        self.runs.get(id)
    }

    /// The node's live run, if any
    pub fn run_for(&self, node: NodeId) -> Option<RunId> {
        self.by_node.get(node).copied()
    }

    pub fn has_active_animations(&self) -> bool {
        !self.runs.is_empty()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::MotionProps;
    use crate::tree::MotionNode;
    use blinc_animation::{Easing, Frame, TweenAnimator, ValueTransition};
    use smallvec::smallvec;

    fn linear(duration: f32) -> ValueTransition {
        ValueTransition {
            duration,
            easing: Easing::Linear,
            ..Default::default()
        }
    }

    fn track(property: &str, from: f32, to: f32, duration: f32) -> ResolvedTrack {
        ResolvedTrack {
            property: property.into(),
            keyframes: smallvec![from, to],
            delay: 0.0,
            transition: linear(duration),
        }
    }

    fn tree_with_node() -> (MotionTree, NodeId) {
        let mut tree = MotionTree::new();
        let node = tree
            .insert(None, MotionNode::from_props(None, MotionProps::new()))
            .unwrap();
        (tree, node)
    }

    /// Fails once sampled past a cutoff
    struct Brittle {
        cutoff: f32,
    }

    impl ValueAnimation for Brittle {
        fn sample(&mut self, elapsed: f32) -> Result<Frame, AnimateError> {
            if elapsed > self.cutoff {
                return Err(AnimateError::Other("snapped".into()));
            }
            Ok(Frame {
                value: elapsed,
                finished: false,
            })
        }
    }

    struct BrittleAnimator;

    impl ValueAnimator for BrittleAnimator {
        fn animate(
            &self,
            keyframes: &[f32],
            transition: &ValueTransition,
        ) -> Result<Box<dyn ValueAnimation>, AnimateError> {
            if keyframes[0] < 0.0 {
                return Ok(Box::new(Brittle { cutoff: 0.25 }));
            }
            TweenAnimator.animate(keyframes, transition)
        }
    }

    #[test]
    fn test_run_completes_and_applies_transition_end() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        let mut end = IndexMap::new();
        end.insert("visible".to_string(), 0.0);
        let run = runner.start(node, vec![track("x", 0.0, 10.0, 1.0)], end, 0.0, &TweenAnimator);

        assert!(runner.advance(&mut tree, 0.5).is_empty());
        assert_eq!(tree.get(node).unwrap().value("x"), Some(5.0));
        assert_eq!(tree.get(node).unwrap().value("visible"), None);

        let reports = runner.advance(&mut tree, 1.0);
        assert_eq!(
            reports,
            vec![RunReport {
                run,
                node,
                outcome: Outcome::Completed
            }]
        );
        assert_eq!(tree.get(node).unwrap().value("x"), Some(10.0));
        assert_eq!(tree.get(node).unwrap().value("visible"), Some(0.0));
        assert!(!runner.has_active_animations());
    }

    #[test]
    fn test_failure_is_isolated_to_one_property() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        runner.start(
            node,
            vec![track("x", -1.0, 0.0, 1.0), track("y", 0.0, 4.0, 1.0)],
            IndexMap::new(),
            0.0,
            &BrittleAnimator,
        );

        assert!(runner.advance(&mut tree, 0.2).is_empty());
        assert!(runner.advance(&mut tree, 0.5).is_empty());
        // x froze at its last good frame, y kept going
        assert_eq!(tree.get(node).unwrap().value("x"), Some(0.2));
        assert_eq!(tree.get(node).unwrap().value("y"), Some(2.0));

        let reports = runner.advance(&mut tree, 1.0);
        assert_eq!(tree.get(node).unwrap().value("y"), Some(4.0));
        assert_eq!(
            reports[0].outcome,
            Outcome::Failed {
                property: "x".into(),
                source: AnimateError::Other("snapped".into())
            }
        );
    }

    #[test]
    fn test_new_run_cancels_previous() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        let first = runner.start(node, vec![track("x", 0.0, 1.0, 1.0)], IndexMap::new(), 0.0, &TweenAnimator);
        let second = runner.start(node, vec![track("x", 0.0, 1.0, 1.0)], IndexMap::new(), 0.0, &TweenAnimator);

        assert_eq!(runner.run_for(node), Some(second));
        let reports = runner.advance(&mut tree, 0.1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].run, first);
        assert_eq!(reports[0].outcome, Outcome::Cancelled);
    }

    #[test]
    fn test_cancelled_values_stay_put() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        let run = runner.start(node, vec![track("x", 0.0, 10.0, 1.0)], IndexMap::new(), 0.0, &TweenAnimator);
        runner.advance(&mut tree, 0.25);
        runner.cancel(run);
        runner.advance(&mut tree, 0.9);

        assert_eq!(tree.get(node).unwrap().value("x"), Some(2.5));
        assert!(runner.run_for(node).is_none());
    }

    #[test]
    fn test_advances_after_long_uptime() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        let start = 3.0e6;
        runner.start(node, vec![track("x", 0.0, 10.0, 1.0)], IndexMap::new(), start, &TweenAnimator);

        runner.advance(&mut tree, start + 1.0 / 60.0);
        let first = tree.get(node).unwrap().value("x").unwrap();
        assert!(first > 0.1 && first < 0.2, "first frame at {first}");

        runner.advance(&mut tree, start + 0.5);
        assert_eq!(tree.get(node).unwrap().value("x"), Some(5.0));
    }

    #[test]
    fn test_track_delay_holds_value() {
        let (mut tree, node) = tree_with_node();
        let mut runner = Runner::new();
        let mut delayed = track("x", 0.0, 10.0, 1.0);
        delayed.delay = 0.5;
        runner.start(node, vec![delayed], IndexMap::new(), 0.0, &TweenAnimator);

        runner.advance(&mut tree, 0.25);
        assert_eq!(tree.get(node).unwrap().value("x"), None);
        runner.advance(&mut tree, 1.0);
        assert_eq!(tree.get(node).unwrap().value("x"), Some(5.0));
    }

    #[test]
    fn test_outcome_merge_priority() {
        let failed = Outcome::Failed {
            property: "x".into(),
            source: AnimateError::Other("a".into()),
        };

        let mut outcome = Outcome::Completed;
        outcome.merge(failed.clone());
        outcome.merge(Outcome::Failed {
            property: "y".into(),
            source: AnimateError::Other("b".into()),
        });
        assert_eq!(outcome, failed);

        outcome.merge(Outcome::Cancelled);
        outcome.merge(Outcome::Completed);
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(outcome.into_result(), Err(MotionError::Cancelled));
    }
}
