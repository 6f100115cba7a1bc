//! Imperative animation controls
//!
//! An [`AnimationControls`] can be bound to any number of nodes through their
//! animate prop. Commands are queued on the controls and picked up by the
//! engine at the start of the next frame, so calling `start` or `stop` never
//! touches the tree directly.
//!
//! Each `start` fans out to one orchestration per bound node and fans back in
//! through a batch counter. The returned [`AnimationHandle`] resolves when the
//! counter reaches zero.

use crate::error::MotionError;
use crate::runner::Outcome;
use crate::tree::NodeId;
use crate::variant::{Custom, Definition};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};
use tracing::debug;

/// Identity of a controls instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ControlsId(u64);

impl ControlsId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A definition that may differ per bound node
#[derive(Clone)]
pub enum ControlsDefinition {
    Shared(Definition),
    /// Computed from each node's custom data
    PerNode(Rc<dyn Fn(Option<&Custom>) -> Definition>),
}

impl ControlsDefinition {
    pub fn for_node(&self, custom: Option<&Custom>) -> Definition {
        match self {
            ControlsDefinition::Shared(definition) => definition.clone(),
            ControlsDefinition::PerNode(compute) => compute(custom),
        }
    }
}

impl fmt::Debug for ControlsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlsDefinition::Shared(definition) => {
                f.debug_tuple("Shared").field(definition).finish()
            }
            ControlsDefinition::PerNode(_) => f.write_str("PerNode(..)"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ControlsCommand {
    Start {
        definition: ControlsDefinition,
        completion: Completion,
    },
    Set(ControlsDefinition),
    Stop,
}

#[derive(Debug, Default)]
struct ControlsInner {
    queue: VecDeque<ControlsCommand>,
    bound: SmallVec<[NodeId; 4]>,
}

/// Shared handle for starting and stopping animations on bound nodes
#[derive(Clone)]
pub struct AnimationControls {
    id: ControlsId,
    inner: Rc<RefCell<ControlsInner>>,
}

impl AnimationControls {
    pub fn new() -> Self {
        Self {
            id: ControlsId::next(),
            inner: Rc::new(RefCell::new(ControlsInner::default())),
        }
    }

    pub fn id(&self) -> ControlsId {
        self.id
    }

    /// Animate every bound node to `definition`
    pub fn start(&self, definition: impl Into<Definition>) -> AnimationHandle {
        self.enqueue_start(ControlsDefinition::Shared(definition.into()))
    }

    /// Animate every bound node to a definition computed from its custom data
    pub fn start_with<F>(&self, compute: F) -> AnimationHandle
    where
        F: Fn(Option<&Custom>) -> Definition + 'static,
    {
        self.enqueue_start(ControlsDefinition::PerNode(Rc::new(compute)))
    }

    fn enqueue_start(&self, definition: ControlsDefinition) -> AnimationHandle {
        let (completion, handle) = Completion::new();
        self.inner.borrow_mut().queue.push_back(ControlsCommand::Start {
            definition,
            completion,
        });
        handle
    }

    /// Jump every bound node to the end values of `definition`
    pub fn set(&self, definition: impl Into<Definition>) {
        self.inner
            .borrow_mut()
            .queue
            .push_back(ControlsCommand::Set(ControlsDefinition::Shared(
                definition.into(),
            )));
    }

    /// Stop everything this instance started
    ///
    /// Starts still waiting in the queue are rejected right away. Running
    /// animations are cancelled on the next frame and keep their values.
    pub fn stop(&self) {
        let mut inner = self.inner.borrow_mut();
        let mut rejected = 0;
        inner.queue.retain(|command| match command {
            ControlsCommand::Start { completion, .. } => {
                completion.resolve(Err(MotionError::Cancelled));
                rejected += 1;
                false
            }
            _ => true,
        });
        inner.queue.push_back(ControlsCommand::Stop);
        if rejected > 0 {
            debug!("Controls {:?} rejected {} queued starts", self.id, rejected);
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.inner.borrow().bound.is_empty()
    }

    pub fn bound_nodes(&self) -> SmallVec<[NodeId; 4]> {
        self.inner.borrow().bound.clone()
    }

    /// Commands waiting for the next frame
    pub fn pending_commands(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub(crate) fn bind(&self, node: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if !inner.bound.contains(&node) {
            inner.bound.push(node);
        }
    }

    pub(crate) fn unbind(&self, node: NodeId) {
        self.inner.borrow_mut().bound.retain(|n| *n != node);
    }

    pub(crate) fn take_commands(&self) -> VecDeque<ControlsCommand> {
        std::mem::take(&mut self.inner.borrow_mut().queue)
    }
}

impl Default for AnimationControls {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AnimationControls {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for AnimationControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AnimationControls")
            .field("id", &self.id)
            .field("bound", &inner.bound)
            .field("queued", &inner.queue.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Slot {
    result: Option<Result<(), MotionError>>,
    waker: Option<Waker>,
}

/// Resolving side of an [`AnimationHandle`]
#[derive(Clone, Debug)]
pub(crate) struct Completion(Rc<RefCell<Slot>>);

impl Completion {
    pub(crate) fn new() -> (Completion, AnimationHandle) {
        let slot = Rc::new(RefCell::new(Slot::default()));
        (Completion(slot.clone()), AnimationHandle { slot })
    }

    /// Resolve once; later calls are ignored
    pub(crate) fn resolve(&self, result: Result<(), MotionError>) {
        let waker = {
            let mut slot = self.0.borrow_mut();
            if slot.result.is_some() {
                return;
            }
            slot.result = Some(result);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Completes when every node a `start` reached has settled
///
/// Resolves `Ok(())` when all completed, `Err(Cancelled)` if any was
/// stopped or superseded, otherwise `Err(PropertyAnimationFailed)` if any
/// property failed.
#[derive(Debug)]
#[must_use = "handles do nothing unless awaited or polled"]
pub struct AnimationHandle {
    slot: Rc<RefCell<Slot>>,
}

impl AnimationHandle {
    pub fn is_finished(&self) -> bool {
        self.slot.borrow().result.is_some()
    }

    /// The result, once finished
    pub fn result(&self) -> Option<Result<(), MotionError>> {
        self.slot.borrow().result.clone()
    }
}

impl Future for AnimationHandle {
    type Output = Result<(), MotionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.result.clone() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

new_key_type! {
    /// One `start` call's fan-in counter
    pub struct BatchId;
}

#[derive(Debug)]
struct Batch {
    controls: ControlsId,
    outstanding: usize,
    outcome: Outcome,
    completion: Completion,
}

/// Fan-in counters for in-flight `start` calls
#[derive(Debug, Default)]
pub(crate) struct BatchLedger {
    batches: SlotMap<BatchId, Batch>,
}

impl BatchLedger {
    /// Open a batch waiting on `count` nodes
    ///
    /// An empty batch resolves immediately and returns `None`.
    pub(crate) fn open(
        &mut self,
        controls: ControlsId,
        count: usize,
        completion: Completion,
    ) -> Option<BatchId> {
        if count == 0 {
            completion.resolve(Ok(()));
            return None;
        }
        Some(self.batches.insert(Batch {
            controls,
            outstanding: count,
            outcome: Outcome::Completed,
            completion,
        }))
    }

    /// One node of the batch settled
    pub(crate) fn settle(&mut self, id: BatchId, outcome: Outcome) {
        let Some(batch) = self.batches.get_mut(id) else {
            return;
        };
        batch.outcome.merge(outcome);
        batch.outstanding = batch.outstanding.saturating_sub(1);
        if batch.outstanding > 0 {
            return;
        }
        if let Some(batch) = self.batches.remove(id) {
            debug!(
                "Batch for controls {:?} settled: {:?}",
                batch.controls, batch.outcome
            );
            batch.completion.resolve(batch.outcome.into_result());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinc_animation::AnimateError;

    #[test]
    fn test_stop_rejects_queued_starts() {
        let controls = AnimationControls::new();
        let handle = controls.start("visible");
        controls.set("hidden");
        controls.stop();

        assert_eq!(handle.result(), Some(Err(MotionError::Cancelled)));
        let commands = controls.take_commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], ControlsCommand::Set(_)));
        assert!(matches!(commands[1], ControlsCommand::Stop));
    }

    #[test]
    fn test_identity_equality() {
        let a = AnimationControls::new();
        let b = AnimationControls::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_bind_is_idempotent() {
        let controls = AnimationControls::new();
        let node: NodeId = slotmap::KeyData::from_ffi(1).into();
        controls.bind(node);
        controls.bind(node);
        assert_eq!(controls.bound_nodes().as_slice(), &[node]);
        controls.unbind(node);
        assert!(!controls.is_bound());
    }

    #[test]
    fn test_batch_waits_for_every_node() {
        let mut ledger = BatchLedger::default();
        let (completion, handle) = Completion::new();
        let batch = ledger
            .open(AnimationControls::new().id(), 2, completion)
            .unwrap();

        ledger.settle(batch, Outcome::Completed);
        assert!(!handle.is_finished());

        ledger.settle(batch, Outcome::Cancelled);
        assert_eq!(pollster::block_on(handle), Err(MotionError::Cancelled));
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn test_batch_reports_failure() {
        let mut ledger = BatchLedger::default();
        let (completion, handle) = Completion::new();
        let batch = ledger
            .open(AnimationControls::new().id(), 1, completion)
            .unwrap();

        ledger.settle(
            batch,
            Outcome::Failed {
                property: "x".into(),
                source: AnimateError::Other("boom".into()),
            },
        );
        assert!(matches!(
            handle.result(),
            Some(Err(MotionError::PropertyAnimationFailed { property, .. })) if property == "x"
        ));
    }

    #[test]
    fn test_empty_batch_resolves_immediately() {
        let mut ledger = BatchLedger::default();
        let (completion, handle) = Completion::new();
        assert!(ledger
            .open(AnimationControls::new().id(), 0, completion)
            .is_none());
        assert_eq!(handle.result(), Some(Ok(())));
    }
}
