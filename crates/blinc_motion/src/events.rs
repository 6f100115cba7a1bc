//! Event journal
//!
//! A bounded record of what the engine did and when, for tooling and timing
//! assertions. Times are engine seconds.

use crate::error::MotionError;
use crate::runner::Outcome;
use crate::transition::When;
use crate::tree::NodeId;
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq)]
pub enum MotionEvent {
    /// A node began orchestrating a new target
    OrchestrationStarted { node: NodeId, at: f64, when: When },
    /// A child intent came due and the child was started
    IntentDispatched {
        node: NodeId,
        index: usize,
        delay: f32,
        at: f64,
    },
    /// A node's own property run began
    RunStarted { node: NodeId, at: f64 },
    /// A node's own property run ended
    RunFinished {
        node: NodeId,
        at: f64,
        outcome: Outcome,
    },
    /// A node's own run and all its attached children have settled
    OrchestrationSettled {
        node: NodeId,
        at: f64,
        outcome: Outcome,
    },
    /// A resolution or configuration problem that was worked around
    Diagnostic { node: NodeId, error: MotionError },
}

impl MotionEvent {
    pub fn node(&self) -> NodeId {
        match self {
            MotionEvent::OrchestrationStarted { node, .. }
            | MotionEvent::IntentDispatched { node, .. }
            | MotionEvent::RunStarted { node, .. }
            | MotionEvent::RunFinished { node, .. }
            | MotionEvent::OrchestrationSettled { node, .. }
            | MotionEvent::Diagnostic { node, .. } => *node,
        }
    }
}

/// Ring buffer of events; the oldest are dropped past capacity
#[derive(Debug)]
pub struct Journal {
    events: VecDeque<MotionEvent>,
    capacity: usize,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn record(&mut self, event: MotionEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionEvent> {
        self.events.iter()
    }

    pub fn drain(&mut self) -> Vec<MotionEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
