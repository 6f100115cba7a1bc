//! Blinc Motion
//!
//! Declarative animation orchestration over a tree of nodes.
//!
//! # Features
//!
//! - **Variants**: named targets, static or computed from per-node custom data
//! - **Propagation**: labels flow from a node to every descendant without its
//!   own animate prop, and each descendant resolves them in its own registry
//! - **Orchestration**: `before-children`, `after-children` and staggered
//!   child starts
//! - **Controls**: imperative start/stop across many nodes with awaitable
//!   completion
//!
//! # Example
//!
//! ```rust
//! use blinc_motion::{
//!     AnimationTarget, MotionEngine, MotionProps, TargetDefinition, Transition, Variants,
//! };
//!
//! let list_variants = Variants::new()
//!     .with("hidden", TargetDefinition::default())
//!     .with(
//!         "visible",
//!         TargetDefinition::default().with_transition(Transition::new().stagger_children(0.1)),
//!     );
//! let item_variants = Variants::new()
//!     .with("hidden", AnimationTarget::new().with("opacity", 0.0))
//!     .with("visible", AnimationTarget::new().with("opacity", 1.0));
//!
//! let mut engine = MotionEngine::default();
//! let list = engine
//!     .mount(
//!         None,
//!         MotionProps::new()
//!             .initial("hidden")
//!             .animate("visible")
//!             .variants(list_variants),
//!     )
//!     .unwrap();
//! let item = engine
//!     .mount(Some(list), MotionProps::new().variants(item_variants))
//!     .unwrap();
//! assert_eq!(engine.value(item, "opacity"), Some(0.0));
//!
//! for _ in 0..60 {
//!     engine.tick(1.0 / 60.0);
//! }
//! assert_eq!(engine.value(item, "opacity"), Some(1.0));
//! ```

pub mod config;
pub mod controls;
pub mod engine;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod props;
pub mod resolver;
pub mod runner;
pub mod target;
pub mod transition;
pub mod tree;
pub mod variant;

pub use config::{MotionConfig, TransitionDefaults};
pub use controls::{AnimationControls, AnimationHandle, BatchId, ControlsDefinition, ControlsId};
pub use engine::MotionEngine;
pub use error::{ConfigError, MotionError, Result};
pub use events::{Journal, MotionEvent};
pub use orchestrator::{OrchestrationId, Schedule, Stagger, StartIntent};
pub use props::{Animate, Initial, MotionProps};
pub use resolver::{Materialized, ResolvedTrack};
pub use runner::{Outcome, RunId, RunReport, Runner};
pub use target::{AnimationTarget, TargetDefinition, TargetValue};
pub use transition::{StaggerDirection, Transition, When};
pub use tree::{MotionNode, MotionTree, NodeId};
pub use variant::{Custom, Definition, DynamicVariant, Labels, Variant, Variants};

pub use blinc_animation::{
    AnimateError, Easing, Frame, KeyframeError, Repeat, RepeatType, TweenAnimator,
    ValueAnimation, ValueAnimator, ValueTransition,
};
