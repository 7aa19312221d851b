//! An ordered list of actions applied as one.
//!
//! A [`Pipeline`] is the dynamic counterpart of a chain of
//! [`and_then`](crate::ActionExt::and_then) calls: stages run in insertion
//! order on the way in and in reverse order on the way out.
//!
//! # Example
//!
//! ```
//! use sluice_actions::{Pipeline, Passthrough};
//! use sluice_actions::stages::{LogAfter, LogBefore};
//!
//! let pipeline = Pipeline::builder()
//!     .stage(LogBefore)
//!     .stage(Passthrough)
//!     .stage(LogAfter)
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), vec!["log_before", "passthrough", "log_after"]);
//! ```

use crate::action::{Action, ActionFuture, Next};
use sluice_core::RequestContext;
use std::sync::Arc;

/// A type-erased action that can be stored in a vector.
pub type BoxedAction = Arc<dyn Action>;

/// An ordered chain of actions.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedAction>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Builds the chain for one request, from back to front.
    fn build_chain(&self, terminal: Next) -> Next {
        let mut next = terminal;
        for stage in self.stages.iter().rev() {
            let stage = Arc::clone(stage);
            let inner = next;
            next = Next::new(move |ctx| stage.apply(ctx, inner));
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Action for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        self.build_chain(next).run(ctx)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedAction>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Earlier stages wrap later ones.
    #[must_use]
    pub fn stage<A: Action>(mut self, action: A) -> Self {
        self.stages.push(Arc::new(action));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn shared_stage(mut self, action: BoxedAction) -> Self {
        self.stages.push(action);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
