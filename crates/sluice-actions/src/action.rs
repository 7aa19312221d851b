//! The action trait and its composition.
//!
//! An [`Action`] receives the request context and a [`Next`] callback that
//! runs the rest of the chain. It may work before calling `next`, after the
//! future returned by `next` completes, or not call `next` at all to answer
//! on its own.
//!
//! # Example
//!
//! ```
//! use sluice_actions::{Action, ActionExt, FnAction, Next};
//! use sluice_core::{Reply, RequestContext};
//!
//! let tag = FnAction::new("tag", |ctx: RequestContext, next: Next| async move {
//!     let reply = next.run(ctx).await?;
//!     Ok::<_, sluice_core::ActionError>(reply.with_header("X-Tagged", "yes"))
//! });
//!
//! let chain = tag.and_then(FnAction::new("noop", |ctx: RequestContext, next: Next| next.run(ctx)));
//!
//! # tokio_test::block_on(async {
//! let reply = chain
//!     .apply(RequestContext::new(), Next::handler(|_ctx| async { Ok(Reply::ok().text("hi")) }))
//!     .await
//!     .unwrap();
//! assert_eq!(reply.header("x-tagged"), Some("yes"));
//! # });
//! ```

use sluice_core::{ActionResult, Reply, RequestContext};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The future every action returns.
pub type ActionFuture = BoxFuture<'static, ActionResult<Reply>>;

/// Wraps an already-known reply into an [`ActionFuture`].
pub fn reply_now(reply: Reply) -> ActionFuture {
    Box::pin(std::future::ready(Ok(reply)))
}

/// A stage of the request pipeline.
///
/// Actions are built once and shared by every request, so any state they
/// hold must be safe for concurrent use.
///
/// # Invariants
///
/// - `next` is run at most once; not running it short-circuits the chain
/// - work done before `next` runs happens-before every later stage
/// - work done after `next`'s future completes happens-after every later stage
pub trait Action: Send + Sync + 'static {
    /// Returns the name of this action, used in logs.
    fn name(&self) -> &'static str;

    /// Runs the action.
    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture;
}

impl<A: Action + ?Sized> Action for Arc<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        (**self).apply(ctx, next)
    }
}

impl<A: Action + ?Sized> Action for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        (**self).apply(ctx, next)
    }
}

/// Callback that runs the rest of the chain.
///
/// Consumed by [`Next::run`], so it can be invoked only once.
pub struct Next {
    inner: Box<dyn FnOnce(RequestContext) -> ActionFuture + Send>,
}

impl Next {
    /// Creates a `Next` from a function returning an [`ActionFuture`].
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(RequestContext) -> ActionFuture + Send + 'static,
    {
        Self { inner: Box::new(f) }
    }

    /// Creates a terminal `Next` from an async handler.
    pub fn handler<F, Fut>(f: F) -> Self
    where
        F: FnOnce(RequestContext) -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult<Reply>> + Send + 'static,
    {
        Self::new(move |ctx| Box::pin(f(ctx)))
    }

    /// Runs the rest of the chain.
    pub fn run(self, ctx: RequestContext) -> ActionFuture {
        (self.inner)(ctx)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Next(..)")
    }
}

/// An action defined by a closure.
pub struct FnAction<F> {
    name: &'static str,
    func: F,
}

impl<F> FnAction<F> {
    /// Creates a function-based action.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult<Reply>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        Box::pin((self.func)(ctx, next))
    }
}

/// The action that only delegates to `next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Action for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        next.run(ctx)
    }
}

/// `first` wrapping `second`; built by [`ActionExt::and_then`].
///
/// Wherever `first` would run its `next`, `second` runs instead, wrapping
/// the original `next`. The first action of a chain is therefore the
/// outermost one.
#[derive(Debug)]
pub struct AndThen<A, B> {
    first: A,
    second: Arc<B>,
}

impl<A: Action, B: Action> Action for AndThen<A, B> {
    fn name(&self) -> &'static str {
        "and_then"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        let second = Arc::clone(&self.second);
        self.first
            .apply(ctx, Next::new(move |ctx| second.apply(ctx, next)))
    }
}

/// Combinators available on every action.
pub trait ActionExt: Action {
    /// Runs `self`, then `second` in place of `self`'s `next`.
    fn and_then<B: Action>(self, second: B) -> AndThen<Self, B>
    where
        Self: Sized,
    {
        AndThen {
            first: self,
            second: Arc::new(second),
        }
    }

    /// Runs `block` on the global dispatch pool behind this action.
    ///
    /// See [`crate::entry::sync`].
    fn sync<F, E>(&self, ctx: RequestContext, block: F) -> BoxFuture<'static, Reply>
    where
        F: FnOnce(RequestContext) -> Result<Reply, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        crate::entry::guarded(self, ctx, crate::entry::sync_terminal(None, block))
    }

    /// Runs `block` on `dispatcher` behind this action.
    fn sync_on<F, E>(
        &self,
        dispatcher: &crate::Dispatcher,
        ctx: RequestContext,
        block: F,
    ) -> BoxFuture<'static, Reply>
    where
        F: FnOnce(RequestContext) -> Result<Reply, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let terminal = crate::entry::sync_terminal(Some(dispatcher.clone()), block);
        crate::entry::guarded(self, ctx, terminal)
    }

    /// Runs the future built by `block` behind this action.
    ///
    /// See [`crate::entry::async_block`].
    fn async_block<F, Fut, E>(&self, ctx: RequestContext, block: F) -> BoxFuture<'static, Reply>
    where
        F: FnOnce(RequestContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Reply, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        crate::entry::guarded(self, ctx, crate::entry::async_terminal(None, block))
    }

    /// Runs the future built by `block` on `dispatcher` behind this action.
    fn async_block_on<F, Fut, E>(
        &self,
        dispatcher: &crate::Dispatcher,
        ctx: RequestContext,
        block: F,
    ) -> BoxFuture<'static, Reply>
    where
        F: FnOnce(RequestContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Reply, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let terminal = crate::entry::async_terminal(Some(dispatcher.clone()), block);
        crate::entry::guarded(self, ctx, terminal)
    }
}

impl<A: Action + ?Sized> ActionExt for A {}
