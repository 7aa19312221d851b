//! Entry points that start a chain.
//!
//! Every entry point returns a future whose output is a [`Reply`], never an
//! error: failures and panics raised anywhere in the chain, before or after
//! the nested call, are turned into a 5xx reply by
//! [`transform_error`](crate::transform_error). The returned future always
//! completes.
//!
//! | Function           | Handler shape                          | Runs on                       |
//! |--------------------|----------------------------------------|-------------------------------|
//! | [`sync`]           | `FnOnce(ctx) -> Result<Reply, E>`      | the global [`Dispatcher`]     |
//! | [`sync_on`]        | `FnOnce(ctx) -> Result<Reply, E>`      | the given [`Dispatcher`]      |
//! | [`async_block`]    | `FnOnce(ctx) -> impl Future<Result<..>>` | the caller's executor       |
//! | [`async_block_on`] | `FnOnce(ctx) -> impl Future<Result<..>>` | the given [`Dispatcher`]    |
//!
//! The same entry points exist on every action through
//! [`ActionExt`](crate::ActionExt), which run the handler behind that action.

use crate::action::{Action, ActionExt, BoxFuture, Next, Passthrough};
use crate::dispatch::Dispatcher;
use crate::error_adapter::transform_error;
use futures_util::FutureExt;
use sluice_core::{ActionError, Reply, RequestContext};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs a blocking handler on the global dispatch pool.
///
/// # Example
///
/// ```
/// use sluice_actions::entry;
/// use sluice_core::{Reply, RequestContext};
///
/// # tokio_test::block_on(async {
/// let reply = entry::sync(RequestContext::new(), |_ctx| {
///     Ok::<_, anyhow::Error>(Reply::ok().text("Hello World!\n"))
/// })
/// .await;
/// assert_eq!(reply.status_code(), http::StatusCode::OK);
/// # });
/// ```
pub fn sync<F, E>(ctx: RequestContext, block: F) -> BoxFuture<'static, Reply>
where
    F: FnOnce(RequestContext) -> Result<Reply, E> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Passthrough.sync(ctx, block)
}

/// Runs a blocking handler on `dispatcher`.
pub fn sync_on<F, E>(dispatcher: &Dispatcher, ctx: RequestContext, block: F) -> BoxFuture<'static, Reply>
where
    F: FnOnce(RequestContext) -> Result<Reply, E> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Passthrough.sync_on(dispatcher, ctx, block)
}

/// Runs an async handler where the returned future is polled.
pub fn async_block<F, Fut, E>(ctx: RequestContext, block: F) -> BoxFuture<'static, Reply>
where
    F: FnOnce(RequestContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Reply, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Passthrough.async_block(ctx, block)
}

/// Builds and runs an async handler on `dispatcher`.
pub fn async_block_on<F, Fut, E>(
    dispatcher: &Dispatcher,
    ctx: RequestContext,
    block: F,
) -> BoxFuture<'static, Reply>
where
    F: FnOnce(RequestContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Reply, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Passthrough.async_block_on(dispatcher, ctx, block)
}

/// Applies `action` and converts every failure into an error reply.
pub(crate) fn guarded<A: Action + ?Sized>(
    action: &A,
    ctx: RequestContext,
    terminal: Next,
) -> BoxFuture<'static, Reply> {
    let diagnostics = ctx.clone();

    match catch_unwind(AssertUnwindSafe(|| action.apply(ctx, terminal))) {
        Err(payload) => {
            let err = ActionError::panicked(payload.as_ref());
            let reply = transform_error(&err, Some(&diagnostics));
            Box::pin(std::future::ready(reply))
        }
        Ok(running) => Box::pin(async move {
            match AssertUnwindSafe(running).catch_unwind().await {
                Ok(Ok(reply)) => reply,
                Ok(Err(err)) => transform_error(&err, Some(&diagnostics)),
                Err(payload) => {
                    transform_error(&ActionError::panicked(payload.as_ref()), Some(&diagnostics))
                }
            }
        }),
    }
}

pub(crate) fn sync_terminal<F, E>(dispatcher: Option<Dispatcher>, block: F) -> Next
where
    F: FnOnce(RequestContext) -> Result<Reply, E> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Next::new(move |ctx| {
        let pool = match dispatcher {
            Some(pool) => pool,
            None => match Dispatcher::global() {
                Ok(pool) => pool.clone(),
                Err(err) => return Box::pin(std::future::ready(Err(err))),
            },
        };
        let running = pool.run(move || block(ctx).map_err(|err| ActionError::from(err.into())));
        Box::pin(async move { running.await? })
    })
}

pub(crate) fn async_terminal<F, Fut, E>(dispatcher: Option<Dispatcher>, block: F) -> Next
where
    F: FnOnce(RequestContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Reply, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    Next::new(move |ctx| match dispatcher {
        None => {
            let running = block(ctx);
            Box::pin(async move { running.await.map_err(|err| ActionError::from(err.into())) })
        }
        Some(pool) => {
            let running = pool.spawn(async move {
                block(ctx).await.map_err(|err| ActionError::from(err.into()))
            });
            Box::pin(async move { running.await? })
        }
    })
}
