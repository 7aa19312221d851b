//! Request timing logs.
//!
//! [`LogBefore`] records when the request reached it and stores that instant
//! in the context under [`START_STATE`]. [`LogAfter`] waits for the rest of
//! the chain and logs the time elapsed since that instant. Placed at the two
//! ends of a chain they measure the latency of everything in between.

use crate::action::{Action, ActionFuture, Next};
use sluice_core::RequestContext;
use std::time::Instant;
use tracing::info;

/// Context key holding the [`Instant`] recorded by [`LogBefore`].
pub const START_STATE: &str = "start";

/// Logs the request and stores its start instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBefore;

impl Action for LogBefore {
    fn name(&self) -> &'static str {
        "log_before"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        info!(request_id = %ctx.request_id(), path = %ctx.path(), "[Log] before action -> {}", ctx.path());
        next.run(ctx.with_value(START_STATE, Instant::now()))
    }
}

/// Logs how long the rest of the chain took.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAfter;

impl Action for LogAfter {
    fn name(&self) -> &'static str {
        "log_after"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        let running = next.run(ctx.clone());
        Box::pin(async move {
            let result = running.await;
            let start = ctx
                .value::<Instant>(START_STATE)
                .copied()
                .unwrap_or_else(|| ctx.started_at());
            let elapsed = start.elapsed();
            #[allow(clippy::cast_possible_truncation)]
            let elapsed_ms = elapsed.as_millis() as u64;
            info!(
                request_id = %ctx.request_id(),
                path = %ctx.path(),
                elapsed_ms,
                "[Log] after action -> {} : took {:?}",
                ctx.path(),
                elapsed
            );
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionExt;
    use sluice_core::Reply;

    #[tokio::test]
    async fn test_start_is_visible_downstream() {
        let chain = LogBefore.and_then(LogAfter);
        let handler = Next::handler(|ctx: RequestContext| async move {
            let has_start = ctx.value::<Instant>(START_STATE).is_some();
            Ok(Reply::ok().text(has_start.to_string()))
        });

        let reply = chain.apply(RequestContext::new(), handler).await.unwrap();
        assert_eq!(reply.body().collect().await.unwrap(), "true");
    }

    #[tokio::test]
    async fn test_log_after_passes_errors_through() {
        let handler = Next::handler(|_ctx| async { Err(sluice_core::ActionError::msg("nope")) });
        assert!(LogAfter.apply(RequestContext::new(), handler).await.is_err());
    }
}
