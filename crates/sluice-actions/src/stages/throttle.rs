//! Fixed-window throttle.
//!
//! The throttle admits at most `limit` requests per window. The window opens
//! with the first request after the previous one has expired and lasts
//! `window`; once `limit` requests were admitted in it, later requests are
//! answered with a rejection reply and never reach the rest of the chain.
//!
//! ## Precision
//!
//! This is a fixed-window counter, not a sliding window or a token bucket. A
//! burst straddling a window boundary can admit up to twice the limit over a
//! short interval; this is accepted for a best-effort throttle.
//!
//! The window end and the admitted count share one atomic word and change
//! together in a single compare-and-swap, so concurrent requests never push
//! one window over its limit, including requests racing a window reset.
//!
//! ## Example
//!
//! ```
//! use sluice_actions::stages::Throttle;
//! use std::time::Duration;
//!
//! let throttle = Throttle::builder()
//!     .limit(2)
//!     .window(Duration::from_millis(3000))
//!     .build();
//! assert_eq!(throttle.limit(), 2);
//! ```

use crate::action::{reply_now, Action, ActionFuture, Next};
use http::StatusCode;
use serde_json::json;
use sluice_core::{Reply, RequestContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Default rejection message.
pub const DEFAULT_MESSAGE: &str = "too much calls";

/// Header carrying the seconds until the window resets.
pub const RETRY_AFTER: &str = "retry-after";

/// Largest effective limit; higher limits are clamped to it.
pub const MAX_LIMIT: u64 = (1 << COUNT_BITS) - 1;

// State layout: window end in ms since `epoch` above, admitted count below.
const COUNT_BITS: u32 = 24;
const MAX_END_MS: u64 = u64::MAX >> COUNT_BITS;

const fn pack(end_ms: u64, count: u64) -> u64 {
    (end_ms << COUNT_BITS) | count
}

const fn window_end(state: u64) -> u64 {
    state >> COUNT_BITS
}

const fn admitted(state: u64) -> u64 {
    state & MAX_LIMIT
}

/// Throttle action.
///
/// One instance is meant to be shared by every request it guards; its
/// state is a single atomic word.
#[derive(Debug)]
pub struct Throttle {
    limit: u64,
    window: Duration,
    message: String,
    status: StatusCode,
    epoch: Instant,
    /// Window end (ms since `epoch`) and admitted count, see [`pack`].
    state: AtomicU64,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed.
    Allowed {
        /// Requests still admissible in this window.
        remaining: u64,
    },
    /// The request is rejected.
    Limited {
        /// Time until the window resets.
        reset_in: Duration,
    },
}

impl Throttle {
    /// Creates a throttle admitting `limit` requests per `window`.
    #[must_use]
    pub fn new(limit: u64, window: Duration) -> Self {
        Self::builder().limit(limit).window(window).build()
    }

    /// Creates a new throttle builder.
    #[must_use]
    pub fn builder() -> ThrottleBuilder {
        ThrottleBuilder::default()
    }

    /// Requests admitted per window.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn next_end(&self, now: u64) -> u64 {
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        now.saturating_add(window_ms).min(MAX_END_MS)
    }

    /// Counts one request against the current window.
    pub fn admit(&self) -> Admission {
        let now = self.now_ms();
        let limit = self.limit.min(MAX_LIMIT);
        let current = |state: u64| {
            if now >= window_end(state) {
                (self.next_end(now), 0)
            } else {
                (window_end(state), admitted(state))
            }
        };

        let update = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let (end, count) = current(state);
                (count < limit).then(|| pack(end, count + 1))
            });

        match update {
            Ok(previous) => {
                let (_, count) = current(previous);
                Admission::Allowed {
                    remaining: limit - (count + 1),
                }
            }
            Err(state) => {
                let (end, _) = current(state);
                Admission::Limited {
                    reset_in: Duration::from_millis(end.saturating_sub(now)),
                }
            }
        }
    }

    fn rejection(&self, reset_in: Duration) -> Reply {
        let retry_after = reset_in.as_secs().max(1);
        Reply::status(self.status)
            .with_header(RETRY_AFTER, retry_after.to_string())
            .json_value(&json!({ "error": self.message }))
    }
}

impl Action for Throttle {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        match self.admit() {
            Admission::Allowed { .. } => next.run(ctx),
            Admission::Limited { reset_in } => {
                info!(request_id = %ctx.request_id(), path = %ctx.path(), "too many calls for {}", ctx.path());
                metrics::counter!("sluice_throttle_rejections_total").increment(1);
                reply_now(self.rejection(reset_in))
            }
        }
    }
}

/// Builder for [`Throttle`].
#[derive(Debug, Clone)]
pub struct ThrottleBuilder {
    limit: u64,
    window: Duration,
    message: String,
    status: StatusCode,
}

impl Default for ThrottleBuilder {
    fn default() -> Self {
        Self {
            limit: 2,
            window: Duration::from_millis(3000),
            message: DEFAULT_MESSAGE.to_string(),
            status: StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl ThrottleBuilder {
    /// Sets the number of requests admitted per window, at most
    /// [`MAX_LIMIT`].
    ///
    /// Default: 2.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the window length.
    ///
    /// Default: 3 seconds.
    #[must_use]
    pub const fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the message of the rejection body.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the rejection status.
    ///
    /// Default: 429.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a client error.
    #[must_use]
    pub fn rejection_status(mut self, status: StatusCode) -> Self {
        assert!(
            status.is_client_error(),
            "throttle rejection status must be 4xx, got {status}"
        );
        self.status = status;
        self
    }

    /// Builds the throttle. Its clock starts now.
    #[must_use]
    pub fn build(self) -> Throttle {
        Throttle {
            limit: self.limit,
            window: self.window,
            message: self.message,
            status: self.status,
            epoch: Instant::now(),
            state: AtomicU64::new(pack(0, 0)),
        }
    }
}
