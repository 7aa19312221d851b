//! # Sluice Actions
//!
//! Composable request actions for Sluice.
//!
//! An [`Action`] wraps the rest of a chain: it sees the request on the way in
//! and the reply on the way out, and may answer on its own without calling
//! the next stage. Actions compose with [`ActionExt::and_then`]; the first
//! action of a chain is the outermost wrapper.
//!
//! ```text
//! LogBefore.and_then(ApiKeyCheck).and_then(Throttle).and_then(LogAfter)
//!
//! request → LogBefore → ApiKeyCheck → Throttle → LogAfter → handler
//!                                                              ↓
//! reply   ← LogBefore ← ApiKeyCheck ← Throttle ← LogAfter ←────┘
//! ```
//!
//! Chains are started through the [`entry`] points, which run blocking
//! handlers on the [`Dispatcher`] pool and turn every failure into a 5xx
//! reply through [`transform_error`].
//!
//! ## Example
//!
//! ```
//! use sluice_actions::stages::{ApiKeyCheck, LogAfter, LogBefore};
//! use sluice_actions::ActionExt;
//! use sluice_core::{Reply, RequestContext};
//!
//! let guarded = LogBefore.and_then(ApiKeyCheck::new(["12345"])).and_then(LogAfter);
//!
//! # tokio_test::block_on(async {
//! let reply = guarded
//!     .async_block(RequestContext::new(), |_ctx| async {
//!         Ok::<_, anyhow::Error>(Reply::ok().text("never reached"))
//!     })
//!     .await;
//! assert_eq!(reply.status_code(), http::StatusCode::BAD_REQUEST);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/sluice-actions/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod action;
pub mod dispatch;
pub mod entry;
pub mod error_adapter;
pub mod pipeline;
pub mod stages;

// Re-export main types at crate root
pub use action::{reply_now, Action, ActionExt, ActionFuture, AndThen, BoxFuture, FnAction, Next, Passthrough};
pub use dispatch::{Dispatcher, DispatcherConfig};
pub use error_adapter::transform_error;
pub use pipeline::{BoxedAction, Pipeline, PipelineBuilder};
