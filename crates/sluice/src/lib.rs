//! # Sluice
//!
//! **A composable request pipeline for HTTP services.**
//!
//! - **Actions** wrap the rest of a chain and may answer on their own; they
//!   compose with `and_then`
//! - **Replies** are immutable values with a streaming body and a
//!   materialized-value side channel resolved when the body starts flowing
//! - **Entry points** run blocking handlers on a dedicated dispatch pool and
//!   turn every failure into a reply
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sluice::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let managed = Arc::new(api_managed(
//!         ApiKeyCheck::new(["12345"]),
//!         Throttle::new(2, Duration::from_secs(3)),
//!     ));
//!
//!     let routes = Routes::new().get("/tests/text", move |ctx: RequestContext| {
//!         managed.sync(ctx, |_ctx| Ok::<_, anyhow::Error>(Reply::ok().text("Hello World!\n")))
//!     });
//!
//!     Server::builder().routes(routes).build().run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → LogBefore → ApiKeyCheck → Throttle → LogAfter → handler
//!                                                              ↓
//! Response ← responder (materializes body) ← Reply ←───────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/sluice/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use sluice_core as core;

// Re-export action types
pub use sluice_actions as actions;

// Re-export server types
pub use sluice_server as server;

// Re-export configuration types
pub use sluice_config as config;

// Re-export telemetry types
pub use sluice_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use sluice::prelude::*;
///
/// let reply = Reply::ok().text("Hello World!\n");
/// assert!(reply.status_code().is_success());
/// ```
pub mod prelude {
    pub use sluice_core::{
        ActionError, ActionResult, Body, Cancellable, Cookie, Materialized, Reply,
        RequestContext, SameSite, StreamError,
    };

    pub use sluice_actions::stages::{api_managed, ApiKeyCheck, LogAfter, LogBefore, Throttle};
    pub use sluice_actions::{entry, Action, ActionExt, Dispatcher, Next, Pipeline};

    pub use sluice_server::{Routes, Server};

    pub use sluice_config::{ConfigLoader, SluiceConfig};
    pub use sluice_telemetry::{init_logging, LogConfig};
}
