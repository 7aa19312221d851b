//! # Sluice Server
//!
//! Serving layer for Sluice.
//!
//! - [`inbound`]: hyper request to [`RequestContext`](sluice_core::RequestContext),
//!   with the body left unread
//! - [`responder`]: [`Reply`](sluice_core::Reply) to hyper response, resolving
//!   the reply's materialized value when its body starts
//! - [`Routes`]: exact-match route table answering `404` otherwise
//! - [`Server`]: HTTP/1.1 accept loop with graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use sluice_actions::ActionExt;
//! use sluice_actions::stages::{LogAfter, LogBefore};
//! use sluice_core::{Reply, RequestContext};
//! use sluice_server::{Routes, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let logged = std::sync::Arc::new(LogBefore.and_then(LogAfter));
//!
//!     let routes = Routes::new().get("/tests/text", move |ctx: RequestContext| {
//!         logged.async_block(ctx, |_ctx| async {
//!             Ok::<_, anyhow::Error>(Reply::ok().text("Hello World!\n"))
//!         })
//!     });
//!
//!     Server::builder().routes(routes).build().run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sluice-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod inbound;
pub mod responder;
pub mod routes;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use responder::{HttpResponse, ResponseBody};
pub use routes::{RouteFuture, RouteHandler, Routes};
pub use server::{handle, Server, ServerBuilder, ServerError};
pub use shutdown::ShutdownSignal;
