//! # Sluice Test
//!
//! In-memory HTTP testing for Sluice routes.
//!
//! Requests are served by the same code a real connection runs, so replies
//! drain through the responder and their materialized values resolve
//! exactly as they would on the wire. No port is bound.
//!
//! - [`TestClient`]: fluent requests against a [`Routes`](sluice_server::Routes) table
//! - [`TestResponse`]: a fully read response with assertion helpers
//! - [`TestStream`]: a response read chunk by chunk, for indefinite bodies
//!
//! ## Example
//!
//! ```
//! use sluice_actions::stages::ApiKeyCheck;
//! use sluice_actions::ActionExt;
//! use sluice_core::{Reply, RequestContext};
//! use sluice_server::Routes;
//! use sluice_test::TestClient;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let guard = Arc::new(ApiKeyCheck::new(["12345"]));
//! let routes = Routes::new().get("/tests/json", move |ctx: RequestContext| {
//!     guard.async_block(ctx, |_ctx| async {
//!         Ok::<_, anyhow::Error>(Reply::ok().json_str(r#"{"message":"Hello World!"}"#))
//!     })
//! });
//! let client = TestClient::new(routes);
//!
//! let denied = client.get("/tests/json").send().await;
//! assert_eq!(denied.status_code(), 400);
//!
//! let allowed = client.get("/tests/json").header("Api-Key", "12345").send().await;
//! assert_eq!(allowed.json_value().unwrap()["message"], "Hello World!");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/sluice-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::{TestResponse, TestStream};
