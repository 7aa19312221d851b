//! Sluice Demo - a service exercising the Sluice pipeline
//!
//! The demo serves a handful of endpoints under `/tests`. Most are guarded
//! by the managed chain:
//!
//! ```text
//! request → LogBefore → ApiKeyCheck → Throttle → LogAfter → endpoint
//! ```
//!
//! - `GET /tests/text`: plain text, unguarded
//! - `GET /tests/sse`: an event stream ticking every second, cancelled after
//!   five seconds through its materialized handle, unguarded
//! - `GET /tests/huge`, `/tests/json`, `/tests/html`: fixed bodies
//! - `POST /tests/post`: echoes the request body as chunked JSON
//! - `GET /tests/ws`: fetches and pretty-prints an upstream JSON document
//!
//! # Example Usage
//!
//! ```bash
//! # Run with a configuration file
//! $ sluice-demo --config sluice.toml
//!
//! # Run with environment variable overrides
//! $ SLUICE__SERVER__HTTP_ADDR=127.0.0.1:9000 \
//!   SLUICE__THROTTLE__LIMIT=10 \
//!   sluice-demo --dev
//! ```

#![doc(html_root_url = "https://docs.rs/sluice-demo/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod endpoints;
pub mod error;
pub mod upstream;

pub use app::DemoApp;
pub use error::{DemoError, DemoResult};
pub use upstream::UpstreamClient;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of the environment variables overriding the configuration.
pub const ENV_PREFIX: &str = "SLUICE";
