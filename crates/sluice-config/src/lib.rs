//! Typed configuration for Sluice services.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`SLUICE__SECTION__KEY`)
//! - Strict parsing (unknown fields are rejected)
//! - Validation of the final result
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//!
//! [dispatch]
//! workers_per_core = 2      # pool size = available cores * workers_per_core
//! # threads = 8             # explicit override
//! thread_name = "sluice-dispatch"
//!
//! [throttle]
//! limit = 2
//! window_ms = 3000
//!
//! [api_key]
//! header = "Api-Key"
//! keys = ["12345"]
//!
//! [logging]
//! level = "info"
//! format = "json"           # or "pretty"
//!
//! [demo]
//! sse_cancel_after_ms = 5000
//! sse_tick_ms = 1000
//! upstream_url = "http://ip-api.com/json/"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sluice_config::ConfigLoader;
//!
//! # fn main() -> Result<(), sluice_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("sluice.toml")?
//!     .with_env_prefix("SLUICE")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::SluiceConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
