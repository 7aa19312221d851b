//! Configuration schema types.
//!
//! One struct per section of the configuration file. Every field has a
//! default, so a file only needs to name what it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sluice_telemetry::LogConfig;

/// Server section.
///
/// # Example
///
/// ```
/// use sluice_config::ServerConfig;
///
/// let config: ServerConfig = toml::from_str(r#"http_addr = "127.0.0.1:3000""#).unwrap();
/// assert_eq!(config.http_addr, "127.0.0.1:3000");
/// assert_eq!(config.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Dispatch pool section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Worker threads per available core.
    #[serde(default = "default_workers_per_core")]
    pub workers_per_core: usize,

    /// Explicit pool size, overriding `workers_per_core`.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Prefix of the worker thread names.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl DispatchConfig {
    /// Number of worker threads: `threads` if set, otherwise
    /// `workers_per_core` times the available cores.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
            cores.saturating_mul(self.workers_per_core)
        })
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers_per_core: default_workers_per_core(),
            threads: None,
            thread_name: default_thread_name(),
        }
    }
}

fn default_workers_per_core() -> usize {
    2
}

fn default_thread_name() -> String {
    "sluice-dispatch".to_string()
}

/// Throttle section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Requests admitted per window.
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl ThrottleConfig {
    /// Window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_limit() -> u64 {
    2
}

fn default_window_ms() -> u64 {
    3000
}

/// API key section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    /// Header carrying the key.
    #[serde(default = "default_api_key_header")]
    pub header: String,

    /// Accepted keys.
    #[serde(default = "default_api_keys")]
    pub keys: Vec<String>,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            header: default_api_key_header(),
            keys: default_api_keys(),
        }
    }
}

fn default_api_key_header() -> String {
    "Api-Key".to_string()
}

fn default_api_keys() -> Vec<String> {
    vec!["12345".to_string()]
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable format (development).
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        let preset = match config.format {
            LogFormat::Json => Self::production(),
            LogFormat::Pretty => Self::development(),
        };
        Self {
            enabled: config.enabled,
            ..preset.with_level(config.level.clone())
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Demo endpoints section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    /// Delay after which the event stream is cancelled, in milliseconds.
    #[serde(default = "default_sse_cancel_after_ms")]
    pub sse_cancel_after_ms: u64,

    /// Interval between events, in milliseconds.
    #[serde(default = "default_sse_tick_ms")]
    pub sse_tick_ms: u64,

    /// Document fetched by the upstream endpoint.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
}

impl DemoConfig {
    /// Delay after which the event stream is cancelled.
    #[must_use]
    pub fn sse_cancel_after(&self) -> Duration {
        Duration::from_millis(self.sse_cancel_after_ms)
    }

    /// Interval between events.
    #[must_use]
    pub fn sse_tick(&self) -> Duration {
        Duration::from_millis(self.sse_tick_ms)
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sse_cancel_after_ms: default_sse_cancel_after_ms(),
            sse_tick_ms: default_sse_tick_ms(),
            upstream_url: default_upstream_url(),
        }
    }
}

fn default_sse_cancel_after_ms() -> u64 {
    5000
}

fn default_sse_tick_ms() -> u64 {
    1000
}

fn default_upstream_url() -> String {
    "http://ip-api.com/json/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_unknown_field_rejected() {
        let toml = r#"
            http_addr = "127.0.0.1:3000"
            unknown_field = "value"
        "#;
        let result: Result<ServerConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_size() {
        let explicit = DispatchConfig {
            threads: Some(3),
            ..DispatchConfig::default()
        };
        assert_eq!(explicit.pool_size(), 3);

        let cores = std::thread::available_parallelism().unwrap().get();
        assert_eq!(DispatchConfig::default().pool_size(), cores * 2);
    }

    #[test]
    fn test_throttle_defaults() {
        let config = ThrottleConfig::default();
        assert_eq!(config.limit, 2);
        assert_eq!(config.window(), Duration::from_millis(3000));
    }

    #[test]
    fn test_api_key_defaults() {
        let config = ApiKeyConfig::default();
        assert_eq!(config.header, "Api-Key");
        assert_eq!(config.keys, ["12345"]);
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);
        assert!(serde_json::from_str::<LogFormat>(r#""xml""#).is_err());
    }

    #[test]
    fn test_logging_into_log_config() {
        let config = LoggingConfig {
            enabled: true,
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        };
        let log = LogConfig::from(&config);
        assert!(!log.json_format);
        assert_eq!(log.level, "warn");
    }

    #[test]
    fn test_demo_durations() {
        let config = DemoConfig::default();
        assert_eq!(config.sse_cancel_after(), Duration::from_secs(5));
        assert_eq!(config.sse_tick(), Duration::from_secs(1));
    }
}
