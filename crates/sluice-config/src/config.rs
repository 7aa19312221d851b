//! Root configuration type.

use serde::{Deserialize, Serialize};

use crate::{
    ApiKeyConfig, ConfigError, DemoConfig, DispatchConfig, LogFormat, LoggingConfig, ServerConfig,
    ThrottleConfig,
};

/// Complete Sluice configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use sluice_config::SluiceConfig;
///
/// let config = SluiceConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.throttle.limit, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Dispatch pool for blocking handlers.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Throttle stage.
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// API key stage.
    #[serde(default)]
    pub api_key: ApiKeyConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Demo endpoints.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl SluiceConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.dispatch.pool_size() == 0 {
            return Err(ConfigError::invalid_value(
                "dispatch",
                "pool size must be greater than zero",
            ));
        }

        if self.dispatch.thread_name.is_empty() {
            return Err(ConfigError::invalid_value("dispatch.thread_name", "must not be empty"));
        }

        if self.throttle.limit == 0 {
            return Err(ConfigError::invalid_value("throttle.limit", "must be greater than zero"));
        }

        if self.throttle.window_ms == 0 {
            return Err(ConfigError::invalid_value("throttle.window_ms", "must be greater than zero"));
        }

        if self.api_key.header.trim().is_empty() {
            return Err(ConfigError::invalid_value("api_key.header", "must not be empty"));
        }

        if self.demo.sse_tick_ms == 0 {
            return Err(ConfigError::invalid_value("demo.sse_tick_ms", "must be greater than zero"));
        }

        Ok(())
    }

    /// Development preset: human-readable `debug` logs on localhost.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                http_addr: "127.0.0.1:8080".to_string(),
                shutdown_timeout_secs: 5,
            },
            logging: LoggingConfig {
                enabled: true,
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            ..Self::default()
        }
    }

    /// Production preset: JSON `info` logs.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                enabled: true,
                level: "info".to_string(),
                format: LogFormat::Json,
            },
            ..Self::default()
        }
    }
}
