//! Configuration loader with layered approach.
//!
//! Layers apply in order, later ones overriding earlier ones:
//!
//! 1. Default values
//! 2. Configuration file or string (TOML or JSON)
//! 3. Environment variables `PREFIX__SECTION__KEY`
//!
//! The result is validated before it is returned.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, SluiceConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use sluice_config::ConfigLoader;
///
/// # fn main() -> Result<(), sluice_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("sluice.toml")?
///     .with_dotenv()?
///     .with_env_prefix("SLUICE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: SluiceConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = SluiceConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = SluiceConfig::production();
        self
    }

    /// Loads a file. The format follows the extension (`.toml` or `.json`).
    ///
    /// Sections missing from the file take their default values; unknown
    /// sections or fields are rejected.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;

        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` ("toml" or "json").
    ///
    /// # Example
    ///
    /// ```
    /// use sluice_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[throttle]\nlimit = 5\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.throttle.limit, 5);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Sets the environment variable prefix for overrides.
    ///
    /// With prefix "SLUICE", `SLUICE__THROTTLE__LIMIT=10` sets
    /// `throttle.limit`. List values (`SLUICE__API_KEY__KEYS`) are
    /// comma-separated.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads variables from a `.env` file in the current directory or its
    /// parents, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<SluiceConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            for (key, value) in env::vars() {
                if key.starts_with(&prefix) {
                    self.apply_env_var(&key, &value, &prefix)?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> SluiceConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }

            ["DISPATCH", "WORKERS_PER_CORE"] => {
                config.dispatch.workers_per_core = parse_number(key, value)?;
            }
            ["DISPATCH", "THREADS"] => {
                config.dispatch.threads = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse_number(key, value)?)
                };
            }
            ["DISPATCH", "THREAD_NAME"] => config.dispatch.thread_name = value.to_string(),

            ["THROTTLE", "LIMIT"] => config.throttle.limit = parse_number(key, value)?,
            ["THROTTLE", "WINDOW_MS"] => config.throttle.window_ms = parse_number(key, value)?,

            ["API_KEY", "HEADER"] => config.api_key.header = value.to_string(),
            ["API_KEY", "KEYS"] => {
                config.api_key.keys = value
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }

            ["LOGGING", "ENABLED"] => {
                config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }

            ["DEMO", "SSE_CANCEL_AFTER_MS"] => {
                config.demo.sse_cancel_after_ms = parse_number(key, value)?;
            }
            ["DEMO", "SSE_TICK_MS"] => config.demo.sse_tick_ms = parse_number(key, value)?,
            ["DEMO", "UPSTREAM_URL"] => config.demo.upstream_url = value.to_string(),

            // Unknown keys under the prefix are ignored
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<SluiceConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::unsupported_format(format)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected non-negative integer"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, SluiceConfig::default());
    }

    #[test]
    fn test_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_with_string_json() {
        let json = r#"{"api_key": {"keys": ["a", "b"]}}"#;
        let config = ConfigLoader::new().with_string(json, "json").unwrap().load().unwrap();
        assert_eq!(config.api_key.keys, ["a", "b"]);
        assert_eq!(config.api_key.header, "Api-Key");
    }

    #[test]
    fn test_with_string_unsupported_format() {
        let result = ConfigLoader::new().with_string("limit: 1", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nhttp_addr = \"127.0.0.1:9000\"\n\n[dispatch]\nthreads = 4").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(config.dispatch.pool_size(), 4);
    }

    #[test]
    fn test_with_file_unknown_field() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[throttle]\nburst = 3").unwrap();

        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/sluice.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));

        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/sluice.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, SluiceConfig::default());
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        let result = ConfigLoader::new()
            .with_string("[throttle]\nwindow_ms = 0\n", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    // Overrides are exercised through apply_env_var rather than the process
    // environment, which other tests share.

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__THROTTLE__LIMIT", "7", "TEST").unwrap();
        loader.apply_env_var("TEST__THROTTLE__WINDOW_MS", "100", "TEST").unwrap();
        loader.apply_env_var("TEST__API_KEY__KEYS", "a, b,,c", "TEST").unwrap();
        loader.apply_env_var("TEST__DISPATCH__THREADS", "3", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__FORMAT", "Pretty", "TEST").unwrap();
        loader.apply_env_var("TEST__DEMO__UPSTREAM_URL", "http://localhost/x", "TEST").unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.throttle.limit, 7);
        assert_eq!(config.throttle.window_ms, 100);
        assert_eq!(config.api_key.keys, ["a", "b", "c"]);
        assert_eq!(config.dispatch.threads, Some(3));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.demo.upstream_url, "http://localhost/x");
    }

    #[test]
    fn test_env_threads_none() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__DISPATCH__THREADS", "4", "TEST").unwrap();
        loader.apply_env_var("TEST__DISPATCH__THREADS", "none", "TEST").unwrap();
        assert_eq!(loader.load_unvalidated().dispatch.threads, None);
    }

    #[test]
    fn test_env_parse_errors() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_var("TEST__THROTTLE__LIMIT", "-1", "TEST")
            .unwrap_err();
        assert!(err.to_string().contains("TEST__THROTTLE__LIMIT"));

        assert!(loader.apply_env_var("TEST__LOGGING__ENABLED", "maybe", "TEST").is_err());
        assert!(loader.apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST").is_err());
    }

    #[test]
    fn test_env_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__METRICS__ENABLED", "true", "TEST").unwrap();
        loader.apply_env_var("TESTING", "x", "TEST").unwrap();
        assert_eq!(loader.load_unvalidated(), SluiceConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
