//! Connector configuration.
//!
//! Loaded from a JSON file before any lifecycle step runs:
//!
//! ```json
//! {
//!   "device": "/dev/ttyACM0",
//!   "log": "info",
//!   "log_file": "connector.log",
//!   "driver_log_file": "OZW.log",
//!   "publish_url": "http://localhost:8000/api/sensor",
//!   "wait": { "max_ticks": 300, "poll_interval_ms": 1000 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::{DEFAULT_CONFIG_PATH, DEFAULT_USER_PATH, DriverOptions};
use crate::error::{Error, Result};
use crate::logging;
use crate::network::{DEFAULT_MAX_TICKS, DEFAULT_POLL_INTERVAL, WaitPolicy};

/// Default timeout for one publish request.
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;

/// Readiness wait settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Polls per phase.
    pub max_ticks: u32,
    /// Delay between polls in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_ticks: DEFAULT_MAX_TICKS,
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(1000),
        }
    }
}

/// Resolved connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Controller device path.
    pub device: String,

    /// Log level for the connector and the driver.
    #[serde(default = "default_log_level", alias = "log")]
    pub log_level: String,

    /// Connector log file; logs go to stderr when unset.
    #[serde(default)]
    pub log_file: Option<String>,

    /// Driver log file, separate from the connector log. The driver
    /// truncates it on start.
    #[serde(default)]
    pub driver_log_file: Option<String>,

    /// Driver device database directory.
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Driver user data directory.
    #[serde(default = "default_user_path")]
    pub user_path: String,

    /// Backend endpoint; envelopes go to stdout when unset.
    #[serde(default)]
    pub publish_url: Option<String>,

    /// Timeout for one publish request.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Readiness wait settings.
    #[serde(default)]
    pub wait: WaitConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}

fn default_user_path() -> String {
    DEFAULT_USER_PATH.to_string()
}

const fn default_publish_timeout() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_SECS
}

impl ConnectorConfig {
    /// Creates a configuration for the given device with default settings.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            log_level: default_log_level(),
            log_file: None,
            driver_log_file: None,
            config_path: default_config_path(),
            user_path: default_user_path(),
            publish_url: None,
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            wait: WaitConfig::default(),
        }
    }

    /// Loads and validates configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        tracing::debug!("loading configuration from {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| config_error(&path_str, e.to_string()))?;
        Self::from_json(&content, &path_str)
    }

    /// Parses and validates configuration from a JSON string.
    ///
    /// `origin` names the source in error messages.
    pub fn from_json(content: &str, origin: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| config_error(origin, e.to_string()))?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self, origin: &str) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(config_error(origin, "device must not be empty"));
        }
        if logging::level_filter(&self.log_level).is_none() {
            return Err(config_error(
                origin,
                format!("unknown log level '{}'", self.log_level),
            ));
        }
        if self.wait.max_ticks == 0 {
            return Err(config_error(origin, "wait.max_ticks must be positive"));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(config_error(origin, "wait.poll_interval_ms must be positive"));
        }
        if self.log_file.is_some() && self.log_file == self.driver_log_file {
            return Err(config_error(
                origin,
                "log_file and driver_log_file must differ",
            ));
        }
        if let Some(url) = &self.publish_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(config_error(
                    origin,
                    format!("publish_url '{url}' must be an http(s) URL"),
                ));
            }
        }
        Ok(())
    }

    /// Driver option set derived from this configuration.
    #[must_use]
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions::new(self.device.clone())
            .config_path(self.config_path.clone())
            .user_path(self.user_path.clone())
            .log_file(self.driver_log_file.clone())
            .log_level(self.log_level.clone())
    }

    /// Readiness wait policy derived from this configuration.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            max_ticks: self.wait.max_ticks,
            poll_interval: Duration::from_millis(self.wait.poll_interval_ms),
        }
    }

    /// Publish request timeout.
    #[must_use]
    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

fn config_error(origin: &str, reason: impl Into<String>) -> Error {
    Error::Config {
        path: origin.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ConnectorConfig::from_json(r#"{"device": "/dev/ttyACM0"}"#, "test").unwrap();

        assert_eq!(config, ConnectorConfig::new("/dev/ttyACM0"));
        assert_eq!(config.wait_policy(), WaitPolicy::default());
        assert_eq!(config.publish_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{"device": "/dev/ttyACM1", "log": "Debug", "log_file": "connector.log"}"#;
        let config = ConnectorConfig::from_json(json, "zwave.json").unwrap();

        assert_eq!(config.log_level, "Debug");
        assert_eq!(config.log_file.as_deref(), Some("connector.log"));

        let options = config.driver_options();
        assert_eq!(options.device, "/dev/ttyACM1");
        assert_eq!(options.log_level, "Debug");
        assert_eq!(options.config_path, DEFAULT_CONFIG_PATH);
        assert_eq!(options.log_file, None);
    }

    #[test]
    fn test_driver_log_kept_apart_from_connector_log() {
        let json = r#"{
            "device": "/dev/ttyACM0",
            "log_file": "connector.log",
            "driver_log_file": "OZW.log"
        }"#;
        let config = ConnectorConfig::from_json(json, "zwave.json").unwrap();
        assert_eq!(config.driver_options().log_file.as_deref(), Some("OZW.log"));

        let shared = r#"{"device": "/dev/ttyACM0", "log_file": "a.log", "driver_log_file": "a.log"}"#;
        assert!(matches!(
            ConnectorConfig::from_json(shared, "zwave.json"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_wait_settings() {
        let json = r#"{"device": "/dev/ttyACM0", "wait": {"poll_interval_ms": 250}}"#;
        let config = ConnectorConfig::from_json(json, "test").unwrap();

        let policy = config.wait_policy();
        assert_eq!(policy.max_ticks, 300);
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let cases = [
            r#"{"log": "info"}"#,
            r#"{"device": ""}"#,
            r#"{"device": "/dev/ttyACM0", "log": "loud"}"#,
            r#"{"device": "/dev/ttyACM0", "wait": {"max_ticks": 0}}"#,
            r#"{"device": "/dev/ttyACM0", "publish_url": "ftp://backend"}"#,
            "not json",
        ];
        for json in cases {
            let err = ConnectorConfig::from_json(json, "zwave.json").unwrap_err();
            assert!(
                matches!(&err, Error::Config { path, .. } if path == "zwave.json"),
                "{json}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = ConnectorConfig::load("/nonexistent/zwave.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
