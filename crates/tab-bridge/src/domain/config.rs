//! Bridge configuration with validation.
//!
//! Layering: defaults, then an optional JSON file named by
//! `TAB_BRIDGE_CONFIG`, then individual environment overrides.

use crate::domain::command::Action;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Absolute ceiling for `framing.max_frame_bytes` (1 GiB).
pub const MAX_FRAME_HARD_LIMIT: usize = 1024 * 1024 * 1024;

/// Main bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Per-action reply timeouts
    pub timeouts: TimeoutConfig,
    /// Framed protocol limits
    pub framing: FramingConfig,
    /// Durable error log
    pub diagnostics: DiagnosticsConfig,
    /// Process logging
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for action in Action::ALL {
            if self.timeouts.for_action(action).is_zero() {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} timeout cannot be 0",
                    action
                )));
            }
        }

        if self.framing.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_frame_bytes cannot be 0".into(),
            ));
        }
        if self.framing.max_frame_bytes > MAX_FRAME_HARD_LIMIT {
            return Err(ConfigError::InvalidLimit(format!(
                "max_frame_bytes cannot exceed {}",
                MAX_FRAME_HARD_LIMIT
            )));
        }
        if self.framing.reply_fields.is_empty() {
            return Err(ConfigError::Invalid(
                "framing.reply_fields must name at least one field".into(),
            ));
        }

        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        if self.diagnostics.error_log.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("diagnostics.error_log is empty".into()));
        }

        Ok(())
    }

    /// Get HTTP listener bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("TAB_BRIDGE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(host) = lookup("TAB_BRIDGE_HTTP_HOST") {
            config.http.host = host
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TAB_BRIDGE_HTTP_HOST", host))?;
        }
        if let Some(port) = lookup("TAB_BRIDGE_HTTP_PORT") {
            config.http.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TAB_BRIDGE_HTTP_PORT", port))?;
        }
        if let Some(ms) = lookup("TAB_BRIDGE_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TAB_BRIDGE_TIMEOUT_MS", ms))?;
            config.timeouts.set_all_ms(ms);
        }
        if let Some(path) = lookup("TAB_BRIDGE_ERROR_LOG") {
            config.diagnostics.error_log = PathBuf::from(path);
        }
        if let Some(level) = lookup("TAB_BRIDGE_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.logging.level = level;
        }
        if let Some(json) = lookup("TAB_BRIDGE_JSON_LOGS") {
            config.logging.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. Missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (loopback only by default)
    pub host: IpAddr,
    /// Port (0 lets the OS choose)
    pub port: u16,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Reply timeouts, stored in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub get_tabs_ms: u64,
    pub switch_tab_ms: u64,
    pub create_tab_ms: u64,
    /// Tool calls
    pub call_mcp_ms: u64,
    /// Extra slack the HTTP layer allows on top of the reply timeout
    pub grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            get_tabs_ms: 5_000,
            switch_tab_ms: 5_000,
            create_tab_ms: 5_000,
            call_mcp_ms: 5_000,
            grace_ms: 250,
        }
    }
}

impl TimeoutConfig {
    /// Reply timeout for an action.
    pub fn for_action(&self, action: Action) -> Duration {
        let ms = match action {
            Action::GetTabs => self.get_tabs_ms,
            Action::SwitchTab => self.switch_tab_ms,
            Action::CreateTab => self.create_tab_ms,
            Action::CallMcp => self.call_mcp_ms,
        };
        Duration::from_millis(ms)
    }

    /// Hard wall-clock bound the HTTP layer applies for an action.
    pub fn http_bound(&self, action: Action) -> Duration {
        self.for_action(action) + Duration::from_millis(self.grace_ms)
    }

    pub fn set_all_ms(&mut self, ms: u64) {
        self.get_tabs_ms = ms;
        self.switch_tab_ms = ms;
        self.create_tab_ms = ms;
        self.call_mcp_ms = ms;
    }
}

/// Framed protocol configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Largest inbound frame accepted
    pub max_frame_bytes: usize,
    /// Reply keys carrying the payload, in priority order
    pub reply_fields: Vec<String>,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024 * 1024,
            reply_fields: vec!["tabs".to_string(), "result".to_string()],
        }
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Plain-text file that fatal transport errors are appended to
    pub error_log: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            error_log: PathBuf::from("/tmp/native_host_error.log"),
        }
    }
}

/// Logging configuration. Output always goes to stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Environment variable could not be parsed
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),
    /// Configuration file could not be read
    #[error("cannot read config file {0:?}: {1}")]
    Read(PathBuf, String),
    /// Configuration file is not valid JSON
    #[error("cannot parse config file: {0}")]
    Parse(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_addr().port(), 0);
        assert!(config.http_addr().ip().is_loopback());
        assert_eq!(
            config.timeouts.for_action(Action::GetTabs),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = BridgeConfig::default();
        config.timeouts.call_mcp_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_frame_limit_validation() {
        let mut config = BridgeConfig::default();
        config.framing.max_frame_bytes = MAX_FRAME_HARD_LIMIT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        config.framing.max_frame_bytes = 1024;
        config.framing.reply_fields.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("TAB_BRIDGE_HTTP_PORT", "8080"),
            ("TAB_BRIDGE_TIMEOUT_MS", "1500"),
            ("TAB_BRIDGE_ERROR_LOG", "/var/tmp/bridge.log"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(
            config.timeouts.for_action(Action::SwitchTab),
            Duration::from_millis(1500)
        );
        assert_eq!(
            config.timeouts.http_bound(Action::SwitchTab),
            Duration::from_millis(1750)
        );
        assert_eq!(config.diagnostics.error_log, PathBuf::from("/var/tmp/bridge.log"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let result = BridgeConfig::from_lookup(lookup(&[("TAB_BRIDGE_HTTP_PORT", "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("TAB_BRIDGE_HTTP_PORT", _))
        ));
    }

    #[test]
    fn test_config_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timeouts": {{"call_mcp_ms": 30000}}}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = BridgeConfig::from_lookup(lookup(&[("TAB_BRIDGE_CONFIG", path.as_str())])).unwrap();
        assert_eq!(
            config.timeouts.for_action(Action::CallMcp),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.timeouts.for_action(Action::GetTabs),
            Duration::from_secs(5)
        );
        assert_eq!(config.framing, FramingConfig::default());
    }
}
