//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LivSync REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint is joined onto
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sent as a bearer token when present
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: default_request_timeout(),
            access_token: None,
        }
    }
}

/// Realtime broadcast channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Realtime service URL (http(s) or ws(s))
    #[serde(default)]
    pub url: String,

    /// Project API key passed as `apikey`
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_event")]
    pub event: String,

    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_topic() -> String {
    "event-changes".to_string()
}

fn default_event() -> String {
    "shout".to_string()
}

fn default_heartbeat() -> u64 {
    30
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            topic: default_topic(),
            event: default_event(),
            heartbeat_secs: default_heartbeat(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Identity of the signed-in user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// User id for profile lookups; comes from the identity provider
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Session storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the session snapshot
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

fn default_store_dir() -> String {
    dirs::cache_dir()
        .map(|p| p.join("livsync").join("session").to_string_lossy().to_string())
        .unwrap_or_else(|| "./livsync_session".to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Outcome of a config search
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config came from; `None` means defaults plus environment
    pub source: Option<PathBuf>,
    /// Files that exist but failed to load
    pub skipped: Vec<(PathBuf, ConfigError)>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Logs which file was used; call [`Config::discover`] instead when the
    /// tracing subscriber is not installed yet.
    pub fn load_default() -> Self {
        let loaded = Self::discover();
        for (path, error) in &loaded.skipped {
            tracing::warn!("Failed to load config from {:?}: {}", path, error);
        }
        match &loaded.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
        loaded.config
    }

    /// Search the default locations without logging
    pub fn discover() -> LoadedConfig {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("livsync").join("config.toml")),
            Some(PathBuf::from("/etc/livsync/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::discover_in(&config_paths)
    }

    /// First loadable file of `paths`, with env overrides applied
    pub fn discover_in(paths: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    }
                }
                Err(e) => skipped.push((path.clone(), e)),
            }
        }

        LoadedConfig {
            config: Self::from_env(),
            source: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides; VITE_API_URL kept for deployments shared with the web build
        if let Some(url) = var("LIVSYNC_API_URL").or_else(|| var("VITE_API_URL")) {
            self.api.base_url = url;
        }
        if let Some(token) = var("LIVSYNC_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }

        // Realtime overrides
        if let Some(url) = var("LIVSYNC_REALTIME_URL") {
            self.realtime.url = url;
        }
        if let Some(key) = var("LIVSYNC_REALTIME_KEY") {
            self.realtime.api_key = key;
        }

        // Session overrides
        if let Some(user_id) = var("LIVSYNC_USER_ID") {
            self.session.user_id = Some(user_id);
        }

        // Store overrides
        if let Some(dir) = var("LIVSYNC_STORE_DIR") {
            self.store.dir = dir;
        }

        // Logging overrides
        if let Some(level) = var("LIVSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LIVSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject configurations that would send requests to an undefined base
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingApiUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(url.to_string()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("API base URL is not set (use [api] base_url or LIVSYNC_API_URL)")]
    MissingApiUrl,

    #[error("API base URL must be http(s): {0}")]
    InvalidApiUrl(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# LivSync Configuration
#
# Environment variables override these settings:
# - LIVSYNC_API_URL (or VITE_API_URL)
# - LIVSYNC_ACCESS_TOKEN
# - LIVSYNC_REALTIME_URL
# - LIVSYNC_REALTIME_KEY
# - LIVSYNC_USER_ID
# - LIVSYNC_STORE_DIR
# - LIVSYNC_LOG_LEVEL
# - LIVSYNC_LOG_FORMAT

[api]
# LivSync API base URL
base_url = "http://localhost:8000"

# Request timeout in seconds
request_timeout_secs = 30

# Bearer token from your identity provider (optional)
# access_token = ""

[realtime]
# Realtime service URL
url = "https://your-project.supabase.co"

# Project API key
api_key = ""

# Broadcast topic and event name carrying AI suggestions
topic = "event-changes"
event = "shout"

# Heartbeat interval in seconds
heartbeat_secs = 30

# Reconnect attempts after the socket drops
max_reconnect_attempts = 5

[session]
# Signed-in user id (required for `livsync profile`)
# user_id = ""

[store]
# Directory holding the session snapshot (default: <cache dir>/livsync/session)
# dir = "/var/lib/livsync/session"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
