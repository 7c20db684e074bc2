//! Worker configuration: a YAML file plus environment overrides.

use std::path::Path;
use std::time::Duration;

use lifecycle::LifecycleOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL that selects the in-memory inventory gateway.
pub const MEMORY_INVENTORY_URL: &str = "memory://";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Output format of the tracing fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// `http(s)://...` for the real service, `memory://` for the in-memory one.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            base_url: MEMORY_INVENTORY_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl InventoryConfig {
    pub fn is_in_memory(&self) -> bool {
        self.base_url == MEMORY_INVENTORY_URL
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Expiry of the pick/cancel wait; unset waits forever.
    pub pick_timeout_secs: Option<u64>,
    /// Use a processor that accepts every order instead of the placeholder.
    pub accept_processing: bool,
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub task_queue: String,
    pub inventory: InventoryConfig,
    /// PostgreSQL history store; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub lifecycle: LifecycleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            task_queue: "order-lifecycle".to_string(),
            inventory: InventoryConfig::default(),
            database_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl Config {
    /// Loads the YAML file at `path`, applies environment overrides and
    /// validates the result.
    ///
    /// A missing file is not an error: defaults plus environment are used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], with overrides taken from `lookup`.
    pub fn load_with(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_yaml(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };

        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    ///
    /// Recognized keys: `HOST`, `PORT`, `TASK_QUEUE`, `INVENTORY_BASE_URL`,
    /// `DATABASE_URL`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ConfigError::Parse(format!("PORT must be a port number: {e}")))?;
        }
        if let Some(task_queue) = lookup("TASK_QUEUE") {
            self.task_queue = task_queue;
        }
        if let Some(base_url) = lookup("INVENTORY_BASE_URL") {
            self.inventory.base_url = base_url;
        }
        if let Some(database_url) = lookup("DATABASE_URL") {
            self.database_url = Some(database_url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Validation("server.host cannot be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }
        if self.task_queue.trim().is_empty() {
            return Err(ConfigError::Validation("task_queue cannot be empty".into()));
        }
        if self.inventory.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "inventory.timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.inventory.is_in_memory() {
            let url = reqwest::Url::parse(&self.inventory.base_url).map_err(|e| {
                ConfigError::Validation(format!(
                    "inventory.base_url '{}' is not a valid URL: {e}",
                    self.inventory.base_url
                ))
            })?;
            if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
                return Err(ConfigError::Validation(format!(
                    "inventory.base_url '{}' must be an http(s) URL",
                    self.inventory.base_url
                )));
            }
        }

        if let Some(database_url) = &self.database_url {
            if database_url.trim().is_empty() {
                return Err(ConfigError::Validation("database_url cannot be empty".into()));
            }
        }

        Ok(())
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn lifecycle_options(&self) -> LifecycleOptions {
        LifecycleOptions {
            pick_timeout: self.lifecycle.pick_timeout_secs.map(Duration::from_secs),
            ..LifecycleOptions::default()
        }
    }
}
