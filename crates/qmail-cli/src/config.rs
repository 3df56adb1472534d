//! Configuration management for the qmail CLI
//!
//! Configuration is stored in TOML format.
//!
//! # Configuration File Locations
//!
//! - Linux: `~/.config/qmail/config.toml`
//! - macOS: `~/Library/Application Support/in.qmail.qmail/config.toml`
//! - Windows: `%APPDATA%\qmail\qmail\config\config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use qmail_crypto::AlgorithmId;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// CLI configuration
///
/// # Example TOML
///
/// ```toml
/// [identity]
/// default = "alice@qmail.co.in"
/// domain = "qmail.co.in"
///
/// [keystore]
/// backend = "file"  # "file" | "sqlite"
/// path = ""         # Empty = default location
///
/// [crypto]
/// default_algorithm = "ML-KEM-768"
/// allowed_algorithms = ["X25519-HKDF-SHA256", "ML-KEM-768"]
///
/// [server]
/// base_url = "http://127.0.0.1:8000"
/// timeout_seconds = 30
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub keystore: KeystoreConfig,

    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity used when a command omits `--identity`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Domain appended to the username at `register`
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    qmail_core::identity::DEFAULT_DOMAIN.to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default: None,
            domain: default_domain(),
        }
    }
}

/// Key store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Storage backend: "file" or "sqlite"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Key directory (file) or database path (sqlite); empty = default location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_backend() -> String {
    "file".to_string()
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl KeystoreConfig {
    /// Resolve the storage location, falling back to the platform data dir.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            if !path.as_os_str().is_empty() {
                return Some(path.clone());
            }
        }
        let data_dir = Config::data_dir()?;
        Some(match self.backend.as_str() {
            "sqlite" => data_dir.join("keys.db"),
            _ => data_dir.join("keys"),
        })
    }
}

/// Cryptography configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Algorithm for newly generated keys
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,

    /// Algorithms this client will generate, seal or open under
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,
}

fn default_algorithm() -> String {
    AlgorithmId::MlKem768.name().to_string()
}

fn default_allowed_algorithms() -> Vec<String> {
    AlgorithmId::ALL.iter().map(|alg| alg.name().to_string()).collect()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            default_algorithm: default_algorithm(),
            allowed_algorithms: default_allowed_algorithms(),
        }
    }
}

impl CryptoConfig {
    pub fn default_algorithm(&self) -> Result<AlgorithmId, ConfigError> {
        parse_algorithm(&self.default_algorithm)
    }

    pub fn allowed_algorithms(&self) -> Result<Vec<AlgorithmId>, ConfigError> {
        self.allowed_algorithms.iter().map(|name| parse_algorithm(name)).collect()
    }
}

fn parse_algorithm(name: &str) -> Result<AlgorithmId, ConfigError> {
    name.parse().map_err(|_| {
        ConfigError::ValidationError(format!(
            "Unknown algorithm '{}'. Valid values: {:?}",
            name,
            AlgorithmId::ALL.iter().map(|alg| alg.name()).collect::<Vec<_>>()
        ))
    })
}

/// Backend server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory and mailbox service URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("in", "qmail", "qmail")
    }

    /// Get default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path (for key storage)
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                Self::default().save(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let allowed = self.crypto.allowed_algorithms()?;
        if allowed.is_empty() {
            return Err(ConfigError::ValidationError(
                "allowed_algorithms must not be empty".to_string(),
            ));
        }

        let default = self.crypto.default_algorithm()?;
        if !allowed.contains(&default) {
            return Err(ConfigError::ValidationError(format!(
                "default_algorithm '{}' is not in allowed_algorithms",
                self.crypto.default_algorithm
            )));
        }

        let valid_backends = ["file", "sqlite"];
        if !valid_backends.contains(&self.keystore.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid keystore backend '{}'. Valid values: {:?}",
                self.keystore.backend, valid_backends
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let url = &self.server.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid server URL '{}': must start with http:// or https://",
                url
            )));
        }

        qmail_core::Identity::from_username("user", &self.identity.domain).map_err(|_| {
            ConfigError::ValidationError(format!(
                "Invalid identity domain '{}'",
                self.identity.domain
            ))
        })?;

        if let Some(identity) = &self.identity.default {
            qmail_core::Identity::parse(identity).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid default identity: {e}"))
            })?;
        }

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_toml() -> &'static str {
        r#"# qmail configuration

[identity]
# Identity used when --identity is omitted
# default = "alice@qmail.co.in"
# Domain of addresses created by `qmail register`
domain = "qmail.co.in"

[keystore]
# Storage backend: "file" (one JSON file per identity) or "sqlite"
backend = "file"
# Key directory or database path (empty = default location)
# path = ""

[crypto]
# Algorithm for newly generated keys
default_algorithm = "ML-KEM-768"
# Algorithms this client accepts
allowed_algorithms = ["X25519-HKDF-SHA256", "ML-KEM-768"]

[server]
# Directory and mailbox service
base_url = "http://127.0.0.1:8000"
# Request timeout in seconds
timeout_seconds = 30

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"
"#
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub debug: Option<bool>,
    pub server_url: Option<String>,
    pub keystore_path: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to configuration
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(true) = overrides.debug {
            self.logging.level = "debug".to_string();
        }
        if let Some(ref url) = overrides.server_url {
            self.server.base_url = url.clone();
        }
        if let Some(ref path) = overrides.keystore_path {
            self.keystore.path = Some(path.clone());
        }
        self
    }
}
