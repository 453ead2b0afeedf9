//! TOML-based configuration for the user service.
//!
//! Every field is optional; a missing file or a missing key falls back to the
//! defaults below.  Example:
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8081"
//! log_level = "info"
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_ttl_secs = 86400
//!
//! [discovery]
//! enabled = true
//! multicast_addr = "239.255.255.250:9999"
//! service_name = "user-service"
//! read_timeout_ms = 2000
//!
//! [storage]
//! db_path = "./data/user.db"
//!
//! [admin]
//! email = "admin@local"
//! password = "admin"
//! full_name = "Administrator"
//! ```
//!
//! # Secret rotation
//!
//! There is none.  Tokens are signed with `auth.jwt_secret`; changing it and
//! restarting invalidates every token issued before the change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use usvc_core::{DEFAULT_MULTICAST_ADDR, DEFAULT_SERVICE_NAME};

/// The signing secret used when none is configured.  Only fit for development.
pub const DEV_SECRET: &str = "dev-secret";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Address the HTTP API binds to.  Port `0` picks a free port.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Token signing settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret for session tokens.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Validity window of issued tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// Discovery responder settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Multicast group and port, `"<ipv4>:<port>"`.
    #[serde(default = "default_multicast_addr")]
    pub multicast_addr: String,
    /// Service name advertised in discovery responses.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Upper bound on how long the responder blocks before re-checking for
    /// shutdown.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Credential database settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// SQLite database file.  Missing parent directories are created.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

/// Account created at startup if it does not exist yet.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdminConfig {
    #[serde(default = "default_admin_email")]
    pub email: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    #[serde(default = "default_admin_full_name")]
    pub full_name: String,
}

impl ServerConfig {
    /// Rejects values that parse but would leave the service unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Returns `true` if the built-in development secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_SECRET
    }
}

impl DiscoveryConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_listen_addr() -> String {
    "0.0.0.0:8081".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_jwt_secret() -> String {
    DEV_SECRET.to_string()
}
fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_true() -> bool {
    true
}
fn default_multicast_addr() -> String {
    DEFAULT_MULTICAST_ADDR.to_string()
}
fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}
fn default_read_timeout_ms() -> u64 {
    2000
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/user.db")
}
fn default_admin_email() -> String {
    "admin@local".to_string()
}
fn default_admin_password() -> String {
    "admin".to_string()
}
fn default_admin_full_name() -> String {
    "Administrator".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            multicast_addr: default_multicast_addr(),
            service_name: default_service_name(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: default_admin_email(),
            password: default_admin_password(),
            full_name: default_admin_full_name(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses a boolean flag the way the deployment environment spells it.
///
/// Accepts `true`/`1`/`yes` and `false`/`0`/`no`, case-insensitively.
pub fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected true/1/yes or false/0/no, got '{other}'")),
    }
}

/// Loads `ServerConfig` from `path`, returning `ServerConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if [`ServerConfig::validate`] fails.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ServerConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
