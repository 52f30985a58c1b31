//! TOML configuration for the server.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 25000
//!
//! [protocol]
//! version = "1.0"
//! supported_versions = ["1.0"]
//! handshake_timeout_ms = 20000
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Handshake parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Version advertised to peers in PHASE1.
    #[serde(default = "default_version")]
    pub version: String,
    /// Versions a peer may answer PHASE1 with.
    #[serde(default = "default_supported_versions")]
    pub supported_versions: Vec<String>,
    /// Deadline for the whole handshake exchange.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    25000
}
fn default_version() -> String {
    "1.0".to_string()
}
fn default_supported_versions() -> Vec<String> {
    vec![default_version()]
}
fn default_handshake_timeout_ms() -> u64 {
    20_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            supported_versions: default_supported_versions(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    /// The address the listener binds to.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] if `bind_address` is not an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let text = format!("{}:{}", self.bind_address, self.port);
        text.parse().map_err(|_| ConfigError::InvalidAddress(text))
    }
}

impl ProtocolConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Parses a TOML document; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the config at `path`, returning the default config if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] for file-system errors other than "not found",
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Writes the config to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
