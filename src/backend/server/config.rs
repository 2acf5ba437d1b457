/**
 * Server Configuration
 *
 * Configuration comes from three places, later ones winning:
 *
 * 1. built-in defaults
 * 2. a TOML file named by `ROOMCHAT_CONFIG` (optional)
 * 3. environment variables: `JWT_SECRET`, `MEMBERSHIP_URL`, `BIND_ADDR`,
 *    `SERVER_PORT`
 *
 * `.env` is loaded by the binary before any of this runs.
 *
 * # Error Handling
 *
 * Unlike optional integrations, a broken configuration stops startup: a
 * missing secret or an impossible heartbeat schedule is reported as a
 * `ConfigError` naming the offending key.
 */
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::realtime::RealtimeConfig;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "ROOMCHAT_CONFIG";

/// Configuration failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Top-level server configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HS256 secret for session tokens
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<String>,

    /// Base URL of the chat REST service; in-memory membership when unset
    #[serde(default)]
    pub membership_url: Option<String>,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            jwt_secret: None,
            membership_url: None,
            realtime: RealtimeConfig::default(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("membership_url", &self.membership_url)
            .field("realtime", &self.realtime)
            .finish()
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl ServerConfig {
    /// Load from the file named by `ROOMCHAT_CONFIG` (if any), apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "[Config] Loaded config file");
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.jwt_secret = Some(secret);
        }
        if let Some(url) = lookup("MEMBERSHIP_URL").filter(|s| !s.is_empty()) {
            self.membership_url = Some(url);
        }
        if let Some(addr) = lookup("BIND_ADDR").filter(|s| !s.is_empty()) {
            self.bind_addr = addr;
        }
        if let Some(port) = lookup("SERVER_PORT").filter(|s| !s.is_empty()) {
            let host = self
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.bind_addr = format!("{}:{}", host, port);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.jwt_secret {
            None => return Err(ConfigError::Missing("jwt_secret")),
            Some(secret) if secret.len() < 8 => {
                return Err(ConfigError::Invalid {
                    key: "jwt_secret",
                    message: "must be at least 8 bytes".into(),
                })
            }
            Some(_) => {}
        }
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "bind_addr",
                message: e.to_string(),
            })?;
        self.realtime
            .validate()
            .map_err(|(key, message)| ConfigError::Invalid { key, message })
    }

    /// The validated secret. Only meaningful after `validate` succeeded.
    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret.as_deref().ok_or(ConfigError::Missing("jwt_secret"))
    }
}
