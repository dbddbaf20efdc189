use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Where generation calls take their API key from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Each caller must store a personal key; generating without one is a
    /// distinguished `needsApiKey` condition.
    UserScoped,
    /// All calls use the server-held key.
    Shared,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// HS256 secret used to verify inbound bearer tokens.
    pub auth_secret: String,
    /// Passphrase for the credential obfuscation transform.
    pub obfuscation_passphrase: String,
    pub key_mode: KeyMode,
    /// Server-held generation key; required in shared mode.
    pub shared_api_key: Option<String>,
    /// Root directory for the credential vault.
    pub data_dir: PathBuf,
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = optional_var("DATA_DIR") {
        return PathBuf::from(dir);
    }
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("prompt-gallery");
    base
}

impl AppConfig {
    /// Resolve all startup configuration. Any failure here is fatal: the
    /// service must not serve traffic without its secrets.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match optional_var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidVar {
                var: "PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let key_mode = match optional_var("API_KEY_MODE").as_deref() {
            None | Some("user") => KeyMode::UserScoped,
            Some("shared") => KeyMode::Shared,
            Some(other) => {
                return Err(ConfigError::InvalidVar {
                    var: "API_KEY_MODE",
                    value: other.to_string(),
                });
            }
        };

        let shared_api_key = match key_mode {
            KeyMode::Shared => Some(required_var("GEMINI_API_KEY")?),
            KeyMode::UserScoped => optional_var("GEMINI_API_KEY"),
        };

        Ok(Self {
            port,
            auth_secret: required_var("AUTH_SECRET")?,
            obfuscation_passphrase: required_var("ENCRYPTION_SECRET")?,
            key_mode,
            shared_api_key,
            data_dir: resolve_data_dir(),
        })
    }
}
