//! Configuration for the phimon CLI.
//!
//! TOML file + `PHIMON_` environment, API token resolution (env +
//! keyring + plaintext), platform paths, and translation to
//! `phimon_core::MonitorConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use phimon_core::MonitorConfig;

const KEYRING_SERVICE: &str = "phimon";
const KEYRING_TOKEN_ENTRY: &str = "api-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Server to connect to when none is given on the command line.
    #[serde(default)]
    pub server: ServerDefaults,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hours a saved session stays eligible for restore.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,

    /// Path prefix of the backend API.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Fixed backend URL. Overrides the per-session address/port.
    pub backend_url: Option<String>,

    /// API bearer token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            session_ttl_hours: default_session_ttl_hours(),
            api_path: default_api_path(),
            backend_url: None,
            token: None,
            token_env: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerDefaults {
    pub address: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_session_ttl_hours() -> u64 {
    24
}
fn default_api_path() -> String {
    phimon_core::DEFAULT_API_PATH.into()
}
fn default_port() -> u16 {
    8080
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "phimon", "phimon").map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding the persisted connection session.
pub fn session_dir() -> PathBuf {
    ProjectDirs::from("com", "phimon", "phimon").map_or_else(
        || dirs_fallback(".local/state"),
        |dirs| dirs.data_local_dir().join("session"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("phimon");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Layered sources: built-in defaults, then the TOML file, then
/// `PHIMON_` environment variables (`__` separates nesting, e.g.
/// `PHIMON_DEFAULTS__POLL_INTERVAL_MS`).
pub fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PHIMON_").split("__"))
}

/// Load the config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    Ok(layered(path).extract()?)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the API token: env var named by `token_env`, then the system
/// keyring, then plaintext `token`. `None` means requests go out
/// without an `Authorization` header.
pub fn resolve_token(defaults: &Defaults) -> Option<SecretString> {
    resolve_token_with(defaults, keyring_token)
}

fn resolve_token_with(
    defaults: &Defaults,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    // 1. Named env var
    if let Some(ref env_name) = defaults.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring() {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    defaults.token.clone().map(SecretString::from)
}

fn keyring_token() -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_ENTRY)
        .ok()?
        .get_password()
        .ok()
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the engine configuration from file config, resolving the API
/// token through [`resolve_token`].
pub fn to_monitor_config(cfg: &Config) -> Result<MonitorConfig, ConfigError> {
    build_monitor_config(cfg, resolve_token(&cfg.defaults))
}

fn build_monitor_config(
    cfg: &Config,
    bearer_token: Option<SecretString>,
) -> Result<MonitorConfig, ConfigError> {
    let d = &cfg.defaults;

    positive("defaults.timeout", d.timeout)?;
    positive("defaults.poll_interval_ms", d.poll_interval_ms)?;
    positive("defaults.session_ttl_hours", d.session_ttl_hours)?;

    if !d.api_path.starts_with('/') {
        return Err(ConfigError::Validation {
            field: "defaults.api_path".into(),
            reason: format!("must start with '/', got '{}'", d.api_path),
        });
    }

    let backend_url = d
        .backend_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|e| ConfigError::Validation {
                field: "defaults.backend_url".into(),
                reason: format!("invalid URL '{raw}': {e}"),
            })
        })
        .transpose()?;

    Ok(MonitorConfig {
        api_path: d.api_path.clone(),
        backend_url,
        timeout: Duration::from_secs(d.timeout),
        poll_interval: Duration::from_millis(d.poll_interval_ms),
        session_ttl: Duration::from_secs(d.session_ttl_hours.saturating_mul(3600)),
        bearer_token,
        ..MonitorConfig::default()
    })
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}
