// ── Runtime engine configuration ──
//
// Describes *how* the engine talks to the backend and how often it polls.
// Never touches disk: phimon-config (or a test) builds one and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use phimon_api::{DEFAULT_API_PATH, TransportConfig};

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path prefix the backend mounts its API under.
    pub api_path: String,
    /// Fixed API root. When set, every session talks to this URL and the
    /// operator-supplied address/port only travel in the `/connect` body.
    /// When unset, the API root is derived from the session address/port.
    pub backend_url: Option<Url>,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Poll period while connected.
    pub poll_interval: Duration,
    /// How long a persisted session stays eligible for auto-restore.
    pub session_ttl: Duration,
    /// Token attached to every request, obtained from the identity provider.
    pub bearer_token: Option<SecretString>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_path: DEFAULT_API_PATH.into(),
            backend_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            bearer_token: None,
        }
    }
}

impl MonitorConfig {
    /// Transport settings for the API client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            bearer_token: self.bearer_token.clone(),
        }
    }
}
