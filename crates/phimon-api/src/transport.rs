// Shared transport configuration for building reqwest::Client instances.
//
// Also owns base-URL resolution: an operator types a bare host or
// `host:port`, the client needs `http://host:port/api/phidget`.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// API prefix the backend mounts its controller under.
pub const DEFAULT_API_PATH: &str = "/api/phidget";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Token issued by the identity provider, sent as `Authorization: Bearer`.
    pub bearer_token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            bearer_token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::Tls(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("phimon/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Resolve the API base URL for a server address and port.
///
/// The address may carry an `http://`/`https://` scheme; bare hosts get
/// `http://`. The explicit `port` always wins over one embedded in the
/// address, and `api_path` replaces any path the address carried.
pub fn base_url_for(address: &str, port: u16, api_path: &str) -> Result<Url, Error> {
    let trimmed = address.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)?;
    url.set_port(Some(port))
        .map_err(|()| Error::InvalidUrl(url::ParseError::InvalidPort))?;
    url.set_path(api_path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Strip any URL scheme from an operator-supplied address.
///
/// The backend expects the bare host in the `/connect` body.
pub fn strip_scheme(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed)
}
