use thiserror::Error;

use crate::models::ErrorResponse;

/// Top-level error type for the `phimon-api` crate.
///
/// Every endpoint call collapses its failure into one of these variants,
/// so callers never see raw transport shapes. `phimon-core` maps them
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Host unreachable, DNS failure, connection reset, timeout, etc.
    #[error(
        "Unable to connect to server. Please check the address and ensure the server is running."
    )]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be built (TLS backend, bad header value).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// Non-2xx response. `message` is the server's own message when the
    /// body carried one, otherwise a generic status line.
    #[error("{message}")]
    Server { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Invalid response from server: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Build a [`Error::Server`] from a status code and the raw response body.
    ///
    /// Uses the body's `message` field verbatim if present and non-empty.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Server returned status {status}"));
        Self::Server { status, message }
    }

    /// HTTP status code, if the failure came from a server response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
