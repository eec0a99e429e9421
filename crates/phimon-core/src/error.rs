// ── Core error types ──
//
// User-facing errors from phimon-core. Consumers never see reqwest
// errors or JSON parse failures directly; the `From<phimon_api::Error>`
// impl folds transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error(
        "Unable to connect to server at {url}. Please check the address and ensure the server is running."
    )]
    Unreachable { url: String },

    #[error("Connection rejected: {message}")]
    Rejected { message: String },

    #[error("Not connected to a sensor server")]
    NotConnected,

    #[error("Already connected to {server}")]
    AlreadyConnected { server: String },

    #[error("A connection check is already in progress")]
    Busy,

    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The link dropped right after it was established.
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    // ── Server errors ────────────────────────────────────────────────
    /// Non-2xx response; `message` is the server's own text when it sent one.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from server: {message}")]
    InvalidResponse { message: String },

    #[error("Sensor not found: {sensor_id}")]
    SensorNotFound { sensor_id: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures that mean the server could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<phimon_api::Error> for CoreError {
    fn from(err: phimon_api::Error) -> Self {
        match err {
            phimon_api::Error::Transport(e) => CoreError::Unreachable {
                url: e
                    .url()
                    .map(|u| format!("{}://{}", u.scheme(), u.authority()))
                    .unwrap_or_else(|| "<unknown>".into()),
            },
            phimon_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid server address: {e}"),
            },
            phimon_api::Error::Tls(msg) => CoreError::Config { message: msg },
            phimon_api::Error::Server { status, message } => CoreError::Server { status, message },
            phimon_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}
