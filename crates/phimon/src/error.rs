//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use phimon_config::ConfigError;
use phimon_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 10;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(phimon::unreachable),
        help("Check that the sensor server is running and reachable from this machine.")
    )]
    Unreachable { message: String },

    #[error("Connection rejected: {message}")]
    #[diagnostic(
        code(phimon::rejected),
        help("The server is up but could not open its hardware link. Check the password.")
    )]
    Rejected { message: String },

    #[error("No active session")]
    #[diagnostic(
        code(phimon::no_session),
        help("Connect first: phimon connect <address> [--port <port>]")
    )]
    NoSession,

    #[error("Lost connection to {server}: {message}")]
    #[diagnostic(
        code(phimon::connection_lost),
        help("The server stopped reporting a live link. Reconnect with `phimon connect`.")
    )]
    ConnectionLost { server: String, message: String },

    #[error("Already connected to {server}")]
    #[diagnostic(
        code(phimon::already_connected),
        help("Run `phimon disconnect` before connecting elsewhere.")
    )]
    AlreadyConnected { server: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Sensor '{sensor_id}' not found")]
    #[diagnostic(
        code(phimon::not_found),
        help("Run `phimon sensors list` to see registered sensors.")
    )]
    SensorNotFound { sensor_id: String },

    #[error("Server error ({status}): {message}")]
    #[diagnostic(code(phimon::server_error))]
    Server { status: u16, message: String },

    // ── Input / configuration ────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(phimon::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(phimon::config),
        help("Check your config file or PHIMON_* environment variables.")
    )]
    Config { message: String },

    // ── Everything else ──────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(phimon::error))]
    Other(String),

    #[error(transparent)]
    #[diagnostic(code(phimon::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. }
            | Self::Rejected { .. }
            | Self::NoSession
            | Self::ConnectionLost { .. }
            | Self::AlreadyConnected { .. } => exit_code::CONNECTION,
            Self::SensorNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config { .. } => exit_code::CONFIG,
            Self::Server { .. } | Self::Other(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            e @ CoreError::Unreachable { .. } => CliError::Unreachable {
                message: e.to_string(),
            },
            CoreError::Rejected { message } => CliError::Rejected { message },
            CoreError::NotConnected => CliError::NoSession,
            CoreError::ConnectionLost { message } => CliError::ConnectionLost {
                server: "sensor server".into(),
                message,
            },
            CoreError::AlreadyConnected { server } => CliError::AlreadyConnected { server },
            CoreError::SensorNotFound { sensor_id } => CliError::SensorNotFound { sensor_id },
            CoreError::Server { status, message } => CliError::Server { status, message },
            CoreError::Config { message } => CliError::Config { message },
            e @ (CoreError::Busy
            | CoreError::Cancelled
            | CoreError::InvalidResponse { .. }
            | CoreError::Storage { .. }
            | CoreError::Internal(_)) => CliError::Other(e.to_string()),
        }
    }
}

/// Error mapper for a connect to `address:port`; names the server when
/// the link drops straight after connecting.
pub fn connect_error(address: &str, port: u16) -> impl FnOnce(CoreError) -> CliError + '_ {
    move |err| match err {
        CoreError::ConnectionLost { message } => CliError::ConnectionLost {
            server: format!("{address}:{port}"),
            message,
        },
        other => other.into(),
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Config {
                message: format!("invalid {field}: {reason}"),
            },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
