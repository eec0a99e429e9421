// phimon-api: Async Rust client for the Phidget sensor backend REST API

pub mod client;
pub mod connection;
pub mod error;
pub mod models;
pub mod sensors;
pub mod transport;

pub use client::ApiClient;
pub use error::Error;
pub use models::{
    ConnectionRequest, ConnectionStatus, ErrorResponse, SensorData, SensorRegistration,
    SensorSummary,
};
pub use transport::{DEFAULT_API_PATH, TransportConfig, base_url_for, strip_scheme};
