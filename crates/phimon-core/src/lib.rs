// phimon-core: Reconciliation engine between phimon-api and consumers (CLI).

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::MonitorConfig;
pub use controller::{ConnectionState, Controller, EnginePhase, ServerEndpoint, TickOutcome};
pub use error::CoreError;
pub use phimon_api::DEFAULT_API_PATH;
pub use model::{NewSensor, SensorRecord, SensorType, SessionInfo};
pub use session::{FileBackend, MemoryBackend, SessionBackend, SessionStore};
pub use store::SensorRegistry;
pub use stream::SensorStream;
