// ── Domain model ──
//
// Canonical types consumers work with. Wire types stay in phimon-api;
// `crate::convert` bridges the two.

pub mod sensor;
pub mod session;

pub use sensor::{NewSensor, SensorRecord, SensorType};
pub use session::SessionInfo;
