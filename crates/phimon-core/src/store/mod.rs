// ── Reactive sensor store ──
//
// Lock-free sensor storage with push-based change notification.

mod registry;

pub use registry::SensorRegistry;
