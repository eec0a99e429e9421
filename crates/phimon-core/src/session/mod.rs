// ── Connection session persistence ──
//
// Remembers the last successful connection so a restart can re-attach
// without asking the operator again. Storage failures never propagate:
// a session that cannot be read is treated as absent.

mod backend;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::model::SessionInfo;

pub use backend::{FileBackend, MemoryBackend, SessionBackend};

/// Storage key for the connection record.
pub const SESSION_KEY: &str = "phidget_connection";

/// Sessions older than this are ignored on load.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Reads and writes the persisted [`SessionInfo`].
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    ttl: TimeDelta,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            ttl: to_delta(DEFAULT_SESSION_TTL),
        }
    }

    /// Override the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_delta(ttl);
        self
    }

    /// Record `address:port` as the current session, stamped now.
    pub fn save(&self, server_address: &str, port: u16) -> SessionInfo {
        let info = SessionInfo {
            server_address: server_address.to_owned(),
            port,
            established_at: Utc::now(),
        };
        match serde_json::to_string(&info) {
            Ok(json) => match self.backend.write(SESSION_KEY, &json) {
                Ok(()) => debug!(server = %info.server_address, port, "session saved"),
                Err(e) => warn!(error = %e, "failed to persist session"),
            },
            Err(e) => warn!(error = %e, "failed to encode session"),
        }
        info
    }

    /// The stored session, if one exists and is still fresh.
    pub fn load(&self) -> Option<SessionInfo> {
        self.load_at(Utc::now())
    }

    /// [`load`](Self::load) against an explicit clock.
    pub fn load_at(&self, now: DateTime<Utc>) -> Option<SessionInfo> {
        let raw = match self.backend.read(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read session");
                return None;
            }
        };

        let info: SessionInfo = match serde_json::from_str(&raw) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "ignoring malformed session record");
                return None;
            }
        };

        if info.is_fresh(now, self.ttl) {
            Some(info)
        } else {
            debug!(server = %info.server_address, "session expired");
            None
        }
    }

    /// Forget the stored session.
    pub fn clear(&self) {
        match self.backend.remove(SESSION_KEY) {
            Ok(()) => debug!("session cleared"),
            Err(e) => warn!(error = %e, "failed to clear session"),
        }
    }
}

fn to_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}
