use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted record of the last successful connection.
///
/// Stored as `{"serverAddress": .., "port": .., "timestamp": <epoch ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub server_address: String,
    pub port: u16,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub established_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Whether the session is still within `ttl` of when it was saved.
    /// Timestamps in the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.established_at < ttl
    }
}
