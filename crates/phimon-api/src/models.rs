// Wire types for the sensor backend REST API.
//
// Field names follow the backend's camelCase JSON. Non-optional fields the
// backend may omit or send as null fall back to their default, so a sparse
// payload still parses.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Read `null` as `T::default()`. Pair with `#[serde(default)]` for missing keys.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Body of `POST /connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub server_address: String,
    pub port: u16,
    /// Sent as `null` when absent.
    pub password: Option<String>,
}

/// Response of `POST /connect` and `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default)]
    pub server_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub connected_at: Option<i64>,
}

impl ConnectionStatus {
    pub fn connected_at_utc(&self) -> Option<DateTime<Utc>> {
        self.connected_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// One entry of `GET /sensors`: identity and metadata of a registered sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSummary {
    pub sensor_id: String,
    pub sensor_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sensor_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hub_port: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel: u32,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attached: bool,
    /// Free-form backend status ("REGISTERED", "ATTACHED", ...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// One entry of `GET /sensors/data`, or the body of `GET /sensors/{id}/data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    pub sensor_id: String,
    pub sensor_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sensor_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hub_port: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel: u32,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Epoch milliseconds of the reading.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attached: bool,
}

impl SensorData {
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Body of `POST /sensors/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRegistration {
    /// VOLTAGE, TEMPERATURE, HUMIDITY, ...
    pub sensor_type: String,
    pub hub_port: u32,
    pub channel: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_name: Option<String>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}
