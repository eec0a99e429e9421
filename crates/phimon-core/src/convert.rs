// ── API-to-domain type conversions ──
//
// Bridges raw `phimon_api` response types into canonical `phimon_core::model`
// types. Readings without a timestamp are stamped with the local clock.

use chrono::Utc;

use phimon_api::{SensorData, SensorRegistration, SensorSummary};

use crate::model::{NewSensor, SensorRecord, SensorType};

// ── Sensor ───────────────────────────────────────────────────────────

impl From<SensorSummary> for SensorRecord {
    fn from(s: SensorSummary) -> Self {
        let sensor_type = SensorType::parse(&s.sensor_type);
        SensorRecord {
            unit: sensor_type.unit().to_owned(),
            sensor_id: s.sensor_id,
            sensor_type,
            sensor_name: s.sensor_name,
            hub_port: s.hub_port,
            channel: s.channel,
            value: s.value,
            timestamp: Utc::now(),
            attached: s.attached,
        }
    }
}

impl SensorRecord {
    /// A record for a sensor first seen in an inventory listing. Its value
    /// stays unset until a readings fetch supplies one.
    pub(crate) fn from_inventory(s: SensorSummary) -> Self {
        Self {
            value: None,
            ..Self::from(s)
        }
    }
}

impl From<SensorData> for SensorRecord {
    fn from(d: SensorData) -> Self {
        let timestamp = d.timestamp_utc().unwrap_or_else(Utc::now);
        let sensor_type = SensorType::parse(&d.sensor_type);
        SensorRecord {
            unit: sensor_type.unit().to_owned(),
            sensor_id: d.sensor_id,
            sensor_type,
            sensor_name: d.sensor_name,
            hub_port: d.hub_port,
            channel: d.channel,
            value: d.value,
            timestamp,
            attached: d.attached,
        }
    }
}

impl From<&NewSensor> for SensorRegistration {
    fn from(n: &NewSensor) -> Self {
        SensorRegistration {
            sensor_type: n.sensor_type.to_string(),
            hub_port: n.hub_port,
            channel: n.channel,
            serial_number: n.serial_number,
            sensor_name: n.sensor_name.clone(),
        }
    }
}
