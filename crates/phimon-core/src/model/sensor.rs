// ── Sensor domain types ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Kind of physical channel a sensor reads from.
///
/// Tags arrive as uppercase strings from the backend. Anything outside the
/// known set is kept verbatim (uppercased) in [`SensorType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum SensorType {
    #[strum(serialize = "TEMPERATURE")]
    Temperature,
    #[strum(serialize = "HUMIDITY")]
    Humidity,
    #[strum(serialize = "VOLTAGE")]
    Voltage,
    #[strum(serialize = "VOLTAGERATIO")]
    VoltageRatio,
    #[strum(serialize = "DIGITALINPUT")]
    DigitalInput,
    #[strum(serialize = "DIGITALOUTPUT")]
    DigitalOutput,
    #[strum(serialize = "DISTANCESENSOR")]
    DistanceSensor,
    #[strum(serialize = "LIGHTSENSOR")]
    LightSensor,
    #[strum(serialize = "SOUNDSENSOR")]
    SoundSensor,
    #[strum(serialize = "PRESSURESENSOR")]
    PressureSensor,
    #[strum(default)]
    Other(String),
}

impl SensorType {
    /// Every variant with a fixed tag, in display order.
    pub const KNOWN: [SensorType; 10] = [
        Self::Temperature,
        Self::Humidity,
        Self::Voltage,
        Self::VoltageRatio,
        Self::DigitalInput,
        Self::DigitalOutput,
        Self::DistanceSensor,
        Self::LightSensor,
        Self::SoundSensor,
        Self::PressureSensor,
    ];

    /// Parse a wire tag. Never fails; unknown tags become `Other`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match Self::from_str(trimmed) {
            Ok(Self::Other(_)) | Err(_) => Self::Other(trimmed.to_ascii_uppercase()),
            Ok(known) => known,
        }
    }

    /// Canonical wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Temperature => "TEMPERATURE",
            Self::Humidity => "HUMIDITY",
            Self::Voltage => "VOLTAGE",
            Self::VoltageRatio => "VOLTAGERATIO",
            Self::DigitalInput => "DIGITALINPUT",
            Self::DigitalOutput => "DIGITALOUTPUT",
            Self::DistanceSensor => "DISTANCESENSOR",
            Self::LightSensor => "LIGHTSENSOR",
            Self::SoundSensor => "SOUNDSENSOR",
            Self::PressureSensor => "PRESSURESENSOR",
            Self::Other(tag) => tag,
        }
    }

    /// Display unit for readings of this type. Empty for unitless or
    /// unrecognized types.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Voltage => "V",
            Self::VoltageRatio => "V/V",
            Self::DistanceSensor => "mm",
            Self::LightSensor => "lux",
            Self::SoundSensor => "dB",
            Self::PressureSensor => "kPa",
            Self::DigitalInput | Self::DigitalOutput | Self::Other(_) => "",
        }
    }

    pub fn is_digital(&self) -> bool {
        matches!(self, Self::DigitalInput | Self::DigitalOutput)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SensorType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<SensorType> for String {
    fn from(kind: SensorType) -> Self {
        kind.as_str().to_owned()
    }
}

/// One sensor as the registry holds it.
///
/// Identity fields (`sensor_id`, `sensor_type`, `sensor_name`, `hub_port`,
/// `channel`) are fixed once the record exists; readings only touch
/// `value`, `timestamp` and `attached`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub sensor_name: String,
    pub hub_port: u32,
    pub channel: u32,
    pub value: Option<f64>,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub attached: bool,
}

impl SensorRecord {
    /// Copy the live part of `reading` into this record.
    pub fn apply_reading(&mut self, reading: &SensorRecord) {
        self.value = reading.value;
        self.timestamp = reading.timestamp;
        self.attached = reading.attached;
    }

    /// Time since the last reading, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.timestamp).max(chrono::Duration::zero())
    }

    /// Value with its unit, or a placeholder when nothing has been read yet.
    pub fn display_value(&self) -> String {
        match self.value {
            None => "-".into(),
            Some(v) if self.sensor_type.is_digital() => {
                if v.abs() > f64::EPSILON { "ON".into() } else { "OFF".into() }
            }
            Some(v) if self.unit.is_empty() => format!("{v:.2}"),
            Some(v) => format!("{v:.2} {}", self.unit),
        }
    }
}

/// A sensor channel to register on the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSensor {
    pub sensor_type: SensorType,
    pub hub_port: u32,
    pub channel: u32,
    pub serial_number: Option<i32>,
    pub sensor_name: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_known_tags_case_insensitively() {
        assert_eq!(SensorType::parse("TEMPERATURE"), SensorType::Temperature);
        assert_eq!(SensorType::parse("voltageRatio"), SensorType::VoltageRatio);
        assert_eq!(SensorType::parse(" humidity "), SensorType::Humidity);
    }

    #[test]
    fn unknown_tags_are_uppercased() {
        let kind = SensorType::parse("accelerometer");
        assert_eq!(kind, SensorType::Other("ACCELEROMETER".into()));
        assert_eq!(kind.to_string(), "ACCELEROMETER");
        assert_eq!(kind.unit(), "");
    }

    #[test]
    fn unit_table() {
        let units: Vec<&str> = SensorType::KNOWN.iter().map(SensorType::unit).collect();
        assert_eq!(
            units,
            ["°C", "%", "V", "V/V", "", "", "mm", "lux", "dB", "kPa"]
        );
    }

    #[test]
    fn serde_uses_wire_tag() {
        let json = serde_json::to_string(&SensorType::LightSensor).unwrap();
        assert_eq!(json, "\"LIGHTSENSOR\"");
        let back: SensorType = serde_json::from_str("\"soundsensor\"").unwrap();
        assert_eq!(back, SensorType::SoundSensor);
    }

    fn record(value: Option<f64>, kind: SensorType) -> SensorRecord {
        SensorRecord {
            sensor_id: "s1".into(),
            unit: kind.unit().into(),
            sensor_type: kind,
            sensor_name: "Thermo".into(),
            hub_port: 0,
            channel: 0,
            value,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            attached: true,
        }
    }

    #[test]
    fn apply_reading_touches_only_live_fields() {
        let mut current = record(None, SensorType::Temperature);
        let mut reading = record(Some(21.5), SensorType::Humidity);
        reading.sensor_name = "Renamed".into();
        reading.attached = false;
        reading.timestamp = Utc.timestamp_millis_opt(1_700_000_001_000).unwrap();

        current.apply_reading(&reading);

        assert_eq!(current.value, Some(21.5));
        assert!(!current.attached);
        assert_eq!(current.timestamp, reading.timestamp);
        assert_eq!(current.sensor_name, "Thermo");
        assert_eq!(current.sensor_type, SensorType::Temperature);
    }

    #[test]
    fn display_value_formats() {
        assert_eq!(record(None, SensorType::Voltage).display_value(), "-");
        assert_eq!(
            record(Some(12.345), SensorType::Voltage).display_value(),
            "12.35 V"
        );
        assert_eq!(
            record(Some(1.0), SensorType::DigitalInput).display_value(),
            "ON"
        );
        assert_eq!(
            record(Some(3.0), SensorType::Other("X".into())).display_value(),
            "3.00"
        );
    }
}
