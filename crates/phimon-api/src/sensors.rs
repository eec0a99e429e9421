// Sensor endpoints
//
// Inventory and readings come from two separate endpoints; both return
// JSON objects keyed by sensor id.

use std::collections::HashMap;

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{SensorData, SensorRegistration, SensorSummary};

impl ApiClient {
    /// List every sensor the backend knows about (no live values).
    ///
    /// `GET /sensors`
    pub async fn list_sensors(&self) -> Result<HashMap<String, SensorSummary>, Error> {
        let url = self.endpoint(&["sensors"])?;
        self.get(url).await
    }

    /// Latest reading for every sensor.
    ///
    /// `GET /sensors/data`
    pub async fn all_sensor_data(&self) -> Result<HashMap<String, SensorData>, Error> {
        let url = self.endpoint(&["sensors", "data"])?;
        self.get(url).await
    }

    /// Latest reading for a single sensor.
    ///
    /// `GET /sensors/{id}/data`
    pub async fn sensor_data(&self, sensor_id: &str) -> Result<SensorData, Error> {
        let url = self.endpoint(&["sensors", sensor_id, "data"])?;
        self.get(url).await
    }

    /// Register a new sensor channel on the hub.
    ///
    /// `POST /sensors/register`
    pub async fn register_sensor(
        &self,
        registration: &SensorRegistration,
    ) -> Result<SensorSummary, Error> {
        let url = self.endpoint(&["sensors", "register"])?;
        debug!(
            sensor_type = %registration.sensor_type,
            hub_port = registration.hub_port,
            channel = registration.channel,
            "registering sensor"
        );
        self.post(url, registration).await
    }

    /// Remove a sensor from the backend.
    ///
    /// `DELETE /sensors/{id}`
    pub async fn unregister_sensor(&self, sensor_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["sensors", sensor_id])?;
        debug!(sensor_id, "unregistering sensor");
        self.delete(url).await
    }
}
