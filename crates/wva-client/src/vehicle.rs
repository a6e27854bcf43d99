//! Vehicle data elements

use chrono::{DateTime, Utc};

use crate::client::WvaClient;
use crate::error::{Result, WvaError};
use crate::types::RawVehicleSample;

/// Current value of a vehicle data element
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDataSample {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<RawVehicleSample> for VehicleDataSample {
    type Error = WvaError;

    fn try_from(raw: RawVehicleSample) -> Result<Self> {
        let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
            .map_err(|e| WvaError::Parse(format!("bad timestamp {:?}: {}", raw.timestamp, e)))?
            .with_timezone(&Utc);
        Ok(Self {
            value: raw.value,
            timestamp,
        })
    }
}

/// Access to one named data element (e.g. `VehicleSpeed`)
#[derive(Debug, Clone)]
pub struct VehicleDataElement {
    client: WvaClient,
    name: String,
}

impl VehicleDataElement {
    pub fn new(client: WvaClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data URI of this element, usable as a subscription target
    pub fn uri(&self) -> String {
        format!("vehicle/data/{}", self.name)
    }

    /// Read the current value
    ///
    /// The device answers `{"<name>": {"timestamp": ..., "value": ...}}`.
    pub async fn sample(&self) -> Result<VehicleDataSample> {
        let mut doc = self.client.get(&self.uri()).await?;
        let inner = doc
            .get_mut(&self.name)
            .map(serde_json::Value::take)
            .ok_or_else(|| WvaError::Parse(format!("missing element {}", self.name)))?;
        let raw: RawVehicleSample =
            serde_json::from_value(inner).map_err(|e| WvaError::Parse(e.to_string()))?;
        raw.try_into()
    }
}
