//! Wire types for the WVA web services

use serde::{Deserialize, Serialize};

/// `config/ws_events` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsEventsDocument {
    pub ws_events: WsEventsConfig,
}

/// Event stream settings as the device reports them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsEventsConfig {
    /// `"on"` or `"off"`
    pub enable: String,
    /// TCP port of the event socket
    pub port: u16,
}

impl WsEventsConfig {
    pub fn is_enabled(&self) -> bool {
        self.enable == "on"
    }
}

/// `subscriptions/{short_name}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDocument {
    pub subscription: SubscriptionMetadata,
}

/// Settings of a single subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMetadata {
    /// Data URI being subscribed to (e.g. `vehicle/data/VehicleSpeed`)
    pub uri: String,
    /// Buffering policy, `queue` or `discard`
    pub buffer: String,
    /// Interval in seconds between samples
    pub interval: u32,
}

/// `subscriptions` listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

/// `vehicle/data` listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleDataList {
    #[serde(default)]
    pub data: Vec<String>,
}

/// A single vehicle data reading as returned by `vehicle/data/{name}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawVehicleSample {
    pub timestamp: String,
    pub value: f64,
}

/// Last path segment of a web services URI (`subscriptions/foo~sub` -> `foo~sub`)
pub(crate) fn last_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}
