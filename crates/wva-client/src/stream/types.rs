//! Types for the event stream

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One JSON document received on the event stream
///
/// The stream does not interpret events; accessors are conveniences for
/// the usual `{"data": {...}}` shape and return `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamEvent(Map<String, Value>);

impl StreamEvent {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    /// Get a top-level value as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a raw top-level value
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check if a top-level key is present
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The `data` object of a subscription event
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.0.get("data").and_then(Value::as_object)
    }

    /// `data.short_name`: the subscription that produced this event
    pub fn short_name(&self) -> Option<&str> {
        self.data()?.get("short_name")?.as_str()
    }

    /// `data.sequence`
    pub fn sequence(&self) -> Option<u64> {
        self.data()?.get("sequence")?.as_u64()
    }

    /// `data.<element>.value` as f64
    pub fn element_value(&self, element: &str) -> Option<f64> {
        self.data()?.get(element)?.get("value")?.as_f64()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StreamEvent {
    fn from(values: Map<String, Value>) -> Self {
        Self(values)
    }
}

/// Lifecycle state of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No background task is running
    Disabled,
    /// Negotiating with the control plane or opening the socket
    Connecting,
    /// Socket open, events are being read
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Tunables for the connection supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Pause after a failed connection attempt
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// Upper bound on a single socket read
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    /// Upper bound on opening the event socket
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Bytes requested per socket read
    pub read_chunk_size: usize,
    /// Largest partial document kept while waiting for more bytes
    pub max_buffer_len: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
            read_chunk_size: 1024,
            max_buffer_len: 1024 * 1024,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Errors from the event socket
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    #[error("Receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

/// Why a connection attempt did not reach the connected state
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] crate::error::WvaError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
