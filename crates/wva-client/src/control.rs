//! Control plane for the event stream
//!
//! The event stream supervisor only needs to know whether the device has
//! its event socket enabled and on which port. [`ControlPlane`] is that
//! seam; [`HttpControlPlane`] implements it on top of `config/ws_events`.

use async_trait::async_trait;

use crate::client::WvaClient;
use crate::error::Result;
use crate::types::{WsEventsConfig, WsEventsDocument};

const WS_EVENTS_PATH: &str = "config/ws_events";

/// Remote event stream switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub enabled: bool,
    pub port: u16,
}

impl From<WsEventsConfig> for StreamConfig {
    fn from(cfg: WsEventsConfig) -> Self {
        Self {
            enabled: cfg.is_enabled(),
            port: cfg.port,
        }
    }
}

impl From<StreamConfig> for WsEventsConfig {
    fn from(cfg: StreamConfig) -> Self {
        Self {
            enable: if cfg.enabled { "on" } else { "off" }.to_string(),
            port: cfg.port,
        }
    }
}

/// Read/update access to the device's event stream setting
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Host the event socket lives on
    fn host(&self) -> String;

    /// Current enable flag and port
    async fn get_stream_config(&self) -> Result<StreamConfig>;

    /// Replace the enable flag and port
    async fn set_stream_config(&self, config: &StreamConfig) -> Result<()>;
}

/// [`ControlPlane`] backed by the WVA web services
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: WvaClient,
}

impl HttpControlPlane {
    pub fn new(client: WvaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    fn host(&self) -> String {
        self.client.hostname().to_string()
    }

    async fn get_stream_config(&self) -> Result<StreamConfig> {
        let doc: WsEventsDocument = self.client.get_as(WS_EVENTS_PATH).await?;
        Ok(doc.ws_events.into())
    }

    async fn set_stream_config(&self, config: &StreamConfig) -> Result<()> {
        let doc = WsEventsDocument {
            ws_events: (*config).into(),
        };
        self.client.put_json(WS_EVENTS_PATH, &doc).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_conversion() {
        let wire = WsEventsConfig {
            enable: "on".into(),
            port: 5000,
        };
        let cfg = StreamConfig::from(wire.clone());
        assert_eq!(
            cfg,
            StreamConfig {
                enabled: true,
                port: 5000
            }
        );
        assert_eq!(WsEventsConfig::from(cfg), wire);

        let off = WsEventsConfig::from(StreamConfig {
            enabled: false,
            port: 5001,
        });
        assert_eq!(off.enable, "off");
    }
}
