//! Device session

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::client::{ClientConfig, WvaClient};
use crate::error::Result;
use crate::stream::{EventStream, StreamSettings};
use crate::subscription::SubscriptionHandle;
use crate::types::{last_segment, SubscriptionList, VehicleDataList};
use crate::vehicle::VehicleDataElement;

/// Session with one WVA device
///
/// The device supports a single event stream, so [`Wva::event_stream`]
/// always hands out the same [`EventStream`].
#[derive(Debug)]
pub struct Wva {
    client: WvaClient,
    stream_settings: StreamSettings,
    event_stream: OnceLock<Arc<EventStream>>,
}

impl Wva {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::from_client(WvaClient::new(config)?))
    }

    pub fn from_client(client: WvaClient) -> Self {
        Self {
            client,
            stream_settings: StreamSettings::default(),
            event_stream: OnceLock::new(),
        }
    }

    /// Tunables for the event stream; only effective before it is first used
    pub fn with_stream_settings(mut self, settings: StreamSettings) -> Self {
        self.stream_settings = settings;
        self
    }

    pub fn client(&self) -> &WvaClient {
        &self.client
    }

    pub fn hostname(&self) -> &str {
        self.client.hostname()
    }

    pub fn vehicle_data_element(&self, name: &str) -> VehicleDataElement {
        VehicleDataElement::new(self.client.clone(), name)
    }

    /// All data elements the device knows, keyed by name
    pub async fn vehicle_data_elements(&self) -> Result<HashMap<String, VehicleDataElement>> {
        let list: VehicleDataList = self.client.get_as("vehicle/data").await?;
        Ok(list
            .data
            .iter()
            .map(|uri| {
                let name = last_segment(uri);
                (name.to_string(), self.vehicle_data_element(name))
            })
            .collect())
    }

    pub fn subscription(&self, short_name: &str) -> SubscriptionHandle {
        SubscriptionHandle::new(self.client.clone(), short_name)
    }

    /// Subscriptions currently configured on the device
    pub async fn subscriptions(&self) -> Result<Vec<SubscriptionHandle>> {
        let list: SubscriptionList = self.client.get_as("subscriptions").await?;
        Ok(list
            .subscriptions
            .iter()
            .map(|uri| self.subscription(last_segment(uri)))
            .collect())
    }

    /// The device's event stream, created on first use
    pub fn event_stream(&self) -> Arc<EventStream> {
        self.event_stream
            .get_or_init(|| {
                Arc::new(EventStream::for_client(
                    self.client.clone(),
                    self.stream_settings.clone(),
                ))
            })
            .clone()
    }
}
