//! Subscriptions to vehicle data
//!
//! A subscription makes the device push a data item onto the event stream
//! at a fixed interval. Events arrive through [`crate::stream::EventStream`].

use serde_json::json;
use tracing::info;

use crate::client::WvaClient;
use crate::error::Result;
use crate::types::SubscriptionDocument;
pub use crate::types::SubscriptionMetadata;

/// Default buffering policy for new subscriptions
pub const DEFAULT_BUFFER: &str = "queue";
/// Default interval in seconds for new subscriptions
pub const DEFAULT_INTERVAL: u32 = 10;

/// Handle to the subscription with a given short name
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    client: WvaClient,
    short_name: String,
}

impl SubscriptionHandle {
    pub fn new(client: WvaClient, short_name: impl Into<String>) -> Self {
        Self {
            client,
            short_name: short_name.into(),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    fn path(&self) -> String {
        format!("subscriptions/{}", self.short_name)
    }

    /// Create (or replace) this subscription
    pub async fn create(&self, uri: &str, buffer: &str, interval: u32) -> Result<()> {
        let body = json!({
            "subscription": {
                "uri": uri,
                "buffer": buffer,
                "interval": interval,
            }
        });
        self.client.put_json(&self.path(), &body).await?;
        info!(short_name = %self.short_name, %uri, interval, "Subscription created");
        Ok(())
    }

    /// Create this subscription with the default buffer and interval
    pub async fn create_default(&self, uri: &str) -> Result<()> {
        self.create(uri, DEFAULT_BUFFER, DEFAULT_INTERVAL).await
    }

    /// Delete this subscription
    pub async fn delete(&self) -> Result<()> {
        self.client.delete(&self.path()).await?;
        info!(short_name = %self.short_name, "Subscription deleted");
        Ok(())
    }

    /// Fetch the uri/buffer/interval of this subscription
    pub async fn metadata(&self) -> Result<SubscriptionMetadata> {
        let doc: SubscriptionDocument = self.client.get_as(&self.path()).await?;
        Ok(doc.subscription)
    }
}
