use std::sync::Arc;

use async_trait::async_trait;

use super::redpanda::RedpandaClient;
use crate::domain::tracking::{StatusNotifier, TrackingUpdated};
use crate::utils::{retry_with_backoff, RetryConfig};

/// Publishes `tracking_updated` envelopes keyed by order id, so all
/// notifications for one order land on the same partition.
pub struct RedpandaNotifier {
    client: Arc<RedpandaClient>,
    topic: String,
}

impl RedpandaNotifier {
    pub fn new(client: Arc<RedpandaClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl StatusNotifier for RedpandaNotifier {
    async fn notify(&self, update: &TrackingUpdated) -> anyhow::Result<()> {
        let payload = update.to_envelope()?;
        let key = update.id_order.to_string();

        let client = self.client.as_ref();
        let (topic, key, payload) = (self.topic.as_str(), key.as_str(), payload.as_str());

        retry_with_backoff(RetryConfig::conservative(), move |_attempt| {
            client.publish(topic, key, payload)
        })
        .await
        .into_result()?;

        tracing::info!(
            order_id = update.id_order,
            status = %update.status,
            topic = %self.topic,
            "🔔 Customer notification published"
        );
        Ok(())
    }
}
