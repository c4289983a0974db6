use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
    Offset, TopicPartitionList,
};

use super::source::{EventSource, ReceivedMessage};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

// ============================================================================
// Redpanda Producer
// ============================================================================

pub struct RedpandaClient {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaClient {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Redpanda producer")?;

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("redpanda", CircuitBreakerConfig::default()),
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(Duration::from_secs(5)))
                    .await
                    .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))
            })
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(topic, key, "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(breaker)) => {
                tracing::error!(topic, breaker = %breaker, "Circuit breaker open - Redpanda unavailable");
                Err(anyhow::anyhow!("Circuit breaker open for Redpanda"))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic, "Failed to publish to Redpanda");
                Err(e)
            }
        }
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }
}

// ============================================================================
// Redpanda Consumer
// ============================================================================
//
// Auto-commit is off: an offset is committed only once the worker acks the
// message, so a crash mid-processing means redelivery, not loss.
//
// ============================================================================

pub struct RedpandaEventSource {
    consumer: StreamConsumer,
    topic: String,
}

impl RedpandaEventSource {
    pub fn new(brokers: &str, group_id: &str, topic: &str, auto_offset_reset: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .context("Failed to create Redpanda consumer")?;

        consumer
            .subscribe(&[topic])
            .with_context(|| format!("Failed to subscribe to topic {topic}"))?;

        tracing::info!(topic, group_id, "📥 Subscribed to Redpanda topic");

        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl EventSource for RedpandaEventSource {
    fn name(&self) -> &str {
        &self.topic
    }

    async fn receive(&self) -> Result<Option<ReceivedMessage>> {
        let message = self
            .consumer
            .recv()
            .await
            .context("Failed to receive from Redpanda")?;

        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned());

        Ok(Some(ReceivedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key,
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;

        self.consumer
            .commit(&offsets, CommitMode::Async)
            .with_context(|| {
                format!(
                    "Failed to commit offset {} on {}/{}",
                    message.offset, message.topic, message.partition
                )
            })
    }
}
