// ============================================================================
// Messaging - Redpanda transport for tracking events
// ============================================================================
//
// - source:   `EventSource` port the consumer worker reads from
// - redpanda: Kafka-protocol producer and consumer
// - notifier: publishes customer notifications through the producer
//
// ============================================================================

pub mod notifier;
pub mod redpanda;
pub mod source;

pub use notifier::RedpandaNotifier;
pub use redpanda::{RedpandaClient, RedpandaEventSource};
pub use source::{EventSource, ReceivedMessage};

#[cfg(test)]
pub use source::InMemoryEventSource;
