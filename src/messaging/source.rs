use async_trait::async_trait;

/// A raw message as delivered by the broker.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ReceivedMessage {
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// At-least-once message source. A message that is never acked will be
/// delivered again.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &str;

    /// Wait for the next message. `Ok(None)` means the source is closed.
    async fn receive(&self) -> anyhow::Result<Option<ReceivedMessage>>;

    async fn ack(&self, message: &ReceivedMessage) -> anyhow::Result<()>;
}

#[cfg(test)]
pub use in_memory::InMemoryEventSource;

#[cfg(test)]
mod in_memory {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of payloads, then reports itself closed.
    pub struct InMemoryEventSource {
        name: String,
        pending: Mutex<VecDeque<ReceivedMessage>>,
        acked: Mutex<Vec<i64>>,
    }

    impl InMemoryEventSource {
        pub fn new(name: &str, payloads: Vec<String>) -> Self {
            let pending = payloads
                .into_iter()
                .enumerate()
                .map(|(offset, payload)| ReceivedMessage {
                    topic: name.to_string(),
                    partition: 0,
                    offset: offset as i64,
                    key: None,
                    payload: payload.into_bytes(),
                })
                .collect();

            Self {
                name: name.to_string(),
                pending: Mutex::new(pending),
                acked: Mutex::new(Vec::new()),
            }
        }

        pub fn acked_offsets(&self) -> Vec<i64> {
            self.acked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for InMemoryEventSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn receive(&self) -> anyhow::Result<Option<ReceivedMessage>> {
            Ok(self.pending.lock().unwrap().pop_front())
        }

        async fn ack(&self, message: &ReceivedMessage) -> anyhow::Result<()> {
            self.acked.lock().unwrap().push(message.offset);
            Ok(())
        }
    }
}
