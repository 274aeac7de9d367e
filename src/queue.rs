//! Queue consumption traits (SPEC_FULL.md S4.1).
//!
//! The core crate defines the consumer contract only; concrete transports
//! (AMQP, etc.) live in sibling crates so this crate stays broker-agnostic.
//! Grounded on the svix-server queue module's ack/nack-with-requeue shape.

use async_trait::async_trait;
use thiserror::Error;

/// A single delivered message plus the means to acknowledge it.
///
/// Drop without calling `ack`/`nack` is equivalent to `nack(requeue: true)`
/// from the broker's point of view — most brokers redeliver unacked
/// messages once the connection that held them closes.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Raw message payload, as received from the broker.
    fn payload(&self) -> &[u8];

    /// Number of times this broker has attempted delivery, if known.
    fn delivery_count(&self) -> Option<u32> {
        None
    }

    /// Acknowledge successful processing; the broker may discard the message.
    async fn ack(self: Box<Self>) -> Result<(), ConsumerError>;

    /// Reject the message. `requeue = true` asks the broker to redeliver it
    /// (used for transient failures); `requeue = false` routes it to a
    /// dead-letter destination if the broker is configured with one.
    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), ConsumerError>;
}

/// Consumes deliveries from a broker with at-least-once semantics and a
/// bounded prefetch window (SPEC_FULL.md S4.1 I-1, I-2).
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Blocks until the next delivery is available or the consumer is
    /// closed. Returns `Ok(None)` on a clean shutdown with no more
    /// deliveries pending.
    async fn next_delivery(&mut self) -> Result<Option<Box<dyn Delivery>>, ConsumerError>;

    /// Maximum number of unacknowledged deliveries this consumer will hold
    /// at once. Implementations should configure the broker-side prefetch
    /// to match.
    fn prefetch(&self) -> u16;

    /// Stops consuming new deliveries. In-flight deliveries already handed
    /// out are unaffected; callers must still ack/nack them.
    async fn close(&mut self) -> Result<(), ConsumerError>;
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("connection to broker lost: {0}")]
    ConnectionLost(String),

    #[error("failed to acknowledge delivery: {0}")]
    AckFailed(String),

    #[error("failed to reject delivery: {0}")]
    NackFailed(String),

    #[error("consumer already closed")]
    Closed,

    #[error("broker rejected consumer setup: {0}")]
    SetupFailed(String),
}


#[cfg(test)]
mod tests {
    use super::test_support::MemoryConsumer;
    use super::*;

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let mut consumer = MemoryConsumer::new(vec![b"a".to_vec(), b"b".to_vec()], 10);
        let first = consumer.next_delivery().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"a");
        first.ack().await.unwrap();
        let second = consumer.next_delivery().await.unwrap().unwrap();
        assert_eq!(second.payload(), b"b");
        second.nack(false).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_queue_yields_none() {
        let mut consumer = MemoryConsumer::new(vec![], 10);
        assert!(consumer.next_delivery().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_consumer_yields_none() {
        let mut consumer = MemoryConsumer::new(vec![b"a".to_vec()], 10);
        consumer.close().await.unwrap();
        assert!(consumer.next_delivery().await.unwrap().is_none());
    }
}
