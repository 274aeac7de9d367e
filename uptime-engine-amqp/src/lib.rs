//! AMQP-backed `QueueConsumer` for `uptime-engine` (companion crate).
//!
//! Bring your own `lapin::Channel`; deliveries are acked/nacked through the
//! channel's `Acker`, matching lapin's own delivery-handle shape.

use async_trait::async_trait;
use uptime_engine::queue::{ConsumerError, Delivery, QueueConsumer};

#[cfg(feature = "client")]
pub struct AmqpConsumer {
    consumer: lapin::Consumer,
    prefetch: u16,
}

#[cfg(feature = "client")]
impl AmqpConsumer {
    /// Declares a consumer on `queue_name` with the given prefetch, via
    /// `basic_qos` on the channel before consuming.
    pub async fn connect(
        channel: &lapin::Channel,
        queue_name: &str,
        prefetch: u16,
    ) -> Result<Self, ConsumerError> {
        channel
            .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
            .await
            .map_err(|e| ConsumerError::SetupFailed(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                queue_name,
                "uptime-engine",
                lapin::options::BasicConsumeOptions::default(),
                lapin::types::FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::SetupFailed(e.to_string()))?;

        Ok(Self { consumer, prefetch })
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl QueueConsumer for AmqpConsumer {
    async fn next_delivery(&mut self) -> Result<Option<Box<dyn Delivery>>, ConsumerError> {
        use futures_util::StreamExt;
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(Box::new(AmqpDelivery { delivery }))),
            Some(Err(e)) => Err(ConsumerError::ConnectionLost(e.to_string())),
            None => Ok(None),
        }
    }

    fn prefetch(&self) -> u16 {
        self.prefetch
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.consumer
            .cancel()
            .await
            .map_err(|e| ConsumerError::ConnectionLost(e.to_string()))
    }
}

#[cfg(feature = "client")]
pub struct AmqpDelivery {
    delivery: lapin::message::Delivery,
}

#[cfg(feature = "client")]
#[async_trait]
impl Delivery for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.delivery.data
    }

    fn delivery_count(&self) -> Option<u32> {
        self.delivery.properties.headers().as_ref().and_then(|headers| {
            headers.inner().get("x-delivery-count").and_then(|v| match v {
                lapin::types::AMQPValue::LongUInt(n) => Some(*n),
                _ => None,
            })
        })
    }

    async fn ack(self: Box<Self>) -> Result<(), ConsumerError> {
        self.delivery
            .ack(lapin::options::BasicAckOptions::default())
            .await
            .map_err(|e| ConsumerError::AckFailed(e.to_string()))
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), ConsumerError> {
        self.delivery
            .nack(lapin::options::BasicNackOptions { requeue, ..Default::default() })
            .await
            .map_err(|e| ConsumerError::NackFailed(e.to_string()))
    }
}
