//! Kafka adapters for the deferral and verdict topics.
//!
//! Deferrals carry no key and are spread over partitions at random; each one
//! is independent, so ordering does not matter. Verdicts are consumed through
//! a consumer group. Offsets are stored only when a verdict is acknowledged
//! and committed in the background from there, so a verdict received but not
//! yet applied is delivered again after a restart.

use crate::config::QueueConfig;
use crate::domain::events::DeferralEvent;
use crate::domain::ports::{EventConsumer, EventPublisher};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rdkafka::Message;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("partitioner", "random")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| GatewayError::InternalError(Box::new(e)))?;

        info!(brokers = %config.bootstrap_servers(), topic = %config.deferral_topic, "kafka producer started");
        Ok(Self {
            producer,
            topic: config.deferral_topic.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish_deferral(&self, event: &DeferralEvent) -> Result<()> {
        let payload = event.to_json()?;
        let record = FutureRecord::<(), _>::to(&self.topic).payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| GatewayError::PublishFailed(e.to_string()))?;

        debug!(topic = %self.topic, partition, offset, invoice_id = %event.invoice_id, "deferral delivered");
        Ok(())
    }
}

/// Position of a received message: topic, partition, offset.
type Position = (String, i32, i64);

pub struct KafkaConsumer {
    consumer: StreamConsumer,
    unacknowledged: Option<Position>,
}

impl KafkaConsumer {
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("group.id", &config.consumer_group)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| GatewayError::InternalError(Box::new(e)))?;

        consumer
            .subscribe(&[config.verdict_topic.as_str()])
            .map_err(|e| GatewayError::InternalError(Box::new(e)))?;

        info!(
            brokers = %config.bootstrap_servers(),
            topic = %config.verdict_topic,
            group_id = %config.consumer_group,
            "kafka consumer started"
        );
        Ok(Self {
            consumer,
            unacknowledged: None,
        })
    }
}

/// Offsets to store once the message at `offset` is handled. The stored
/// offset is the next one to read.
fn next_offsets(topic: &str, partition: i32, offset: i64) -> KafkaResult<TopicPartitionList> {
    let mut offsets = TopicPartitionList::new();
    offsets.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
    Ok(offsets)
}

#[async_trait]
impl EventConsumer for KafkaConsumer {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| GatewayError::ConsumeFailed(e.to_string()))?;
        self.unacknowledged = Some((
            message.topic().to_string(),
            message.partition(),
            message.offset(),
        ));
        Ok(Some(message.payload().unwrap_or_default().to_vec()))
    }

    async fn acknowledge(&mut self) -> Result<()> {
        let Some((topic, partition, offset)) = self.unacknowledged.take() else {
            return Ok(());
        };
        next_offsets(&topic, partition, offset)
            .and_then(|offsets| self.consumer.store_offsets(&offsets))
            .map_err(|e| GatewayError::ConsumeFailed(e.to_string()))?;
        debug!(%topic, partition, offset, "verdict offset stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_offsets_point_past_the_message() {
        let offsets = next_offsets("transaction_results", 3, 41).unwrap();
        let elem = offsets.find_partition("transaction_results", 3).unwrap();
        assert_eq!(elem.offset(), Offset::Offset(42));
        assert_eq!(offsets.count(), 1);
    }

    #[tokio::test]
    async fn test_clients_build_from_queue_config() {
        let config = QueueConfig {
            brokers: vec!["localhost:19092".to_string(), "localhost:29092".to_string()],
            ..QueueConfig::default()
        };

        let publisher = KafkaPublisher::new(&config).unwrap();
        assert_eq!(publisher.topic, config.deferral_topic);

        let mut consumer = KafkaConsumer::new(&config).unwrap();
        assert!(consumer.unacknowledged.is_none());
        // Nothing received yet, so there is nothing to store.
        consumer.acknowledge().await.unwrap();
    }
}
