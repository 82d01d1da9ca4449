//! NATS JetStream message bus adapter (C2): the Kafka-compatible durable
//! bus behind the three pipeline topics.
//!
//! Per §5, delivery is effectively at-most-once: the pipeline acks a
//! message right after it finishes processing it (success or failure),
//! it never naks for redelivery. The `nak` path on [`BusMessage`] exists
//! for a hardened deployment but the stage workers in `sr-pipeline`
//! don't call it.

use crate::config::MessageBusConfig;
use async_nats::jetstream::{
    self,
    consumer::{pull::Config as PullConsumerConfig, AckPolicy, DeliverPolicy},
    stream::Config as StreamConfig,
    Context as JetStreamContext,
};
use async_nats::Client as NatsClient;
use sr_ports::{BusMessage, MessageBus, MessageBusError, MessageSubscription};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, instrument, warn};

pub const TOPIC_INGEST: &str = "certificate.ingest";
pub const TOPIC_OCR: &str = "certificate.ocr";
pub const TOPIC_METADATA: &str = "certificate.metadata";

pub const CONSUMER_GROUP_INGEST: &str = "certificate-ingest-group";
pub const CONSUMER_GROUP_OCR: &str = "certificate-ocr-group";
pub const CONSUMER_GROUP_METADATA: &str = "certificate-metadata-group";

const STREAM_NAME: &str = "certificates";

pub struct NatsMessageBus {
    jetstream: JetStreamContext,
    config: MessageBusConfig,
}

impl NatsMessageBus {
    pub async fn connect(config: MessageBusConfig) -> Result<Self, MessageBusError> {
        info!(url = %config.url, "connecting to NATS");
        let client: NatsClient =
            async_nats::connect(&config.url)
                .await
                .map_err(|e| MessageBusError::ConnectionError {
                    message: e.to_string(),
                })?;
        let jetstream = jetstream::new(client);

        let bus = Self { jetstream, config };
        bus.ensure_stream().await?;
        info!("message bus initialized");
        Ok(bus)
    }

    async fn ensure_stream(&self) -> Result<(), MessageBusError> {
        let stream_name = format!("{}-{}", self.config.stream_prefix, STREAM_NAME);
        let stream_config = StreamConfig {
            name: stream_name.clone(),
            subjects: vec![
                TOPIC_INGEST.to_string(),
                TOPIC_OCR.to_string(),
                TOPIC_METADATA.to_string(),
            ],
            max_age: std::time::Duration::from_secs(self.config.message_ttl_secs as u64),
            duplicate_window: std::time::Duration::from_secs(
                self.config.duplicate_window_secs as u64,
            ),
            ..Default::default()
        };

        match self.jetstream.get_stream(&stream_name).await {
            Ok(_) => {
                debug!(stream = %stream_name, "stream exists");
                Ok(())
            }
            Err(_) => {
                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .map_err(|e| MessageBusError::ConnectionError {
                        message: e.to_string(),
                    })?;
                info!(stream = %stream_name, "stream created");
                Ok(())
            }
        }
    }
}

impl MessageBus for NatsMessageBus {
    #[instrument(skip(self, payload), fields(topic = %topic))]
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), MessageBusError> {
        let body = serde_json::to_vec(&payload).map_err(|e| MessageBusError::PublishFailed {
            message: e.to_string(),
        })?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", key.to_string());

        let ack = self
            .jetstream
            .publish_with_headers(topic.to_string(), headers, body.into())
            .await
            .map_err(|e| MessageBusError::PublishFailed {
                message: e.to_string(),
            })?;
        ack.await.map_err(|e| MessageBusError::PublishFailed {
            message: e.to_string(),
        })?;

        debug!(topic = %topic, key = %key, "message published");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
    ) -> Result<Box<dyn MessageSubscription>, MessageBusError> {
        let stream_name = format!("{}-{}", self.config.stream_prefix, STREAM_NAME);
        let stream = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| MessageBusError::SubscribeFailed {
                message: e.to_string(),
            })?;

        let durable_name = format!("{}-{}", self.config.stream_prefix, consumer_group);
        let consumer_config = PullConsumerConfig {
            durable_name: Some(durable_name),
            ack_policy: AckPolicy::Explicit,
            deliver_policy: DeliverPolicy::All,
            filter_subject: topic.to_string(),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(consumer_group, consumer_config)
            .await
            .map_err(|e| MessageBusError::SubscribeFailed {
                message: e.to_string(),
            })?;

        info!(topic = %topic, consumer_group = %consumer_group, "subscribed");
        Ok(Box::new(NatsSubscription { consumer }))
    }
}

struct NatsSubscription {
    consumer: jetstream::consumer::Consumer<jetstream::consumer::pull::Config>,
}

impl MessageSubscription for NatsSubscription {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Box<dyn BusMessage>>> + Send + '_>> {
        Box::pin(async move {
            let mut messages = match self.consumer.fetch().max_messages(1).messages().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "failed to fetch from consumer");
                    return None;
                }
            };

            use futures::StreamExt;
            match messages.next().await {
                Some(Ok(msg)) => Some(Box::new(NatsBusMessage { inner: msg }) as Box<dyn BusMessage>),
                Some(Err(e)) => {
                    warn!(error = %e, "failed to receive message");
                    None
                }
                None => None,
            }
        })
    }
}

struct NatsBusMessage {
    inner: jetstream::Message,
}

impl BusMessage for NatsBusMessage {
    fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    fn ack(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(e) = self.inner.ack().await {
                warn!(error = %e, "failed to ack message");
            }
        })
    }

    fn nak(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(e) = self.inner.ack_with(jetstream::AckKind::Nak(None)).await {
                warn!(error = %e, "failed to nak message");
            }
        })
    }
}
