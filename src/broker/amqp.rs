//! AMQP broker access with `lapin`.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use log::{debug, error, info};

use crate::config::{BrokerConfig, CONSUMER_TAG};
use crate::error_handling::BrokerError;

use super::{Acknowledge, BrokerConnector, MessageSource, QueueMessage};

/// Connects to the job queue of an AMQP 0.9.1 broker.
pub struct AmqpConnector {
    config: BrokerConfig,
}

impl AmqpConnector {
    pub fn new(config: BrokerConfig) -> Self {
        AmqpConnector { config }
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn connect(&self, prefetch: u16) -> Result<Box<dyn MessageSource>, BrokerError> {
        let uri = self
            .config
            .uri()
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        connection.on_error(|e| error!("[AMQP] connection error: {e}"));
        info!(
            "Connected to broker at {}:{}",
            self.config.host, self.config.port
        );

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions {
                    durable: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        let consumer = channel
            .basic_consume(
                &self.config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(Box::new(AmqpSource {
            connection,
            channel,
            consumer,
        }))
    }

    fn queue(&self) -> &str {
        &self.config.queue
    }
}

struct AmqpSource {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl MessageSource for AmqpSource {
    async fn next_message(&mut self) -> Option<Result<QueueMessage, BrokerError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| QueueMessage {
                    delivery_tag: delivery.delivery_tag,
                    body: delivery.data,
                    acker: Box::new(AmqpAcker(delivery.acker)),
                })
                .map_err(|e| BrokerError::Consume(e.to_string())),
        )
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close(200, "shutting down").await {
            debug!("[AMQP] channel close failed: {e}");
        }
        if let Err(e) = self.connection.close(200, "shutting down").await {
            debug!("[AMQP] connection close failed: {e}");
        }
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }
}
