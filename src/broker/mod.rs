//! Work queue access.
//!
//! The dispatcher only sees three seams: a connector that opens a consuming
//! channel, the message source it returns, and the per-message acknowledger.

mod amqp;

use async_trait::async_trait;

use crate::error_handling::BrokerError;

pub use amqp::AmqpConnector;

/// Settles one delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Negative acknowledgement; `requeue` puts the message back on the queue.
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// One delivered message and the handle that settles it.
pub struct QueueMessage {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub acker: Box<dyn Acknowledge>,
}

impl std::fmt::Debug for QueueMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMessage")
            .field("delivery_tag", &self.delivery_tag)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Stream of deliveries from one consuming channel.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next delivery. `None` means the channel is gone.
    async fn next_message(&mut self) -> Option<Result<QueueMessage, BrokerError>>;

    /// Closes the channel and its connection.
    async fn close(&mut self) {}
}

/// Opens consuming channels on the job queue.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Connects, declares the queue and starts consuming with `prefetch`
    /// unacknowledged deliveries at most.
    async fn connect(&self, prefetch: u16) -> Result<Box<dyn MessageSource>, BrokerError>;

    /// Queue name, for logging.
    fn queue(&self) -> &str;
}
