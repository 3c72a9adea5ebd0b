use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Connection, ConnectionProperties,
};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Broker connection failed: {0}")]
    Connect(#[source] lapin::Error),

    #[error("Failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("Failed to declare queue {queue}: {source}")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Failed to consume from {queue}: {source}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Failed to acknowledge delivery {delivery_tag}: {source}")]
    Ack {
        delivery_tag: u64,
        #[source]
        source: lapin::Error,
    },

    #[error("Consumer stream for {0} closed")]
    StreamClosed(String),
}

/// Receiver of raw message bodies
///
/// The broker client has no view into how a message was processed; it acks
/// once `handle` returns.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]);
}

/// A received message that is acknowledged at most once, after handling
#[async_trait]
pub trait Acknowledge: Send + Sync {
    fn body(&self) -> &[u8];

    async fn ack(&self) -> Result<(), BrokerError>;
}

/// Something that can consume a queue until its transport fails
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(
        &mut self,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<Infallible, BrokerError>;
}

struct AmqpDelivery(Delivery);

#[async_trait]
impl Acknowledge for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.0
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|source| BrokerError::Ack {
                delivery_tag: self.0.delivery_tag,
                source,
            })?;
        debug!("Acked delivery {}", self.0.delivery_tag);
        Ok(())
    }
}

/// Hand each delivery to `handler`, then ack it
///
/// The next delivery is not pulled until the previous one is acked. An error
/// item or a failed ack ends the loop; so does the end of the stream.
pub(crate) async fn process_deliveries<S, D>(
    deliveries: S,
    queue: &str,
    handler: &dyn MessageHandler,
) -> Result<Infallible, BrokerError>
where
    S: Stream<Item = Result<D, BrokerError>> + Send,
    D: Acknowledge,
{
    futures::pin_mut!(deliveries);

    while let Some(delivery) = deliveries.next().await {
        let delivery = delivery?;
        handler.handle(delivery.body()).await;
        delivery.ack().await?;
    }

    Err(BrokerError::StreamClosed(queue.to_string()))
}

/// Subscribe to `queue` forever, waiting `delay` after every failed attempt
pub async fn consume_forever<S>(
    subscriber: &mut S,
    queue: &str,
    handler: &dyn MessageHandler,
    delay: Duration,
) -> Infallible
where
    S: Subscriber + ?Sized,
{
    loop {
        match subscriber.subscribe(queue, handler).await {
            Ok(never) => return never,
            Err(e) => {
                error!("Consumer for {} stopped: {}", queue, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// One logical AMQP connection that delivers messages to a handler
pub struct BrokerClient {
    url: String,
    reconnect_delay: Duration,
    prefetch_count: u16,
    consumer_tag: String,
    connection: Option<Connection>,
}

impl BrokerClient {
    pub fn new(url: impl Into<String>, consumer_tag: impl Into<String>) -> Self {
        BrokerClient {
            url: url.into(),
            reconnect_delay: Duration::from_secs(5),
            prefetch_count: 1,
            consumer_tag: consumer_tag.into(),
            connection: None,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_prefetch(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.status().connected())
            .unwrap_or(false)
    }

    /// Connect to the broker, retrying after a fixed delay until it succeeds
    pub async fn connect(&mut self) -> &Connection {
        loop {
            match Connection::connect(&self.url, ConnectionProperties::default()).await {
                Ok(connection) => {
                    info!("Connected to broker");
                    return self.connection.insert(connection);
                }
                Err(e) => {
                    error!("{}", BrokerError::Connect(e));
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn consume(
        &mut self,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<Infallible, BrokerError> {
        if !self.is_connected() {
            self.connect().await;
        }
        let connection = match &self.connection {
            Some(connection) => connection,
            None => return Err(BrokerError::StreamClosed(queue.to_string())),
        };

        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::Channel)?;

        channel
            .basic_qos(self.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(BrokerError::Channel)?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Declare {
                queue: queue.to_string(),
                source,
            })?;

        let consumer = channel
            .basic_consume(
                queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Consume {
                queue: queue.to_string(),
                source,
            })?;

        info!("Consuming from {} as {}", queue, self.consumer_tag);

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(AmqpDelivery)
                .map_err(|source| BrokerError::Consume {
                    queue: queue.to_string(),
                    source,
                })
        });
        process_deliveries(deliveries, queue, handler).await
    }
}

#[async_trait]
impl Subscriber for BrokerClient {
    /// Declare `queue` as durable and feed every delivery to `handler`,
    /// acking each one after the handler returns
    ///
    /// Deliveries are processed one at a time. Only returns on a transport
    /// failure, after dropping the connection so the next call reconnects.
    async fn subscribe(
        &mut self,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<Infallible, BrokerError> {
        let result = self.consume(queue, handler).await;
        if result.is_err() {
            self.connection = None;
        }
        result
    }
}
