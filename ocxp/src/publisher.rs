use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use ocxp_common::error::Error;

/// Seam between connection handlers and the broker client.
///
/// Implementations must be safe for concurrent publish calls: one
/// handle is shared by all in-flight handlers.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, body: &[u8]) -> Result<(), Error>;
}

/// Publishes payloads to a durable fanout exchange.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    pub async fn connect(url: &str, exchange: &str) -> Result<Self, Error> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| Error::publish_failed(format!("broker connect to {} failed: {}", url, e)))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::publish_failed(format!("channel open failed: {}", e)))?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                Error::publish_failed(format!("exchange '{}' declare failed: {}", exchange, e))
            })?;
        info!("connected to broker at {}, exchange '{}'", url, exchange);
        Ok(Self {
            connection,
            channel,
            exchange: exchange.to_string(),
        })
    }

    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "shutdown").await {
            debug!("channel close failed: {}", e);
        }
        if let Err(e) = self.connection.close(200, "shutdown").await {
            debug!("connection close failed: {}", e);
        }
    }
}

#[async_trait]
impl Publish for AmqpPublisher {
    async fn publish(&self, body: &[u8]) -> Result<(), Error> {
        let properties = BasicProperties::default()
            .with_content_type("text/plain".into())
            .with_delivery_mode(2);
        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|e| {
                Error::publish_failed(format!("publish to '{}' failed: {}", self.exchange, e))
            })?;
        confirm.await.map_err(|e| {
            Error::publish_failed(format!("publish to '{}' not confirmed: {}", self.exchange, e))
        })?;
        Ok(())
    }
}
