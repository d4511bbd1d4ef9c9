/// Publishes notifications to per-user Redis streams
///
/// Streams are capped with an approximate `MAXLEN` so a user who never
/// connects does not grow their stream without bound. Failed writes are
/// retried with exponential backoff.
///
/// # Example
///
/// ```no_run
/// use repute_shared::redis::{RedisClient, RedisConfig, StreamWriter};
/// # use repute_shared::events::Notification;
///
/// # async fn example(notification: Notification) -> anyhow::Result<()> {
/// let client = RedisClient::new(RedisConfig::from_env()?).await?;
/// let writer = StreamWriter::new(client);
/// let stream_id = writer.publish_notification(&notification).await?;
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::time::Duration;

use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use thiserror::Error;

use crate::events::serialization::{notification_stream_key, serialize_notification, SerializationError};
use crate::events::Notification;
use crate::redis::client::RedisClient;

#[derive(Error, Debug)]
pub enum StreamWriterError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Failed to write notification after {attempts} attempts: {last_error}")]
    WriteFailed { attempts: u32, last_error: String },
}

#[derive(Debug, Clone)]
pub struct StreamWriterConfig {
    pub max_retries: u32,

    pub base_retry_delay_ms: u64,

    pub max_retry_delay_ms: u64,

    /// Approximate number of entries kept per stream
    pub max_stream_len: usize,
}

impl Default for StreamWriterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
            max_stream_len: 1000,
        }
    }
}

impl StreamWriterConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_retry_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }
}

#[derive(Clone)]
pub struct StreamWriter {
    client: RedisClient,
    config: StreamWriterConfig,
}

impl StreamWriter {
    pub fn new(client: RedisClient) -> Self {
        Self::with_config(client, StreamWriterConfig::default())
    }

    pub fn with_config(client: RedisClient, config: StreamWriterConfig) -> Self {
        Self { client, config }
    }

    /// Appends the notification to its recipient's stream
    ///
    /// Returns the Redis stream ID of the new entry.
    pub async fn publish_notification(
        &self,
        notification: &Notification,
    ) -> Result<String, StreamWriterError> {
        let fields = serialize_notification(notification)?;
        let stream_key = notification_stream_key(notification.user_id());

        let stream_id = self.xadd_with_retry(&stream_key, &fields).await?;

        tracing::debug!(
            user_id = %notification.user_id(),
            kind = notification.kind(),
            stream_id = %stream_id,
            "Published notification"
        );

        Ok(stream_id)
    }

    async fn xadd_with_retry(
        &self,
        stream_key: &str,
        fields: &HashMap<String, String>,
    ) -> Result<String, StreamWriterError> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut attempt = 0;
        loop {
            let mut conn = self.client.get_connection();
            let result: Result<String, redis::RedisError> = conn
                .xadd_maxlen(
                    stream_key,
                    StreamMaxlen::Approx(self.config.max_stream_len),
                    "*",
                    &items,
                )
                .await;

            match result {
                Ok(stream_id) => return Ok(stream_id),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(StreamWriterError::WriteFailed {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = self.config.retry_delay(attempt);
                    tracing::warn!(
                        stream_key = %stream_key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "XADD failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_writer_config_default() {
        let config = StreamWriterConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_retry_delay_ms, 100);
        assert_eq!(config.max_retry_delay_ms, 5000);
        assert_eq!(config.max_stream_len, 1000);
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let config = StreamWriterConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.retry_delay(2), Duration::from_millis(200));
        assert_eq!(config.retry_delay(3), Duration::from_millis(400));
        assert_eq!(config.retry_delay(10), Duration::from_millis(5000));
        assert_eq!(config.retry_delay(80), Duration::from_millis(5000));
    }
}
