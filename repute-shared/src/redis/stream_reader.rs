/// Reads notifications back from per-user Redis streams
///
/// Two modes feed the SSE endpoint: [`StreamReader::read_backfill`] returns
/// entries after a known stream ID without blocking, and [`LiveTail::read`]
/// blocks with `XREAD BLOCK` until new entries arrive or the timeout
/// passes. A [`LiveTail`] owns its connection so one subscriber's block
/// never stalls other commands.
///
/// # Example
///
/// ```no_run
/// use repute_shared::redis::{RedisClient, RedisConfig, StreamReader};
/// # use uuid::Uuid;
///
/// # async fn example(user_id: Uuid) -> anyhow::Result<()> {
/// let client = RedisClient::new(RedisConfig::from_env()?).await?;
/// let reader = StreamReader::new(client);
///
/// let mut cursor = reader.latest_id(user_id).await?.unwrap_or_else(|| "0-0".to_string());
/// let mut tail = reader.live_tail().await?;
/// loop {
///     for (id, notification) in tail.read(user_id, &cursor, 5000).await? {
///         println!("{}: {:?}", id, notification);
///         cursor = id;
///     }
/// }
/// # }
/// ```

use std::collections::HashMap;

use redis::streams::{StreamId, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use uuid::Uuid;

use crate::events::serialization::{deserialize_notification, notification_stream_key};
use crate::events::Notification;
use crate::redis::client::{RedisClient, RedisClientError};

#[derive(Error, Debug)]
pub enum StreamReaderError {
    #[error("Redis command error: {0}")]
    RedisCommandError(#[from] redis::RedisError),

    #[error("Invalid stream ID: {0}")]
    InvalidStreamId(String),

    #[error("Redis connection error: {0}")]
    Connection(#[from] RedisClientError),
}

#[derive(Debug, Clone)]
pub struct StreamReaderConfig {
    pub default_batch_size: usize,

    pub max_batch_size: usize,
}

impl Default for StreamReaderConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 100,
            max_batch_size: 1000,
        }
    }
}

#[derive(Clone)]
pub struct StreamReader {
    client: RedisClient,
    config: StreamReaderConfig,
}

impl StreamReader {
    pub fn new(client: RedisClient) -> Self {
        Self::with_config(client, StreamReaderConfig::default())
    }

    pub fn with_config(client: RedisClient, config: StreamReaderConfig) -> Self {
        Self { client, config }
    }

    /// Entries strictly after `since_id`, oldest first
    pub async fn read_backfill(
        &self,
        user_id: Uuid,
        since_id: &str,
        count: usize,
    ) -> Result<Vec<(String, Notification)>, StreamReaderError> {
        validate_stream_id(since_id)?;

        let count = count.clamp(1, self.config.max_batch_size);
        let stream_key = notification_stream_key(user_id);
        let mut conn = self.client.get_connection();

        let opts = StreamReadOptions::default().count(count);
        let reply: StreamReadReply = conn
            .xread_options(&[&stream_key], &[since_id], &opts)
            .await?;

        let entries = decode_reply(user_id, reply);
        tracing::debug!(
            user_id = %user_id,
            since_id = %since_id,
            fetched = entries.len(),
            "Backfilled notifications"
        );

        Ok(entries)
    }

    /// Opens a blocking reader on a dedicated connection
    pub async fn live_tail(&self) -> Result<LiveTail, StreamReaderError> {
        Ok(LiveTail {
            conn: self.client.dedicated_connection().await?,
            batch_size: self.config.default_batch_size,
        })
    }

    /// ID of the newest entry, if the stream has any
    pub async fn latest_id(&self, user_id: Uuid) -> Result<Option<String>, StreamReaderError> {
        let stream_key = notification_stream_key(user_id);
        let mut conn = self.client.get_connection();

        let reply: StreamRangeReply = conn.xrevrange_count(&stream_key, "+", "-", 1).await?;
        Ok(reply.ids.into_iter().next().map(|entry| entry.id))
    }
}

/// Live reader for one subscriber
pub struct LiveTail {
    conn: MultiplexedConnection,
    batch_size: usize,
}

impl LiveTail {
    /// Blocks up to `timeout_ms` for entries after `after_id`
    ///
    /// An empty result means the block timed out.
    pub async fn read(
        &mut self,
        user_id: Uuid,
        after_id: &str,
        timeout_ms: usize,
    ) -> Result<Vec<(String, Notification)>, StreamReaderError> {
        validate_stream_id(after_id)?;

        let stream_key = notification_stream_key(user_id);
        let opts = StreamReadOptions::default()
            .count(self.batch_size)
            .block(timeout_ms);
        let reply: StreamReadReply = self
            .conn
            .xread_options(&[&stream_key], &[after_id], &opts)
            .await?;

        Ok(decode_reply(user_id, reply))
    }
}

/// Accepts `0`, `$` and `<ms>-<seq>` / `<ms>` stream IDs
pub fn validate_stream_id(id: &str) -> Result<(), StreamReaderError> {
    let invalid = || StreamReaderError::InvalidStreamId(id.to_string());

    if id == "$" {
        return Ok(());
    }

    let mut parts = id.splitn(2, '-');
    let millis = parts.next().ok_or_else(invalid)?;
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if let Some(seq) = parts.next() {
        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    Ok(())
}

fn decode_reply(user_id: Uuid, reply: StreamReadReply) -> Vec<(String, Notification)> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .filter_map(|entry| decode_entry(user_id, entry))
        .collect()
}

fn decode_entry(user_id: Uuid, entry: StreamId) -> Option<(String, Notification)> {
    let fields: HashMap<String, String> = entry
        .map
        .iter()
        .filter_map(|(k, v)| Some((k.clone(), redis::from_redis_value::<String>(v).ok()?)))
        .collect();

    match deserialize_notification(&fields) {
        Ok(notification) => Some((entry.id, notification)),
        Err(e) => {
            tracing::error!(
                user_id = %user_id,
                stream_id = %entry.id,
                error = %e,
                "Skipping undecodable notification"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stream_id() {
        assert!(validate_stream_id("0").is_ok());
        assert!(validate_stream_id("0-0").is_ok());
        assert!(validate_stream_id("1735689600000-3").is_ok());
        assert!(validate_stream_id("1735689600000").is_ok());
        assert!(validate_stream_id("$").is_ok());

        assert!(validate_stream_id("").is_err());
        assert!(validate_stream_id("abc").is_err());
        assert!(validate_stream_id("12-").is_err());
        assert!(validate_stream_id("-1").is_err());
        assert!(validate_stream_id("1-2-3").is_err());
    }

    #[test]
    fn test_stream_reader_config_default() {
        let config = StreamReaderConfig::default();
        assert_eq!(config.default_batch_size, 100);
        assert_eq!(config.max_batch_size, 1000);
    }
}
