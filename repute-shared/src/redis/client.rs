/// Redis connection handling
///
/// [`RedisClient`] wraps a [`ConnectionManager`], which reconnects on its
/// own after the server drops a connection. Cloning the client is cheap and
/// shares the underlying connection. Blocking commands must not go through
/// the shared connection; use [`RedisClient::dedicated_connection`].

use std::env;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{Client, RedisError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            RedisClientError::ConnectionError(err.to_string())
        } else {
            RedisClientError::CommandError(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,

    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_secs: 5,
        }
    }

    /// Reads `REDIS_URL` and optional `REDIS_COMMAND_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, RedisClientError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            RedisClientError::ConfigError("REDIS_URL environment variable is required".to_string())
        })?;

        let mut config = Self::new(url);
        if let Some(secs) = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.command_timeout_secs = secs;
        }
        Ok(config)
    }
}

#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            client,
            manager,
            config: Arc::new(config),
        })
    }

    /// `PING` bounded by the command timeout
    pub async fn ping(&self) -> Result<(), RedisClientError> {
        let mut conn = self.manager.clone();

        let reply: String = tokio::time::timeout(
            Duration::from_secs(self.config.command_timeout_secs),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("PING timed out".to_string()))??;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(RedisClientError::CommandError(format!(
                "Unexpected PING reply: {}",
                reply
            )))
        }
    }

    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Opens a connection of its own, for `XREAD BLOCK` and the like
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, RedisClientError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e)))
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Masks credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &url[..scheme_end + 3], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
