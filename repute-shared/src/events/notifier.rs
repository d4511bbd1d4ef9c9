/// Delivery of score notifications
///
/// The worker holds an `Arc<dyn ScoreNotifier>`. Production uses
/// [`RedisNotifier`]; tests and Redis-less deployments use
/// [`NoopNotifier`] or [`InMemoryNotifier`].

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::Notification;
use crate::redis::stream_writer::{StreamWriter, StreamWriterError};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Stream write failed: {0}")]
    Stream(#[from] StreamWriterError),
}

#[async_trait]
pub trait ScoreNotifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

pub struct RedisNotifier {
    writer: StreamWriter,
}

impl RedisNotifier {
    pub fn new(writer: StreamWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl ScoreNotifier for RedisNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.writer.publish_notification(notification).await?;
        Ok(())
    }
}

/// Drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl ScoreNotifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::trace!(user_id = %notification.user_id(), "Notification dropped");
        Ok(())
    }
}

/// Keeps notifications in memory for inspection
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ScoreNotifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification.clone());
        Ok(())
    }
}
