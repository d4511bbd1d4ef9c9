/// Push notifications
///
/// Notifications are written to a per-user Redis stream
/// (`notifications:{user_id}`) as flat string fields so that any stream
/// consumer can read them without knowing the Rust types.
///
/// - [`serialization`]: field encoding and stream keys
/// - [`notifier`]: the [`ScoreNotifier`] seam used by the worker
///
/// # Example
///
/// ```no_run
/// use repute_shared::events::{notification_stream_key, serialize_notification, Notification};
/// # use repute_shared::events::ReputationUpdated;
///
/// # fn example(update: ReputationUpdated) -> Result<(), Box<dyn std::error::Error>> {
/// let notification = Notification::ReputationUpdated(update);
/// let fields = serialize_notification(&notification)?;
/// let key = notification_stream_key(notification.user_id());
/// # Ok(())
/// # }
/// ```

pub mod notifier;
pub mod serialization;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use notifier::{InMemoryNotifier, NoopNotifier, NotifyError, RedisNotifier, ScoreNotifier};
pub use serialization::{
    deserialize_notification, notification_stream_key, serialize_notification, SerializationError,
};

/// A user's persisted score changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationUpdated {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    pub previous_score: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

impl From<&crate::reputation::ScoreUpdate> for ReputationUpdated {
    fn from(update: &crate::reputation::ScoreUpdate) -> Self {
        Self {
            tenant_id: update.tenant_id,
            user_id: update.user_id,
            score: update.score,
            previous_score: update.previous_score,
            computed_at: update.computed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ReputationUpdated(ReputationUpdated),
}

impl Notification {
    /// Value of the `kind` stream field and the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ReputationUpdated(_) => "reputation_updated",
        }
    }

    /// Recipient of the notification
    pub fn user_id(&self) -> Uuid {
        match self {
            Notification::ReputationUpdated(event) => event.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_json_shape() {
        let user_id = Uuid::new_v4();
        let notification = Notification::ReputationUpdated(ReputationUpdated {
            tenant_id: Uuid::nil(),
            user_id,
            score: 412.5,
            previous_score: None,
            computed_at: Utc::now(),
        });

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "reputation_updated");
        assert_eq!(json["score"], 412.5);
        assert!(json["previous_score"].is_null());
        assert_eq!(notification.kind(), "reputation_updated");
        assert_eq!(notification.user_id(), user_id);
    }
}
