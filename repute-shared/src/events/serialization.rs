/// Redis stream field encoding for notifications

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::Notification;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown notification kind: {0}")]
    UnknownKind(String),

    #[error("Notification kind {field} does not match payload {payload}")]
    KindMismatch { field: String, payload: &'static str },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Timestamp error: {0}")]
    TimestampError(String),
}

/// Stream holding a user's notifications
pub fn notification_stream_key(user_id: Uuid) -> String {
    format!("notifications:{}", user_id)
}

/// Encodes a notification as `kind`, `user_id`, `ts` and a JSON `payload`
pub fn serialize_notification(
    notification: &Notification,
) -> Result<HashMap<String, String>, SerializationError> {
    let mut fields = HashMap::with_capacity(4);
    fields.insert("kind".to_string(), notification.kind().to_string());
    fields.insert("user_id".to_string(), notification.user_id().to_string());
    fields.insert("ts".to_string(), Utc::now().to_rfc3339());
    fields.insert("payload".to_string(), serde_json::to_string(notification)?);
    Ok(fields)
}

pub fn deserialize_notification(
    fields: &HashMap<String, String>,
) -> Result<Notification, SerializationError> {
    let kind = fields
        .get("kind")
        .ok_or(SerializationError::MissingField("kind"))?;

    if kind != "reputation_updated" {
        return Err(SerializationError::UnknownKind(kind.clone()));
    }

    if let Some(ts) = fields.get("ts") {
        DateTime::parse_from_rfc3339(ts)
            .map_err(|e| SerializationError::TimestampError(e.to_string()))?;
    }

    let payload = fields
        .get("payload")
        .ok_or(SerializationError::MissingField("payload"))?;
    let notification: Notification = serde_json::from_str(payload)?;

    if notification.kind() != kind {
        return Err(SerializationError::KindMismatch {
            field: kind.clone(),
            payload: notification.kind(),
        });
    }

    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReputationUpdated;

    fn sample() -> Notification {
        Notification::ReputationUpdated(ReputationUpdated {
            tenant_id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            user_id: Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap(),
            score: 630.25,
            previous_score: Some(600.0),
            computed_at: DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        })
    }

    #[test]
    fn test_notification_stream_key() {
        let user_id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
        assert_eq!(
            notification_stream_key(user_id),
            "notifications:6ba7b810-9dad-11d1-80b4-00c04fd430c8"
        );
    }

    #[test]
    fn test_serialize_notification_fields() {
        let fields = serialize_notification(&sample()).unwrap();
        assert_eq!(fields["kind"], "reputation_updated");
        assert_eq!(fields["user_id"], "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
        assert!(fields["payload"].contains("630.25"));
        assert!(fields.contains_key("ts"));
    }

    #[test]
    fn test_deserialize_notification() {
        let fields = serialize_notification(&sample()).unwrap();
        assert_eq!(deserialize_notification(&fields).unwrap(), sample());
    }

    #[test]
    fn test_deserialize_missing_payload() {
        let mut fields = serialize_notification(&sample()).unwrap();
        fields.remove("payload");
        assert!(matches!(
            deserialize_notification(&fields),
            Err(SerializationError::MissingField("payload"))
        ));
    }

    #[test]
    fn test_deserialize_unknown_kind() {
        let mut fields = serialize_notification(&sample()).unwrap();
        fields.insert("kind".to_string(), "task_started".to_string());
        assert!(matches!(
            deserialize_notification(&fields),
            Err(SerializationError::UnknownKind(kind)) if kind == "task_started"
        ));
    }

    #[test]
    fn test_deserialize_bad_timestamp() {
        let mut fields = serialize_notification(&sample()).unwrap();
        fields.insert("ts".to_string(), "yesterday".to_string());
        assert!(matches!(
            deserialize_notification(&fields),
            Err(SerializationError::TimestampError(_))
        ));
    }
}
