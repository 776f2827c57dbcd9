use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

// --- MessageBody ---

/// Typed message content: free text, a photo URI, or a shared location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Photo(String),
    Location { lat: f64, lon: f64 },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Photo(_) => "photo",
            Self::Location { .. } => "location",
        }
    }

    /// Local validation before any network call: empty content is rejected
    /// here, not by the collaborator.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Text(text) if text.trim().is_empty() => {
                Err(CoreError::validation("message text must not be empty"))
            }
            Self::Photo(uri) if uri.trim().is_empty() => {
                Err(CoreError::validation("photo message needs a photo URI"))
            }
            Self::Location { lat, lon }
                if !(-90.0..=90.0).contains(lat) || !(-180.0..=180.0).contains(lon) =>
            {
                Err(CoreError::validation("location is out of range"))
            }
            _ => Ok(()),
        }
    }

    /// Short preview for conversation lists, truncated to 100 chars.
    pub fn preview(&self) -> String {
        match self {
            Self::Text(text) => text.chars().take(100).collect(),
            Self::Photo(_) => "[photo]".to_string(),
            Self::Location { .. } => "[location]".to_string(),
        }
    }
}

// --- Message ---

/// A message inside one match.
///
/// `read` transitions false→true exactly once, set when the recipient sees
/// it; `read_at` is non-null iff `read` is true. The only other mutation
/// after creation is the sender-initiated unsend, which removes the message
/// entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// One-way read transition; a second call is a no-op so `read_at` keeps
    /// its first value.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if !self.read {
            self.read = true;
            self.read_at = Some(at);
        }
    }

    /// Total-order key: `created_at` ascending, ties broken by id.
    pub fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// A message being sent: the collaborator assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub match_id: Uuid,
    #[serde(flatten)]
    pub body: MessageBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: MessageBody) -> Message {
        Message {
            id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            body,
            created_at: Utc::now(),
            read: false,
            read_at: None,
        }
    }

    #[test]
    fn empty_text_rejected_locally() {
        assert!(MessageBody::Text("   ".into()).validate().is_err());
        assert!(MessageBody::Text("hey".into()).validate().is_ok());
    }

    #[test]
    fn location_bounds_checked() {
        assert!(MessageBody::Location { lat: 91.0, lon: 0.0 }.validate().is_err());
        assert!(MessageBody::Location { lat: 48.85, lon: 2.35 }.validate().is_ok());
    }

    #[test]
    fn read_is_monotonic() {
        let mut msg = message(MessageBody::Text("hello".into()));
        assert!(msg.read_at.is_none());

        let first = Utc::now();
        msg.mark_read(first);
        assert!(msg.read);
        assert_eq!(msg.read_at, Some(first));

        // A later mark must not move the timestamp or clear the flag.
        msg.mark_read(first + chrono::Duration::seconds(30));
        assert!(msg.read);
        assert_eq!(msg.read_at, Some(first));
    }

    #[test]
    fn body_serializes_tagged() {
        let json = serde_json::to_value(MessageBody::Text("hi".into())).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["content"], "hi");

        let json = serde_json::to_value(MessageBody::Location { lat: 1.0, lon: 2.0 }).unwrap();
        assert_eq!(json["kind"], "location");
        assert_eq!(json["content"]["lat"], 1.0);
    }

    #[test]
    fn message_wire_shape_is_flat() {
        let msg = message(MessageBody::Photo("https://cdn.example/p.jpg".into()));
        let json = serde_json::to_value(&msg).unwrap();
        // body flattens into the message object
        assert_eq!(json["kind"], "photo");
        assert!(json["id"].is_string());
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
