/// Live event payloads and their SSE framing
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// Events pushed to connected clients
///
/// Serialized with the `type` discriminator first and camelCase fields,
/// e.g. `{"type":"like","postId":"p1"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// Stream opened
    Connected {
        connection_id: String,
        timestamp: i64,
    },

    /// Keep-alive frame
    Heartbeat { timestamp: i64 },

    Like {
        post_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
    },

    Comment {
        post_id: String,
        comment_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
    },

    Reply {
        post_id: String,
        comment_id: String,
        parent_comment_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
    },

    Repost {
        post_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
    },

    Follow { actor_id: String },

    Mention {
        post_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
    },

    NewMessage {
        message_id: String,
        conversation_id: String,
        sender_id: String,
        content: String,
        created_at: DateTime<Utc>,
    },

    MessageRead {
        conversation_id: String,
        reader_id: String,
        read_at: DateTime<Utc>,
    },

    MessageDeleted {
        message_id: String,
        conversation_id: String,
    },
}

impl LiveEvent {
    pub fn connected(connection_id: impl Into<String>) -> Self {
        LiveEvent::Connected {
            connection_id: connection_id.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn heartbeat() -> Self {
        LiveEvent::Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn like(post_id: impl Into<String>) -> Self {
        LiveEvent::Like {
            post_id: post_id.into(),
            actor_id: None,
        }
    }

    /// The wire `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::Connected { .. } => "connected",
            LiveEvent::Heartbeat { .. } => "heartbeat",
            LiveEvent::Like { .. } => "like",
            LiveEvent::Comment { .. } => "comment",
            LiveEvent::Reply { .. } => "reply",
            LiveEvent::Repost { .. } => "repost",
            LiveEvent::Follow { .. } => "follow",
            LiveEvent::Mention { .. } => "mention",
            LiveEvent::NewMessage { .. } => "new_message",
            LiveEvent::MessageRead { .. } => "message_read",
            LiveEvent::MessageDeleted { .. } => "message_deleted",
        }
    }
}

/// Encode a payload as one SSE frame: `data: <JSON>\n\n`.
///
/// serde_json never emits raw newlines, so the JSON always fits a single `data:` line.
pub fn encode_frame<T: Serialize + ?Sized>(payload: &T) -> AppResult<Bytes> {
    let json = serde_json::to_vec(payload)?;
    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(&json);
    frame.extend_from_slice(b"\n\n");
    Ok(Bytes::from(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_frame_layout() {
        let frame = encode_frame(&LiveEvent::like("p1")).unwrap();
        assert_eq!(&frame[..], b"data: {\"type\":\"like\",\"postId\":\"p1\"}\n\n");
    }

    #[test]
    fn test_optional_actor_is_included_when_present() {
        let event = LiveEvent::Repost {
            post_id: "p9".into(),
            actor_id: Some("bob".into()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"repost","postId":"p9","actorId":"bob"}"#);
    }

    #[test]
    fn test_message_event_tags() {
        let event = LiveEvent::NewMessage {
            message_id: "m1".into(),
            conversation_id: "c1".into(),
            sender_id: "alice".into(),
            content: "hi\nthere".into(),
            created_at: Utc::now(),
        };
        let frame = encode_frame(&event).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {\"type\":\"new_message\""));
        assert!(text.contains("\"conversationId\":\"c1\""));
        // The only newlines are the frame terminator
        assert_eq!(text.matches('\n').count(), 2);
        assert_eq!(event.kind(), "new_message");
    }

    #[test]
    fn test_connected_and_heartbeat_kinds() {
        let connected = serde_json::to_value(LiveEvent::connected("abc")).unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["connectionId"], "abc");

        let heartbeat = serde_json::to_value(LiveEvent::heartbeat()).unwrap();
        assert_eq!(heartbeat["type"], "heartbeat");
        assert!(heartbeat["timestamp"].is_i64());
    }

    #[test]
    fn test_parse_client_payload() {
        let event: LiveEvent =
            serde_json::from_str(r#"{"type":"follow","actorId":"carol"}"#).unwrap();
        assert_eq!(
            event,
            LiveEvent::Follow {
                actor_id: "carol".into()
            }
        );
    }
}
