//! Data Transfer Objects for the WebSocket wire protocol.
//!
//! Every frame is a JSON object tagged with a snake_case `type` field.
//! Conversion between domain events and DTOs lives in [`conversion`].

pub mod conversion;

use serde::{Deserialize, Serialize};

use crate::domain::{Speaker, UserInfo};

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind the calling connection as the site owner.
    RegisterOwner,
    JoinQueue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_info: Option<UserInfo>,
    },
    SendMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_connection_id: Option<String>,
    },
    SwitchChat {
        target_connection_id: String,
    },
    CloseChat {
        target_connection_id: String,
    },
    /// Legacy owner command: end whatever chat is currently active.
    EndChat,
    VisitorClose,
}

/// One visitor in the owner's queue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntryDto {
    pub connection_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

/// One transcript message as sent in `chat_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessageDto {
    pub sender: Speaker,
    pub text: String,
    /// Unix timestamp in UTC milliseconds.
    pub timestamp: i64,
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        connection_id: String,
        session_id: String,
    },
    QueueSnapshot {
        count: usize,
        queue: Vec<QueueEntryDto>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active: Option<QueueEntryDto>,
    },
    QueuePosition {
        position: usize,
    },
    ChatStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visitor_connection_id: Option<String>,
    },
    ChatHistory {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_info: Option<UserInfo>,
        messages: Vec<TranscriptMessageDto>,
    },
    ReceiveMessage {
        text: String,
        sender: Speaker,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_connection_id: Option<String>,
    },
    ChatEnded {
        reason: String,
    },
    OwnerOffline,
    QueueFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_join_queue_deserializes() {
        // given (precondition):
        let json = r#"{"type":"join_queue","user_info":{"name":"Ada"}}"#;

        // when (operation):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (expected result):
        assert_eq!(
            event,
            ClientEvent::JoinQueue {
                user_info: Some(UserInfo {
                    name: Some("Ada".to_string()),
                    email: None,
                    avatar: None,
                }),
            }
        );
    }

    #[test]
    fn test_client_event_send_message_without_target() {
        // given (precondition):
        let json = r#"{"type":"send_message","text":"hello"}"#;

        // when (operation):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (expected result):
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                text: "hello".to_string(),
                target_connection_id: None,
            }
        );
    }

    #[test]
    fn test_client_event_register_owner_has_no_payload() {
        // given (precondition):
        let json = r#"{"type":"register_owner"}"#;

        // when (operation):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (expected result):
        assert_eq!(event, ClientEvent::RegisterOwner);
    }

    #[test]
    fn test_server_event_chat_ended_serializes_with_reason() {
        // given (precondition):
        let event = ServerEvent::ChatEnded {
            reason: "owner_closed".to_string(),
        };

        // when (operation):
        let json = serde_json::to_string(&event).unwrap();

        // then (expected result):
        assert_eq!(json, r#"{"type":"chat_ended","reason":"owner_closed"}"#);
    }

    #[test]
    fn test_server_event_owner_offline_is_bare_tag() {
        // given (precondition):
        let event = ServerEvent::OwnerOffline;

        // when (operation):
        let json = serde_json::to_string(&event).unwrap();

        // then (expected result):
        assert_eq!(json, r#"{"type":"owner_offline"}"#);
    }
}
