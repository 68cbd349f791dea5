//! Conversion logic between domain events and wire DTOs.

use crate::domain::{
    ChatEndReason, OutboundEvent, QueueSnapshot, SnapshotEntry, TranscriptMessage,
};
use crate::infrastructure::dto::{QueueEntryDto, ServerEvent, TranscriptMessageDto};

// ========================================
// Domain → DTO
// ========================================

impl From<ChatEndReason> for String {
    fn from(reason: ChatEndReason) -> Self {
        match reason {
            ChatEndReason::OwnerClosed => "owner_closed".to_string(),
            ChatEndReason::OwnerEnded => "owner_ended".to_string(),
            ChatEndReason::VisitorDisconnected => "visitor_disconnected".to_string(),
        }
    }
}

impl From<SnapshotEntry> for QueueEntryDto {
    fn from(entry: SnapshotEntry) -> Self {
        Self {
            connection_id: entry.connection_id.into_string(),
            display_name: entry.display_name,
            user_info: entry.user_info,
        }
    }
}

impl From<TranscriptMessage> for TranscriptMessageDto {
    fn from(message: TranscriptMessage) -> Self {
        Self {
            sender: message.speaker,
            text: message.text,
            timestamp: message.timestamp_ms,
        }
    }
}

impl From<QueueSnapshot> for ServerEvent {
    fn from(snapshot: QueueSnapshot) -> Self {
        ServerEvent::QueueSnapshot {
            count: snapshot.queue.len(),
            queue: snapshot.queue.into_iter().map(Into::into).collect(),
            active: snapshot.active.map(Into::into),
        }
    }
}

impl From<OutboundEvent> for ServerEvent {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::Connected {
                connection_id,
                session_id,
            } => ServerEvent::Connected {
                connection_id: connection_id.into_string(),
                session_id: session_id.as_str().to_string(),
            },
            OutboundEvent::QueueSnapshot(snapshot) => snapshot.into(),
            OutboundEvent::QueuePosition { position } => ServerEvent::QueuePosition { position },
            OutboundEvent::ChatStartedVisitor { position } => ServerEvent::ChatStarted {
                position: Some(position),
                visitor_connection_id: None,
            },
            OutboundEvent::ChatStartedOwner { visitor } => ServerEvent::ChatStarted {
                position: None,
                visitor_connection_id: Some(visitor.into_string()),
            },
            OutboundEvent::ChatHistory {
                connection_id,
                user_info,
                messages,
            } => ServerEvent::ChatHistory {
                connection_id: connection_id.into_string(),
                user_info,
                messages: messages.into_iter().map(Into::into).collect(),
            },
            OutboundEvent::ReceiveMessage {
                text,
                sender,
                from_connection_id,
            } => ServerEvent::ReceiveMessage {
                text,
                sender,
                from_connection_id: from_connection_id.map(|id| id.into_string()),
            },
            OutboundEvent::ChatEnded { reason } => ServerEvent::ChatEnded {
                reason: reason.into(),
            },
            OutboundEvent::OwnerOffline => ServerEvent::OwnerOffline,
            OutboundEvent::QueueFull => ServerEvent::QueueFull,
        }
    }
}
