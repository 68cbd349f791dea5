//! Outbound events and effects produced by the router.
//!
//! Router operations never perform I/O themselves: each one mutates state
//! and returns a list of [`Effect`]s for the service layer to apply after
//! the lock is released. This keeps the state machine synchronous and
//! directly testable.

use super::sink::TranscriptFlush;
use super::types::{ConnectionId, SessionId, Speaker, TranscriptMessage, UserInfo};

/// Why a conversation ended, as reported to the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEndReason {
    OwnerClosed,
    OwnerEnded,
    VisitorDisconnected,
}

/// One visitor as it appears in the owner's queue snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub user_info: Option<UserInfo>,
}

/// Full routing state, sent to the owner on registration and whenever the
/// queue or active chat changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueSnapshot {
    pub queue: Vec<SnapshotEntry>,
    pub active: Option<SnapshotEntry>,
}

/// An event addressed to a single connection.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Handshake acknowledgement carrying the assigned ids.
    Connected {
        connection_id: ConnectionId,
        session_id: SessionId,
    },
    QueueSnapshot(QueueSnapshot),
    QueuePosition {
        position: usize,
    },
    /// Sent to the visitor whose chat just started (position is always 0).
    ChatStartedVisitor {
        position: usize,
    },
    /// Sent to the owner when a chat starts or is switched to.
    ChatStartedOwner {
        visitor: ConnectionId,
    },
    /// Prior history for the promoted/switched-to visitor's session.
    ChatHistory {
        connection_id: ConnectionId,
        user_info: Option<UserInfo>,
        messages: Vec<TranscriptMessage>,
    },
    ReceiveMessage {
        text: String,
        sender: Speaker,
        from_connection_id: Option<ConnectionId>,
    },
    ChatEnded {
        reason: ChatEndReason,
    },
    /// Admission-control rejection: no owner is registered.
    OwnerOffline,
    /// Backpressure rejection: the waiting queue is full.
    QueueFull,
}

/// A side effect requested by a router operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `event` to connection `to`.
    Send {
        to: ConnectionId,
        event: OutboundEvent,
    },
    /// Persist a transcript block to the durable sink (fire-and-forget).
    Flush(TranscriptFlush),
}
