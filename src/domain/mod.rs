//! Domain layer: chat-routing state machine, value types, and the ports
//! (message pusher, transcript sink) the infrastructure layer implements.

pub mod event;
pub mod pusher;
pub mod router;
pub mod sink;
pub mod types;

pub use event::{ChatEndReason, Effect, OutboundEvent, QueueSnapshot, SnapshotEntry};
pub use pusher::{MessagePushError, MessagePusher, PusherChannel};
pub use router::{ChatRouter, RouterConfig};
pub use sink::{TranscriptFlush, TranscriptSink, TranscriptSinkError};
pub use types::{
    ActiveChat, ConnectionId, QueueEntry, SessionId, Speaker, Transcript, TranscriptMessage,
    UserInfo, anonymous_nickname,
};
