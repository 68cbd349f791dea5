//! UseCase: visitor-chat orchestration.
//!
//! `ChatService` is the single entry point the UI layer calls. It holds the
//! [`ChatRouter`] behind one `tokio::sync::Mutex`: every router operation
//! touches several structures at once (queue, active chat, transcripts,
//! owner slot), so they share a single lock and each operation is atomic
//! with respect to every other. Effects are applied *after* the lock is
//! released: event sends go through the [`MessagePusher`] port, transcript
//! flushes are spawned fire-and-forget on the [`TranscriptSink`] port, so a
//! stalled flush can never hold up or corrupt routing state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    ChatRouter, ConnectionId, Effect, MessagePusher, OutboundEvent, PusherChannel, QueueSnapshot,
    SessionId, TranscriptSink, UserInfo,
};
use crate::infrastructure::dto::ServerEvent;

/// Orchestrates the chat router and its collaborators.
pub struct ChatService {
    router: Mutex<ChatRouter>,
    pusher: Arc<dyn MessagePusher>,
    sink: Arc<dyn TranscriptSink>,
}

impl ChatService {
    pub fn new(
        router: ChatRouter,
        pusher: Arc<dyn MessagePusher>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        Self {
            router: Mutex::new(router),
            pusher,
            sink,
        }
    }

    /// Register a freshly upgraded connection and acknowledge it with its
    /// assigned ids (the client persists the session id for reconnects).
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        sender: PusherChannel,
    ) {
        self.pusher
            .register_client(connection_id.clone(), sender)
            .await;
        self.apply(vec![Effect::Send {
            to: connection_id.clone(),
            event: OutboundEvent::Connected {
                connection_id,
                session_id,
            },
        }])
        .await;
    }

    pub async fn register_owner(&self, connection_id: ConnectionId) {
        let effects = self.router.lock().await.register_owner(connection_id);
        self.apply(effects).await;
    }

    pub async fn join_queue(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        user_info: Option<UserInfo>,
    ) {
        let effects = self
            .router
            .lock()
            .await
            .join_queue(connection_id, session_id, user_info);
        self.apply(effects).await;
    }

    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        text: String,
        target: Option<ConnectionId>,
    ) {
        let effects = self
            .router
            .lock()
            .await
            .send_message(connection_id, session_id, text, target);
        self.apply(effects).await;
    }

    pub async fn switch_chat(&self, connection_id: ConnectionId, target: ConnectionId) {
        let effects = self.router.lock().await.switch_chat(connection_id, target);
        self.apply(effects).await;
    }

    pub async fn close_chat(&self, connection_id: ConnectionId, target: ConnectionId) {
        let effects = self.router.lock().await.close_chat(connection_id, target);
        self.apply(effects).await;
    }

    pub async fn end_chat(&self, connection_id: ConnectionId) {
        let effects = self.router.lock().await.end_chat(connection_id);
        self.apply(effects).await;
    }

    pub async fn visitor_close(&self, connection_id: ConnectionId) {
        let effects = self.router.lock().await.visitor_close(connection_id);
        self.apply(effects).await;
    }

    /// Transport-level disconnect: run the router transition, then drop the
    /// connection's outbound channel.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let effects = self.router.lock().await.disconnect(connection_id.clone());
        self.apply(effects).await;
        self.pusher.unregister_client(&connection_id).await;
    }

    /// Owner-view snapshot of the routing state (debug endpoint).
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.router.lock().await.snapshot()
    }

    /// Apply router effects: serialize-and-push sends, spawn flushes.
    async fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, event } => {
                    let frame = serde_json::to_string(&ServerEvent::from(event))
                        .expect("server events serialize to JSON");
                    if let Err(e) = self.pusher.push_to(&to, &frame).await {
                        tracing::warn!("Failed to push event to connection '{}': {}", to, e);
                    }
                }
                Effect::Flush(job) => {
                    // Fire-and-forget: the state transition is already
                    // complete and acknowledged; on failure the transcript
                    // is still in memory for a later retry.
                    let sink = self.sink.clone();
                    tokio::spawn(async move {
                        let session_id = job.session_id.clone();
                        if let Err(e) = sink.flush(job).await {
                            tracing::error!(
                                "Failed to flush transcript for session '{}': {}",
                                session_id,
                                e
                            );
                        }
                    });
                }
            }
        }
    }
}
