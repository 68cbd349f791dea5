//! MessagePusher port.
//!
//! The domain layer defines the interface it needs for delivering events to
//! connected clients; the infrastructure layer provides the WebSocket
//! implementation (dependency inversion).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::ConnectionId;

/// Outbound channel for one connection (serialized JSON frames).
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[derive(Debug, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Targeted delivery of serialized events to live connections.
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register a connection's outbound channel.
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// Remove a connection's outbound channel.
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// Send a serialized frame to one connection.
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;
}
