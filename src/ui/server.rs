//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::usecase::ChatService;

use super::{
    handler::{debug_chat_state, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Visitor-chat WebSocket server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(chat_service);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    chat_service: Arc<ChatService>,
}

impl Server {
    pub fn new(chat_service: Arc<ChatService>) -> Self {
        Self { chat_service }
    }

    /// Run the visitor-chat server.
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified
    /// address or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app_state = Arc::new(AppState {
            chat_service: self.chat_service,
        });

        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .route("/api/health", get(health_check))
            .route("/debug/chat", get(debug_chat_state))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Visitor-chat server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
