//! Server state shared across request handlers.

use std::sync::Arc;

use crate::usecase::ChatService;

/// Shared application state
pub struct AppState {
    /// ChatService (the single entry point to the routing logic)
    pub chat_service: Arc<ChatService>,
}
