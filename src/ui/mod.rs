//! UI layer: axum HTTP/WebSocket surface.

mod handler;
mod signal;
mod state;

pub mod server;

pub use server::Server;
