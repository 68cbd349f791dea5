//! MessagePusher implementations.
//!
//! Currently only the WebSocket implementation; the domain port keeps the
//! router independent of the transport.

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
