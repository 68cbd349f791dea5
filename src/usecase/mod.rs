//! UseCase layer: orchestrates the router, the message pusher, and the
//! transcript sink.

pub mod chat_service;

pub use chat_service::ChatService;
