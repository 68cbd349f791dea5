//! TranscriptSink port.
//!
//! Write-only interface to durable transcript storage. The router never
//! reads transcripts back; a flush is a one-way append of a closed
//! conversation.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{SessionId, TranscriptMessage};

/// Snapshot of one conversation at the moment it was closed.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFlush {
    pub session_id: SessionId,
    /// Display identity of the visitor (name, email, or derived nickname).
    pub identity: String,
    /// Never empty: the router does not flush empty transcripts.
    pub messages: Vec<TranscriptMessage>,
    /// Unix timestamp (UTC milliseconds) when the conversation closed.
    pub closed_at_ms: i64,
}

#[derive(Debug, Error)]
pub enum TranscriptSinkError {
    #[error("failed to write transcript: {0}")]
    WriteFailed(String),
}

/// Durable, append-only persistence for closed conversations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn flush(&self, job: TranscriptFlush) -> Result<(), TranscriptSinkError>;
}
