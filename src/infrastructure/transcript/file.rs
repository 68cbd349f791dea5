//! File-backed TranscriptSink.
//!
//! Writes one append-only, human-readable text block per closed
//! conversation. Files are grouped by (calendar day, visitor identity):
//! `<identity>_<YYYY-MM-DD>.log` under the logs directory, each starting
//! with a `# day:` header line. If an existing file's recorded day differs
//! from the flush's day (a name collision across days), numeric suffixes
//! are tried instead of overwriting. This is a write-only path; nothing in
//! the server ever reads these files back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::common::time::{timestamp_to_day, timestamp_to_rfc3339};
use crate::domain::{TranscriptFlush, TranscriptSink, TranscriptSinkError};

/// File-based implementation of the TranscriptSink port.
pub struct FileTranscriptSink {
    base_dir: PathBuf,
    /// Flushes are spawned concurrently; resolving a path and writing the
    /// day header must not interleave between two jobs for the same file.
    write_lock: Mutex<()>,
}

impl FileTranscriptSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Pick the log file for this (identity, day) pair, bumping a numeric
    /// suffix past any existing file whose recorded day differs.
    async fn resolve_path(
        &self,
        identity: &str,
        day: &str,
    ) -> Result<PathBuf, TranscriptSinkError> {
        let expected_header = day_header(day);
        for suffix in 0..u32::MAX {
            let file_name = if suffix == 0 {
                format!("{identity}_{day}.log")
            } else {
                format!("{identity}_{day}_{suffix}.log")
            };
            let path = self.base_dir.join(file_name);
            match read_first_line(&path).await? {
                None => return Ok(path),
                Some(line) if line == expected_header => return Ok(path),
                Some(_) => continue,
            }
        }
        Err(TranscriptSinkError::WriteFailed(
            "exhausted log file suffixes".to_string(),
        ))
    }
}

#[async_trait]
impl TranscriptSink for FileTranscriptSink {
    async fn flush(&self, job: TranscriptFlush) -> Result<(), TranscriptSinkError> {
        let _guard = self.write_lock.lock().await;

        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| TranscriptSinkError::WriteFailed(e.to_string()))?;

        let day = timestamp_to_day(job.closed_at_ms);
        let identity = sanitize_identity(&job.identity);
        let path = self.resolve_path(&identity, &day).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TranscriptSinkError::WriteFailed(e.to_string()))?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| TranscriptSinkError::WriteFailed(e.to_string()))?;
        let mut block = String::new();
        if metadata.len() == 0 {
            block.push_str(&day_header(&day));
            block.push('\n');
        }
        block.push_str(&render_block(&job));

        file.write_all(block.as_bytes())
            .await
            .map_err(|e| TranscriptSinkError::WriteFailed(e.to_string()))?;

        tracing::info!(
            "Flushed transcript for session '{}' ({} messages) to {}",
            job.session_id,
            job.messages.len(),
            path.display()
        );
        Ok(())
    }
}

fn day_header(day: &str) -> String {
    format!("# day: {day}")
}

/// Render one conversation block: an RFC 3339 header line followed by each
/// message as `[speaker]: text` in chronological order.
fn render_block(job: &TranscriptFlush) -> String {
    let mut block = format!(
        "=== {} | {} | session {} ===\n",
        timestamp_to_rfc3339(job.closed_at_ms),
        job.identity,
        job.session_id
    );
    for message in &job.messages {
        block.push('[');
        block.push_str(&message.speaker.to_string());
        block.push_str("]: ");
        block.push_str(&message.text);
        block.push('\n');
    }
    block.push('\n');
    block
}

/// Keep identities filesystem-safe: alphanumerics and a few separators
/// survive, everything else becomes '_'.
fn sanitize_identity(identity: &str) -> String {
    let sanitized: String = identity
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "anonymous".to_string()
    } else {
        sanitized
    }
}

async fn read_first_line(path: &Path) -> Result<Option<String>, TranscriptSinkError> {
    match fs::File::open(path).await {
        Ok(file) => {
            let mut line = String::new();
            BufReader::new(file)
                .read_line(&mut line)
                .await
                .map_err(|e| TranscriptSinkError::WriteFailed(e.to_string()))?;
            Ok(Some(line.trim_end().to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TranscriptSinkError::WriteFailed(e.to_string())),
    }
}
