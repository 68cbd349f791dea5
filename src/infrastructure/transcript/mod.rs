//! TranscriptSink implementations.

pub mod file;

pub use file::FileTranscriptSink;
