//! Live visitor-chat server for a personal site.
//!
//! Queues visitors, routes one active conversation to the site owner, and
//! persists transcripts to append-only text logs.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000 --logs-dir ./chatlogs
//! ```

use std::sync::Arc;

use clap::Parser;
use parlor::{
    common::{logger::setup_logger, time::SystemClock},
    domain::{ChatRouter, RouterConfig},
    infrastructure::{message_pusher::WebSocketMessagePusher, transcript::FileTranscriptSink},
    ui::Server,
    usecase::ChatService,
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Single-owner visitor-chat server with FIFO queueing", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Directory for persisted transcript logs
    #[arg(long, default_value = "logs")]
    logs_dir: String,

    /// Maximum number of visitors allowed to wait in the queue
    #[arg(long, default_value = "50")]
    max_queue_len: usize,

    /// Maximum buffered messages per transcript before an early flush
    #[arg(long, default_value = "500")]
    max_transcript_len: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. TranscriptSink
    // 2. MessagePusher
    // 3. ChatRouter + ChatService
    // 4. Server

    // 1. Create TranscriptSink (append-only text logs)
    let sink = Arc::new(FileTranscriptSink::new(&args.logs_dir));
    tracing::info!("Transcripts will be written under '{}'", args.logs_dir);

    // 2. Create MessagePusher (WebSocket implementation)
    let pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create the router and the service orchestrating it
    let router = ChatRouter::new(
        RouterConfig {
            max_queue_len: args.max_queue_len,
            max_transcript_len: args.max_transcript_len,
        },
        Arc::new(SystemClock),
    );
    let chat_service = Arc::new(ChatService::new(router, pusher, sink));

    // 4. Create and run the server
    let server = Server::new(chat_service);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
