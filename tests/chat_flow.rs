//! Scenario tests driving the chat service end to end, in process.
//!
//! Each test wires the real service, router, and WebSocket pusher together
//! and reads the JSON frames that would have gone out over the wire from
//! the per-connection channels.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parlor::common::time::FixedClock;
use parlor::domain::{ChatRouter, ConnectionId, RouterConfig, SessionId, UserInfo};
use parlor::infrastructure::message_pusher::WebSocketMessagePusher;
use parlor::infrastructure::transcript::FileTranscriptSink;
use parlor::usecase::ChatService;
use tokio::sync::mpsc;

struct TestClient {
    connection_id: ConnectionId,
    session_id: SessionId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    /// All frames received so far, parsed as JSON.
    fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("frames are valid JSON"));
        }
        frames
    }

    /// Frames of one `type`, most recent last.
    fn drain_of_type(&mut self, event_type: &str) -> Vec<serde_json::Value> {
        self.drain()
            .into_iter()
            .filter(|frame| frame["type"] == event_type)
            .collect()
    }
}

async fn connect(service: &ChatService, connection_id: &str, session_id: &str) -> TestClient {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = ConnectionId::new(connection_id);
    let session_id = SessionId::new(session_id);
    service
        .connect(connection_id.clone(), session_id.clone(), tx)
        .await;
    TestClient {
        connection_id,
        session_id,
        rx,
    }
}

fn build_service(logs_dir: &PathBuf) -> ChatService {
    let router = ChatRouter::new(
        RouterConfig::default(),
        Arc::new(FixedClock::new(1_672_567_200_000)), // 2023-01-01T10:00:00Z
    );
    ChatService::new(
        router,
        Arc::new(WebSocketMessagePusher::new()),
        Arc::new(FileTranscriptSink::new(logs_dir)),
    )
}

fn temp_logs_dir() -> PathBuf {
    std::env::temp_dir().join(format!("parlor-flow-test-{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn full_conversation_lifecycle() {
    let logs_dir = temp_logs_dir();
    let service = build_service(&logs_dir);

    // Owner comes online.
    let mut owner = connect(&service, "owner-conn", "owner-session").await;
    service.register_owner(owner.connection_id.clone()).await;
    let connected = owner.drain_of_type("connected");
    assert_eq!(connected[0]["connection_id"], "owner-conn");

    // First visitor joins and is promoted immediately.
    let mut v1 = connect(&service, "v1-conn", "111-s").await;
    service
        .join_queue(
            v1.connection_id.clone(),
            v1.session_id.clone(),
            Some(UserInfo {
                name: Some("Ada".to_string()),
                email: None,
                avatar: None,
            }),
        )
        .await;
    let v1_frames = v1.drain();
    assert!(v1_frames.iter().any(|f| f["type"] == "queue_position"));
    assert!(
        v1_frames
            .iter()
            .any(|f| f["type"] == "chat_started" && f["position"] == 0)
    );
    let owner_started = owner.drain_of_type("chat_started");
    assert_eq!(
        owner_started.last().unwrap()["visitor_connection_id"],
        "v1-conn"
    );

    // Second visitor waits at position 1.
    let mut v2 = connect(&service, "v2-conn", "222-s").await;
    service
        .join_queue(v2.connection_id.clone(), v2.session_id.clone(), None)
        .await;
    let v2_positions = v2.drain_of_type("queue_position");
    assert_eq!(v2_positions.last().unwrap()["position"], 1);

    // Messages flow both ways on the active chat.
    service
        .send_message(
            v1.connection_id.clone(),
            v1.session_id.clone(),
            "hello there".to_string(),
            None,
        )
        .await;
    let owner_received = owner.drain_of_type("receive_message");
    assert_eq!(owner_received[0]["text"], "hello there");
    assert_eq!(owner_received[0]["sender"], "visitor");
    assert_eq!(owner_received[0]["from_connection_id"], "v1-conn");

    service
        .send_message(
            owner.connection_id.clone(),
            owner.session_id.clone(),
            "hi Ada".to_string(),
            None,
        )
        .await;
    let v1_received = v1.drain_of_type("receive_message");
    assert_eq!(v1_received[0]["text"], "hi Ada");
    assert_eq!(v1_received[0]["sender"], "owner");

    // Owner closes the chat: v1 is told, v2 is promoted with history.
    service
        .close_chat(owner.connection_id.clone(), v1.connection_id.clone())
        .await;
    let v1_ended = v1.drain_of_type("chat_ended");
    assert_eq!(v1_ended[0]["reason"], "owner_closed");
    let v2_started = v2.drain_of_type("chat_started");
    assert_eq!(v2_started.last().unwrap()["position"], 0);
    let owner_history = owner.drain_of_type("chat_history");
    assert_eq!(
        owner_history.last().unwrap()["connection_id"],
        "v2-conn"
    );

    // The flushed transcript landed on disk with the expected format.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let content = tokio::fs::read_to_string(logs_dir.join("Ada_2023-01-01.log"))
        .await
        .expect("transcript file exists");
    assert!(content.contains("| Ada | session 111-s ==="));
    assert!(content.contains("[visitor]: hello there"));
    assert!(content.contains("[owner]: hi Ada"));

    tokio::fs::remove_dir_all(&logs_dir).await.unwrap();
}

#[tokio::test]
async fn visitor_joining_without_owner_is_turned_away() {
    let logs_dir = temp_logs_dir();
    let service = build_service(&logs_dir);

    let mut visitor = connect(&service, "v1-conn", "111-s").await;
    service
        .join_queue(visitor.connection_id.clone(), visitor.session_id.clone(), None)
        .await;

    let frames = visitor.drain();
    assert!(frames.iter().any(|f| f["type"] == "owner_offline"));
    assert!(frames.iter().all(|f| f["type"] != "queue_position"));
    assert!(service.snapshot().await.queue.is_empty());
}

#[tokio::test]
async fn owner_reconnect_recovers_queue_and_active_chat() {
    let logs_dir = temp_logs_dir();
    let service = build_service(&logs_dir);

    let owner = connect(&service, "owner-conn", "owner-session").await;
    service.register_owner(owner.connection_id.clone()).await;
    for (conn_id, sess_id) in [("v1-conn", "1-s"), ("v2-conn", "2-s"), ("v3-conn", "3-s")] {
        let client = connect(&service, conn_id, sess_id).await;
        service
            .join_queue(client.connection_id.clone(), client.session_id.clone(), None)
            .await;
    }
    let before = service.snapshot().await;

    // Owner's socket drops, then a fresh connection re-registers.
    service.disconnect(owner.connection_id.clone()).await;
    let mut owner2 = connect(&service, "owner-conn-2", "owner-session").await;
    service.register_owner(owner2.connection_id.clone()).await;

    // No visitor lost or reordered.
    assert_eq!(service.snapshot().await, before);
    let snapshots = owner2.drain_of_type("queue_snapshot");
    let snapshot = snapshots.last().unwrap();
    assert_eq!(snapshot["count"], 2);
    assert_eq!(snapshot["active"]["connection_id"], "v1-conn");
    assert_eq!(snapshot["queue"][0]["connection_id"], "v2-conn");
    assert_eq!(snapshot["queue"][1]["connection_id"], "v3-conn");
}

#[tokio::test]
async fn switch_chat_preserves_interrupted_visitor_place() {
    let logs_dir = temp_logs_dir();
    let service = build_service(&logs_dir);

    let owner = connect(&service, "owner-conn", "owner-session").await;
    service.register_owner(owner.connection_id.clone()).await;
    let mut v1 = connect(&service, "v1-conn", "1-s").await;
    let v2 = connect(&service, "v2-conn", "2-s").await;
    service
        .join_queue(v1.connection_id.clone(), v1.session_id.clone(), None)
        .await;
    service
        .join_queue(v2.connection_id.clone(), v2.session_id.clone(), None)
        .await;

    service
        .switch_chat(owner.connection_id.clone(), v2.connection_id.clone())
        .await;

    // The interrupted visitor is waiting again at position 1, not the back.
    let v1_positions = v1.drain_of_type("queue_position");
    assert_eq!(v1_positions.last().unwrap()["position"], 1);
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.active.unwrap().connection_id, v2.connection_id);
    assert_eq!(snapshot.queue[0].connection_id, v1.connection_id);
}

#[tokio::test]
async fn messages_sent_while_owner_offline_survive_to_the_log() {
    let logs_dir = temp_logs_dir();
    let service = build_service(&logs_dir);

    let visitor = connect(&service, "v1-conn", "42-s").await;
    for text in ["anyone?", "hello?", "guess not"] {
        service
            .send_message(
                visitor.connection_id.clone(),
                visitor.session_id.clone(),
                text.to_string(),
                None,
            )
            .await;
    }
    service.visitor_close(visitor.connection_id.clone()).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Anonymous identity: session "42-s" → digits 4, 2 → "ec".
    let content = tokio::fs::read_to_string(logs_dir.join("ec_2023-01-01.log"))
        .await
        .expect("transcript file exists");
    assert!(content.contains("[visitor]: anyone?"));
    assert!(content.contains("[visitor]: hello?"));
    assert!(content.contains("[visitor]: guess not"));

    tokio::fs::remove_dir_all(&logs_dir).await.unwrap();
}
