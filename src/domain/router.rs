//! The chat router: a single-owner, multi-visitor support-chat state
//! machine.
//!
//! Owns all mutable routing state (owner slot, FIFO waiting queue, the one
//! active chat, per-connection transcript buffers). Every operation runs to
//! completion synchronously and returns the [`Effect`]s to apply, so the
//! whole router sits behind one lock and no operation can observe a
//! half-applied transition.
//!
//! There are no fatal errors here: invalid input (unknown targets,
//! unauthorized owner commands, duplicate joins) degrades to a no-op or a
//! soft client-visible signal.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::common::time::Clock;

use super::event::{ChatEndReason, Effect, OutboundEvent, QueueSnapshot, SnapshotEntry};
use super::sink::TranscriptFlush;
use super::types::{
    ActiveChat, ConnectionId, QueueEntry, SessionId, Speaker, Transcript, TranscriptMessage,
    UserInfo,
};

/// Backpressure bounds for the router.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Joins beyond this queue length are rejected with `queue_full`.
    pub max_queue_len: usize,
    /// Appending beyond this buffer length first flushes and clears the
    /// buffer, so no message is ever dropped.
    pub max_transcript_len: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_queue_len: 50,
            max_transcript_len: 500,
        }
    }
}

/// Single-owner visitor-chat router.
pub struct ChatRouter {
    owner: Option<ConnectionId>,
    queue: VecDeque<QueueEntry>,
    active: Option<ActiveChat>,
    /// Transcript buffers keyed by the session's *current* connection id;
    /// re-keyed when a session rejoins from a new connection.
    transcripts: HashMap<ConnectionId, Transcript>,
    config: RouterConfig,
    clock: Arc<dyn Clock>,
}

impl ChatRouter {
    pub fn new(config: RouterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            owner: None,
            queue: VecDeque::new(),
            active: None,
            transcripts: HashMap::new(),
            config,
            clock,
        }
    }

    /// Bind the calling connection as owner, replacing any prior owner.
    ///
    /// The prior owner's connection, if still open, becomes an ordinary
    /// unprivileged connection; no handoff is negotiated. If no chat is
    /// active and visitors are waiting, the queue head is promoted before
    /// the caller receives its state snapshot, so a reconnecting owner
    /// recovers without races.
    pub fn register_owner(&mut self, connection_id: ConnectionId) -> Vec<Effect> {
        self.owner = Some(connection_id.clone());
        if let Some(active) = &mut self.active {
            active.owner = connection_id.clone();
        }

        let mut effects = Vec::new();
        if self.active.is_none() {
            effects.extend(self.promote());
        }
        effects.push(Effect::Send {
            to: connection_id,
            event: OutboundEvent::QueueSnapshot(self.snapshot()),
        });
        effects
    }

    /// Admit a visitor into the waiting queue.
    ///
    /// No-op when the caller is the owner or is already queued/active.
    /// Rejected with `owner_offline` when no owner is registered (visitors
    /// are not queued against an absent owner) and with `queue_full` at the
    /// configured bound. On success the caller learns its position, the
    /// owner gets a fresh snapshot, and promotion runs if the owner is idle.
    pub fn join_queue(
        &mut self,
        connection_id: ConnectionId,
        session_id: SessionId,
        user_info: Option<UserInfo>,
    ) -> Vec<Effect> {
        if self.owner.as_ref() == Some(&connection_id) {
            return Vec::new();
        }
        let Some(owner) = self.owner.clone() else {
            return vec![Effect::Send {
                to: connection_id,
                event: OutboundEvent::OwnerOffline,
            }];
        };
        if self.is_queued(&connection_id) || self.is_active(&connection_id) {
            return Vec::new();
        }
        if self.queue.len() >= self.config.max_queue_len {
            return vec![Effect::Send {
                to: connection_id,
                event: OutboundEvent::QueueFull,
            }];
        }

        self.bind_transcript(&connection_id, session_id, user_info.clone());
        self.queue.push_back(QueueEntry {
            connection_id: connection_id.clone(),
            user_info,
        });

        let mut effects = vec![
            Effect::Send {
                to: connection_id,
                event: OutboundEvent::QueuePosition {
                    position: self.queue.len(),
                },
            },
            Effect::Send {
                to: owner,
                event: OutboundEvent::QueueSnapshot(self.snapshot()),
            },
        ];
        if self.active.is_none() {
            effects.extend(self.promote());
        }
        effects
    }

    /// Route a message.
    ///
    /// Owner messages go to the explicit target or, failing that, the
    /// active visitor; neither present is a no-op. Visitor messages are
    /// always appended to the visitor's transcript (even with no owner
    /// registered; messages are never dropped) and forwarded live only
    /// when the visitor is the active chat.
    pub fn send_message(
        &mut self,
        connection_id: ConnectionId,
        session_id: SessionId,
        text: String,
        target: Option<ConnectionId>,
    ) -> Vec<Effect> {
        if self.owner.as_ref() == Some(&connection_id) {
            let Some(recipient) = target.or_else(|| {
                self.active.as_ref().map(|active| active.visitor.clone())
            }) else {
                return Vec::new();
            };
            if !self.transcripts.contains_key(&recipient) {
                // Unknown target: nothing to route to.
                return Vec::new();
            }
            let mut effects = self.append_message(&recipient, Speaker::Owner, text.clone());
            effects.push(Effect::Send {
                to: recipient,
                event: OutboundEvent::ReceiveMessage {
                    text,
                    sender: Speaker::Owner,
                    from_connection_id: None,
                },
            });
            return effects;
        }

        // A visitor may message before ever joining the queue (e.g. while
        // the owner is offline), so the transcript is created lazily here.
        self.bind_transcript(&connection_id, session_id, None);
        let mut effects = self.append_message(&connection_id, Speaker::Visitor, text.clone());
        if self.is_active(&connection_id) {
            if let Some(owner) = self.owner.clone() {
                effects.push(Effect::Send {
                    to: owner,
                    event: OutboundEvent::ReceiveMessage {
                        text,
                        sender: Speaker::Visitor,
                        from_connection_id: Some(connection_id),
                    },
                });
            }
        }
        effects
    }

    /// Reassign the active chat to a currently queued visitor (owner only).
    ///
    /// The previously active visitor returns to the *front* of the queue
    /// (their place is preserved, not penalized). Switching to the already
    /// active visitor only re-fetches history; unknown targets are a no-op.
    pub fn switch_chat(
        &mut self,
        connection_id: ConnectionId,
        target: ConnectionId,
    ) -> Vec<Effect> {
        if self.owner.as_ref() != Some(&connection_id) {
            return Vec::new();
        }
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.visitor == target)
        {
            return vec![Effect::Send {
                to: connection_id,
                event: self.history_event(&target),
            }];
        }
        let Some(position) = self
            .queue
            .iter()
            .position(|entry| entry.connection_id == target)
        else {
            return Vec::new();
        };

        let entry = self
            .queue
            .remove(position)
            .expect("position comes from a just-computed index");
        if let Some(previous) = self.active.take() {
            self.queue.push_front(QueueEntry {
                connection_id: previous.visitor,
                user_info: previous.user_info,
            });
        }
        self.activate(entry)
    }

    /// Close a conversation (owner only), whether queued or active.
    ///
    /// Flushes a non-empty transcript, notifies the visitor, and promotes
    /// the next waiter when the active slot was freed. The in-memory
    /// transcript record is retained so the visitor can resume later.
    pub fn close_chat(&mut self, connection_id: ConnectionId, target: ConnectionId) -> Vec<Effect> {
        if self.owner.as_ref() != Some(&connection_id) {
            return Vec::new();
        }
        self.close_target(&target, ChatEndReason::OwnerClosed)
    }

    /// Legacy owner command: end whatever chat is currently active.
    pub fn end_chat(&mut self, connection_id: ConnectionId) -> Vec<Effect> {
        if self.owner.as_ref() != Some(&connection_id) {
            return Vec::new();
        }
        let Some(visitor) = self.active.as_ref().map(|active| active.visitor.clone()) else {
            return Vec::new();
        };
        self.close_target(&visitor, ChatEndReason::OwnerEnded)
    }

    /// Visitor-initiated close: flush, reset the message buffer (keeping
    /// session id and user info so a rejoin resumes the same identity),
    /// leave the queue or active slot, and promote if it was active.
    pub fn visitor_close(&mut self, connection_id: ConnectionId) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(transcript) = self.transcripts.get_mut(&connection_id) {
            if let Some(job) = flush_job(transcript, self.clock.now_utc_millis()) {
                effects.push(Effect::Flush(job));
            }
            transcript.messages.clear();
        }

        let was_queued = self.remove_from_queue(&connection_id);
        let was_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.visitor == connection_id);
        if was_active {
            self.active = None;
            effects.extend(self.promote());
        }
        if was_queued {
            effects.extend(self.position_updates());
        }
        if was_queued || was_active {
            effects.extend(self.owner_snapshot());
        }
        effects
    }

    /// Handle a transport-level disconnect.
    ///
    /// Owner: the owner slot is cleared and nothing else moves; the active
    /// chat and queue survive so the next `register_owner` recovers the
    /// exact prior state. Queued visitor: removed, trailing positions
    /// recomputed. Active visitor: owner is told the chat ended and the
    /// next waiter is promoted. Any non-empty transcript is flushed, even
    /// for a visitor who only buffered messages while the owner was offline
    /// and never reached the queue (the buffer stays in memory so the
    /// session can still resume).
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Effect> {
        if self.owner.as_ref() == Some(&connection_id) {
            self.owner = None;
            return Vec::new();
        }

        let mut effects = Vec::new();
        if let Some(transcript) = self.transcripts.get(&connection_id) {
            if let Some(job) = flush_job(transcript, self.clock.now_utc_millis()) {
                effects.push(Effect::Flush(job));
            }
        }

        let was_queued = self.remove_from_queue(&connection_id);
        let was_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.visitor == connection_id);
        if !was_queued && !was_active {
            return effects;
        }

        if was_active {
            self.active = None;
            if let Some(owner) = self.owner.clone() {
                effects.push(Effect::Send {
                    to: owner,
                    event: OutboundEvent::ChatEnded {
                        reason: ChatEndReason::VisitorDisconnected,
                    },
                });
            }
            effects.extend(self.promote());
        }
        if was_queued {
            effects.extend(self.position_updates());
        }
        effects.extend(self.owner_snapshot());
        effects
    }

    /// Owner-view snapshot of the current routing state.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queue: self
                .queue
                .iter()
                .map(|entry| self.snapshot_entry(&entry.connection_id, entry.user_info.as_ref()))
                .collect(),
            active: self
                .active
                .as_ref()
                .map(|active| self.snapshot_entry(&active.visitor, active.user_info.as_ref())),
        }
    }

    // ---- internals ----

    /// Pop the queue head into the active slot, if an owner is registered
    /// and no chat is active.
    fn promote(&mut self) -> Vec<Effect> {
        if self.owner.is_none() || self.active.is_some() {
            return Vec::new();
        }
        let Some(entry) = self.queue.pop_front() else {
            return Vec::new();
        };
        self.activate(entry)
    }

    /// Install `entry` as the active chat and emit the start events:
    /// history + chat_started to the owner, chat_started(0) to the visitor,
    /// recomputed positions to everyone still waiting.
    fn activate(&mut self, entry: QueueEntry) -> Vec<Effect> {
        let owner = self
            .owner
            .clone()
            .expect("activate is only reached with an owner registered");
        let visitor = entry.connection_id.clone();
        self.active = Some(ActiveChat {
            visitor: visitor.clone(),
            owner: owner.clone(),
            user_info: entry.user_info,
        });

        let mut effects = vec![
            Effect::Send {
                to: owner.clone(),
                event: self.history_event(&visitor),
            },
            Effect::Send {
                to: owner.clone(),
                event: OutboundEvent::ChatStartedOwner {
                    visitor: visitor.clone(),
                },
            },
            Effect::Send {
                to: visitor,
                event: OutboundEvent::ChatStartedVisitor { position: 0 },
            },
        ];
        effects.extend(self.position_updates());
        effects.push(Effect::Send {
            to: owner,
            event: OutboundEvent::QueueSnapshot(self.snapshot()),
        });
        effects
    }

    /// Remove `target` from wherever it sits (queue or active slot), flush
    /// its transcript if non-empty, notify it, and promote the next waiter
    /// when the active slot was freed. Unknown targets are a no-op.
    fn close_target(&mut self, target: &ConnectionId, reason: ChatEndReason) -> Vec<Effect> {
        let was_queued = self.remove_from_queue(target);
        let was_active = self
            .active
            .as_ref()
            .is_some_and(|active| &active.visitor == target);
        if !was_queued && !was_active {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if let Some(transcript) = self.transcripts.get(target) {
            if let Some(job) = flush_job(transcript, self.clock.now_utc_millis()) {
                effects.push(Effect::Flush(job));
            }
        }
        effects.push(Effect::Send {
            to: target.clone(),
            event: OutboundEvent::ChatEnded { reason },
        });

        if was_active {
            self.active = None;
            effects.extend(self.promote());
        }
        if was_queued {
            effects.extend(self.position_updates());
        }
        effects.extend(self.owner_snapshot());
        effects
    }

    /// Create the transcript for this session, or re-key an existing one to
    /// the new connection id after a reconnect. A supplied user info record
    /// refreshes the stored one.
    ///
    /// Only an *orphaned* transcript (its key connection no longer queued or
    /// active) is re-keyed: a second tab joining with the same session id
    /// must not steal the buffer out from under a live connection, so it
    /// gets a fresh one instead.
    fn bind_transcript(
        &mut self,
        connection_id: &ConnectionId,
        session_id: SessionId,
        user_info: Option<UserInfo>,
    ) {
        if self.transcripts.contains_key(connection_id) {
            if user_info.is_some() {
                if let Some(transcript) = self.transcripts.get_mut(connection_id) {
                    transcript.user_info = user_info;
                }
            }
            return;
        }

        let existing_key = self
            .transcripts
            .iter()
            .find(|(key, transcript)| {
                transcript.session_id == session_id
                    && !self.is_queued(key)
                    && !self.is_active(key)
            })
            .map(|(key, _)| key.clone());

        let mut transcript = match existing_key {
            Some(key) => self
                .transcripts
                .remove(&key)
                .expect("key was just found in the map"),
            None => Transcript::new(session_id, None),
        };
        if user_info.is_some() {
            transcript.user_info = user_info;
        }
        self.transcripts.insert(connection_id.clone(), transcript);
    }

    /// Append to a transcript buffer, flushing and clearing it first when
    /// the append would exceed the configured bound.
    fn append_message(
        &mut self,
        connection_id: &ConnectionId,
        speaker: Speaker,
        text: String,
    ) -> Vec<Effect> {
        let now = self.clock.now_utc_millis();
        let max_len = self.config.max_transcript_len;
        let mut effects = Vec::new();
        if let Some(transcript) = self.transcripts.get_mut(connection_id) {
            if transcript.messages.len() >= max_len {
                if let Some(job) = flush_job(transcript, now) {
                    effects.push(Effect::Flush(job));
                }
                transcript.messages.clear();
            }
            transcript.messages.push(TranscriptMessage {
                speaker,
                text,
                timestamp_ms: now,
            });
        }
        effects
    }

    fn history_event(&self, visitor: &ConnectionId) -> OutboundEvent {
        let (user_info, messages) = self
            .transcripts
            .get(visitor)
            .map(|transcript| (transcript.user_info.clone(), transcript.messages.clone()))
            .unwrap_or_default();
        OutboundEvent::ChatHistory {
            connection_id: visitor.clone(),
            user_info,
            messages,
        }
    }

    /// 1-indexed position updates for everyone still waiting.
    fn position_updates(&self) -> Vec<Effect> {
        self.queue
            .iter()
            .enumerate()
            .map(|(index, entry)| Effect::Send {
                to: entry.connection_id.clone(),
                event: OutboundEvent::QueuePosition {
                    position: index + 1,
                },
            })
            .collect()
    }

    fn owner_snapshot(&self) -> Vec<Effect> {
        match self.owner.clone() {
            Some(owner) => vec![Effect::Send {
                to: owner,
                event: OutboundEvent::QueueSnapshot(self.snapshot()),
            }],
            None => Vec::new(),
        }
    }

    fn snapshot_entry(
        &self,
        connection_id: &ConnectionId,
        user_info: Option<&UserInfo>,
    ) -> SnapshotEntry {
        let display_name = user_info
            .and_then(|info| info.label())
            .map(str::to_string)
            .or_else(|| {
                self.transcripts
                    .get(connection_id)
                    .map(|transcript| transcript.display_identity())
            })
            .unwrap_or_else(|| "anonymous".to_string());
        SnapshotEntry {
            connection_id: connection_id.clone(),
            display_name,
            user_info: user_info.cloned(),
        }
    }

    fn remove_from_queue(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|entry| &entry.connection_id != connection_id);
        self.queue.len() != before
    }

    fn is_queued(&self, connection_id: &ConnectionId) -> bool {
        self.queue
            .iter()
            .any(|entry| &entry.connection_id == connection_id)
    }

    fn is_active(&self, connection_id: &ConnectionId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| &active.visitor == connection_id)
    }
}

/// Build a flush job for a transcript, or `None` when it has no messages
/// (empty transcripts are never persisted).
fn flush_job(transcript: &Transcript, closed_at_ms: i64) -> Option<TranscriptFlush> {
    if transcript.messages.is_empty() {
        return None;
    }
    Some(TranscriptFlush {
        session_id: transcript.session_id.clone(),
        identity: transcript.display_identity(),
        messages: transcript.messages.clone(),
        closed_at_ms,
    })
}
