//! Value types for the visitor-chat domain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-assigned identifier for one live connection.
///
/// Changes across reconnects; a visitor who reloads the page comes back with
/// a fresh ConnectionId but (usually) the same [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-persisted identifier tying multiple connections (across
/// reconnects) to one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form identity record a visitor may supply when joining the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserInfo {
    /// Best human-readable label carried by this record, if any.
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Which side of the conversation a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Owner,
    Visitor,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Owner => f.write_str("owner"),
            Speaker::Visitor => f.write_str("visitor"),
        }
    }
}

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub speaker: Speaker,
    pub text: String,
    /// Unix timestamp in UTC milliseconds.
    pub timestamp_ms: i64,
}

/// Ordered message history for one session.
///
/// Created the moment a visitor's connection is first associated with a
/// session; survives reconnects (the router re-keys it to the new
/// connection) and explicit closes (the record is kept for resume).
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub session_id: SessionId,
    pub user_info: Option<UserInfo>,
    pub messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new(session_id: SessionId, user_info: Option<UserInfo>) -> Self {
        Self {
            session_id,
            user_info,
            messages: Vec::new(),
        }
    }

    /// Display identity used in the owner's UI and in persisted transcript
    /// headers: the supplied name or email when present, otherwise a
    /// deterministic nickname derived from the session id.
    pub fn display_identity(&self) -> String {
        self.user_info
            .as_ref()
            .and_then(|info| info.label())
            .map(str::to_string)
            .unwrap_or_else(|| anonymous_nickname(&self.session_id))
    }
}

/// One waiting visitor, FIFO by arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub user_info: Option<UserInfo>,
}

/// The single conversation currently routed to the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveChat {
    pub visitor: ConnectionId,
    pub owner: ConnectionId,
    pub user_info: Option<UserInfo>,
}

/// Derive a deterministic pseudonym for an anonymous visitor.
///
/// Takes the numeric prefix of the session id (characters before the first
/// non-digit) and maps each decimal digit to a fixed letter (0→a, 1→b, …,
/// 9→j). Session ids without a numeric prefix fall back to "anonymous".
pub fn anonymous_nickname(session_id: &SessionId) -> String {
    let nickname: String = session_id
        .as_str()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .map(|c| (b'a' + (c as u8 - b'0')) as char)
        .collect();

    if nickname.is_empty() {
        "anonymous".to_string()
    } else {
        nickname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_nickname_maps_digits_to_letters() {
        // given (precondition):
        let session_id = SessionId::new("1029384756-xyz");

        // when (operation):
        let nickname = anonymous_nickname(&session_id);

        // then (expected result): 1→b 0→a 2→c 9→j 3→d 8→i 4→e 7→h 5→f 6→g
        assert_eq!(nickname, "bacjdiehfg");
    }

    #[test]
    fn test_anonymous_nickname_stops_at_first_separator() {
        // given (precondition):
        let session_id = SessionId::new("42-99");

        // when (operation):
        let nickname = anonymous_nickname(&session_id);

        // then (expected result): only the prefix before '-' is used
        assert_eq!(nickname, "ec");
    }

    #[test]
    fn test_anonymous_nickname_without_numeric_prefix() {
        // given (precondition):
        let session_id = SessionId::new("abc-123");

        // when (operation):
        let nickname = anonymous_nickname(&session_id);

        // then (expected result):
        assert_eq!(nickname, "anonymous");
    }

    #[test]
    fn test_display_identity_prefers_name_then_email() {
        // given (precondition):
        let session_id = SessionId::new("12-s");
        let named = Transcript::new(
            session_id.clone(),
            Some(UserInfo {
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                avatar: None,
            }),
        );
        let email_only = Transcript::new(
            session_id.clone(),
            Some(UserInfo {
                name: None,
                email: Some("ada@example.com".to_string()),
                avatar: None,
            }),
        );
        let anonymous = Transcript::new(session_id, None);

        // when / then (expected result):
        assert_eq!(named.display_identity(), "Ada");
        assert_eq!(email_only.display_identity(), "ada@example.com");
        assert_eq!(anonymous.display_identity(), "bc");
    }
}
