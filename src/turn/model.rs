use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinator state; `Processing` doubles as the responder mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Listening,
    Processing,
    Speaking,
    Ended,
}

impl TurnState {
    pub fn accepts_utterance(&self) -> bool {
        matches!(self, TurnState::Idle | TurnState::Listening)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// One conversation from connect to end/disconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Completed turns
    pub turn_count: u64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            status: SessionStatus::Active,
            turn_count: 0,
        }
    }
}

/// Progress of a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Processing,
    Speaking,
    Ready,
    Failed,
}

/// Whether a turn answers the user or closes the session with a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Reply,
    Summary,
}

/// One listen -> process -> speak cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    pub session_id: String,
    pub kind: TurnKind,
    pub state: TurnPhase,
    pub utterance: String,
    pub response: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// History length before this turn touched it, for rollback
    #[serde(skip)]
    pub history_mark: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only conversation history with rollback to a mark
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    messages: Vec<ConversationMessage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything appended after `mark`
    pub fn truncate(&mut self, mark: usize) {
        self.messages.truncate(mark);
    }

    /// The most recent `window` messages
    pub fn recent(&self, window: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    pub fn all(&self) -> &[ConversationMessage] {
        &self.messages
    }
}

/// Normalized form used for duplicate detection
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_recent_window() {
        let mut history = History::new();
        for i in 0..5 {
            history.push(ConversationMessage::user(format!("m{}", i)));
        }

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(recent[1].content, "m4");
        assert_eq!(history.recent(50).len(), 5);
    }

    #[test]
    fn test_history_truncate_to_mark() {
        let mut history = History::new();
        history.push(ConversationMessage::user("a"));
        let mark = history.len();
        history.push(ConversationMessage::user("b"));
        history.truncate(mark);
        assert_eq!(history.len(), 1);
        assert_eq!(history.all()[0].content, "a");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello There "), "hello there");
    }
}
