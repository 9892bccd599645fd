use crate::turn::{SessionSnapshot, SessionStatus, TurnState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub status: SessionStatus,

    /// Where the turn machine currently is
    pub state: TurnState,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Seconds since the session started
    pub duration_secs: f64,

    /// Completed turns
    pub turn_count: u64,

    /// Messages in the conversation history
    pub message_count: usize,

    /// Active phase name
    pub phase: String,

    /// Seconds left in the active phase
    pub remaining_secs: u64,
}

impl From<&SessionSnapshot> for SessionStats {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session.id.clone(),
            status: snapshot.session.status,
            state: snapshot.state,
            started_at: snapshot.session.started_at,
            duration_secs: snapshot.elapsed_secs,
            turn_count: snapshot.session.turn_count,
            message_count: snapshot.history.len(),
            phase: snapshot.phase.clone(),
            remaining_secs: snapshot.remaining_secs,
        }
    }
}
