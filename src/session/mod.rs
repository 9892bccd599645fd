//! Conversation session management
//!
//! This module provides the `ConversationSession` abstraction that manages:
//! - Session-scoped state (created on connect, dropped on disconnect/end)
//! - The turn coordinator task driving the session channel
//! - Session statistics and transcript queries

mod config;
mod session;
mod stats;

pub use config::{new_session_id, SessionConfig};
pub use session::ConversationSession;
pub use stats::SessionStats;
