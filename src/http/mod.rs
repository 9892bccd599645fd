//! HTTP and WebSocket API
//!
//! This module serves the session channel and a small REST API:
//! - GET /ws - Upgrade to a session channel (one session per connection)
//! - GET /sessions - List live session ids
//! - GET /sessions/:id/status - Query session status
//! - GET /sessions/:id/transcript - Get the conversation so far
//! - POST /sessions/:id/end - End a session
//! - GET /health - Health check

mod handlers;
mod routes;
mod socket;
mod state;

pub use routes::create_router;
pub use state::AppState;
