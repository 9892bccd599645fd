use crate::config::Config;
use crate::responder::{Responder, SummarySink};
use crate::session::ConversationSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live conversation sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<ConversationSession>>>>,

    /// Service configuration, used to build each new session
    pub config: Arc<Config>,

    /// Reply generator shared by all sessions
    pub responder: Arc<dyn Responder>,

    /// Where end-of-session summaries go
    pub summary_sink: Arc<dyn SummarySink>,
}

impl AppState {
    pub fn new(
        config: Config,
        responder: Arc<dyn Responder>,
        summary_sink: Arc<dyn SummarySink>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            responder,
            summary_sink,
        }
    }
}
