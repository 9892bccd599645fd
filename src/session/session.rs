use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::channel::{ClientEvent, ServerChannel};
use crate::phase::PhaseScheduler;
use crate::responder::{Responder, SummarySink};
use crate::turn::{ConversationMessage, Input, Session, SessionSnapshot, TurnCoordinator};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};

/// A conversation session: owns the turn coordinator for one client
/// connection and exposes its state to the HTTP API
pub struct ConversationSession {
    /// Session configuration
    config: SessionConfig,

    /// Coordinator waiting to be run; taken by `run`
    coordinator: Mutex<Option<TurnCoordinator>>,

    /// Inputs injected from outside the channel
    inbox: mpsc::UnboundedSender<Input>,

    /// Latest view of the session, written by the coordinator
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl ConversationSession {
    /// Create a new conversation session
    pub fn new(
        config: SessionConfig,
        responder: Arc<dyn Responder>,
        summary_sink: Arc<dyn SummarySink>,
    ) -> Result<Self> {
        info!("Creating conversation session: {}", config.session_id);

        let scheduler =
            PhaseScheduler::new(config.phases.clone()).context("Invalid phase plan")?;

        let coordinator = TurnCoordinator::new(
            Session::new(config.session_id.clone()),
            scheduler,
            config.machine.clone(),
            config.timing.clone(),
            responder,
            summary_sink,
        );

        Ok(Self {
            inbox: coordinator.inbox(),
            snapshot: coordinator.snapshot(),
            coordinator: Mutex::new(Some(coordinator)),
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    /// Drive the session over `channel` until it ends. Runs at most once.
    pub async fn run(&self, channel: ServerChannel) -> Result<SessionStats> {
        let coordinator = self
            .coordinator
            .lock()
            .await
            .take()
            .context("Session already started")?;

        info!("Conversation session started: {}", self.config.session_id);

        let snapshot = coordinator.run(channel).await;

        info!("Conversation session finished: {}", self.config.session_id);

        Ok(SessionStats::from(&snapshot))
    }

    /// Ask the coordinator to end the session as if the client had
    pub fn end(&self) {
        if self
            .inbox
            .send(Input::Client(ClientEvent::EndSession {}))
            .is_err()
        {
            warn!("Session {} already finished", self.config.session_id);
        }
    }

    /// Get current session statistics
    pub async fn get_stats(&self) -> SessionStats {
        let snapshot = self.snapshot.read().await;
        SessionStats::from(&*snapshot)
    }

    /// Get the full conversation history so far
    pub async fn get_transcript(&self) -> Vec<ConversationMessage> {
        let snapshot = self.snapshot.read().await;
        snapshot.history.clone()
    }
}
