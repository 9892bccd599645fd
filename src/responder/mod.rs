//! Reply generation and summary persistence collaborators
//!
//! The coordinator only sees the [`Responder`] and [`SummarySink`] traits;
//! `openai` provides the production responder.

mod openai;

pub use openai::OpenAiResponder;

use crate::error::UpstreamError;
use crate::phase::PhaseConfig;
use crate::turn::ConversationMessage;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Prompt focus and sampling flags for one responder call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhasePrompt {
    pub text: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PhasePrompt {
    pub fn from_phase(phase: &PhaseConfig) -> Self {
        Self {
            text: phase.prompt.clone(),
            temperature: phase.temperature,
            max_tokens: phase.max_tokens,
        }
    }
}

/// Produces reply text from conversation history
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate a reply.
    ///
    /// Fails with [`UpstreamError`] on a non-success response or an empty
    /// completion.
    async fn generate(
        &self,
        history: &[ConversationMessage],
        prompt: &PhasePrompt,
    ) -> Result<String, UpstreamError>;
}

/// Receives the end-of-session summary for storage
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn store(&self, session_id: &str, summary: &str) -> Result<()>;
}

/// Summary sink that only writes to the log
pub struct LogSummarySink;

#[async_trait]
impl SummarySink for LogSummarySink {
    async fn store(&self, session_id: &str, summary: &str) -> Result<()> {
        info!(session_id, chars = summary.len(), "Session summary: {}", summary);
        Ok(())
    }
}
