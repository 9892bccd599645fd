//! OpenAI-compatible chat completions responder.
//!
//! Works against any `/v1/chat/completions` endpoint (OpenAI, OpenRouter,
//! Ollama and friends). Replies are requested non-streaming since the turn
//! only advances once the whole text is known.

use super::{PhasePrompt, Responder};
use crate::config::ResponderConfig;
use crate::error::UpstreamError;
use crate::turn::{ConversationMessage, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct OpenAiResponder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: String,
    client: reqwest::Client,
}

impl OpenAiResponder {
    pub fn new(config: &ResponderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            system_prompt: config.system_prompt.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, history: &[ConversationMessage], prompt: &PhasePrompt) -> ChatRequest {
        let system = if prompt.text.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.system_prompt, prompt.text)
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage {
            role: "system".into(),
            content: system,
        });
        messages.extend(history.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
            },
            content: m.content.clone(),
        }));

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            stream: false,
        }
    }
}

// --- request/response types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First non-blank completion text in a response body
fn extract_reply(response: ChatResponse) -> Result<String, UpstreamError> {
    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
        .ok_or(UpstreamError::EmptyCompletion)
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate(
        &self,
        history: &[ConversationMessage],
        prompt: &PhasePrompt,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request(history, prompt);

        debug!(messages = body.messages.len(), model = %body.model, "Calling responder");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        extract_reply(parsed)
    }
}
