use super::console::TextOnlySynthesizer;
use super::playback::AudioClip;
use crate::config::{SynthesizerBackend, SynthesizerConfig};
use crate::error::SynthesisError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Converts reply text into playable audio
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SynthesisError>;
}

/// Synthesizer for JSON text-to-speech endpoints answering with base64
/// `audioContent` (Google Cloud TTS style)
pub struct HttpSynthesizer {
    url: String,
    voice: String,
    language_code: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest {
    input: serde_json::Value,
    voice: serde_json::Value,
    audio_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl HttpSynthesizer {
    pub fn new(config: &SynthesizerConfig) -> Self {
        Self {
            url: format!("{}/v1/text:synthesize", config.base_url.trim_end_matches('/')),
            voice: config.voice.clone(),
            language_code: config.language_code.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, text: &str) -> SynthesizeRequest {
        SynthesizeRequest {
            input: json!({ "text": text }),
            voice: json!({ "languageCode": self.language_code, "name": self.voice }),
            audio_config: json!({ "audioEncoding": "MP3" }),
        }
    }
}

fn decode_audio(response: SynthesizeResponse) -> Result<AudioClip, SynthesisError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(response.audio_content.as_bytes())
        .map_err(|e| SynthesisError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(SynthesisError::Decode("empty audio".to_string()));
    }
    Ok(AudioClip::new(bytes, "audio/mpeg"))
}

#[async_trait]
impl VoiceSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SynthesisError> {
        debug!(chars = text.len(), "Synthesizing reply");

        let mut request = self.client.post(&self.url).json(&self.build_request(text));
        if let Some(key) = &self.api_key {
            request = request.header("X-Goog-Api-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SynthesizeResponse = response.json().await?;
        decode_audio(parsed)
    }
}

/// Synthesizer for the configured backend
pub fn build_synthesizer(config: &SynthesizerConfig) -> Arc<dyn VoiceSynthesizer> {
    match config.backend {
        SynthesizerBackend::Text => Arc::new(TextOnlySynthesizer),
        SynthesizerBackend::Http => {
            info!(base_url = %config.base_url, voice = %config.voice, "Using HTTP synthesizer");
            Arc::new(HttpSynthesizer::new(config))
        }
    }
}
