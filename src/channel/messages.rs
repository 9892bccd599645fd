use crate::error::ProtocolError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Events sent by the client device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// A finalized utterance
    UserSpeech { text: String },
    /// Playback of the last reply finished (or was skipped)
    SpeechEnded {},
    /// The client could not synthesize or play the reply
    TtsError { error: String },
    EndSession {},
    Ping {},
    Pong {},
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Reply text for display
    AiResponse { text: String },
    /// Reply text the client should speak
    SpeechRequest { text: String },
    /// The turn is over; the client may listen again
    ReadyForNextInput {
        #[serde(default)]
        keep_listening: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        reset_state: bool,
    },
    Error { message: String, recoverable: bool },
    PhaseChanged { phase: String, remaining_secs: u64 },
    SessionSummary { text: String },
    SessionEnded { reason: String },
    Ping {},
    Pong {},
}

impl ServerEvent {
    /// `ready-for-next-input{keep_listening:true}`
    pub fn ready() -> Self {
        ServerEvent::ReadyForNextInput {
            keep_listening: true,
            reset_state: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::AiResponse { .. } => "ai-response",
            ServerEvent::SpeechRequest { .. } => "speech-request",
            ServerEvent::ReadyForNextInput { .. } => "ready-for-next-input",
            ServerEvent::Error { .. } => "error",
            ServerEvent::PhaseChanged { .. } => "phase-changed",
            ServerEvent::SessionSummary { .. } => "session-summary",
            ServerEvent::SessionEnded { .. } => "session-ended",
            ServerEvent::Ping {} => "ping",
            ServerEvent::Pong {} => "pong",
        }
    }
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserSpeech { .. } => "user-speech",
            ClientEvent::SpeechEnded {} => "speech-ended",
            ClientEvent::TtsError { .. } => "tts-error",
            ClientEvent::EndSession {} => "end-session",
            ClientEvent::Ping {} => "ping",
            ClientEvent::Pong {} => "pong",
        }
    }
}

/// Decode one JSON text frame.
///
/// Frames may omit `data` (or send `null`) for events without a payload.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, ProtocolError> {
    let mut value: serde_json::Value =
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if let Some(object) = value.as_object_mut() {
        let missing = object.get("data").map_or(true, |data| data.is_null());
        if missing {
            object.insert("data".to_string(), serde_json::json!({}));
        }
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Encode one event as a JSON text frame
pub fn encode<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
