//! Error taxonomy for the turn protocol
//!
//! Every error is caught where it originates and turned into either a
//! user-visible message or a silent recovery that re-arms listening.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes reported by the platform speech-capture capability
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorKind {
    /// No speech was detected before the capability gave up
    #[error("no-speech")]
    NoSpeech,
    /// The capability was interrupted (often by our own stop)
    #[error("aborted")]
    Aborted,
    /// Microphone permission denied
    #[error("not-allowed")]
    NotAllowed,
    /// Speech service blocked by the platform
    #[error("service-not-allowed")]
    ServiceNotAllowed,
    /// Recognition backend unreachable
    #[error("network")]
    Network,
    /// No usable capture device
    #[error("audio-capture")]
    AudioCapture,
    /// Anything else the capability reports
    #[error("{0}")]
    Other(String),
}

impl RecognitionErrorKind {
    /// Fatal kinds end the current attempt and disable auto-restart
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotAllowed | Self::ServiceNotAllowed | Self::Network | Self::AudioCapture
        )
    }

    /// Kinds that are silently ignored
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::NoSpeech)
    }
}

/// Recognition controller errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("recognition already running")]
    AlreadyRunning,

    #[error("a turn is still processing")]
    TurnProcessing,

    #[error("recognition controller has shut down")]
    Closed,

    #[error("speech capability error: {0}")]
    Capability(RecognitionErrorKind),
}

impl RecognitionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Capability(kind) => kind.is_fatal(),
            Self::Closed => true,
            Self::AlreadyRunning | Self::TurnProcessing => false,
        }
    }

    /// Instructional text for the blocking prompt shown on fatal failures
    pub fn user_message(&self) -> String {
        match self {
            Self::Capability(RecognitionErrorKind::NotAllowed)
            | Self::Capability(RecognitionErrorKind::ServiceNotAllowed) => {
                "Microphone access is blocked. Allow microphone access and start again.".to_string()
            }
            Self::Capability(RecognitionErrorKind::Network) => {
                "Speech recognition lost its network connection. Check your connection and start again.".to_string()
            }
            Self::Capability(RecognitionErrorKind::AudioCapture) => {
                "No microphone was found. Connect one and start again.".to_string()
            }
            _ => "Speech recognition stopped unexpectedly.".to_string(),
        }
    }
}

/// Responder failure; recoverable per turn
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("responder returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("responder returned an empty completion")]
    EmptyCompletion,

    #[error("responder timed out after {0} ms")]
    Timeout(u64),

    #[error("responder request failed: {0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(_) => "That took too long. Please say it again.".to_string(),
            _ => "I couldn't come up with a reply just now. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Transport(e.to_string())
    }
}

/// Voice synthesizer failure; playback is skipped and listening resumes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("synthesizer returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesizer returned undecodable audio: {0}")]
    Decode(String),

    #[error("synthesizer request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        SynthesisError::Transport(e.to_string())
    }
}

/// Audio output failure; never fatal to the conversation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("audio source could not be loaded: {0}")]
    Load(String),

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Malformed, duplicate or out-of-place channel event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("unexpected binary frame")]
    BinaryFrame,

    #[error("channel closed")]
    ChannelClosed,
}

/// Invalid phase plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    #[error("at least one phase is required")]
    Empty,

    #[error("first phase must start at 0, found {0}")]
    FirstStartNotZero(f64),

    #[error("phase '{name}' has end {end} not after start {start}")]
    EmptyWindow { name: String, start: f64, end: f64 },

    #[error("phase '{name}' starts at {start} but previous phase ends at {previous_end}")]
    NotContiguous {
        name: String,
        start: f64,
        previous_end: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RecognitionErrorKind::NotAllowed.is_fatal());
        assert!(RecognitionErrorKind::ServiceNotAllowed.is_fatal());
        assert!(RecognitionErrorKind::Network.is_fatal());
        assert!(!RecognitionErrorKind::Aborted.is_fatal());
        assert!(!RecognitionErrorKind::NoSpeech.is_fatal());
        assert!(RecognitionErrorKind::NoSpeech.is_ignored());
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&RecognitionErrorKind::ServiceNotAllowed).unwrap();
        assert_eq!(json, "\"service-not-allowed\"");
        assert_eq!(RecognitionErrorKind::NoSpeech.to_string(), "no-speech");
        assert_eq!(
            RecognitionErrorKind::Other("language-not-supported".to_string()).to_string(),
            "language-not-supported"
        );
    }
}
