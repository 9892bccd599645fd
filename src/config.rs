use crate::phase::PhaseConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub timing: TurnTiming,
    #[serde(default)]
    pub client: ClientTiming,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub synthesizer: SynthesizerConfig,
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-turns".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Session-wide limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Global session timer; expiry ends the session
    pub duration_secs: u64,

    /// Most recent messages sent to the responder each turn
    pub history_window: usize,

    /// How often the phase scheduler is consulted
    pub phase_tick_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: 180,
            history_window: 10,
            phase_tick_ms: 1000,
        }
    }
}

impl SessionSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn phase_tick(&self) -> Duration {
        Duration::from_millis(self.phase_tick_ms)
    }
}

/// Server-side turn timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnTiming {
    /// Window after a completed turn in which new utterances are delayed
    pub debounce_ms: u64,

    /// Gap between `speech-request` and `ready-for-next-input`
    pub settle_delay_ms: u64,

    /// Upper bound on a single responder call
    pub responder_timeout_ms: u64,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            settle_delay_ms: 300,
            responder_timeout_ms: 30_000,
        }
    }
}

impl TurnTiming {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn responder_timeout(&self) -> Duration {
        Duration::from_millis(self.responder_timeout_ms)
    }
}

/// Client-side recognition and playback timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientTiming {
    /// Interim transcript is finalized after this much silence
    pub silence_threshold_ms: u64,

    /// Delay before restarting a capability that ended on its own
    pub restart_delay_ms: u64,

    /// Pause after tearing down a previous capability instance
    pub teardown_settle_ms: u64,

    /// How long finalized utterances are remembered for duplicate checks
    pub dedup_window_ms: u64,

    /// Maximum remembered utterances
    pub dedup_capacity: usize,

    /// Pause after playback ends before listening again
    pub playback_grace_ms: u64,

    /// How long to wait for the server to answer an utterance
    pub response_timeout_ms: u64,
}

impl Default for ClientTiming {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 2000,
            restart_delay_ms: 250,
            teardown_settle_ms: 100,
            dedup_window_ms: 5000,
            dedup_capacity: 8,
            playback_grace_ms: 400,
            response_timeout_ms: 30_000,
        }
    }
}

impl ClientTiming {
    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.silence_threshold_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn teardown_settle(&self) -> Duration {
        Duration::from_millis(self.teardown_settle_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn playback_grace(&self) -> Duration {
        Duration::from_millis(self.playback_grace_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// OpenAI-compatible chat completions endpoint used as the responder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub system_prompt: String,
    pub summary_prompt: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            system_prompt: "You are a friendly voice conversation partner. Keep replies short and spoken-style.".to_string(),
            summary_prompt: "Summarize this conversation in three short spoken sentences.".to_string(),
        }
    }
}

/// Which synthesizer the client speaks replies with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesizerBackend {
    /// Replies are printed only
    Text,
    /// JSON text-to-speech endpoint
    Http,
}

/// Text-to-speech endpoint used by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub backend: SynthesizerBackend,
    pub base_url: String,
    pub voice: String,
    pub language_code: String,
    pub api_key_env: String,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            backend: SynthesizerBackend::Text,
            base_url: "https://texttospeech.googleapis.com".to_string(),
            voice: "en-US-Neural2-F".to_string(),
            language_code: "en-US".to_string(),
            api_key_env: "GOOGLE_TTS_API_KEY".to_string(),
        }
    }
}

fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("warm-up", 0.0, 60.0, "Greet the user and find out what they want to talk about."),
        PhaseConfig::new("explore", 60.0, 120.0, "Ask follow-up questions and go deeper on the topic."),
        PhaseConfig::new("wrap-up", 120.0, 180.0, "Start wrapping up the conversation.").with_summary(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            session: SessionSettings::default(),
            timing: TurnTiming::default(),
            client: ClientTiming::default(),
            responder: ResponderConfig::default(),
            synthesizer: SynthesizerConfig::default(),
            phases: default_phases(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_TURNS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        crate::phase::PhaseScheduler::new(cfg.phases.clone()).context("Invalid phase plan")?;

        Ok(cfg)
    }
}
