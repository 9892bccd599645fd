use serde::{Deserialize, Serialize};

/// One phase of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Position in the ordered plan (assigned by the scheduler)
    #[serde(default)]
    pub id: usize,

    pub name: String,

    /// Window start in seconds since session start (inclusive)
    pub start_secs: f64,

    /// Window end in seconds (exclusive)
    pub end_secs: f64,

    /// Prompt fragment appended to the system prompt while active
    #[serde(default)]
    pub prompt: String,

    /// Ask for an end-of-session summary once this phase is reached
    #[serde(default)]
    pub require_summary: bool,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl PhaseConfig {
    pub fn new(name: &str, start_secs: f64, end_secs: f64, prompt: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            start_secs,
            end_secs,
            prompt: prompt.to_string(),
            require_summary: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_summary(mut self) -> Self {
        self.require_summary = true;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Half-open window check: `start <= elapsed < end`
    pub fn contains(&self, elapsed_secs: f64) -> bool {
        elapsed_secs >= self.start_secs && elapsed_secs < self.end_secs
    }
}
