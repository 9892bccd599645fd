use crate::config::Config;
use crate::phase::PhaseConfig;
use crate::turn::{CoordinatorTiming, MachineConfig};

/// Configuration for one conversation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-6f1c...")
    pub session_id: String,

    /// Debounce, settle delay, history window and summary prompt
    pub machine: MachineConfig,

    /// Responder timeout, phase tick and global session timer
    pub timing: CoordinatorTiming,

    /// Phase plan, ordered by start time
    pub phases: Vec<PhaseConfig>,
}

impl SessionConfig {
    /// Build a session config with a fresh id from the service config
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            session_id: new_session_id(),
            machine: MachineConfig {
                debounce: cfg.timing.debounce(),
                settle_delay: cfg.timing.settle_delay(),
                history_window: cfg.session.history_window,
                summary_prompt: cfg.responder.summary_prompt.clone(),
            },
            timing: CoordinatorTiming {
                responder_timeout: cfg.timing.responder_timeout(),
                phase_tick: cfg.session.phase_tick(),
                session_duration: cfg.session.duration(),
            },
            phases: cfg.phases.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4())
}
