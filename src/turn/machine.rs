//! Pure turn state machine
//!
//! [`TurnMachine::handle`] maps `(state, input)` to a new state plus a list
//! of [`Effect`]s. It never awaits, sleeps or performs I/O; the coordinator
//! runtime executes the effects and feeds results back in as inputs.

use super::model::{
    ConversationMessage, History, Session, SessionStatus, Turn, TurnKind, TurnPhase, TurnState,
};
use crate::channel::{ClientEvent, ServerEvent};
use crate::error::{ProtocolError, UpstreamError};
use crate::phase::{PhaseScheduler, SummaryTrigger};
use crate::responder::PhasePrompt;
use chrono::Utc;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Utterances shorter than this (after trimming) never reach the responder
pub const MIN_UTTERANCE_CHARS: usize = 2;

#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub debounce: Duration,
    pub settle_delay: Duration,
    pub history_window: usize,
    pub summary_prompt: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(300),
            history_window: 10,
            summary_prompt: "Summarize this conversation.".to_string(),
        }
    }
}

/// Everything the machine reacts to
#[derive(Debug, Clone)]
pub enum Input {
    Client(ClientEvent),
    Malformed(ProtocolError),
    ResponderFinished {
        turn_id: u64,
        result: Result<String, UpstreamError>,
    },
    Timer(Timer),
    /// Periodic phase check
    Tick,
    /// Global session timer ran out
    SessionExpired,
    /// Channel to the client is gone
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Emit `ready-for-next-input` for a spoken turn
    Settle { turn_id: u64 },
    /// Replay an utterance that arrived inside the debounce window
    Deferred { seq: u64 },
}

/// What the responder is asked to do for a turn
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderRequest {
    pub history: Vec<ConversationMessage>,
    pub prompt: PhasePrompt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(ServerEvent),
    InvokeResponder {
        turn_id: u64,
        request: ResponderRequest,
    },
    Schedule {
        after: Duration,
        timer: Timer,
    },
    /// Hand the end-of-session summary to persistence
    StoreSummary { session_id: String, text: String },
    /// Close the channel; the session is over
    Close,
}

pub struct TurnMachine {
    config: MachineConfig,
    scheduler: PhaseScheduler,
    summary_trigger: SummaryTrigger,
    state: TurnState,
    session: Session,
    history: History,
    current: Option<Turn>,
    next_turn_id: u64,
    last_completed_at: Option<Duration>,
    last_phase: Option<usize>,
    /// Utterances held back by the debounce window, oldest first
    deferred: VecDeque<String>,
    deferred_seq: u64,
    deferred_armed: bool,
    summary_pending: bool,
}

impl TurnMachine {
    pub fn new(session: Session, scheduler: PhaseScheduler, config: MachineConfig) -> Self {
        Self {
            config,
            scheduler,
            summary_trigger: SummaryTrigger::new(),
            state: TurnState::Idle,
            session,
            history: History::new(),
            current: None,
            next_turn_id: 1,
            last_completed_at: None,
            last_phase: None,
            deferred: VecDeque::new(),
            deferred_seq: 0,
            deferred_armed: false,
            summary_pending: false,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current_turn(&self) -> Option<&Turn> {
        self.current.as_ref()
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    /// Apply one input at `at` (time since session start)
    pub fn handle(&mut self, at: Duration, input: Input) -> Vec<Effect> {
        if self.state == TurnState::Ended {
            debug!(session_id = %self.session.id, ?input, "Session ended, ignoring input");
            return Vec::new();
        }

        let mut effects = Vec::new();

        match input {
            Input::Client(ClientEvent::UserSpeech { text }) => {
                self.on_utterance(at, text, &mut effects)
            }
            Input::Client(ClientEvent::SpeechEnded {}) => self.on_speech_ended(),
            Input::Client(ClientEvent::TtsError { error }) => {
                warn!(session_id = %self.session.id, %error, "Client failed to voice reply");
            }
            Input::Client(ClientEvent::EndSession {}) => {
                self.end("client ended session", &mut effects)
            }
            Input::Client(ClientEvent::Ping {}) => effects.push(Effect::Emit(ServerEvent::Pong {})),
            Input::Client(ClientEvent::Pong {}) => {}
            Input::Malformed(e) => self.on_malformed(e, &mut effects),
            Input::ResponderFinished { turn_id, result } => {
                self.on_responder_finished(at, turn_id, result, &mut effects)
            }
            Input::Timer(Timer::Settle { turn_id }) => self.on_settled(at, turn_id, &mut effects),
            Input::Timer(Timer::Deferred { seq }) => self.on_deferred(at, seq, &mut effects),
            Input::Tick => self.on_tick(at, &mut effects),
            Input::SessionExpired => self.end("session time is up", &mut effects),
            Input::Disconnected => {
                info!(session_id = %self.session.id, "Client disconnected");
                self.state = TurnState::Ended;
                self.session.status = SessionStatus::Ended;
                self.current = None;
                effects.push(Effect::Close);
            }
        }

        effects
    }

    fn on_utterance(&mut self, at: Duration, text: String, effects: &mut Vec<Effect>) {
        match self.state {
            TurnState::Processing => {
                debug!(session_id = %self.session.id, "Utterance while processing, dropped");
                effects.push(Effect::Emit(ServerEvent::ready()));
                return;
            }
            TurnState::Speaking => {
                // a ready signal is already scheduled for this turn
                debug!(session_id = %self.session.id, "Utterance while speaking, dropped");
                return;
            }
            TurnState::Idle | TurnState::Listening | TurnState::Ended => {}
        }

        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_UTTERANCE_CHARS {
            debug!(session_id = %self.session.id, "Utterance too short, ignored");
            effects.push(Effect::Emit(ServerEvent::ready()));
            return;
        }

        // queued utterances keep their order ahead of new ones
        if self.in_debounce(at) || !self.deferred.is_empty() {
            self.defer(at, trimmed.to_string(), effects);
            return;
        }

        self.start_reply_turn(at, trimmed.to_string(), effects);
    }

    fn in_debounce(&self, at: Duration) -> bool {
        self.last_completed_at
            .is_some_and(|completed| at.saturating_sub(completed) < self.config.debounce)
    }

    fn defer(&mut self, at: Duration, text: String, effects: &mut Vec<Effect>) {
        let key = text.to_lowercase();
        if self.deferred.iter().any(|queued| queued.to_lowercase() == key) {
            debug!(session_id = %self.session.id, "Repeated utterance inside debounce window, collapsed");
            return;
        }

        debug!(session_id = %self.session.id, queued = self.deferred.len() + 1, "Utterance inside debounce window, deferred");
        self.deferred.push_back(text);
        self.arm_deferred(at, effects);
    }

    /// Schedule the next deferred replay for when the debounce window closes
    fn arm_deferred(&mut self, at: Duration, effects: &mut Vec<Effect>) {
        if self.deferred_armed || self.deferred.is_empty() {
            return;
        }

        let since = self
            .last_completed_at
            .map_or(self.config.debounce, |completed| at.saturating_sub(completed));
        self.deferred_seq += 1;
        self.deferred_armed = true;
        effects.push(Effect::Schedule {
            after: self.config.debounce.saturating_sub(since),
            timer: Timer::Deferred {
                seq: self.deferred_seq,
            },
        });
    }

    fn start_reply_turn(&mut self, at: Duration, utterance: String, effects: &mut Vec<Effect>) {
        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;

        let history_mark = self.history.len();
        self.history.push(ConversationMessage::user(utterance.clone()));

        let phase = self.scheduler.current_phase(at);
        let request = ResponderRequest {
            history: self.history.recent(self.config.history_window).to_vec(),
            prompt: PhasePrompt::from_phase(phase),
        };

        info!(session_id = %self.session.id, turn_id, phase = %phase.name, "Turn accepted");

        self.current = Some(Turn {
            id: turn_id,
            session_id: self.session.id.clone(),
            kind: TurnKind::Reply,
            state: TurnPhase::Processing,
            utterance,
            response: None,
            started_at: Utc::now(),
            completed_at: None,
            history_mark,
        });
        self.state = TurnState::Processing;

        effects.push(Effect::InvokeResponder { turn_id, request });
    }

    fn start_summary_turn(&mut self, at: Duration, effects: &mut Vec<Effect>) {
        self.summary_pending = false;

        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;

        let phase = self.scheduler.current_phase(at);
        let request = ResponderRequest {
            history: self.history.all().to_vec(),
            prompt: PhasePrompt {
                text: self.config.summary_prompt.clone(),
                temperature: phase.temperature,
                max_tokens: phase.max_tokens,
            },
        };

        info!(session_id = %self.session.id, turn_id, "Summary turn started");

        self.current = Some(Turn {
            id: turn_id,
            session_id: self.session.id.clone(),
            kind: TurnKind::Summary,
            state: TurnPhase::Processing,
            utterance: String::new(),
            response: None,
            started_at: Utc::now(),
            completed_at: None,
            history_mark: self.history.len(),
        });
        self.state = TurnState::Processing;

        effects.push(Effect::InvokeResponder { turn_id, request });
    }

    fn on_responder_finished(
        &mut self,
        at: Duration,
        turn_id: u64,
        result: Result<String, UpstreamError>,
        effects: &mut Vec<Effect>,
    ) {
        let in_flight = self.state == TurnState::Processing
            && self.current.as_ref().is_some_and(|turn| turn.id == turn_id);
        if !in_flight {
            debug!(session_id = %self.session.id, turn_id, "Stale responder result ignored");
            return;
        }

        let result = result.and_then(|text| {
            let text = text.trim().to_string();
            if text.is_empty() {
                Err(UpstreamError::EmptyCompletion)
            } else {
                Ok(text)
            }
        });

        let Some(turn) = self.current.as_mut() else {
            return;
        };

        match result {
            Ok(text) => {
                self.history.push(ConversationMessage::assistant(text.clone()));
                turn.state = TurnPhase::Speaking;
                turn.response = Some(text.clone());
                let kind = turn.kind;
                self.state = TurnState::Speaking;

                effects.push(Effect::Emit(ServerEvent::AiResponse { text: text.clone() }));
                effects.push(Effect::Emit(ServerEvent::SpeechRequest { text: text.clone() }));
                if kind == TurnKind::Summary {
                    effects.push(Effect::Emit(ServerEvent::SessionSummary { text: text.clone() }));
                    effects.push(Effect::StoreSummary {
                        session_id: self.session.id.clone(),
                        text,
                    });
                }
                effects.push(Effect::Schedule {
                    after: self.config.settle_delay,
                    timer: Timer::Settle { turn_id },
                });
            }
            Err(e) => {
                warn!(session_id = %self.session.id, turn_id, error = %e, "Responder failed, rolling back turn");
                self.history.truncate(turn.history_mark);
                turn.state = TurnPhase::Failed;
                turn.completed_at = Some(Utc::now());
                self.current = None;
                self.state = TurnState::Idle;

                effects.push(Effect::Emit(ServerEvent::Error {
                    message: e.user_message(),
                    recoverable: e.is_recoverable(),
                }));
                effects.push(Effect::Emit(ServerEvent::ready()));

                if self.summary_pending {
                    self.start_summary_turn(at, effects);
                } else {
                    self.arm_deferred(at, effects);
                }
            }
        }
    }

    fn on_settled(&mut self, at: Duration, turn_id: u64, effects: &mut Vec<Effect>) {
        let speaking = self.state == TurnState::Speaking
            && self.current.as_ref().is_some_and(|turn| turn.id == turn_id);
        if !speaking {
            return;
        }

        if let Some(turn) = self.current.as_mut() {
            turn.state = TurnPhase::Ready;
            turn.completed_at = Some(Utc::now());
        }
        self.current = None;
        self.state = TurnState::Idle;
        self.session.turn_count += 1;
        self.last_completed_at = Some(at);

        info!(session_id = %self.session.id, turn_id, turns = self.session.turn_count, "Turn complete");

        effects.push(Effect::Emit(ServerEvent::ready()));

        if self.summary_pending {
            self.start_summary_turn(at, effects);
        } else {
            self.arm_deferred(at, effects);
        }
    }

    fn on_deferred(&mut self, at: Duration, seq: u64, effects: &mut Vec<Effect>) {
        if seq != self.deferred_seq {
            return;
        }
        self.deferred_armed = false;

        // re-armed when the turn in flight completes
        if !self.state.accepts_utterance() {
            return;
        }
        if self.in_debounce(at) {
            self.arm_deferred(at, effects);
            return;
        }
        if let Some(text) = self.deferred.pop_front() {
            self.start_reply_turn(at, text, effects);
        }
    }

    fn on_speech_ended(&mut self) {
        if self.state == TurnState::Idle {
            self.state = TurnState::Listening;
        } else {
            debug!(session_id = %self.session.id, state = ?self.state, "speech-ended noted");
        }
    }

    fn on_malformed(&mut self, error: ProtocolError, effects: &mut Vec<Effect>) {
        warn!(session_id = %self.session.id, %error, "Dropping malformed event");
        effects.push(Effect::Emit(ServerEvent::Error {
            message: error.to_string(),
            recoverable: true,
        }));
        if self.state != TurnState::Speaking {
            effects.push(Effect::Emit(ServerEvent::ready()));
        }
    }

    fn on_tick(&mut self, at: Duration, effects: &mut Vec<Effect>) {
        let phase = self.scheduler.current_phase(at);
        if self.last_phase != Some(phase.id) {
            info!(session_id = %self.session.id, phase = %phase.name, "Phase started");
            self.last_phase = Some(phase.id);
            effects.push(Effect::Emit(ServerEvent::PhaseChanged {
                phase: phase.name.clone(),
                remaining_secs: self.scheduler.remaining_time(at).as_secs(),
            }));
        }

        if self.summary_trigger.check(&self.scheduler, at) {
            if self.state.accepts_utterance() {
                self.start_summary_turn(at, effects);
            } else {
                self.summary_pending = true;
            }
        }
    }

    fn end(&mut self, reason: &str, effects: &mut Vec<Effect>) {
        info!(session_id = %self.session.id, reason, "Session ending");
        self.state = TurnState::Ended;
        self.session.status = SessionStatus::Ended;
        self.current = None;
        self.deferred.clear();
        effects.push(Effect::Emit(ServerEvent::SessionEnded {
            reason: reason.to_string(),
        }));
        effects.push(Effect::Close);
    }
}
