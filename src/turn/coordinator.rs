use super::machine::{Effect, Input, MachineConfig, ResponderRequest, TurnMachine};
use super::model::{ConversationMessage, Session, TurnState};
use crate::channel::{EventSender, ServerChannel, ServerEvent};
use crate::error::UpstreamError;
use crate::phase::PhaseScheduler;
use crate::responder::{Responder, SummarySink};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Timers owned by the coordinator runtime
#[derive(Debug, Clone)]
pub struct CoordinatorTiming {
    pub responder_timeout: Duration,
    pub phase_tick: Duration,
    pub session_duration: Duration,
}

impl Default for CoordinatorTiming {
    fn default() -> Self {
        Self {
            responder_timeout: Duration::from_secs(30),
            phase_tick: Duration::from_secs(1),
            session_duration: Duration::from_secs(180),
        }
    }
}

/// Read-only view of a running session, refreshed after every input
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session: Session,
    pub state: TurnState,
    pub phase: String,
    pub remaining_secs: u64,
    pub elapsed_secs: f64,
    pub history: Vec<ConversationMessage>,
}

/// Server-side authority for one session's turns.
///
/// Owns the [`TurnMachine`], feeds it client events, timer expiries and
/// responder results one at a time, and executes the effects it returns.
pub struct TurnCoordinator {
    machine: TurnMachine,
    responder: Arc<dyn Responder>,
    summary_sink: Arc<dyn SummarySink>,
    timing: CoordinatorTiming,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    inbox_tx: mpsc::UnboundedSender<Input>,
    inbox_rx: mpsc::UnboundedReceiver<Input>,
}

impl TurnCoordinator {
    pub fn new(
        session: Session,
        scheduler: PhaseScheduler,
        config: MachineConfig,
        timing: CoordinatorTiming,
        responder: Arc<dyn Responder>,
        summary_sink: Arc<dyn SummarySink>,
    ) -> Self {
        let machine = TurnMachine::new(session, scheduler, config);
        let snapshot = Arc::new(RwLock::new(Self::capture(&machine, Duration::ZERO)));
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Self {
            machine,
            responder,
            summary_sink,
            timing,
            snapshot,
            inbox_tx,
            inbox_rx,
        }
    }

    /// Sender for injecting inputs from outside the channel (e.g. the HTTP API)
    pub fn inbox(&self) -> mpsc::UnboundedSender<Input> {
        self.inbox_tx.clone()
    }

    pub fn snapshot(&self) -> Arc<RwLock<SessionSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Drive the session until it ends or the client goes away
    pub async fn run(mut self, channel: ServerChannel) -> SessionSnapshot {
        let session_id = self.machine.session().id.clone();
        info!(session_id = %session_id, "Turn coordinator started");

        let (out, mut inbound) = channel.split();
        let started = Instant::now();

        let deadline = tokio::time::sleep(self.timing.session_duration);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.timing.phase_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                item = inbound.recv() => match item {
                    Some(Ok(event)) => Input::Client(event),
                    Some(Err(e)) => Input::Malformed(e),
                    None => Input::Disconnected,
                },
                Some(input) = self.inbox_rx.recv() => input,
                _ = ticker.tick() => Input::Tick,
                _ = &mut deadline => Input::SessionExpired,
            };

            let at = started.elapsed();
            let effects = self.machine.handle(at, input);
            let closing = self.execute(effects, &out);

            *self.snapshot.write().await = Self::capture(&self.machine, at);

            if closing || self.machine.state() == TurnState::Ended {
                break;
            }
        }

        inbound.close();
        info!(session_id = %session_id, turns = self.machine.session().turn_count, "Turn coordinator stopped");

        let snapshot = self.snapshot.read().await.clone();
        snapshot
    }

    /// Run effects in order; returns true once the channel should close
    fn execute(&self, effects: Vec<Effect>, out: &EventSender<ServerEvent>) -> bool {
        let mut closing = false;

        for effect in effects {
            match effect {
                Effect::Emit(event) => {
                    debug!(event = event.name(), "Emitting");
                    if out.send(event).is_err() {
                        debug!("Client channel closed, event dropped");
                    }
                }
                Effect::InvokeResponder { turn_id, request } => {
                    self.invoke_responder(turn_id, request);
                }
                Effect::Schedule { after, timer } => {
                    let inbox = self.inbox_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = inbox.send(Input::Timer(timer));
                    });
                }
                Effect::StoreSummary { session_id, text } => {
                    let sink = Arc::clone(&self.summary_sink);
                    tokio::spawn(async move {
                        if let Err(e) = sink.store(&session_id, &text).await {
                            error!(session_id = %session_id, "Failed to store summary: {:#}", e);
                        }
                    });
                }
                Effect::Close => closing = true,
            }
        }

        closing
    }

    fn invoke_responder(&self, turn_id: u64, request: ResponderRequest) {
        let responder = Arc::clone(&self.responder);
        let inbox = self.inbox_tx.clone();
        let limit = self.timing.responder_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(
                limit,
                responder.generate(&request.history, &request.prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout(limit.as_millis() as u64)),
            };
            let _ = inbox.send(Input::ResponderFinished { turn_id, result });
        });
    }

    fn capture(machine: &TurnMachine, at: Duration) -> SessionSnapshot {
        let scheduler = machine.scheduler();
        SessionSnapshot {
            session: machine.session().clone(),
            state: machine.state(),
            phase: scheduler.current_phase(at).name.clone(),
            remaining_secs: scheduler.remaining_time(at).as_secs(),
            elapsed_secs: at.as_secs_f64(),
            history: machine.history().all().to_vec(),
        }
    }
}
