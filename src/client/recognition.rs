//! Recognition controller
//!
//! Wraps an unreliable speech-capture capability so that every explicit
//! `start()` yields at most one finalized utterance. The capability may
//! emit any number of interim, final, end and error callbacks, end on its
//! own, or keep firing after it was replaced; the controller filters all of
//! that down to a single [`RecognitionOutput::Utterance`].

use super::transcript::{RecentUtterances, TranscriptBuffer};
use crate::config::ClientTiming;
use crate::error::{RecognitionError, RecognitionErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Callback from a capability instance
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    Interim(String),
    Final(String),
    /// The capability stopped on its own
    End,
    Error(RecognitionErrorKind),
}

/// Where a capability instance delivers its callbacks.
///
/// Each sink is stamped with the instance generation; events from a
/// replaced instance are discarded by the controller.
#[derive(Debug, Clone)]
pub struct RecognizerSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, RecognizerEvent)>,
}

impl RecognizerSink {
    pub fn interim(&self, text: impl Into<String>) {
        self.emit(RecognizerEvent::Interim(text.into()));
    }

    pub fn final_result(&self, text: impl Into<String>) {
        self.emit(RecognizerEvent::Final(text.into()));
    }

    pub fn ended(&self) {
        self.emit(RecognizerEvent::End);
    }

    pub fn error(&self, kind: RecognitionErrorKind) {
        self.emit(RecognizerEvent::Error(kind));
    }

    pub fn emit(&self, event: RecognizerEvent) {
        let _ = self.tx.send((self.generation, event));
    }
}

/// One instance of the platform speech-capture capability
#[async_trait]
pub trait Recognizer: Send {
    /// Begin capturing; callbacks go to `sink` until detached
    async fn start(&mut self, sink: RecognizerSink) -> Result<(), RecognitionErrorKind>;

    async fn stop(&mut self);

    /// Drop the callback sink so late events go nowhere
    fn detach(&mut self);

    fn is_active(&self) -> bool;
}

/// Creates fresh capability instances
pub trait RecognizerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Recognizer>;
}

/// What the controller reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutput {
    Interim(String),
    /// The one finalized utterance for this listening attempt
    Utterance(String),
    /// Fatal capability error; auto-restart is off until the next `start()`
    Fatal(RecognitionError),
}

enum Command {
    Start(oneshot::Sender<Result<(), RecognitionError>>),
    Stop(oneshot::Sender<()>),
    SetProcessing(bool),
    Shutdown,
}

/// Cloneable handle to a running [`RecognitionController`]
#[derive(Clone)]
pub struct RecognitionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RecognitionHandle {
    /// Begin a listening attempt.
    ///
    /// Rejected while an attempt is already running or a turn is processing.
    pub async fn start(&self) -> Result<(), RecognitionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Start(tx))
            .map_err(|_| RecognitionError::Closed)?;
        rx.await.map_err(|_| RecognitionError::Closed)?
    }

    /// End the attempt, flushing any buffered interim text as the utterance
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Stop(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn set_processing(&self, processing: bool) {
        let _ = self.commands.send(Command::SetProcessing(processing));
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Stopped,
    Listening,
}

/// Exclusive owner of the active capability instance
pub struct RecognitionController {
    factory: Arc<dyn RecognizerFactory>,
    timing: ClientTiming,
    instance: Option<Box<dyn Recognizer>>,
    generation: u64,
    intent: Intent,
    processing: bool,
    alive: bool,
    buffer: TranscriptBuffer,
    recent: RecentUtterances,
    silence_deadline: Option<Instant>,
    restart_deadline: Option<Instant>,
    events_tx: mpsc::UnboundedSender<(u64, RecognizerEvent)>,
    out: mpsc::UnboundedSender<RecognitionOutput>,
}

impl RecognitionController {
    /// Spawn the controller task
    pub fn spawn(
        factory: Arc<dyn RecognizerFactory>,
        timing: ClientTiming,
    ) -> (RecognitionHandle, mpsc::UnboundedReceiver<RecognitionOutput>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let controller = Self {
            factory,
            recent: RecentUtterances::new(timing.dedup_window(), timing.dedup_capacity),
            timing,
            instance: None,
            generation: 0,
            intent: Intent::Stopped,
            processing: false,
            alive: true,
            buffer: TranscriptBuffer::new(),
            silence_deadline: None,
            restart_deadline: None,
            events_tx,
            out: out_tx,
        };

        tokio::spawn(controller.run(commands_rx, events_rx));

        (
            RecognitionHandle {
                commands: commands_tx,
            },
            out_rx,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(u64, RecognizerEvent)>,
    ) {
        info!("Recognition controller started");

        while self.alive {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => self.shutdown().await,
                },
                Some((generation, event)) = events.recv() => {
                    if generation == self.generation {
                        self.on_event(event).await;
                    } else {
                        debug!(generation, current = self.generation, "Stale recognizer event dropped");
                    }
                }
                _ = until(self.silence_deadline) => {
                    self.silence_deadline = None;
                    self.on_silence().await;
                }
                _ = until(self.restart_deadline) => {
                    self.restart_deadline = None;
                    self.on_restart_due().await;
                }
            }
        }

        info!("Recognition controller stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::SetProcessing(processing) => self.processing = processing,
            Command::Shutdown => self.shutdown().await,
        }
    }

    async fn start(&mut self) -> Result<(), RecognitionError> {
        if self.intent == Intent::Listening {
            return Err(RecognitionError::AlreadyRunning);
        }
        if self.processing {
            return Err(RecognitionError::TurnProcessing);
        }

        self.intent = Intent::Listening;
        self.buffer.reset();
        self.silence_deadline = None;
        self.restart_deadline = None;

        if let Err(kind) = self.launch().await {
            if kind.is_fatal() {
                self.intent = Intent::Stopped;
                return Err(RecognitionError::Capability(kind));
            }
            warn!(%kind, "Recognizer failed to start, retrying");
            self.schedule_restart();
        }

        info!("Listening");
        Ok(())
    }

    async fn stop(&mut self) {
        self.intent = Intent::Stopped;
        self.silence_deadline = None;
        self.restart_deadline = None;

        if let Some(text) = self.buffer.take_interim() {
            self.emit_utterance(text);
        }

        self.release_instance().await;
    }

    async fn shutdown(&mut self) {
        self.alive = false;
        self.intent = Intent::Stopped;
        self.silence_deadline = None;
        self.restart_deadline = None;
        self.release_instance().await;
    }

    /// Replace any previous instance with a fresh one
    async fn launch(&mut self) -> Result<(), RecognitionErrorKind> {
        if self.instance.is_some() {
            self.release_instance().await;
            tokio::time::sleep(self.timing.teardown_settle()).await;
        }

        self.generation += 1;
        let sink = RecognizerSink {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };

        let mut instance = self.factory.create();
        instance.start(sink).await?;
        self.instance = Some(instance);

        debug!(generation = self.generation, "Recognizer instance started");
        Ok(())
    }

    async fn release_instance(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            instance.detach();
            if instance.is_active() {
                instance.stop().await;
            }
        }
    }

    async fn on_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Interim(text) => {
                if self.intent != Intent::Listening {
                    return;
                }
                let now = Instant::now();
                self.buffer.set_interim(&text, now);
                self.silence_deadline = Some(now + self.timing.silence_threshold());
                let _ = self.out.send(RecognitionOutput::Interim(text));
            }
            RecognizerEvent::Final(text) => {
                if self.intent != Intent::Listening {
                    return;
                }
                self.silence_deadline = None;
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                if self.recent.is_duplicate(&text, Instant::now()) {
                    debug!(%text, "Duplicate final result suppressed");
                    self.buffer.reset();
                    return;
                }
                self.finish(text).await;
            }
            RecognizerEvent::End => {
                debug!("Recognizer ended on its own");
                if let Some(instance) = self.instance.as_mut() {
                    instance.detach();
                }
                self.instance = None;

                if !self.wants_audio() {
                    self.park().await;
                    return;
                }
                match self.buffer.take_interim() {
                    Some(text) => self.finish(text).await,
                    None => self.schedule_restart(),
                }
            }
            RecognizerEvent::Error(kind) => self.on_error(kind).await,
        }
    }

    async fn on_error(&mut self, kind: RecognitionErrorKind) {
        if kind.is_ignored() {
            debug!(%kind, "Recognizer error ignored");
            return;
        }

        if kind.is_fatal() {
            warn!(%kind, "Fatal recognizer error");
            self.intent = Intent::Stopped;
            self.silence_deadline = None;
            self.restart_deadline = None;
            self.release_instance().await;
            let _ = self
                .out
                .send(RecognitionOutput::Fatal(RecognitionError::Capability(kind)));
            return;
        }

        if self.wants_audio() {
            debug!(%kind, "Recognizer interrupted, restarting");
            self.schedule_restart();
        } else {
            debug!(%kind, "Recognizer interrupted while idle");
            self.park().await;
        }
    }

    async fn on_silence(&mut self) {
        if self.intent != Intent::Listening {
            return;
        }
        if let Some(text) = self.buffer.take_interim() {
            debug!("Silence threshold reached, finalizing interim transcript");
            self.finish(text).await;
        }
    }

    async fn on_restart_due(&mut self) {
        if !self.wants_audio() {
            self.park().await;
            return;
        }
        if let Err(kind) = self.launch().await {
            if kind.is_fatal() {
                self.on_error(kind).await;
            } else {
                warn!(%kind, "Recognizer restart failed, retrying");
                self.schedule_restart();
            }
        }
    }

    /// Close the attempt with `text` as its utterance
    async fn finish(&mut self, text: String) {
        self.intent = Intent::Stopped;
        self.silence_deadline = None;
        self.restart_deadline = None;
        self.emit_utterance(text);
        self.release_instance().await;
    }

    fn emit_utterance(&mut self, text: String) {
        let now = Instant::now();
        self.buffer.finalize(&text, now);
        self.recent.remember(&text, now);
        info!(%text, "Utterance finalized");
        let _ = self.out.send(RecognitionOutput::Utterance(text));
    }

    /// Give up on the attempt without an utterance; the next `start()` begins fresh
    async fn park(&mut self) {
        self.intent = Intent::Stopped;
        self.silence_deadline = None;
        self.restart_deadline = None;
        self.release_instance().await;
    }

    fn schedule_restart(&mut self) {
        self.restart_deadline = Some(Instant::now() + self.timing.restart_delay());
    }

    fn wants_audio(&self) -> bool {
        self.alive && self.intent == Intent::Listening && !self.processing
    }
}

/// Sleep until `deadline`, or forever when there is none
pub(crate) async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
