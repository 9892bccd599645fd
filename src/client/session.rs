use super::playback::{AudioClip, PlaybackHandle, PlaybackOutput};
use super::recognition::{until, RecognitionHandle, RecognitionOutput};
use super::synth::VoiceSynthesizer;
use crate::channel::{ClientChannel, ClientEvent, ServerEvent};
use crate::config::ClientTiming;
use crate::error::{RecognitionError, SynthesisError};
use crate::turn::ConversationMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the UI layer should show
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotice {
    Interim(String),
    UserSaid(String),
    AssistantSaid(String),
    /// Inline message; the session carries on
    Retry(String),
    /// Instructions that need the user before listening can resume
    Blocking(String),
    Phase { name: String, remaining_secs: u64 },
    Summary(String),
    Ended(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    EndSession,
}

/// Lets the UI end the conversation
#[derive(Clone)]
pub struct ClientControl {
    commands: mpsc::UnboundedSender<ClientCommand>,
}

impl ClientControl {
    pub fn end_session(&self) {
        let _ = self.commands.send(ClientCommand::EndSession);
    }
}

/// Client side of one conversation.
///
/// Sends each finalized utterance to the server, voices replies through the
/// synthesizer and playback controller, and re-arms listening when the
/// server signals the turn is over.
pub struct ClientSession {
    channel: ClientChannel,
    recognition: RecognitionHandle,
    recognition_rx: mpsc::UnboundedReceiver<RecognitionOutput>,
    playback: PlaybackHandle,
    playback_rx: mpsc::UnboundedReceiver<PlaybackOutput>,
    synthesizer: Arc<dyn VoiceSynthesizer>,
    timing: ClientTiming,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    notices: mpsc::UnboundedSender<ClientNotice>,
    /// Optimistic display copy; the server holds the real history
    display: Vec<ConversationMessage>,
    speaking: bool,
    reply_deadline: Option<Instant>,
}

impl ClientSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: ClientChannel,
        recognition: RecognitionHandle,
        recognition_rx: mpsc::UnboundedReceiver<RecognitionOutput>,
        playback: PlaybackHandle,
        playback_rx: mpsc::UnboundedReceiver<PlaybackOutput>,
        synthesizer: Arc<dyn VoiceSynthesizer>,
        timing: ClientTiming,
    ) -> (Self, ClientControl, mpsc::UnboundedReceiver<ClientNotice>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let session = Self {
            channel,
            recognition,
            recognition_rx,
            playback,
            playback_rx,
            synthesizer,
            timing,
            commands: commands_rx,
            notices: notices_tx,
            display: Vec::new(),
            speaking: false,
            reply_deadline: None,
        };

        (
            session,
            ClientControl {
                commands: commands_tx,
            },
            notices_rx,
        )
    }

    /// Run until the server ends the session or the channel drops.
    /// Returns the display transcript.
    pub async fn run(mut self) -> Vec<ConversationMessage> {
        info!("Client session started");

        let (synth_tx, mut synth_rx) = mpsc::unbounded_channel::<Result<AudioClip, SynthesisError>>();

        self.listen().await;

        loop {
            tokio::select! {
                item = self.channel.recv() => match item {
                    Some(Ok(event)) => {
                        if !self.on_server_event(event, &synth_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => warn!("Dropping undecodable server event: {}", e),
                    None => {
                        self.notify(ClientNotice::Ended("connection closed".to_string()));
                        break;
                    }
                },
                Some(output) = self.recognition_rx.recv() => self.on_recognition(output),
                Some(result) = synth_rx.recv() => self.on_synthesized(result),
                Some(output) = self.playback_rx.recv() => self.on_playback(output),
                Some(command) = self.commands.recv() => match command {
                    ClientCommand::EndSession => {
                        info!("Ending session");
                        self.send(ClientEvent::EndSession {});
                    }
                },
                _ = until(self.reply_deadline) => {
                    self.reply_deadline = None;
                    self.on_reply_timeout().await;
                }
            }
        }

        self.recognition.shutdown();
        self.playback.shutdown();
        info!("Client session stopped");

        self.display
    }

    /// Returns false once the session is over
    async fn on_server_event(
        &mut self,
        event: ServerEvent,
        synth_tx: &mpsc::UnboundedSender<Result<AudioClip, SynthesisError>>,
    ) -> bool {
        debug!(event = event.name(), "Server event");

        match event {
            ServerEvent::AiResponse { text } => {
                self.reply_deadline = None;
                self.display.push(ConversationMessage::assistant(text.clone()));
                self.notify(ClientNotice::AssistantSaid(text));
            }
            ServerEvent::SpeechRequest { text } => {
                self.speaking = true;
                let synthesizer = Arc::clone(&self.synthesizer);
                let synth_tx = synth_tx.clone();
                tokio::spawn(async move {
                    let _ = synth_tx.send(synthesizer.synthesize(&text).await);
                });
            }
            ServerEvent::ReadyForNextInput {
                keep_listening,
                reset_state,
            } => {
                self.reply_deadline = None;
                self.recognition.set_processing(false);
                if reset_state {
                    self.display.clear();
                }
                if keep_listening && !self.speaking {
                    self.listen().await;
                }
            }
            ServerEvent::Error {
                message,
                recoverable,
            } => {
                if recoverable {
                    self.notify(ClientNotice::Retry(message));
                } else {
                    self.notify(ClientNotice::Blocking(message));
                }
            }
            ServerEvent::PhaseChanged {
                phase,
                remaining_secs,
            } => self.notify(ClientNotice::Phase {
                name: phase,
                remaining_secs,
            }),
            ServerEvent::SessionSummary { text } => self.notify(ClientNotice::Summary(text)),
            ServerEvent::SessionEnded { reason } => {
                self.notify(ClientNotice::Ended(reason));
                return false;
            }
            ServerEvent::Ping {} => self.send(ClientEvent::Pong {}),
            ServerEvent::Pong {} => {}
        }

        true
    }

    fn on_recognition(&mut self, output: RecognitionOutput) {
        match output {
            RecognitionOutput::Interim(text) => self.notify(ClientNotice::Interim(text)),
            RecognitionOutput::Utterance(text) => {
                self.recognition.set_processing(true);
                self.display.push(ConversationMessage::user(text.clone()));
                self.notify(ClientNotice::UserSaid(text.clone()));
                self.send(ClientEvent::UserSpeech { text });
                self.reply_deadline = Some(Instant::now() + self.timing.response_timeout());
            }
            RecognitionOutput::Fatal(e) => {
                warn!("Listening stopped: {}", e);
                self.notify(ClientNotice::Blocking(e.user_message()));
            }
        }
    }

    fn on_synthesized(&mut self, result: Result<AudioClip, SynthesisError>) {
        match result {
            Ok(clip) => self.playback.enqueue(clip),
            Err(e) => {
                warn!("Voice synthesis failed: {}", e);
                self.send(ClientEvent::TtsError {
                    error: e.to_string(),
                });
                self.playback.skip();
            }
        }
    }

    fn on_playback(&mut self, output: PlaybackOutput) {
        match output {
            PlaybackOutput::Started => debug!("Reply playing"),
            PlaybackOutput::SpeechEnded => {
                // the playback controller re-arms listening after its grace period
                self.speaking = false;
                self.send(ClientEvent::SpeechEnded {});
            }
        }
    }

    async fn on_reply_timeout(&mut self) {
        warn!("No reply within {:?}", self.timing.response_timeout());
        self.notify(ClientNotice::Retry(
            "The reply is taking too long. Please say that again.".to_string(),
        ));
        self.recognition.set_processing(false);
        if !self.speaking {
            self.listen().await;
        }
    }

    async fn listen(&self) {
        match self.recognition.start().await {
            Ok(()) => {}
            Err(RecognitionError::AlreadyRunning) => debug!("Already listening"),
            Err(e) if e.is_fatal() => self.notify(ClientNotice::Blocking(e.user_message())),
            Err(e) => debug!("Listening not started: {}", e),
        }
    }

    fn send(&self, event: ClientEvent) {
        if let Err(e) = self.channel.send(event) {
            debug!("Client event not sent: {}", e);
        }
    }

    fn notify(&self, notice: ClientNotice) {
        let _ = self.notices.send(notice);
    }
}
