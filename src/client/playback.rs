use super::recognition::{until, RecognitionHandle};
use crate::config::ClientTiming;
use crate::error::PlaybackError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Playable audio produced by the voice synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Ended,
    Error(PlaybackError),
}

/// Where the audio output reports the end of the current source
#[derive(Debug, Clone)]
pub struct PlaybackSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PlaybackEvent)>,
}

impl PlaybackSink {
    pub fn ended(&self) {
        let _ = self.tx.send((self.generation, PlaybackEvent::Ended));
    }

    pub fn error(&self, error: PlaybackError) {
        let _ = self.tx.send((self.generation, PlaybackEvent::Error(error)));
    }
}

/// The platform audio output
#[async_trait]
pub trait AudioOutput: Send {
    /// Load `clip` and start playing; completion is reported through `sink`
    async fn play(&mut self, clip: AudioClip, sink: PlaybackSink) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn rewind(&mut self);

    /// Free whatever the last source held on to
    fn release(&mut self);

    fn is_playing(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutput {
    Started,
    /// Playback finished, failed or was skipped
    SpeechEnded,
}

enum Command {
    Enqueue(AudioClip),
    Skip,
    Shutdown,
}

#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl PlaybackHandle {
    /// Play `clip`, cutting off whatever is playing now
    pub fn enqueue(&self, clip: AudioClip) {
        let _ = self.commands.send(Command::Enqueue(clip));
    }

    /// Treat the current reply as spoken without playing anything
    pub fn skip(&self) {
        let _ = self.commands.send(Command::Skip);
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Exclusive owner of the audio output; one source at a time
pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    recognition: RecognitionHandle,
    timing: ClientTiming,
    generation: u64,
    playing: bool,
    resume_deadline: Option<Instant>,
    events_tx: mpsc::UnboundedSender<(u64, PlaybackEvent)>,
    out: mpsc::UnboundedSender<PlaybackOutput>,
}

impl PlaybackController {
    pub fn spawn(
        output: Box<dyn AudioOutput>,
        recognition: RecognitionHandle,
        timing: ClientTiming,
    ) -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackOutput>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let controller = Self {
            output,
            recognition,
            timing,
            generation: 0,
            playing: false,
            resume_deadline: None,
            events_tx,
            out: out_tx,
        };

        tokio::spawn(controller.run(commands_rx, events_rx));

        (
            PlaybackHandle {
                commands: commands_tx,
            },
            out_rx,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(u64, PlaybackEvent)>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Enqueue(clip)) => self.enqueue(clip).await,
                    Some(Command::Skip) => {
                        self.cut();
                        self.finish();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some((generation, event)) = events.recv() => {
                    if generation != self.generation || !self.playing {
                        continue;
                    }
                    if let PlaybackEvent::Error(e) = event {
                        warn!("Playback failed: {}", e);
                    }
                    self.finish();
                }
                _ = until(self.resume_deadline) => {
                    self.resume_deadline = None;
                    if let Err(e) = self.recognition.start().await {
                        debug!("Listening not resumed after playback: {}", e);
                    }
                }
            }
        }

        self.cut();
        self.output.release();
        debug!("Playback controller stopped");
    }

    async fn enqueue(&mut self, clip: AudioClip) {
        self.resume_deadline = None;
        self.cut();

        self.generation += 1;
        let sink = PlaybackSink {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };

        info!(bytes = clip.bytes.len(), mime = %clip.mime_type, "Playing reply");
        match self.output.play(clip, sink).await {
            Ok(()) => {
                self.playing = true;
                let _ = self.out.send(PlaybackOutput::Started);
            }
            Err(e) => {
                warn!("Could not start playback: {}", e);
                self.finish();
            }
        }
    }

    /// Stop and rewind the current source, if any
    fn cut(&mut self) {
        if self.playing || self.output.is_playing() {
            self.output.pause();
            self.output.rewind();
        }
        self.playing = false;
    }

    fn finish(&mut self) {
        self.playing = false;
        self.output.release();
        let _ = self.out.send(PlaybackOutput::SpeechEnded);
        self.resume_deadline = Some(Instant::now() + self.timing.playback_grace());
    }
}
