//! Terminal stand-ins for the platform capabilities, used by `talk`.
//!
//! Each stdin line is delivered as a final recognition result, replies are
//! "played" by printing, and nothing is actually synthesized.

use super::playback::{AudioClip, AudioOutput, PlaybackSink};
use super::recognition::{Recognizer, RecognizerFactory, RecognizerSink};
use super::synth::VoiceSynthesizer;
use crate::error::{PlaybackError, RecognitionErrorKind, SynthesisError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

type SinkSlot = Arc<Mutex<Option<RecognizerSink>>>;

/// Reads stdin and routes lines to whichever console recognizer is active
pub struct ConsoleCapability {
    slot: SinkSlot,
}

impl ConsoleCapability {
    /// Start reading stdin. The receiver fires when stdin reaches EOF.
    pub fn spawn() -> (Arc<Self>, oneshot::Receiver<()>) {
        let slot: SinkSlot = Arc::new(Mutex::new(None));
        let (eof_tx, eof_rx) = oneshot::channel();

        let reader_slot = Arc::clone(&slot);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let sink = reader_slot.lock().ok().and_then(|slot| slot.clone());
                match sink {
                    Some(sink) => sink.final_result(line),
                    None => debug!("Not listening, input ignored"),
                }
            }
            let _ = eof_tx.send(());
        });

        (Arc::new(Self { slot }), eof_rx)
    }
}

impl RecognizerFactory for ConsoleCapability {
    fn create(&self) -> Box<dyn Recognizer> {
        Box::new(ConsoleRecognizer {
            slot: Arc::clone(&self.slot),
            active: false,
        })
    }
}

struct ConsoleRecognizer {
    slot: SinkSlot,
    active: bool,
}

impl ConsoleRecognizer {
    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    async fn start(&mut self, sink: RecognizerSink) -> Result<(), RecognitionErrorKind> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| RecognitionErrorKind::AudioCapture)?;
        *slot = Some(sink);
        self.active = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.clear();
        self.active = false;
    }

    fn detach(&mut self) {
        self.clear();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Audio output that finishes immediately
#[derive(Default)]
pub struct SilentOutput {
    playing: bool,
}

#[async_trait]
impl AudioOutput for SilentOutput {
    async fn play(&mut self, _clip: AudioClip, sink: PlaybackSink) -> Result<(), PlaybackError> {
        self.playing = true;
        sink.ended();
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn rewind(&mut self) {}

    fn release(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Synthesizer that wraps the text itself as the "audio"
pub struct TextOnlySynthesizer;

#[async_trait]
impl VoiceSynthesizer for TextOnlySynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SynthesisError> {
        Ok(AudioClip::new(text.as_bytes().to_vec(), "text/plain"))
    }
}
