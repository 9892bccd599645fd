// Fakes for the collaborator traits, shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voice_turns::client::{
    AudioClip, AudioOutput, PlaybackSink, Recognizer, RecognizerFactory, RecognizerSink,
    VoiceSynthesizer,
};
use voice_turns::error::{PlaybackError, RecognitionErrorKind, SynthesisError, UpstreamError};
use voice_turns::phase::{PhaseConfig, PhaseScheduler};
use voice_turns::responder::{PhasePrompt, Responder, SummarySink};
use voice_turns::turn::ConversationMessage;

pub fn three_phases() -> PhaseScheduler {
    PhaseScheduler::new(vec![
        PhaseConfig::new("intro", 0.0, 60.0, "say hi"),
        PhaseConfig::new("middle", 60.0, 120.0, "dig in"),
        PhaseConfig::new("closing", 120.0, 180.0, "wrap up").with_summary(),
    ])
    .unwrap()
}

/// Poll `condition` while letting (paused) time move forward
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ----------------------------------------------------------------------------
// Responder
// ----------------------------------------------------------------------------

/// Replies after `delay`, popping scripted results first and echoing after
pub struct FakeResponder {
    delay: Duration,
    scripted: Mutex<VecDeque<Result<String, UpstreamError>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeResponder {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            scripted: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, result: Result<String, UpstreamError>) {
        self.scripted.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn generate(
        &self,
        history: &[ConversationMessage],
        prompt: &PhasePrompt,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.text.clone());

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
            Ok(format!("You said: {}", last))
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    stored: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn stored(&self) -> Vec<(String, String)> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummarySink for RecordingSink {
    async fn store(&self, session_id: &str, summary: &str) -> anyhow::Result<()> {
        self.stored
            .lock()
            .unwrap()
            .push((session_id.to_string(), summary.to_string()));
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Speech capture
// ----------------------------------------------------------------------------

struct Instance {
    sink: RecognizerSink,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct MicState {
    instances: Vec<Instance>,
    created: usize,
    fail_next: Option<RecognitionErrorKind>,
}

/// Speech capture capability driven by the test through the recorded sinks
#[derive(Default)]
pub struct FakeMic {
    state: Arc<Mutex<MicState>>,
}

impl FakeMic {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Instances created so far, including ones that failed to start
    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// Instances currently capturing audio
    pub fn active(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .instances
            .iter()
            .filter(|i| i.active.load(Ordering::SeqCst))
            .count()
    }

    /// Sink of the `index`-th successfully started instance
    pub fn sink(&self, index: usize) -> RecognizerSink {
        self.state.lock().unwrap().instances[index].sink.clone()
    }

    pub fn latest(&self) -> RecognizerSink {
        let state = self.state.lock().unwrap();
        state.instances.last().expect("no instance started").sink.clone()
    }

    /// The latest instance stops on its own
    pub fn end_latest(&self) {
        let sink = {
            let state = self.state.lock().unwrap();
            let instance = state.instances.last().expect("no instance started");
            instance.active.store(false, Ordering::SeqCst);
            instance.sink.clone()
        };
        sink.ended();
    }

    pub fn fail_next_start(&self, kind: RecognitionErrorKind) {
        self.state.lock().unwrap().fail_next = Some(kind);
    }
}

impl RecognizerFactory for FakeMic {
    fn create(&self) -> Box<dyn Recognizer> {
        self.state.lock().unwrap().created += 1;
        Box::new(FakeRecognizer {
            state: Arc::clone(&self.state),
            active: Arc::new(AtomicBool::new(false)),
        })
    }
}

struct FakeRecognizer {
    state: Arc<Mutex<MicState>>,
    active: Arc<AtomicBool>,
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn start(&mut self, sink: RecognizerSink) -> Result<(), RecognitionErrorKind> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.fail_next.take() {
            return Err(kind);
        }
        self.active.store(true, Ordering::SeqCst);
        state.instances.push(Instance {
            sink,
            active: Arc::clone(&self.active),
        });
        Ok(())
    }

    async fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn detach(&mut self) {}

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Audio output
// ----------------------------------------------------------------------------

#[derive(Default)]
struct SpeakerState {
    played: Vec<AudioClip>,
    sinks: Vec<PlaybackSink>,
    cuts: usize,
    releases: usize,
    playing: bool,
    fail_next: bool,
}

/// Audio output whose sources only end when the test says so
#[derive(Clone, Default)]
pub struct FakeSpeaker {
    state: Arc<Mutex<SpeakerState>>,
}

impl FakeSpeaker {
    pub fn played(&self) -> usize {
        self.state.lock().unwrap().played.len()
    }

    pub fn cuts(&self) -> usize {
        self.state.lock().unwrap().cuts
    }

    pub fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    pub fn sink(&self, index: usize) -> PlaybackSink {
        self.state.lock().unwrap().sinks[index].clone()
    }

    pub fn fail_next_play(&self) {
        self.state.lock().unwrap().fail_next = true;
    }
}

#[async_trait]
impl AudioOutput for FakeSpeaker {
    async fn play(&mut self, clip: AudioClip, sink: PlaybackSink) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(PlaybackError::Load("unsupported format".to_string()));
        }
        state.played.push(clip);
        state.sinks.push(sink);
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.cuts += 1;
    }

    fn rewind(&mut self) {}

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.releases += 1;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }
}

// ----------------------------------------------------------------------------
// Synthesis
// ----------------------------------------------------------------------------

pub struct FakeSynthesizer {
    fail: bool,
}

impl FakeSynthesizer {
    pub fn working() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl VoiceSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SynthesisError> {
        if self.fail {
            return Err(SynthesisError::Status {
                status: 403,
                body: "quota".to_string(),
            });
        }
        Ok(AudioClip::new(text.as_bytes().to_vec(), "audio/mpeg"))
    }
}
