//! Client-side turn handling
//!
//! This module provides the device half of the protocol:
//! - `RecognitionController`: one finalized utterance per listening attempt
//! - `PlaybackController`: serialized reply playback, re-arming listening
//! - `VoiceSynthesizer`: reply text to audio
//! - `ClientSession`: wires the above to the session channel

pub mod console;
mod playback;
mod recognition;
mod session;
mod synth;
mod transcript;

pub use playback::{
    AudioClip, AudioOutput, PlaybackController, PlaybackEvent, PlaybackHandle, PlaybackOutput,
    PlaybackSink,
};
pub use recognition::{
    RecognitionController, RecognitionHandle, RecognitionOutput, Recognizer, RecognizerEvent,
    RecognizerFactory, RecognizerSink,
};
pub use session::{ClientCommand, ClientControl, ClientNotice, ClientSession};
pub use synth::{build_synthesizer, HttpSynthesizer, VoiceSynthesizer};
pub use transcript::{RecentUtterances, TranscriptBuffer};
