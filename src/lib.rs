pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod phase;
pub mod responder;
pub mod session;
pub mod turn;

pub use channel::{duplex, ClientChannel, ClientEvent, ServerChannel, ServerEvent};
pub use client::{
    ClientNotice, ClientSession, PlaybackController, RecognitionController, VoiceSynthesizer,
};
pub use config::Config;
pub use error::{PhaseError, PlaybackError, ProtocolError, RecognitionError, SynthesisError, UpstreamError};
pub use http::{create_router, AppState};
pub use phase::{PhaseConfig, PhaseScheduler, SummaryTrigger};
pub use responder::{LogSummarySink, OpenAiResponder, Responder, SummarySink};
pub use session::{ConversationSession, SessionConfig, SessionStats};
pub use turn::{ConversationMessage, TurnCoordinator, TurnMachine, TurnState};
