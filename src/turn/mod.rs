//! Server-side turn coordination
//!
//! - `model`: sessions, turns and the append-only conversation history
//! - `machine`: the pure `(state, input) -> effects` transition function
//! - `coordinator`: the async runtime that executes effects for one session

mod coordinator;
pub mod machine;
mod model;

pub use coordinator::{CoordinatorTiming, SessionSnapshot, TurnCoordinator};
pub use machine::{Effect, Input, MachineConfig, ResponderRequest, Timer, TurnMachine};
pub use model::{
    normalize, ConversationMessage, History, Role, Session, SessionStatus, Turn, TurnKind,
    TurnPhase, TurnState,
};
