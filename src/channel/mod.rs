//! Session channel between client device and server
//!
//! Events are JSON text frames of the form `{"event": <name>, "data": {...}}`.
//! The in-memory [`duplex`] pair is the transport both sides are written
//! against; the WebSocket bridges on either side feed it.

mod duplex;
pub mod messages;
mod ws;

pub use duplex::{duplex, ChannelEnd, ClientChannel, EventReceiver, EventSender, Inbound, ServerChannel};
pub use messages::{ClientEvent, ServerEvent};
pub use ws::connect;
