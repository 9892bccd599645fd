use super::messages::{ClientEvent, ServerEvent};
use crate::error::ProtocolError;
use tokio::sync::mpsc;

/// An event as seen by the receiving side; frames that failed to decode
/// arrive as `Err` so the receiver decides how to recover.
pub type Inbound<T> = Result<T, ProtocolError>;

/// One end of a bidirectional session channel
pub struct ChannelEnd<In, Out> {
    tx: mpsc::UnboundedSender<Inbound<Out>>,
    rx: mpsc::UnboundedReceiver<Inbound<In>>,
}

/// The server's end: receives client events, sends server events
pub type ServerChannel = ChannelEnd<ClientEvent, ServerEvent>;

/// The client's end: receives server events, sends client events
pub type ClientChannel = ChannelEnd<ServerEvent, ClientEvent>;

/// Create a connected in-memory channel pair
pub fn duplex() -> (ClientChannel, ServerChannel) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    (
        ChannelEnd {
            tx: client_tx,
            rx: client_rx,
        },
        ChannelEnd {
            tx: server_tx,
            rx: server_rx,
        },
    )
}

impl<In, Out> ChannelEnd<In, Out> {
    pub fn send(&self, event: Out) -> Result<(), ProtocolError> {
        self.forward(Ok(event))
    }

    /// Pass along an inbound item as-is, including decode failures
    pub fn forward(&self, item: Inbound<Out>) -> Result<(), ProtocolError> {
        self.tx.send(item).map_err(|_| ProtocolError::ChannelClosed)
    }

    /// Next item from the peer; `None` once the peer is gone
    pub async fn recv(&mut self) -> Option<Inbound<In>> {
        self.rx.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn sender(&self) -> EventSender<Out> {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub fn split(self) -> (EventSender<Out>, EventReceiver<In>) {
        (EventSender { tx: self.tx }, EventReceiver { rx: self.rx })
    }
}

/// Sending half of a channel end
pub struct EventSender<Out> {
    tx: mpsc::UnboundedSender<Inbound<Out>>,
}

impl<Out> Clone for EventSender<Out> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Out> EventSender<Out> {
    pub fn send(&self, event: Out) -> Result<(), ProtocolError> {
        self.tx.send(Ok(event)).map_err(|_| ProtocolError::ChannelClosed)
    }

    pub fn forward(&self, item: Inbound<Out>) -> Result<(), ProtocolError> {
        self.tx.send(item).map_err(|_| ProtocolError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a channel end
pub struct EventReceiver<In> {
    rx: mpsc::UnboundedReceiver<Inbound<In>>,
}

impl<In> EventReceiver<In> {
    pub async fn recv(&mut self) -> Option<Inbound<In>> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}
