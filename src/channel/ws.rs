use super::duplex::{duplex, ClientChannel};
use super::messages::{self, ServerEvent};
use crate::error::ProtocolError;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Open a WebSocket session channel to a server's `/ws` endpoint
pub async fn connect(url: &str) -> Result<ClientChannel> {
    info!("Connecting to {}", url);

    let (stream, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    let (mut ws_tx, mut ws_rx) = stream.split();
    let (client, bridge) = duplex();
    let (to_client, mut from_client) = bridge.split();

    // Outgoing: client events -> text frames
    tokio::spawn(async move {
        while let Some(item) = from_client.recv().await {
            let Ok(event) = item else { continue };
            let frame = match messages::encode(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        debug!("Client writer stopped");
    });

    // Incoming: text frames -> server events
    tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            let item = match msg {
                Ok(Message::Text(text)) => messages::decode::<ServerEvent>(&text),
                Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            };
            if to_client.forward(item).is_err() {
                break;
            }
        }
        debug!("Client reader stopped");
    });

    info!("Connected to {}", url);

    Ok(client)
}
