//! WebSocket client transport

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChannelTransport, WireMessage, DEFAULT_SEND_QUEUE};
use crate::error::{AppError, Result};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const INBOUND_QUEUE: usize = 64;

/// An open relay connection
pub struct WsConnection {
    /// Outbound side, shared by the loop and the negotiation session
    pub transport: ChannelTransport,
    /// Inbound signaling messages; closes when the socket does
    pub inbound: mpsc::Receiver<WireMessage>,
    /// Socket pump task
    pub task: JoinHandle<()>,
}

/// Connect to the relay and start the socket pump
pub async fn connect(url: &str, cancel: CancellationToken) -> Result<WsConnection> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| AppError::Transport(format!("Failed to connect to {}: {}", url, e)))?;
    info!("Connected to relay at {}", url);

    let (transport, outbound) = ChannelTransport::new(DEFAULT_SEND_QUEUE);
    let (inbound_tx, inbound) = mpsc::channel(INBOUND_QUEUE);
    let task = tokio::spawn(pump(ws_stream, outbound, inbound_tx, cancel));

    Ok(WsConnection {
        transport,
        inbound,
        task,
    })
}

async fn pump<S>(
    ws_stream: S,
    mut outbound: mpsc::Receiver<WireMessage>,
    inbound: mpsc::Sender<WireMessage>,
    cancel: CancellationToken,
) where
    S: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sender, mut receiver) = ws_stream.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize {}: {}", msg.event_name(), e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    warn!("Failed to send to relay, disconnecting");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(msg) = parse_inbound(&text) {
                            if inbound.send(msg).await.is_err() {
                                debug!("Inbound receiver dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        debug!("Received ping from relay");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!("Failed to send ping, disconnecting");
                    break;
                }
            }
        }
    }

    info!("Relay connection closed");
}

/// Parse an inbound text frame; unknown or malformed events are ignored
pub fn parse_inbound(text: &str) -> Option<WireMessage> {
    match WireMessage::from_json(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!("Ignoring inbound message: {}", e);
            None
        }
    }
}
