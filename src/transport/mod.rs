//! Reliable message transport to the vehicle relay
//!
//! Messages travel as JSON text frames shaped `{"event": ..., "data": ...}`:
//!
//! | event       | data                                           |
//! |-------------|------------------------------------------------|
//! | `command`   | control frame bytes as an integer array        |
//! | `offer`     | base64 of the JSON session description         |
//! | `answer`    | base64 of the JSON session description         |
//! | `candidate` | base64 of the JSON ICE candidate               |

pub mod ws;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{AppError, Result};

pub use ws::{connect, WsConnection};

/// Default outbound queue depth
pub const DEFAULT_SEND_QUEUE: usize = 64;

/// Signaling and control message envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum WireMessage {
    Command(Vec<u8>),
    Offer(String),
    Answer(String),
    Candidate(String),
}

impl WireMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            WireMessage::Command(_) => "command",
            WireMessage::Offer(_) => "offer",
            WireMessage::Answer(_) => "answer",
            WireMessage::Candidate(_) => "candidate",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Outbound message sink
///
/// `send` must not block: the transmission loop calls it from its tick.
pub trait Transport: Send + Sync {
    fn send(&self, message: WireMessage) -> Result<()>;
}

/// Transport backed by a bounded channel drained by a writer task
///
/// A full queue rejects the message instead of waiting.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<WireMessage>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WireMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: WireMessage) -> Result<()> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(m) => {
                AppError::Transport(format!("Send queue full, dropping {}", m.event_name()))
            }
            TrySendError::Closed(_) => AppError::Transport("Transport closed".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let json = WireMessage::Command(vec![127, 0, 127, 127, 127, 0])
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"event":"command","data":[127,0,127,127,127,0]}"#);

        let json = WireMessage::Offer("eyJ0eXBlIjoib2ZmZXIifQ==".into())
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"event":"offer","data":"eyJ0eXBlIjoib2ZmZXIifQ=="}"#);
    }

    #[test]
    fn test_parse_inbound() {
        let msg = WireMessage::from_json(r#"{"event":"answer","data":"abc"}"#).unwrap();
        assert_eq!(msg, WireMessage::Answer("abc".into()));
        assert!(WireMessage::from_json(r#"{"event":"telemetry","data":1}"#).is_err());
    }

    #[tokio::test]
    async fn test_channel_transport_full_drops() {
        let (transport, mut rx) = ChannelTransport::new(1);
        transport.send(WireMessage::Command(vec![1])).unwrap();
        let err = transport.send(WireMessage::Command(vec![2])).unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));

        assert_eq!(rx.recv().await, Some(WireMessage::Command(vec![1])));
        transport.send(WireMessage::Command(vec![3])).unwrap();
        assert_eq!(rx.recv().await, Some(WireMessage::Command(vec![3])));
    }

    #[test]
    fn test_channel_transport_closed() {
        let (transport, rx) = ChannelTransport::new(4);
        drop(rx);
        assert!(transport.is_closed());
        assert!(transport.send(WireMessage::Command(vec![])).is_err());
    }
}
