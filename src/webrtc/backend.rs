//! Peer backend seam
//!
//! The negotiation session drives media capture and ICE gathering through
//! [`PeerBackend`]. Asynchronous notifications from the backend (gathered
//! candidates, arriving tracks, connection changes) flow back on a
//! [`PeerEvents`] channel handed out when the backend is created.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::signaling::{ConnectionState, IceCandidate, SessionDescription};
use crate::error::Result;

/// Notification from a peer backend
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A gathered local candidate; `None` marks the end of gathering
    LocalCandidate(Option<IceCandidate>),
    /// A remote media track arrived ("audio" or "video")
    TrackAdded { kind: String },
    ConnectionStateChanged(ConnectionState),
    /// Unrecoverable backend failure
    Failure(String),
}

pub type PeerEvents = mpsc::UnboundedReceiver<PeerEvent>;
pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

pub fn peer_event_channel() -> (PeerEventSender, PeerEvents) {
    mpsc::unbounded_channel()
}

/// Media capture and ICE provider for one connection attempt
#[async_trait]
pub trait PeerBackend: Send + Sync {
    /// Attach the local microphone as an outgoing audio track
    ///
    /// Fails with `AppError::MediaAccess` when no capture is available.
    async fn attach_microphone(&self) -> Result<()>;

    /// Create the offer and install it as the local description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Current local description, including gathered candidates
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
