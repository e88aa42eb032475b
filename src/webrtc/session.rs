//! Negotiation session
//!
//! One connection attempt to the vehicle. The session sends a single offer,
//! waits for one answer, and exposes a readiness flag that gates control
//! frame transmission.
//!
//! ```text
//! Idle --start()--> OfferSent --apply_answer(ok)--> Ready
//!   |                   |
//!   +----(failure)------+--(malformed / rejected)--> Failed
//! ```
//!
//! `Ready` and `Failed` are terminal. A failed attempt is replaced by a new
//! session; it never retries itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::backend::{PeerBackend, PeerEvent, PeerEvents};
use super::config::WebRtcConfig;
use super::peer::RtcPeer;
use super::signaling::{
    decode_payload, encode_payload, ConnectionState, IceCandidate, SdpType, SessionDescription,
};
use crate::drive::ReadinessGate;
use crate::error::{AppError, Result};
use crate::events::{EventBus, SystemEvent};
use crate::transport::{Transport, WireMessage};

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    Idle,
    OfferSent,
    Ready,
    Failed,
}

impl NegotiationState {
    fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, next),
            (Idle, OfferSent) | (Idle, Failed) | (OfferSent, Ready) | (OfferSent, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Ready | NegotiationState::Failed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Idle => write!(f, "idle"),
            NegotiationState::OfferSent => write!(f, "offer_sent"),
            NegotiationState::Ready => write!(f, "ready"),
            NegotiationState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Default)]
struct CandidateQueue {
    remote_set: bool,
    pending: Vec<IceCandidate>,
}

pub struct NegotiationSession {
    session_id: String,
    created_at: DateTime<Utc>,
    config: WebRtcConfig,
    backend: Arc<dyn PeerBackend>,
    peer_events: Mutex<Option<PeerEvents>>,
    state: watch::Sender<NegotiationState>,
    ready: AtomicBool,
    started: AtomicBool,
    answer_received: AtomicBool,
    candidates: Mutex<CandidateQueue>,
    remote_description: RwLock<Option<SessionDescription>>,
    connection_state: watch::Sender<Option<ConnectionState>>,
    events: Option<Arc<EventBus>>,
}

impl NegotiationSession {
    pub fn new(
        session_id: String,
        backend: Arc<dyn PeerBackend>,
        peer_events: PeerEvents,
        config: WebRtcConfig,
    ) -> Self {
        let (state, _) = watch::channel(NegotiationState::Idle);
        let (connection_state, _) = watch::channel(None);
        Self {
            session_id,
            created_at: Utc::now(),
            config,
            backend,
            peer_events: Mutex::new(Some(peer_events)),
            state,
            ready: AtomicBool::new(false),
            started: AtomicBool::new(false),
            answer_received: AtomicBool::new(false),
            candidates: Mutex::new(CandidateQueue::default()),
            remote_description: RwLock::new(None),
            connection_state,
            events: None,
        }
    }

    /// Create a session on a fresh webrtc-rs peer
    pub async fn with_rtc_peer(config: &WebRtcConfig) -> Result<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (peer, peer_events) = RtcPeer::new(config, session_id.clone()).await?;
        Ok(Self::new(session_id, peer, peer_events, config.clone()))
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    /// Whether control frames may be sent; set once, on reaching `Ready`
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub async fn local_description(&self) -> Option<SessionDescription> {
        self.backend.local_description().await
    }

    pub async fn remote_description(&self) -> Option<SessionDescription> {
        self.remote_description.read().await.clone()
    }

    /// Remote candidates waiting for the remote description
    pub async fn pending_candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().await.pending.clone()
    }

    /// Last peer connection state reported by the backend
    pub fn connection_state(&self) -> Option<ConnectionState> {
        *self.connection_state.borrow()
    }

    /// Begin negotiation: capture, offer, trickle candidates, send the offer
    ///
    /// Returns once the offer has been handed to the transport. Peer events
    /// after that are handled by a background task for the life of the
    /// backend.
    pub async fn start(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AppError::InvalidState(format!(
                "Negotiation {} already started",
                self.session_id
            )));
        }

        let mut peer_events = self.peer_events.lock().await.take().ok_or_else(|| {
            AppError::InvalidState("Peer event stream already consumed".to_string())
        })?;

        info!("Starting negotiation {}", self.session_id);

        if self.config.send_microphone {
            if let Err(e) = self.backend.attach_microphone().await {
                warn!("Microphone unavailable, continuing receive-only: {}", e);
                self.publish(SystemEvent::MediaDegraded {
                    session_id: self.session_id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let offer = match self.prepare_offer(&mut peer_events, transport.as_ref()).await {
            Ok(offer) => offer,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        if !self.transition(NegotiationState::OfferSent) {
            let e = AppError::InvalidState(format!(
                "Negotiation {} is {}, offer not sent",
                self.session_id,
                self.state()
            ));
            warn!("{}", e);
            return Err(e);
        }
        let sent = encode_payload(&offer).and_then(|payload| transport.send(WireMessage::Offer(payload)));
        if let Err(e) = sent {
            self.fail(&e);
            return Err(e);
        }
        info!("Offer sent (session {})", self.session_id);

        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = peer_events.recv().await {
                session.handle_peer_event(event, transport.as_ref());
            }
            debug!("Peer event stream closed (session {})", session.session_id);
        });

        Ok(())
    }

    /// Create the offer and trickle candidates until gathering completes
    /// or times out, returning the final local description
    async fn prepare_offer(
        &self,
        peer_events: &mut PeerEvents,
        transport: &dyn Transport,
    ) -> Result<SessionDescription> {
        self.backend.create_offer().await?;

        let timeout = Duration::from_millis(self.config.gathering_timeout_ms);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = peer_events.recv() => match event {
                    Some(PeerEvent::LocalCandidate(Some(candidate))) => {
                        self.send_local_candidate(transport, &candidate)?;
                    }
                    Some(PeerEvent::LocalCandidate(None)) => break,
                    Some(PeerEvent::Failure(reason)) => {
                        return Err(AppError::WebRtcError(reason));
                    }
                    Some(event) => self.handle_peer_event(event, transport),
                    None => {
                        return Err(AppError::WebRtcError(
                            "Peer backend closed during ICE gathering".to_string(),
                        ));
                    }
                },
                _ = &mut deadline => {
                    warn!(
                        "ICE gathering did not complete within {} ms, sending offer",
                        self.config.gathering_timeout_ms
                    );
                    break;
                }
            }
        }

        self.backend
            .local_description()
            .await
            .ok_or_else(|| AppError::WebRtcError("No local description".to_string()))
    }

    /// Apply the remote answer
    ///
    /// Only valid in `OfferSent`. A malformed or rejected answer fails the
    /// attempt.
    pub async fn apply_answer(&self, payload: &str) -> Result<()> {
        let state = self.state();
        if state != NegotiationState::OfferSent
            || self.answer_received.swap(true, Ordering::AcqRel)
        {
            return Err(AppError::InvalidState(format!(
                "Cannot apply answer in state {}",
                state
            )));
        }

        let description = match decode_answer(payload) {
            Ok(description) => description,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        if let Err(e) = self.backend.set_remote_description(description.clone()).await {
            self.fail(&e);
            return Err(e);
        }
        *self.remote_description.write().await = Some(description);

        let pending = {
            let mut queue = self.candidates.lock().await;
            queue.remote_set = true;
            std::mem::take(&mut queue.pending)
        };

        self.transition(NegotiationState::Ready);
        info!("Negotiation ready (session {})", self.session_id);

        if !pending.is_empty() {
            debug!("Applying {} queued remote candidates", pending.len());
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }

        Ok(())
    }

    /// Apply or queue a remote ICE candidate
    pub async fn apply_remote_candidate(&self, payload: &str) -> Result<()> {
        if self.state() == NegotiationState::Failed {
            debug!("Ignoring candidate for failed session {}", self.session_id);
            return Ok(());
        }

        let candidate: IceCandidate = match decode_payload("candidate", payload) {
            Ok(candidate) => candidate,
            Err(e) if self.is_ready() => {
                warn!("Ignoring malformed remote candidate: {}", e);
                return Err(e);
            }
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        {
            let mut queue = self.candidates.lock().await;
            if !queue.remote_set {
                debug!("Queueing remote candidate until remote description is set");
                queue.pending.push(candidate);
                return Ok(());
            }
        }

        self.apply_candidate(candidate).await;
        Ok(())
    }

    /// Close the underlying peer connection
    pub async fn close(&self) -> Result<()> {
        info!(
            "Closing negotiation session {} after {}s",
            self.session_id,
            (Utc::now() - self.created_at).num_seconds()
        );
        self.backend.close().await
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.backend.add_ice_candidate(candidate).await {
            warn!("Remote ICE candidate rejected: {}", e);
        }
    }

    fn send_local_candidate(&self, transport: &dyn Transport, candidate: &IceCandidate) -> Result<()> {
        let payload = encode_payload(candidate)?;
        transport.send(WireMessage::Candidate(payload))
    }

    fn handle_peer_event(&self, event: PeerEvent, transport: &dyn Transport) {
        match event {
            PeerEvent::LocalCandidate(Some(candidate)) => {
                if let Err(e) = self.send_local_candidate(transport, &candidate) {
                    warn!("Failed to send late local candidate: {}", e);
                }
            }
            PeerEvent::LocalCandidate(None) => {
                debug!("ICE gathering complete (session {})", self.session_id);
            }
            PeerEvent::TrackAdded { kind } => {
                self.publish(SystemEvent::TrackAdded {
                    session_id: self.session_id.clone(),
                    kind,
                });
            }
            PeerEvent::ConnectionStateChanged(state) => {
                self.connection_state.send_replace(Some(state));
                self.publish(SystemEvent::PeerConnectionState {
                    session_id: self.session_id.clone(),
                    state: state.to_string(),
                });
            }
            PeerEvent::Failure(reason) => {
                self.fail(&AppError::WebRtcError(reason));
            }
        }
    }

    /// Report an error and move to `Failed` unless already terminal
    fn fail(&self, error: &AppError) {
        warn!("Negotiation {} error: {}", self.session_id, error);
        self.publish(SystemEvent::NegotiationError {
            session_id: self.session_id.clone(),
            message: error.to_string(),
        });
        self.transition(NegotiationState::Failed);
    }

    fn transition(&self, next: NegotiationState) -> bool {
        let mut previous = None;
        let changed = self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                previous = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });

        if changed {
            if next == NegotiationState::Ready {
                self.ready.store(true, Ordering::Release);
            }
            debug!(
                "Negotiation {}: {} -> {}",
                self.session_id,
                previous.unwrap_or(NegotiationState::Idle),
                next
            );
            self.publish(SystemEvent::NegotiationStateChanged {
                session_id: self.session_id.clone(),
                state: next.to_string(),
            });
        }
        changed
    }

    fn publish(&self, event: SystemEvent) {
        if let Some(ref events) = self.events {
            events.publish(event);
        }
    }
}

impl ReadinessGate for NegotiationSession {
    fn is_ready(&self) -> bool {
        NegotiationSession::is_ready(self)
    }
}

fn decode_answer(payload: &str) -> Result<SessionDescription> {
    let description: SessionDescription = decode_payload("answer", payload)?;
    if description.sdp_type != SdpType::Answer {
        return Err(AppError::decode(
            "answer",
            format!("expected answer, got {}", description.sdp_type),
        ));
    }
    Ok(description)
}
