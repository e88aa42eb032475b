//! Inbound signaling dispatch
//!
//! Relay messages are routed to whichever negotiation session is current.
//! Replacing the session after a failure swaps the slot; messages addressed
//! to the old attempt then land on the new one, which refuses an answer it
//! did not ask for.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::NegotiationSession;
use crate::drive::ReadinessGate;
use crate::transport::WireMessage;

/// Holder for the current negotiation session
#[derive(Default)]
pub struct SessionSlot {
    current: ArcSwapOption<NegotiationSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, returning the one it replaces
    pub fn install(&self, session: Arc<NegotiationSession>) -> Option<Arc<NegotiationSession>> {
        self.current.swap(Some(session))
    }

    pub fn current(&self) -> Option<Arc<NegotiationSession>> {
        self.current.load_full()
    }

    pub fn clear(&self) -> Option<Arc<NegotiationSession>> {
        self.current.swap(None)
    }
}

impl ReadinessGate for SessionSlot {
    fn is_ready(&self) -> bool {
        match &*self.current.load() {
            Some(session) => session.is_ready(),
            None => false,
        }
    }
}

/// Route one inbound message to the current session
pub async fn dispatch(slot: &SessionSlot, message: WireMessage) {
    let Some(session) = slot.current() else {
        debug!("No session for inbound {}", message.event_name());
        return;
    };

    match message {
        WireMessage::Answer(payload) => {
            if let Err(e) = session.apply_answer(&payload).await {
                warn!("Answer not applied (session {}): {}", session.session_id(), e);
            }
        }
        WireMessage::Candidate(payload) => {
            if let Err(e) = session.apply_remote_candidate(&payload).await {
                debug!("Remote candidate not applied: {}", e);
            }
        }
        other => {
            debug!("Ignoring inbound {}", other.event_name());
        }
    }
}

/// Dispatch inbound messages until the relay closes or `cancel` fires
pub async fn run_dispatcher(
    mut inbound: mpsc::Receiver<WireMessage>,
    slot: Arc<SessionSlot>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => dispatch(&slot, message).await,
                None => {
                    info!("Relay inbound stream ended");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::transport::Transport;
    use crate::webrtc::backend::{peer_event_channel, PeerBackend, PeerEvent};
    use crate::webrtc::config::WebRtcConfig;
    use crate::webrtc::session::NegotiationState;
    use crate::webrtc::signaling::{encode_payload, IceCandidate, SessionDescription};
    use async_trait::async_trait;

    struct NullBackend;

    #[async_trait]
    impl PeerBackend for NullBackend {
        async fn attach_microphone(&self) -> Result<()> {
            Ok(())
        }
        async fn create_offer(&self) -> Result<SessionDescription> {
            Ok(SessionDescription::offer("v=0\r\n"))
        }
        async fn local_description(&self) -> Option<SessionDescription> {
            Some(SessionDescription::offer("v=0\r\n"))
        }
        async fn set_remote_description(&self, _: SessionDescription) -> Result<()> {
            Ok(())
        }
        async fn add_ice_candidate(&self, _: IceCandidate) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct DiscardTransport;

    impl Transport for DiscardTransport {
        fn send(&self, _: WireMessage) -> Result<()> {
            Ok(())
        }
    }

    async fn started_session() -> Arc<NegotiationSession> {
        let (tx, rx) = peer_event_channel();
        tx.send(PeerEvent::LocalCandidate(None)).unwrap();
        let session = Arc::new(NegotiationSession::new(
            "dispatch".into(),
            Arc::new(NullBackend),
            rx,
            WebRtcConfig::default(),
        ));
        session.start(Arc::new(DiscardTransport)).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_empty_slot_not_ready() {
        let slot = SessionSlot::new();
        assert!(!ReadinessGate::is_ready(&slot));
        dispatch(&slot, WireMessage::Answer("x".into())).await;
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn test_answer_routed_to_current_session() {
        let slot = SessionSlot::new();
        let session = started_session().await;
        slot.install(session.clone());
        assert!(!ReadinessGate::is_ready(&slot));

        let answer = encode_payload(&SessionDescription::answer("v=0\r\n")).unwrap();
        dispatch(&slot, WireMessage::Answer(answer)).await;
        assert_eq!(session.state(), NegotiationState::Ready);
        assert!(ReadinessGate::is_ready(&slot));
    }

    #[tokio::test]
    async fn test_replacement_resets_readiness() {
        let slot = SessionSlot::new();
        let first = started_session().await;
        slot.install(first);
        dispatch(&slot, WireMessage::Answer("garbage".into())).await;
        assert_eq!(
            slot.current().map(|s| s.state()),
            Some(NegotiationState::Failed)
        );

        let second = started_session().await;
        let old = slot.install(second.clone()).unwrap();
        assert_eq!(old.state(), NegotiationState::Failed);
        assert!(!ReadinessGate::is_ready(&slot));
        assert!(slot.clear().is_some());
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn test_dispatcher_stops_on_close() {
        let (tx, rx) = mpsc::channel(4);
        let slot = Arc::new(SessionSlot::new());
        let handle = tokio::spawn(run_dispatcher(rx, slot, CancellationToken::new()));
        tx.send(WireMessage::Command(vec![0])).await.unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
