//! WebRTC peer connection backend

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice::mdns::MulticastDnsMode;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::backend::{peer_event_channel, PeerBackend, PeerEvent, PeerEventSender, PeerEvents};
use super::config::WebRtcConfig;
use super::mdns::{mdns_host_name, mdns_mode, mdns_mode_label};
use super::signaling::{ConnectionState, IceCandidate, SdpType, SessionDescription};
use crate::error::{AppError, Result};

/// webrtc-rs backed peer for one negotiation attempt
///
/// Video is received only. Audio is sent from the microphone track when one
/// is attached, and received when configured.
pub struct RtcPeer {
    session_id: String,
    config: WebRtcConfig,
    pc: Arc<RTCPeerConnection>,
    microphone: RwLock<Option<Arc<TrackLocalStaticSample>>>,
}

impl RtcPeer {
    /// Create the peer connection and its event channel
    pub async fn new(config: &WebRtcConfig, session_id: String) -> Result<(Arc<Self>, PeerEvents)> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| AppError::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            AppError::WebRtcError(format!("Failed to register interceptors: {}", e))
        })?;

        let mut setting_engine = SettingEngine::default();
        let mode = mdns_mode();
        setting_engine.set_ice_multicast_dns_mode(mode);
        if mode == MulticastDnsMode::QueryAndGather {
            setting_engine.set_multicast_dns_host_name(mdns_host_name(&session_id));
        }
        debug!("WebRTC mDNS mode: {} (session {})", mdns_mode_label(mode), session_id);

        let api = APIBuilder::new()
            .with_setting_engine(setting_engine)
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let mut ice_servers = vec![];
        for stun_url in &config.stun_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![stun_url.clone()],
                ..Default::default()
            });
        }
        for turn in &config.turn_servers {
            ice_servers.push(RTCIceServer {
                urls: turn.urls.clone(),
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            });
        }

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = api.new_peer_connection(rtc_config).await.map_err(|e| {
            AppError::WebRtcError(format!("Failed to create peer connection: {}", e))
        })?;

        let (events_tx, events_rx) = peer_event_channel();
        let peer = Arc::new(Self {
            session_id,
            config: config.clone(),
            pc: Arc::new(pc),
            microphone: RwLock::new(None),
        });
        peer.setup_event_handlers(events_tx);

        Ok((peer, events_rx))
    }

    fn setup_event_handlers(&self, events: PeerEventSender) {
        let session_id = self.session_id.clone();
        let state_events = events.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                let session_id = session_id.clone();

                Box::pin(async move {
                    let new_state = match s {
                        RTCPeerConnectionState::New => ConnectionState::New,
                        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
                        RTCPeerConnectionState::Connected => ConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => ConnectionState::Failed,
                        RTCPeerConnectionState::Closed => ConnectionState::Closed,
                        _ => return,
                    };

                    info!("Peer {} connection state: {}", session_id, new_state);
                    let _ = events.send(PeerEvent::ConnectionStateChanged(new_state));
                })
            }));

        let candidate_events = events.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let events = candidate_events.clone();

                Box::pin(async move {
                    let event = match candidate {
                        Some(c) => match c.to_json() {
                            Ok(init) => {
                                debug!("Local ICE candidate: {}", init.candidate);
                                PeerEvent::LocalCandidate(Some(IceCandidate {
                                    candidate: init.candidate,
                                    sdp_mid: init.sdp_mid,
                                    sdp_mline_index: init.sdp_mline_index,
                                    username_fragment: init.username_fragment,
                                }))
                            }
                            Err(e) => {
                                warn!("Failed to serialize local ICE candidate: {}", e);
                                return;
                            }
                        },
                        None => {
                            debug!("ICE gathering complete");
                            PeerEvent::LocalCandidate(None)
                        }
                    };
                    let _ = events.send(event);
                })
            }));

        let track_events = events;
        self.pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    let kind = track.kind().to_string();
                    info!("Remote {} track added", kind);
                    let _ = events.send(PeerEvent::TrackAdded { kind });
                })
            },
        ));
    }

    async fn add_receive_transceiver(&self, kind: RTPCodecType) -> Result<()> {
        self.pc
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to add {} transceiver: {}", kind, e)))?;
        Ok(())
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let result = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpType::Rollback => {
            return Err(AppError::decode("answer", "rollback is not supported"));
        }
    };
    result.map_err(|e| AppError::decode("answer", format!("Invalid SDP: {}", e)))
}

fn from_rtc_description(description: &RTCSessionDescription) -> Option<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => return None,
    };
    Some(SessionDescription {
        sdp_type,
        sdp: description.sdp.clone(),
    })
}

#[async_trait]
impl PeerBackend for RtcPeer {
    async fn attach_microphone(&self) -> Result<()> {
        let mut microphone = self.microphone.write().await;
        if microphone.is_some() {
            return Ok(());
        }

        let codec = RTCRtpCodecCapability {
            mime_type: "audio/opus".to_string(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
            rtcp_feedback: vec![],
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            codec,
            "microphone".to_string(),
            format!("teleop-{}", self.session_id),
        ));

        self.pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| AppError::MediaAccess(format!("Failed to add microphone track: {}", e)))?;

        *microphone = Some(track);
        info!("Microphone track attached (session {})", self.session_id);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.config.receive_video {
            self.add_receive_transceiver(RTPCodecType::Video).await?;
        }
        if self.config.receive_audio && self.microphone.read().await.is_none() {
            self.add_receive_transceiver(RTPCodecType::Audio).await?;
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to create offer: {}", e)))?;

        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to set local description: {}", e)))?;

        from_rtc_description(&offer)
            .ok_or_else(|| AppError::WebRtcError("Offer has no SDP type".to_string()))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let description = self.pc.local_description().await?;
        from_rtc_description(&description)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let description = to_rtc_description(description)?;
        self.pc
            .set_remote_description(description)
            .await
            .map_err(|e| AppError::decode("answer", format!("Remote description rejected: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        self.pc
            .close()
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to close peer connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_conversion() {
        let sdp = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";
        let rtc = to_rtc_description(SessionDescription::answer(sdp)).unwrap();
        assert_eq!(rtc.sdp_type, RTCSdpType::Answer);
        assert_eq!(
            from_rtc_description(&rtc),
            Some(SessionDescription::answer(sdp))
        );
    }

    #[test]
    fn test_rollback_rejected() {
        let description = SessionDescription {
            sdp_type: SdpType::Rollback,
            sdp: String::new(),
        };
        assert!(to_rtc_description(description).is_err());
    }

    #[tokio::test]
    async fn test_microphone_attached_once() {
        let config = WebRtcConfig {
            stun_servers: vec![],
            ..Default::default()
        };
        let (peer, _events) = RtcPeer::new(&config, "mic".to_string()).await.unwrap();
        peer.attach_microphone().await.unwrap();
        peer.attach_microphone().await.unwrap();
        let offer = peer.create_offer().await.unwrap();
        assert_eq!(offer.sdp.matches("m=audio").count(), 1);
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_offer_has_recvonly_video() {
        let config = WebRtcConfig {
            stun_servers: vec![],
            ..Default::default()
        };
        let (peer, _events) = RtcPeer::new(&config, "test".to_string()).await.unwrap();
        peer.attach_microphone().await.unwrap();
        let offer = peer.create_offer().await.unwrap();

        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=video"));
        assert!(offer.sdp.contains("a=recvonly"));
        assert!(offer.sdp.contains("m=audio"));
        assert!(peer.local_description().await.is_some());

        peer.close().await.unwrap();
    }
}
