//! WebRTC negotiation with the vehicle
//!
//! The remote peer (the vehicle) answers an offer relayed over the signaling
//! socket. Video is received; the local microphone is sent when available.
//!
//! ```text
//! NegotiationSession --offer/candidates--> Transport --> relay --> vehicle
//!        ^                                                  |
//!        +------- dispatch(answer/candidate) <--------------+
//!        |
//!   PeerBackend (RtcPeer over webrtc-rs)
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod mdns;
pub mod peer;
pub mod session;
pub mod signaling;

pub use backend::{PeerBackend, PeerEvent, PeerEvents};
pub use config::{TurnServer, WebRtcConfig};
pub use dispatch::{dispatch, run_dispatcher, SessionSlot};
pub use peer::RtcPeer;
pub use session::{NegotiationSession, NegotiationState};
pub use signaling::{ConnectionState, IceCandidate, SdpType, SessionDescription};
