//! WebRTC configuration

use serde::{Deserialize, Serialize};

/// Public STUN server used when none is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// WebRTC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// STUN server URLs
    pub stun_servers: Vec<String>,
    /// TURN server configuration
    pub turn_servers: Vec<TurnServer>,
    /// Request the vehicle camera
    pub receive_video: bool,
    /// Request vehicle audio
    pub receive_audio: bool,
    /// Offer the local microphone to the vehicle speaker
    pub send_microphone: bool,
    /// How long to wait for ICE gathering before sending the offer anyway (ms)
    pub gathering_timeout_ms: u64,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            turn_servers: vec![],
            receive_video: true,
            receive_audio: false,
            send_microphone: true,
            gathering_timeout_ms: 5000,
        }
    }
}

/// TURN server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnServer {
    /// TURN server URLs (e.g., ["turn:turn.example.com:3478?transport=udp"])
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl TurnServer {
    pub fn new(url: String, username: String, credential: String) -> Self {
        Self {
            urls: vec![url],
            username,
            credential,
        }
    }
}
