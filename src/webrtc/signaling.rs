//! WebRTC signaling types and payload encoding
//!
//! Session descriptions and ICE candidates cross the relay as base64 (standard
//! alphabet, padded) of their browser-compatible JSON form, so an unmodified
//! remote peer can decode them with `JSON.parse(atob(data))`.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Session description type (`RTCSdpType`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Pranswer => write!(f, "pranswer"),
            SdpType::Answer => write!(f, "answer"),
            SdpType::Rollback => write!(f, "rollback"),
        }
    }
}

/// Session description (`RTCSessionDescriptionInit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate (`RTCIceCandidateInit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate string
    pub candidate: String,
    /// SDP mid (media ID)
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    /// SDP mline index
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
    /// Username fragment
    #[serde(rename = "usernameFragment", default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, mid: impl Into<String>, index: u16) -> Self {
        self.sdp_mid = Some(mid.into());
        self.sdp_mline_index = Some(index);
        self
    }
}

/// Peer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::New => write!(f, "new"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Failed => write!(f, "failed"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Encode a signaling value as base64 JSON
pub fn encode_payload<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(json))
}

/// Decode a base64 JSON signaling payload
///
/// `kind` names the payload ("answer", "candidate") in the error.
pub fn decode_payload<T: DeserializeOwned>(kind: &str, payload: &str) -> Result<T> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::decode(kind, format!("invalid base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::decode(kind, format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_json_matches_browser() {
        let desc = SessionDescription::offer("v=0\r\n");
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(json, r#"{"type":"offer","sdp":"v=0\r\n"}"#);
    }

    #[test]
    fn test_candidate_json_matches_browser() {
        let candidate = IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host")
            .with_mid("0", 0);
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["sdpMid"], "0");
        assert_eq!(value["sdpMLineIndex"], 0);
        assert!(value["usernameFragment"].is_null());
    }

    #[test]
    fn test_decode_browser_payload() {
        // btoa(JSON.stringify({type: "answer", sdp: "v=0"}))
        let payload = "eyJ0eXBlIjoiYW5zd2VyIiwic2RwIjoidj0wIn0=";
        let desc: SessionDescription = decode_payload("answer", payload).unwrap();
        assert_eq!(desc, SessionDescription::answer("v=0"));

        // browser candidates may omit fields
        let payload = STANDARD.encode(r#"{"candidate":"candidate:0 1 udp 1 1.2.3.4 9 typ host"}"#);
        let candidate: IceCandidate = decode_payload("candidate", &payload).unwrap();
        assert_eq!(candidate.sdp_mid, None);
    }

    #[test]
    fn test_encode_decode_payload() {
        let desc = SessionDescription::offer("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n");
        let payload = encode_payload(&desc).unwrap();
        let back: SessionDescription = decode_payload("offer", &payload).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_decode_errors() {
        let err = decode_payload::<SessionDescription>("answer", "%%%").unwrap_err();
        assert!(matches!(err, AppError::NegotiationDecode { .. }));

        let not_json = STANDARD.encode("hello");
        let err = decode_payload::<SessionDescription>("answer", &not_json).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));

        let wrong_type = STANDARD.encode(r#"{"type":"bogus","sdp":""}"#);
        assert!(decode_payload::<SessionDescription>("answer", &wrong_type).is_err());
    }
}
