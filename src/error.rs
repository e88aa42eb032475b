use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Input device identity not recognised by any control profile
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// Malformed offer/answer/candidate payload or a rejected description
    #[error("Negotiation decode error [{kind}]: {reason}")]
    NegotiationDecode { kind: String, reason: String },

    /// Camera or microphone unavailable
    #[error("Media access error: {0}")]
    MediaAccess(String),

    /// Frame computed but the session is not ready to carry it
    #[error("Transport not ready")]
    TransportNotReady,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Build a decode error for a signaling payload of the given kind
    pub fn decode(kind: &str, reason: impl std::fmt::Display) -> Self {
        AppError::NegotiationDecode {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
