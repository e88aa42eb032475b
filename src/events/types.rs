//! Status event types
//!
//! Defines all status reports that can be broadcast through the event bus.

use serde::{Deserialize, Serialize};

/// Status event enumeration
///
/// All events are tagged with their event name for serialization:
/// ```json
/// {
///   "event": "control.gear_changed",
///   "data": { "gear": "3" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    // ============================================================================
    // Control Events
    // ============================================================================
    /// The active input device changed classification
    #[serde(rename = "control.device_changed")]
    DeviceChanged {
        /// Profile name: "keyboard", "xbox", "g27", "tgt", "unsupported", "disconnected"
        profile: String,
        /// Raw device identity string
        identity: String,
        /// Whether the encoder can produce commands for it
        supported: bool,
    },

    /// Input device identity was not recognised; neutral frames are being produced
    #[serde(rename = "control.unsupported_device")]
    UnsupportedDevice {
        /// Raw device identity string
        identity: String,
    },

    /// Gear changed after a shift edge
    #[serde(rename = "control.gear_changed")]
    GearChanged {
        /// "R", "N" or the forward gear number
        gear: String,
    },

    /// Steering trim changed
    #[serde(rename = "control.trim_changed")]
    TrimChanged { trim: i16 },

    /// Camera pan/tilt recentered
    #[serde(rename = "control.camera_recentered")]
    CameraRecentered,

    /// Local audio volume changed
    #[serde(rename = "audio.volume_changed")]
    VolumeChanged {
        /// Level 0-100
        level: u8,
        muted: bool,
    },

    // ============================================================================
    // Negotiation Events
    // ============================================================================
    /// Negotiation session state changed
    #[serde(rename = "negotiation.state_changed")]
    NegotiationStateChanged {
        session_id: String,
        /// "idle", "offer_sent", "ready", "failed"
        state: String,
    },

    /// Negotiation attempt aborted
    #[serde(rename = "negotiation.error")]
    NegotiationError { session_id: String, message: String },

    /// Peer connection state changed
    #[serde(rename = "peer.connection_state")]
    PeerConnectionState { session_id: String, state: String },

    /// Remote media track arrived
    #[serde(rename = "media.track_added")]
    TrackAdded {
        session_id: String,
        /// "audio" or "video"
        kind: String,
    },

    /// Local capture unavailable, session continues receive-only
    #[serde(rename = "media.degraded")]
    MediaDegraded { session_id: String, reason: String },

    // ============================================================================
    // System Events
    // ============================================================================
    /// Non-fatal error report
    #[serde(rename = "system.error")]
    SystemError {
        module: String,
        severity: String,
        message: String,
    },
}

impl SystemEvent {
    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::DeviceChanged { .. } => "control.device_changed",
            Self::UnsupportedDevice { .. } => "control.unsupported_device",
            Self::GearChanged { .. } => "control.gear_changed",
            Self::TrimChanged { .. } => "control.trim_changed",
            Self::CameraRecentered => "control.camera_recentered",
            Self::VolumeChanged { .. } => "audio.volume_changed",
            Self::NegotiationStateChanged { .. } => "negotiation.state_changed",
            Self::NegotiationError { .. } => "negotiation.error",
            Self::PeerConnectionState { .. } => "peer.connection_state",
            Self::TrackAdded { .. } => "media.track_added",
            Self::MediaDegraded { .. } => "media.degraded",
            Self::SystemError { .. } => "system.error",
        }
    }

    /// Check if event matches a topic pattern
    ///
    /// Supports wildcards:
    /// - `*` matches all events
    /// - `control.*` matches all control events
    /// - `negotiation.state_changed` matches exact event
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if let Some(prefix) = topic.strip_suffix(".*") {
            return event_name.starts_with(prefix)
                && event_name.as_bytes().get(prefix.len()) == Some(&b'.');
        }

        event_name == topic
    }
}
