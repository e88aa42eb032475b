use serde::{Deserialize, Serialize};

use crate::drive::{DEFAULT_TICK_MS, MAX_TICK_MS, MIN_TICK_MS};
use crate::error::{AppError, Result};

// Re-export EncoderConfig from control module
pub use crate::control::EncoderConfig;
// Re-export WebRtcConfig from webrtc module
pub use crate::webrtc::WebRtcConfig;

/// Largest steering trim; beyond this the steer channel is pinned at an end
pub const MAX_TRIM_LIMIT: i16 = 255;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Transmission loop settings
    pub control: ControlConfig,
    /// Command encoder settings
    pub encoder: EncoderConfig,
    /// WebRTC negotiation settings
    pub webrtc: WebRtcConfig,
    /// Relay connection settings
    pub signaling: SignalingConfig,
    /// Received audio settings
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Check values that serde cannot bound
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.control.tick_ms) {
            return Err(AppError::Config(format!(
                "tick_ms must be within {}..={} (got {})",
                MIN_TICK_MS, MAX_TICK_MS, self.control.tick_ms
            )));
        }
        if self.encoder.max_gear == 0 || self.encoder.max_gear == u8::MAX {
            return Err(AppError::Config(format!(
                "max_gear must be within 1..=254 (got {})",
                self.encoder.max_gear
            )));
        }
        if !(0..=MAX_TRIM_LIMIT).contains(&self.encoder.trim_limit) {
            return Err(AppError::Config(format!(
                "trim_limit must be within 0..={} (got {})",
                MAX_TRIM_LIMIT, self.encoder.trim_limit
            )));
        }
        if !(0..=self.encoder.trim_limit).contains(&self.encoder.trim_step) {
            return Err(AppError::Config(format!(
                "trim_step must be within 0..={} (got {})",
                self.encoder.trim_limit, self.encoder.trim_step
            )));
        }
        if !(0.0..1.0).contains(&self.encoder.camera_deadzone) {
            return Err(AppError::Config(format!(
                "camera_deadzone must be within [0, 1) (got {})",
                self.encoder.camera_deadzone
            )));
        }
        if self.audio.initial_volume > 100 {
            return Err(AppError::Config(format!(
                "initial_volume must be at most 100 (got {})",
                self.audio.initial_volume
            )));
        }
        if !self.signaling.server_url.starts_with("ws://")
            && !self.signaling.server_url.starts_with("wss://")
        {
            return Err(AppError::Config(format!(
                "server_url must be a ws:// or wss:// URL (got {})",
                self.signaling.server_url
            )));
        }
        Ok(())
    }
}

/// Transmission loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Tick period in milliseconds
    pub tick_ms: u64,
    /// Start a fresh negotiation after a failed one
    pub reconnect: bool,
    /// Delay before reconnecting (ms)
    pub reconnect_delay_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            reconnect: false,
            reconnect_delay_ms: 2000,
        }
    }
}

/// Relay connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the relay
    pub server_url: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
        }
    }
}

/// Received audio configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Playback volume at startup (0-100)
    pub initial_volume: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { initial_volume: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::FrameLayout;

    #[test]
    fn test_defaults_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.tick_ms, 10);
        assert_eq!(config.encoder.max_gear, 6);
        assert_eq!(config.encoder.frame_layout, FrameLayout::Extended);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"control":{"tick_ms":20},"encoder":{"max_gear":4}}"#).unwrap();
        assert_eq!(config.control.tick_ms, 20);
        assert!(!config.control.reconnect);
        assert_eq!(config.encoder.max_gear, 4);
        assert_eq!(config.encoder.trim_limit, 50);
        assert_eq!(config.webrtc, WebRtcConfig::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.control.tick_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.max_gear = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.signaling.server_url = "http://example.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.initial_volume = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_trim() {
        let mut config = AppConfig::default();
        config.encoder.trim_step = i16::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.trim_limit = 256;
        config.encoder.trim_step = 2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.trim_step = -1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.trim_limit = 255;
        config.encoder.trim_step = 255;
        assert!(config.validate().is_ok());
    }
}
