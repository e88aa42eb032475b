//! Environment overrides
//!
//! Variables prefixed `RC_TELEOP_` override the stored configuration for the
//! current run only. Unparseable values are logged and ignored.

use tracing::{info, warn};

use super::AppConfig;
use crate::control::FrameLayout;
use crate::drive::{MAX_TICK_MS, MIN_TICK_MS};

pub const ENV_PREFIX: &str = "RC_TELEOP_";

/// Apply overrides from the process environment
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let name = format!("{}{}", ENV_PREFIX, suffix);
        lookup(&name).map(|value| (name, value))
    };

    if let Some((name, value)) = var("SERVER_URL") {
        let value = value.trim();
        if value.starts_with("ws://") || value.starts_with("wss://") {
            info!("{} overrides server URL", name);
            config.signaling.server_url = value.to_string();
        } else {
            warn!("Ignoring {}: not a ws:// or wss:// URL", name);
        }
    }

    if let Some((name, value)) = var("TICK_MS") {
        match value.trim().parse::<u64>() {
            Ok(ms) if (MIN_TICK_MS..=MAX_TICK_MS).contains(&ms) => config.control.tick_ms = ms,
            _ => warn!("Ignoring {}={:?}: expected {}..={}", name, value, MIN_TICK_MS, MAX_TICK_MS),
        }
    }

    if let Some((name, value)) = var("MAX_GEAR") {
        match value.trim().parse::<u8>() {
            Ok(gear) if (1..=254).contains(&gear) => config.encoder.max_gear = gear,
            _ => warn!("Ignoring {}={:?}: expected 1..=254", name, value),
        }
    }

    if let Some((name, value)) = var("FRAME_LAYOUT") {
        match value.parse::<FrameLayout>() {
            Ok(layout) => config.encoder.frame_layout = layout,
            Err(e) => warn!("Ignoring {}: {}", name, e),
        }
    }

    if let Some((_, value)) = var("STUN_SERVERS") {
        config.webrtc.stun_servers = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
}
