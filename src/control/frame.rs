//! Control frame wire format
//!
//! Extended layout (6 bytes):
//! - Byte 0: ESC (throttle/brake), 127 = neutral
//! - Byte 1: Gear (0 = neutral, 255 = reverse, 1..n = forward gear)
//! - Byte 2: Steering servo, trim already applied
//! - Byte 3: Camera pan
//! - Byte 4: Camera tilt
//! - Byte 5: Sound cue (0 = none)
//!
//! Legacy layout (4 bytes): ESC, steering, pan, tilt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::gear::Gear;
use crate::error::{AppError, Result};

/// Lowest channel value
pub const CHANNEL_MIN: u8 = 0;
/// Neutral / centre value shared by every channel
pub const CHANNEL_MID: u8 = 127;
/// Highest channel value
pub const CHANNEL_MAX: u8 = 255;

pub const LEGACY_FRAME_LEN: usize = 4;
pub const EXTENDED_FRAME_LEN: usize = 6;

/// Frame layout understood by the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameLayout {
    /// esc, steer, pan, tilt
    Legacy,
    /// esc, gear, steer, pan, tilt, sound cue
    #[default]
    Extended,
}

impl FrameLayout {
    pub fn len(&self) -> usize {
        match self {
            FrameLayout::Legacy => LEGACY_FRAME_LEN,
            FrameLayout::Extended => EXTENDED_FRAME_LEN,
        }
    }
}

impl FromStr for FrameLayout {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "4" => Ok(FrameLayout::Legacy),
            "extended" | "6" => Ok(FrameLayout::Extended),
            _ => Err(AppError::Config(format!(
                "Unknown frame layout: {} (expected legacy or extended)",
                s
            ))),
        }
    }
}

/// Canned sound played by the vehicle speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SoundCue {
    #[default]
    None,
    Affirmative,
    Negative,
    Aggressive,
    Sorry,
}

impl SoundCue {
    /// Cues in wire order, excluding `None`
    pub const ALL: [SoundCue; 4] = [
        SoundCue::Affirmative,
        SoundCue::Negative,
        SoundCue::Aggressive,
        SoundCue::Sorry,
    ];

    pub fn to_byte(self) -> u8 {
        match self {
            SoundCue::None => 0,
            SoundCue::Affirmative => 1,
            SoundCue::Negative => 2,
            SoundCue::Aggressive => 3,
            SoundCue::Sorry => 4,
        }
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundCue::None => write!(f, "none"),
            SoundCue::Affirmative => write!(f, "affirmative"),
            SoundCue::Negative => write!(f, "negative"),
            SoundCue::Aggressive => write!(f, "aggressive"),
            SoundCue::Sorry => write!(f, "sorry"),
        }
    }
}

/// One tick's intended vehicle actuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    pub layout: FrameLayout,
    pub esc: u8,
    pub gear: Gear,
    pub steer: u8,
    pub pan: u8,
    pub tilt: u8,
    pub sound: SoundCue,
}

impl ControlFrame {
    /// All channels centred, gear in neutral, no sound
    pub fn neutral(layout: FrameLayout) -> Self {
        Self {
            layout,
            esc: CHANNEL_MID,
            gear: Gear::Neutral,
            steer: CHANNEL_MID,
            pan: CHANNEL_MID,
            tilt: CHANNEL_MID,
            sound: SoundCue::None,
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral(self.layout)
    }

    /// Encode to the byte sequence sent as the `command` payload
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.layout {
            FrameLayout::Legacy => vec![self.esc, self.steer, self.pan, self.tilt],
            FrameLayout::Extended => vec![
                self.esc,
                self.gear.to_byte(),
                self.steer,
                self.pan,
                self.tilt,
                self.sound.to_byte(),
            ],
        }
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            FrameLayout::Legacy => write!(
                f,
                "Esc: {} Steer: {} Pan: {} Tilt: {}",
                self.esc, self.steer, self.pan, self.tilt
            ),
            FrameLayout::Extended => write!(
                f,
                "Esc: {} Gear: {} Steer: {} Pan: {} Tilt: {} Sound: {}",
                self.esc, self.gear, self.steer, self.pan, self.tilt, self.sound
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_bytes() {
        assert_eq!(
            ControlFrame::neutral(FrameLayout::Extended).to_bytes(),
            vec![127, 0, 127, 127, 127, 0]
        );
        assert_eq!(
            ControlFrame::neutral(FrameLayout::Legacy).to_bytes(),
            vec![127, 127, 127, 127]
        );
    }

    #[test]
    fn test_extended_channel_order() {
        let frame = ControlFrame {
            layout: FrameLayout::Extended,
            esc: 200,
            gear: Gear::Reverse,
            steer: 10,
            pan: 20,
            tilt: 30,
            sound: SoundCue::Aggressive,
        };
        assert_eq!(frame.to_bytes(), vec![200, 255, 10, 20, 30, 3]);
    }

    #[test]
    fn test_legacy_drops_gear_and_sound() {
        let mut frame = ControlFrame::neutral(FrameLayout::Legacy);
        frame.gear = Gear::Forward(3);
        frame.sound = SoundCue::Sorry;
        frame.steer = 0;
        assert_eq!(frame.to_bytes(), vec![127, 0, 127, 127]);
    }

    #[test]
    fn test_display() {
        let frame = ControlFrame::neutral(FrameLayout::Extended);
        assert_eq!(
            frame.to_string(),
            "Esc: 127 Gear: N Steer: 127 Pan: 127 Tilt: 127 Sound: none"
        );
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("Legacy".parse::<FrameLayout>().unwrap(), FrameLayout::Legacy);
        assert_eq!(" 6 ".parse::<FrameLayout>().unwrap(), FrameLayout::Extended);
        assert!(matches!(
            "wide".parse::<FrameLayout>(),
            Err(AppError::Config(_))
        ));
    }
}
