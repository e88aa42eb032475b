//! Command encoder
//!
//! Stateful per-tick transform from a [`DeviceSample`] into a
//! [`ControlFrame`]. The encoder owns every piece of cross-tick control
//! state: action latches, gear, steering trim, camera pan/tilt and the mute
//! flag. It is driven exclusively by the transmission loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::frame::{ControlFrame, FrameLayout, SoundCue, CHANNEL_MID};
use super::gear::{Gear, Transmission, DEFAULT_MAX_GEAR};
use super::latch::{Action, ActionInputs, ActionLatches, FiredActions};
use super::mapping::{camera_delta, offset_channel};
use super::profile::{classify, map_sample, ControlIntent, DeviceProfile};
use super::sample::DeviceSample;
use super::volume::{AudioSink, VolumeControl, DEFAULT_VOLUME_STEP};
use crate::error::AppError;
use crate::events::{EventBus, SystemEvent};
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Encoder tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Wire layout of emitted frames
    pub frame_layout: FrameLayout,
    /// Highest forward gear
    pub max_gear: u8,
    /// Trim change per press
    pub trim_step: i16,
    /// Trim is bounded to [-trim_limit, trim_limit]
    pub trim_limit: i16,
    /// Analog camera rates at or below this magnitude are ignored
    pub camera_deadzone: f32,
    /// Maximum camera step per tick for analog inputs
    pub camera_step: u8,
    /// Camera step per tick for keyboard arrows
    pub keyboard_camera_step: u8,
    /// Volume change per press
    pub volume_step: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            frame_layout: FrameLayout::Extended,
            max_gear: DEFAULT_MAX_GEAR,
            trim_step: 2,
            trim_limit: 50,
            camera_deadzone: 0.2,
            camera_step: 3,
            keyboard_camera_step: 1,
            volume_step: DEFAULT_VOLUME_STEP,
        }
    }
}

/// Snapshot of encoder state for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderState {
    pub profile: DeviceProfile,
    pub gear: Gear,
    pub trim: i16,
    pub pan: u8,
    pub tilt: u8,
    pub volume: u8,
    pub muted: bool,
}

pub struct CommandEncoder {
    config: EncoderConfig,
    latches: ActionLatches,
    transmission: Transmission,
    trim: i16,
    pan: u8,
    tilt: u8,
    volume: VolumeControl,
    profile: Option<DeviceProfile>,
    events: Option<Arc<EventBus>>,
    throttler: LogThrottler,
}

impl CommandEncoder {
    pub fn new(config: EncoderConfig, sink: Arc<dyn AudioSink>) -> Self {
        let transmission = Transmission::new(config.max_gear);
        let volume = VolumeControl::new(sink, config.volume_step);
        Self {
            config,
            latches: ActionLatches::default(),
            transmission,
            trim: 0,
            pan: CHANNEL_MID,
            tilt: CHANNEL_MID,
            volume,
            profile: None,
            events: None,
            throttler: LogThrottler::default(),
        }
    }

    /// Publish gear, trim, volume and device changes on the bus
    pub fn set_event_bus(&mut self, events: Arc<EventBus>) {
        self.events = Some(events);
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn state(&self) -> EncoderState {
        EncoderState {
            profile: self.profile.unwrap_or(DeviceProfile::Disconnected),
            gear: self.transmission.gear(),
            trim: self.trim,
            pan: self.pan,
            tilt: self.tilt,
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
        }
    }

    /// Encode one tick
    ///
    /// Never fails: unsupported or absent devices yield the neutral frame.
    pub fn sample(&mut self, sample: &DeviceSample) -> ControlFrame {
        let profile = classify(sample);
        self.track_device(profile, sample);

        if self.volume.sync() {
            self.publish_volume();
        }

        let Some(intent) = map_sample(profile, sample) else {
            if profile == DeviceProfile::Unsupported {
                let err = AppError::UnsupportedDevice(sample.identity().to_string());
                warn_throttled!(
                    self.throttler,
                    "unsupported_device",
                    "{}, sending neutral frames",
                    err
                );
            }
            // Re-arm every latch; a button still held when the device returns fires again
            self.latches.update(&ActionInputs::default());
            return ControlFrame::neutral(self.config.frame_layout);
        };

        let fired = self.latches.update(&intent.actions);
        self.apply_actions(&fired);
        self.integrate_camera(profile, &intent);
        // Recenter is the last write to pan and tilt on its tick
        if fired.contains(Action::Recenter) {
            self.recenter();
        }

        ControlFrame {
            layout: self.config.frame_layout,
            esc: intent.esc,
            gear: self.transmission.gear(),
            steer: offset_channel(intent.steer, self.trim),
            pan: self.pan,
            tilt: self.tilt,
            sound: pressed_cue(&fired),
        }
    }

    /// Reset pan and tilt to centre
    pub fn recenter(&mut self) {
        self.pan = CHANNEL_MID;
        self.tilt = CHANNEL_MID;
        self.publish(SystemEvent::CameraRecentered);
    }

    fn track_device(&mut self, profile: DeviceProfile, sample: &DeviceSample) {
        if self.profile == Some(profile) {
            return;
        }
        let previous = self.profile.replace(profile);

        match profile {
            DeviceProfile::Unsupported => {
                self.publish(SystemEvent::UnsupportedDevice {
                    identity: sample.identity().to_string(),
                });
            }
            DeviceProfile::Disconnected => {
                if previous.is_some() {
                    info!("Input device disconnected");
                }
            }
            _ => {
                self.throttler.clear("unsupported_device");
                info!(
                    "Input device: {} ({})",
                    profile,
                    sample.identity()
                );
            }
        }

        self.publish(SystemEvent::DeviceChanged {
            profile: profile.to_string(),
            identity: sample.identity().to_string(),
            supported: profile.is_supported(),
        });
    }

    fn apply_actions(&mut self, fired: &FiredActions) {
        if fired.is_empty() {
            return;
        }

        let mut shifted = false;
        if fired.contains(Action::GearUp) {
            shifted |= self.transmission.upshift();
        }
        if fired.contains(Action::GearDown) {
            shifted |= self.transmission.downshift();
        }
        if shifted {
            let gear = self.transmission.gear();
            debug!("Gear: {}", gear);
            self.publish(SystemEvent::GearChanged {
                gear: gear.to_string(),
            });
        }

        let mut trim = self.trim;
        if fired.contains(Action::TrimLeft) {
            trim = trim.saturating_sub(self.config.trim_step);
        }
        if fired.contains(Action::TrimRight) {
            trim = trim.saturating_add(self.config.trim_step);
        }
        let limit = self.config.trim_limit.saturating_abs();
        let trim = trim.clamp(-limit, limit);
        if trim != self.trim {
            self.trim = trim;
            debug!("Steering trim: {}", trim);
            self.publish(SystemEvent::TrimChanged { trim });
        }

        let mut volume_changed = false;
        if fired.contains(Action::Mute) {
            self.volume.toggle_mute();
            volume_changed = true;
        }
        if fired.contains(Action::VolumeUp) {
            self.volume.volume_up();
            volume_changed = true;
        }
        if fired.contains(Action::VolumeDown) {
            self.volume.volume_down();
            volume_changed = true;
        }
        if volume_changed {
            self.publish_volume();
        }
    }

    fn integrate_camera(&mut self, profile: DeviceProfile, intent: &ControlIntent) {
        let step = if profile == DeviceProfile::Keyboard {
            self.config.keyboard_camera_step
        } else {
            self.config.camera_step
        };
        let deadzone = self.config.camera_deadzone;

        self.pan = offset_channel(self.pan, camera_delta(intent.pan_rate, deadzone, step));
        self.tilt = offset_channel(self.tilt, camera_delta(intent.tilt_rate, deadzone, step));
    }

    fn publish_volume(&self) {
        self.publish(SystemEvent::VolumeChanged {
            level: self.volume.level(),
            muted: self.volume.is_muted(),
        });
    }

    fn publish(&self, event: SystemEvent) {
        if let Some(ref events) = self.events {
            events.publish(event);
        }
    }
}

/// Lowest-index cue whose press edge fired this tick
fn pressed_cue(fired: &FiredActions) -> SoundCue {
    Action::CUES
        .iter()
        .zip(SoundCue::ALL)
        .find(|(action, _)| fired.contains(**action))
        .map(|(_, cue)| cue)
        .unwrap_or(SoundCue::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::sample::ButtonState;
    use crate::control::volume::MemoryAudioSink;

    fn encoder() -> (Arc<MemoryAudioSink>, CommandEncoder) {
        let sink = Arc::new(MemoryAudioSink::new(50));
        let encoder = CommandEncoder::new(EncoderConfig::default(), sink.clone());
        (sink, encoder)
    }

    fn keys(keys: &[&str]) -> DeviceSample {
        DeviceSample::keyboard(keys.iter().copied())
    }

    fn xbox(axes: Vec<f32>, pressed: &[usize]) -> DeviceSample {
        let buttons = (0..16)
            .map(|i| {
                if pressed.contains(&i) {
                    ButtonState::pressed(1.0)
                } else {
                    ButtonState::default()
                }
            })
            .collect();
        DeviceSample::gamepad("Xbox Wireless Controller", axes, buttons)
    }

    #[test]
    fn test_idle_keyboard_is_neutral() {
        let (_, mut enc) = encoder();
        let frame = enc.sample(&keys(&[]));
        assert!(frame.is_neutral());
        assert_eq!(frame.to_bytes(), vec![127, 0, 127, 127, 127, 0]);
    }

    #[test]
    fn test_unsupported_device_neutral_and_reported() {
        let (_, mut enc) = encoder();
        let events = Arc::new(EventBus::new());
        let mut rx = events.subscribe();
        enc.set_event_bus(events);

        let sample = DeviceSample::gamepad("Generic Flight Stick", vec![1.0, 1.0], vec![]);
        let frame = enc.sample(&sample);
        assert!(frame.is_neutral());
        assert_eq!(enc.state().profile, DeviceProfile::Unsupported);

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first,
            SystemEvent::UnsupportedDevice {
                identity: "Generic Flight Stick".to_string()
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            SystemEvent::DeviceChanged { supported: false, .. }
        ));

        // no repeat status while the same device stays attached
        enc.sample(&sample);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_device_neutral() {
        let (_, mut enc) = encoder();
        assert!(enc.sample(&DeviceSample::None).is_neutral());
    }

    #[test]
    fn test_gear_shift_once_per_press() {
        let (_, mut enc) = encoder();
        for _ in 0..5 {
            enc.sample(&keys(&["e"]));
        }
        assert_eq!(enc.state().gear, Gear::Forward(1));

        enc.sample(&keys(&[]));
        let frame = enc.sample(&keys(&["e"]));
        assert_eq!(frame.gear, Gear::Forward(2));
        assert_eq!(frame.to_bytes()[1], 2);
    }

    #[test]
    fn test_downshift_to_reverse() {
        let (_, mut enc) = encoder();
        let frame = enc.sample(&keys(&["q"]));
        assert_eq!(frame.gear, Gear::Reverse);
        assert_eq!(frame.to_bytes()[1], 255);
    }

    #[test]
    fn test_trim_bounded_and_applied() {
        let (_, mut enc) = encoder();
        for _ in 0..40 {
            enc.sample(&keys(&["."]));
            enc.sample(&keys(&[]));
        }
        assert_eq!(enc.state().trim, 50);
        let frame = enc.sample(&keys(&[]));
        assert_eq!(frame.steer, 177);

        let frame = enc.sample(&keys(&["d"]));
        assert_eq!(frame.steer, 255);

        for _ in 0..80 {
            enc.sample(&keys(&[","]));
            enc.sample(&keys(&[]));
        }
        assert_eq!(enc.state().trim, -50);
        let frame = enc.sample(&keys(&["a"]));
        assert_eq!(frame.steer, 0);
    }

    #[test]
    fn test_camera_integrates_and_clamps() {
        let (_, mut enc) = encoder();
        for _ in 0..10 {
            enc.sample(&keys(&["ArrowRight", "ArrowUp"]));
        }
        assert_eq!(enc.state().pan, 137);
        assert_eq!(enc.state().tilt, 137);

        for _ in 0..200 {
            enc.sample(&xbox(vec![0.0, 0.0, 1.0, -1.0], &[]));
        }
        let frame = enc.sample(&xbox(vec![0.0, 0.0, 1.0, -1.0], &[]));
        assert_eq!((frame.pan, frame.tilt), (255, 255));
    }

    #[test]
    fn test_camera_deadzone() {
        let (_, mut enc) = encoder();
        for _ in 0..10 {
            enc.sample(&xbox(vec![0.0, 0.0, 0.15, -0.2], &[]));
        }
        assert_eq!((enc.state().pan, enc.state().tilt), (127, 127));
    }

    #[test]
    fn test_recenter_idempotent() {
        let (_, mut enc) = encoder();
        for _ in 0..5 {
            enc.sample(&keys(&["ArrowLeft", "ArrowDown"]));
        }
        assert_eq!(enc.state().pan, 122);

        let frame = enc.sample(&keys(&["space"]));
        assert_eq!((frame.pan, frame.tilt), (127, 127));
        enc.sample(&keys(&[]));
        let frame = enc.sample(&keys(&[" "]));
        assert_eq!((frame.pan, frame.tilt), (127, 127));
        enc.recenter();
        assert_eq!((enc.state().pan, enc.state().tilt), (127, 127));
    }

    #[test]
    fn test_volume_actions_hit_sink_not_frame() {
        let (sink, mut enc) = encoder();
        let frame = enc.sample(&keys(&["m"]));
        assert_eq!(sink.volume(), 0);
        assert!(enc.state().muted);
        assert!(frame.is_neutral());

        enc.sample(&keys(&[]));
        enc.sample(&keys(&["]"]));
        assert!(!enc.state().muted);
        assert_eq!(sink.volume(), 60);

        enc.sample(&keys(&[]));
        enc.sample(&keys(&["["]));
        assert_eq!(sink.volume(), 50);
    }

    #[test]
    fn test_external_volume_raise_clears_mute() {
        let (sink, mut enc) = encoder();
        enc.sample(&keys(&["m"]));
        assert!(enc.state().muted);
        sink.set_volume(20);
        enc.sample(&keys(&[]));
        assert!(!enc.state().muted);
    }

    #[test]
    fn test_sound_cue_on_edge_only() {
        let (_, mut enc) = encoder();
        let frame = enc.sample(&xbox(vec![], &[1]));
        assert_eq!(frame.sound, SoundCue::Negative);
        assert_eq!(frame.to_bytes()[5], 2);

        let frame = enc.sample(&xbox(vec![], &[1]));
        assert_eq!(frame.sound, SoundCue::None);
    }

    #[test]
    fn test_sound_cue_lowest_index_wins() {
        let (_, mut enc) = encoder();
        let frame = enc.sample(&keys(&["4", "2"]));
        assert_eq!(frame.sound, SoundCue::Negative);
    }

    #[test]
    fn test_xbox_throttle_and_steer() {
        let (_, mut enc) = encoder();
        let frame = enc.sample(&xbox(vec![0.5], &[7]));
        assert_eq!(frame.esc, 255);
        assert_eq!(frame.steer, 184);
    }

    #[test]
    fn test_legacy_layout() {
        let sink = Arc::new(MemoryAudioSink::default());
        let config = EncoderConfig {
            frame_layout: FrameLayout::Legacy,
            ..Default::default()
        };
        let mut enc = CommandEncoder::new(config, sink);
        let frame = enc.sample(&keys(&["w", "e"]));
        assert_eq!(frame.to_bytes(), vec![255, 127, 127, 127]);
        assert_eq!(enc.state().gear, Gear::Forward(1));
    }

    #[test]
    fn test_held_button_across_unsupported_refires() {
        let (_, mut enc) = encoder();
        enc.sample(&xbox(vec![], &[5]));
        enc.sample(&DeviceSample::None);
        enc.sample(&xbox(vec![], &[5]));
        assert_eq!(enc.state().gear, Gear::Forward(2));
    }

    #[test]
    fn test_recenter_wins_over_held_camera_input() {
        let (_, mut enc) = encoder();
        for _ in 0..5 {
            enc.sample(&keys(&["ArrowRight"]));
        }
        assert_eq!(enc.state().pan, 132);

        let frame = enc.sample(&keys(&["space", "ArrowRight"]));
        assert_eq!(frame.pan, 127);
        assert_eq!(frame.tilt, 127);

        // still held: integration resumes on the next tick
        let frame = enc.sample(&keys(&["space", "ArrowRight"]));
        assert_eq!(frame.pan, 128);
    }

    #[test]
    fn test_huge_trim_step_saturates() {
        let config = EncoderConfig {
            trim_step: i16::MAX,
            ..Default::default()
        };
        let mut enc = CommandEncoder::new(config, Arc::new(MemoryAudioSink::default()));
        for _ in 0..2 {
            enc.sample(&keys(&["."]));
            enc.sample(&keys(&[]));
        }
        assert_eq!(enc.state().trim, 50);
        for _ in 0..2 {
            enc.sample(&keys(&[","]));
            enc.sample(&keys(&[]));
        }
        assert_eq!(enc.state().trim, -50);
    }
}
