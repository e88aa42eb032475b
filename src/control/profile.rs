//! Device classification and per-profile input mapping
//!
//! Classification is a pure function of the sample identity. Each profile
//! owns an index table and a mapping function that turns a raw sample into a
//! [`ControlIntent`]; indices are never shared between profiles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::keymap::{self, key};
use super::latch::{Action, ActionInputs};
use super::mapping::{esc_from_pedals, map_axis, pedal_pressure};
use super::sample::{DeviceSample, GamepadView};
use super::frame::CHANNEL_MID;

/// Closed set of supported input devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProfile {
    Keyboard,
    Xbox,
    WheelG27,
    WheelTgt,
    Unsupported,
    Disconnected,
}

impl DeviceProfile {
    /// Whether samples of this profile produce actuation
    pub fn is_supported(&self) -> bool {
        !matches!(self, DeviceProfile::Unsupported | DeviceProfile::Disconnected)
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceProfile::Keyboard => "keyboard",
            DeviceProfile::Xbox => "xbox",
            DeviceProfile::WheelG27 => "g27",
            DeviceProfile::WheelTgt => "tgt",
            DeviceProfile::Unsupported => "unsupported",
            DeviceProfile::Disconnected => "disconnected",
        };
        write!(f, "{}", name)
    }
}

/// Classify a sample by its identity string (case-insensitive)
pub fn classify(sample: &DeviceSample) -> DeviceProfile {
    match sample {
        DeviceSample::None => DeviceProfile::Disconnected,
        DeviceSample::Keyboard { .. } => DeviceProfile::Keyboard,
        DeviceSample::Gamepad { id, .. } => classify_identity(id),
    }
}

/// Classify a gamepad identity string
pub fn classify_identity(id: &str) -> DeviceProfile {
    let id = id.to_ascii_lowercase();
    if id.contains("xbox") {
        DeviceProfile::Xbox
    } else if id.contains("g27") {
        DeviceProfile::WheelG27
    } else if id.contains("t-gt") || id.contains("tgt") {
        DeviceProfile::WheelTgt
    } else {
        DeviceProfile::Unsupported
    }
}

/// Normalized per-tick intent produced by a profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlIntent {
    pub esc: u8,
    /// Steering before trim is applied
    pub steer: u8,
    /// Camera pan rate in [-1, 1]
    pub pan_rate: f32,
    /// Camera tilt rate in [-1, 1], positive is up
    pub tilt_rate: f32,
    pub actions: ActionInputs,
}

impl ControlIntent {
    pub fn neutral() -> Self {
        Self {
            esc: CHANNEL_MID,
            steer: CHANNEL_MID,
            pan_rate: 0.0,
            tilt_rate: 0.0,
            actions: ActionInputs::default(),
        }
    }
}

/// Map a sample through the profile it classifies as
///
/// Returns `None` for unsupported or disconnected devices.
pub fn map_sample(profile: DeviceProfile, sample: &DeviceSample) -> Option<ControlIntent> {
    match (profile, sample) {
        (DeviceProfile::Keyboard, DeviceSample::Keyboard { keys }) => Some(map_keyboard(keys)),
        (DeviceProfile::Xbox, DeviceSample::Gamepad { axes, buttons, .. }) => {
            Some(map_xbox(&GamepadView::new(axes, buttons)))
        }
        (DeviceProfile::WheelG27, DeviceSample::Gamepad { axes, buttons, .. }) => {
            Some(map_g27(&GamepadView::new(axes, buttons)))
        }
        (DeviceProfile::WheelTgt, DeviceSample::Gamepad { axes, buttons, .. }) => {
            Some(map_tgt(&GamepadView::new(axes, buttons)))
        }
        _ => None,
    }
}

// ============================================================================
// Keyboard
// ============================================================================

/// Keyboard bindings: `w`/`s` throttle, `a`/`d` steer, arrows camera
pub fn map_keyboard(raw_keys: &BTreeSet<String>) -> ControlIntent {
    let keys: BTreeSet<String> = raw_keys.iter().map(|k| keymap::normalize(k)).collect();
    let held = |k: &str| keys.contains(k);

    let esc = if held(key::S) {
        0
    } else if held(key::W) {
        255
    } else {
        CHANNEL_MID
    };

    let steer = match (held(key::A), held(key::D)) {
        (true, false) => 0,
        (false, true) => 255,
        _ => CHANNEL_MID,
    };

    let axis = |neg: &str, pos: &str| match (held(neg), held(pos)) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    };

    let mut actions = ActionInputs::default();
    actions.set(Action::GearUp, held(key::E));
    actions.set(Action::GearDown, held(key::Q));
    actions.set(Action::TrimLeft, held(key::COMMA));
    actions.set(Action::TrimRight, held(key::PERIOD));
    actions.set(Action::VolumeUp, held(key::RIGHT_BRACKET));
    actions.set(Action::VolumeDown, held(key::LEFT_BRACKET));
    actions.set(Action::Mute, held(key::M));
    actions.set(Action::Recenter, held(key::SPACE));
    actions.set(Action::Cue1, held(key::DIGIT_1));
    actions.set(Action::Cue2, held(key::DIGIT_2));
    actions.set(Action::Cue3, held(key::DIGIT_3));
    actions.set(Action::Cue4, held(key::DIGIT_4));

    ControlIntent {
        esc,
        steer,
        pan_rate: axis(key::ARROW_LEFT, key::ARROW_RIGHT),
        tilt_rate: axis(key::ARROW_DOWN, key::ARROW_UP),
        actions,
    }
}

// ============================================================================
// Xbox (standard gamepad mapping)
// ============================================================================

/// Xbox controller index table
pub mod xbox {
    pub const AXIS_STEER: usize = 0;
    pub const AXIS_PAN: usize = 2;
    pub const AXIS_TILT: usize = 3;

    pub const BUTTON_A: usize = 0;
    pub const BUTTON_B: usize = 1;
    pub const BUTTON_X: usize = 2;
    pub const BUTTON_Y: usize = 3;
    pub const BUTTON_LB: usize = 4;
    pub const BUTTON_RB: usize = 5;
    pub const BUTTON_BRAKE: usize = 6;
    pub const BUTTON_GAS: usize = 7;
    pub const BUTTON_BACK: usize = 8;
    pub const BUTTON_RIGHT_STICK: usize = 11;
    pub const BUTTON_DPAD_UP: usize = 12;
    pub const BUTTON_DPAD_DOWN: usize = 13;
    pub const BUTTON_DPAD_LEFT: usize = 14;
    pub const BUTTON_DPAD_RIGHT: usize = 15;

    pub const STEER_DEADZONE: f32 = 0.1;
    pub const TRIGGER_DEADZONE: f32 = 0.1;
}

pub fn map_xbox(pad: &GamepadView<'_>) -> ControlIntent {
    let esc = esc_from_pedals(
        pad.value(xbox::BUTTON_GAS),
        pad.value(xbox::BUTTON_BRAKE),
        xbox::TRIGGER_DEADZONE,
    );

    let mut actions = ActionInputs::default();
    actions.set(Action::GearUp, pad.pressed(xbox::BUTTON_RB));
    actions.set(Action::GearDown, pad.pressed(xbox::BUTTON_LB));
    actions.set(Action::TrimLeft, pad.pressed(xbox::BUTTON_DPAD_LEFT));
    actions.set(Action::TrimRight, pad.pressed(xbox::BUTTON_DPAD_RIGHT));
    actions.set(Action::VolumeUp, pad.pressed(xbox::BUTTON_DPAD_UP));
    actions.set(Action::VolumeDown, pad.pressed(xbox::BUTTON_DPAD_DOWN));
    actions.set(Action::Mute, pad.pressed(xbox::BUTTON_BACK));
    actions.set(Action::Recenter, pad.pressed(xbox::BUTTON_RIGHT_STICK));
    actions.set(Action::Cue1, pad.pressed(xbox::BUTTON_A));
    actions.set(Action::Cue2, pad.pressed(xbox::BUTTON_B));
    actions.set(Action::Cue3, pad.pressed(xbox::BUTTON_X));
    actions.set(Action::Cue4, pad.pressed(xbox::BUTTON_Y));

    ControlIntent {
        esc,
        steer: map_axis(pad.axis(xbox::AXIS_STEER), xbox::STEER_DEADZONE),
        pan_rate: pad.axis(xbox::AXIS_PAN),
        // stick up reports negative
        tilt_rate: -pad.axis(xbox::AXIS_TILT),
        actions,
    }
}

// ============================================================================
// Racing wheels
// ============================================================================

/// How a wheel reports camera direction
#[derive(Debug, Clone, Copy)]
pub enum CameraInput {
    /// Single hat-switch axis encoding eight directions
    Hat { axis: usize },
    /// Separate pan and tilt axes at ±1; tilt up reports negative
    Axes { pan: usize, tilt: usize },
}

/// Wheel index table
#[derive(Debug, Clone, Copy)]
pub struct WheelLayout {
    pub steer_axis: usize,
    pub gas_axis: usize,
    pub brake_axis: usize,
    pub camera: CameraInput,
    pub gear_up: usize,
    pub gear_down: usize,
    pub trim_left: usize,
    pub trim_right: usize,
    pub volume_up: usize,
    pub volume_down: usize,
    pub mute: usize,
    pub recenter: usize,
    pub cues: [usize; 4],
    pub steer_deadzone: f32,
    pub pedal_deadzone: f32,
}

pub const G27_LAYOUT: WheelLayout = WheelLayout {
    steer_axis: 0,
    gas_axis: 2,
    brake_axis: 5,
    camera: CameraInput::Hat { axis: 9 },
    gear_up: 4,
    gear_down: 5,
    trim_left: 6,
    trim_right: 7,
    volume_up: 9,
    volume_down: 8,
    mute: 2,
    recenter: 3,
    cues: [0, 1, 10, 11],
    steer_deadzone: 0.05,
    pedal_deadzone: 0.05,
};

pub const TGT_LAYOUT: WheelLayout = WheelLayout {
    steer_axis: 0,
    gas_axis: 1,
    brake_axis: 5,
    camera: CameraInput::Axes { pan: 6, tilt: 7 },
    gear_up: 0,
    gear_down: 1,
    trim_left: 2,
    trim_right: 3,
    volume_up: 7,
    volume_down: 6,
    mute: 8,
    recenter: 9,
    cues: [10, 11, 12, 13],
    steer_deadzone: 0.05,
    pedal_deadzone: 0.05,
};

/// Hat switch positions, clockwise from up, as (value, pan, tilt)
const HAT_POSITIONS: [(f32, f32, f32); 8] = [
    (-1.0, 0.0, 1.0),
    (-0.714, 1.0, 1.0),
    (-0.429, 1.0, 0.0),
    (-0.143, 1.0, -1.0),
    (0.143, 0.0, -1.0),
    (0.429, -1.0, -1.0),
    (0.714, -1.0, 0.0),
    (1.0, -1.0, 1.0),
];

const HAT_TOLERANCE: f32 = 0.05;

/// Decode a hat-switch axis into (pan, tilt) rates
///
/// The rest position (reported outside [-1, 1]) and unknown values decode
/// to no movement.
pub fn decode_hat(raw: Option<f32>) -> (f32, f32) {
    let Some(value) = raw else {
        return (0.0, 0.0);
    };
    HAT_POSITIONS
        .iter()
        .find(|(pos, _, _)| (value - pos).abs() <= HAT_TOLERANCE)
        .map(|(_, pan, tilt)| (*pan, *tilt))
        .unwrap_or((0.0, 0.0))
}

fn map_wheel(layout: &WheelLayout, pad: &GamepadView<'_>) -> ControlIntent {
    let gas = pedal_pressure(pad.axis_or(layout.gas_axis, 1.0));
    let brake = pedal_pressure(pad.axis_or(layout.brake_axis, 1.0));

    let (pan_rate, tilt_rate) = match layout.camera {
        CameraInput::Hat { axis } => decode_hat(pad.raw_axis(axis)),
        CameraInput::Axes { pan, tilt } => (pad.axis(pan), -pad.axis(tilt)),
    };

    let mut actions = ActionInputs::default();
    actions.set(Action::GearUp, pad.pressed(layout.gear_up));
    actions.set(Action::GearDown, pad.pressed(layout.gear_down));
    actions.set(Action::TrimLeft, pad.pressed(layout.trim_left));
    actions.set(Action::TrimRight, pad.pressed(layout.trim_right));
    actions.set(Action::VolumeUp, pad.pressed(layout.volume_up));
    actions.set(Action::VolumeDown, pad.pressed(layout.volume_down));
    actions.set(Action::Mute, pad.pressed(layout.mute));
    actions.set(Action::Recenter, pad.pressed(layout.recenter));
    for (action, button) in Action::CUES.iter().zip(layout.cues) {
        actions.set(*action, pad.pressed(button));
    }

    ControlIntent {
        esc: esc_from_pedals(gas, brake, layout.pedal_deadzone),
        steer: map_axis(pad.axis(layout.steer_axis), layout.steer_deadzone),
        pan_rate,
        tilt_rate,
        actions,
    }
}

pub fn map_g27(pad: &GamepadView<'_>) -> ControlIntent {
    map_wheel(&G27_LAYOUT, pad)
}

pub fn map_tgt(pad: &GamepadView<'_>) -> ControlIntent {
    map_wheel(&TGT_LAYOUT, pad)
}
