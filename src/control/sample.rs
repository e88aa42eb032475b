//! Raw device samples fed to the encoder once per tick

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::keymap;

/// State of one gamepad button
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ButtonState {
    pub pressed: bool,
    /// Analog value in [0, 1]; equals 0/1 on digital buttons
    #[serde(default)]
    pub value: f32,
}

impl ButtonState {
    pub fn pressed(value: f32) -> Self {
        Self {
            pressed: true,
            value,
        }
    }
}

/// One poll of the active input device
///
/// Serialized with a `kind` tag so producers can emit JSON lines such as
/// `{"kind":"keyboard","keys":["w","a"]}` or
/// `{"kind":"gamepad","id":"Xbox 360 Controller","axes":[0.0],"buttons":[]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceSample {
    /// Currently held keys, normalized with [`keymap::normalize`]
    Keyboard { keys: BTreeSet<String> },
    Gamepad {
        id: String,
        #[serde(default)]
        axes: Vec<f32>,
        #[serde(default)]
        buttons: Vec<ButtonState>,
    },
    #[default]
    None,
}

impl DeviceSample {
    /// Build a keyboard sample, normalizing key identifiers
    pub fn keyboard<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        DeviceSample::Keyboard {
            keys: keys.into_iter().map(|k| keymap::normalize(k.as_ref())).collect(),
        }
    }

    pub fn gamepad(id: impl Into<String>, axes: Vec<f32>, buttons: Vec<ButtonState>) -> Self {
        DeviceSample::Gamepad {
            id: id.into(),
            axes,
            buttons,
        }
    }

    /// Identity string used for device classification
    pub fn identity(&self) -> &str {
        match self {
            DeviceSample::Keyboard { .. } => "keyboard",
            DeviceSample::Gamepad { id, .. } => id,
            DeviceSample::None => "",
        }
    }
}

/// Read-only view over a gamepad sample
///
/// Missing axes read as `rest`, missing buttons read as released. Non-finite
/// axis values are treated as missing.
#[derive(Debug, Clone, Copy)]
pub struct GamepadView<'a> {
    pub axes: &'a [f32],
    pub buttons: &'a [ButtonState],
}

impl<'a> GamepadView<'a> {
    pub fn new(axes: &'a [f32], buttons: &'a [ButtonState]) -> Self {
        Self { axes, buttons }
    }

    /// Axis value clamped to [-1, 1], or `rest` when absent
    pub fn axis_or(&self, index: usize, rest: f32) -> f32 {
        match self.axes.get(index) {
            Some(v) if v.is_finite() => v.clamp(-1.0, 1.0),
            _ => rest,
        }
    }

    /// Unclamped axis value; hat switches report rest outside [-1, 1]
    pub fn raw_axis(&self, index: usize) -> Option<f32> {
        self.axes.get(index).copied().filter(|v| v.is_finite())
    }

    /// Axis value with a centred rest position
    pub fn axis(&self, index: usize) -> f32 {
        self.axis_or(index, 0.0)
    }

    pub fn pressed(&self, index: usize) -> bool {
        self.buttons.get(index).map(|b| b.pressed).unwrap_or(false)
    }

    /// Analog button value clamped to [0, 1]
    pub fn value(&self, index: usize) -> f32 {
        match self.buttons.get(index) {
            Some(b) if b.value.is_finite() => b.value.clamp(0.0, 1.0),
            Some(b) if b.pressed => 1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_arrays_read_rest() {
        let axes = [0.5];
        let buttons = [ButtonState::pressed(1.0)];
        let view = GamepadView::new(&axes, &buttons);

        assert_eq!(view.axis(0), 0.5);
        assert_eq!(view.axis(7), 0.0);
        assert_eq!(view.axis_or(5, 1.0), 1.0);
        assert!(view.pressed(0));
        assert!(!view.pressed(12));
        assert_eq!(view.value(3), 0.0);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let axes = [3.0, f32::NAN];
        let buttons = [ButtonState {
            pressed: true,
            value: 1.7,
        }];
        let view = GamepadView::new(&axes, &buttons);
        assert_eq!(view.axis(0), 1.0);
        assert_eq!(view.axis(1), 0.0);
        assert_eq!(view.value(0), 1.0);
    }

    #[test]
    fn test_json_shape() {
        let sample: DeviceSample =
            serde_json::from_str(r#"{"kind":"keyboard","keys":["w","ArrowLeft"]}"#).unwrap();
        match sample {
            DeviceSample::Keyboard { keys } => {
                assert!(keys.contains("w"));
                assert!(keys.contains("ArrowLeft"));
            }
            other => panic!("unexpected sample: {:?}", other),
        }

        let sample: DeviceSample = serde_json::from_str(
            r#"{"kind":"gamepad","id":"Xbox 360 Controller","axes":[0.1],"buttons":[{"pressed":true,"value":1.0}]}"#,
        )
        .unwrap();
        assert_eq!(sample.identity(), "Xbox 360 Controller");

        let none: DeviceSample = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, DeviceSample::None);
    }

    #[test]
    fn test_keyboard_constructor_normalizes() {
        let sample = DeviceSample::keyboard(["W", "ArrowUp", " "]);
        match sample {
            DeviceSample::Keyboard { keys } => {
                assert!(keys.contains("w"));
                assert!(keys.contains("arrowup"));
                assert!(keys.contains("space"));
            }
            other => panic!("unexpected sample: {:?}", other),
        }
    }
}
