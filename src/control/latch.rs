//! Edge detection for discrete actions

use serde::{Deserialize, Serialize};

/// Two-state press latch
///
/// Fires once on the released -> pressed transition. Holding produces no
/// repeat; releasing re-arms the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceLatch {
    #[default]
    Released,
    Pressed,
}

impl DebounceLatch {
    /// Feed the raw input for this tick, returning true on a new press
    pub fn update(&mut self, raw: bool) -> bool {
        match (*self, raw) {
            (DebounceLatch::Released, true) => {
                *self = DebounceLatch::Pressed;
                true
            }
            (DebounceLatch::Pressed, false) => {
                *self = DebounceLatch::Released;
                false
            }
            _ => false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self, DebounceLatch::Pressed)
    }
}

/// Discrete operator action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    GearUp,
    GearDown,
    TrimLeft,
    TrimRight,
    VolumeUp,
    VolumeDown,
    Mute,
    Recenter,
    Cue1,
    Cue2,
    Cue3,
    Cue4,
}

impl Action {
    pub const COUNT: usize = 12;

    pub const ALL: [Action; Action::COUNT] = [
        Action::GearUp,
        Action::GearDown,
        Action::TrimLeft,
        Action::TrimRight,
        Action::VolumeUp,
        Action::VolumeDown,
        Action::Mute,
        Action::Recenter,
        Action::Cue1,
        Action::Cue2,
        Action::Cue3,
        Action::Cue4,
    ];

    /// Sound cue actions in wire order
    pub const CUES: [Action; 4] = [Action::Cue1, Action::Cue2, Action::Cue3, Action::Cue4];

    fn index(self) -> usize {
        self as usize
    }
}

/// Raw, undebounced action inputs for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionInputs {
    held: [bool; Action::COUNT],
}

impl ActionInputs {
    pub fn set(&mut self, action: Action, held: bool) {
        self.held[action.index()] = held;
    }

    /// Mark an action held; never clears a hold already set by another binding
    pub fn press(&mut self, action: Action, held: bool) {
        self.held[action.index()] |= held;
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held[action.index()]
    }
}

/// One latch per discrete action
#[derive(Debug, Clone, Default)]
pub struct ActionLatches {
    latches: [DebounceLatch; Action::COUNT],
}

impl ActionLatches {
    /// Advance every latch, returning the set of actions that fired this tick
    pub fn update(&mut self, inputs: &ActionInputs) -> FiredActions {
        let mut fired = FiredActions::default();
        for action in Action::ALL {
            let idx = action.index();
            fired.fired[idx] = self.latches[idx].update(inputs.held[idx]);
        }
        fired
    }

    pub fn latch(&self, action: Action) -> DebounceLatch {
        self.latches[action.index()]
    }
}

/// Actions whose press edge occurred this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiredActions {
    fired: [bool; Action::COUNT],
}

impl FiredActions {
    pub fn contains(&self, action: Action) -> bool {
        self.fired[action.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.fired.iter().any(|f| *f)
    }
}
