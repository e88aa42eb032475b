//! Stream volume control
//!
//! Volume actions act on an [`AudioSink`] and never appear in the control
//! frame. The sink may also be changed by the operator directly (a slider),
//! so [`VolumeControl::sync`] reconciles the mute flag each tick.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Maximum volume level
pub const MAX_VOLUME: u8 = 100;
/// Default step for volume up/down
pub const DEFAULT_VOLUME_STEP: u8 = 10;

/// Playback volume of the received audio stream, in [0, 100]
pub trait AudioSink: Send + Sync {
    fn volume(&self) -> u8;
    fn set_volume(&self, level: u8);
}

/// In-process audio sink holding only a level
#[derive(Debug)]
pub struct MemoryAudioSink {
    level: AtomicU8,
}

impl MemoryAudioSink {
    pub fn new(level: u8) -> Self {
        Self {
            level: AtomicU8::new(level.min(MAX_VOLUME)),
        }
    }
}

impl Default for MemoryAudioSink {
    fn default() -> Self {
        Self::new(MAX_VOLUME)
    }
}

impl AudioSink for MemoryAudioSink {
    fn volume(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    fn set_volume(&self, level: u8) {
        self.level.store(level.min(MAX_VOLUME), Ordering::Relaxed);
    }
}

/// Mute and step state layered over an audio sink
pub struct VolumeControl {
    sink: Arc<dyn AudioSink>,
    muted: bool,
    pre_mute_level: Option<u8>,
    step: u8,
}

impl VolumeControl {
    pub fn new(sink: Arc<dyn AudioSink>, step: u8) -> Self {
        Self {
            sink,
            muted: false,
            pre_mute_level: None,
            step,
        }
    }

    pub fn level(&self) -> u8 {
        self.sink.volume().min(MAX_VOLUME)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn pre_mute_level(&self) -> Option<u8> {
        self.pre_mute_level
    }

    /// Store the current level and silence the sink
    pub fn mute(&mut self) {
        if self.muted {
            return;
        }
        self.pre_mute_level = Some(self.level());
        self.sink.set_volume(0);
        self.muted = true;
    }

    /// Restore the level stored at mute time
    pub fn unmute(&mut self) {
        if !self.muted {
            return;
        }
        let level = self.pre_mute_level.take().unwrap_or(0);
        self.sink.set_volume(level);
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.unmute();
        } else {
            self.mute();
        }
    }

    /// Step up; unmutes first when muted
    pub fn volume_up(&mut self) {
        if self.muted {
            self.unmute();
        }
        let level = self.level().saturating_add(self.step).min(MAX_VOLUME);
        self.sink.set_volume(level);
    }

    pub fn volume_down(&mut self) {
        let level = self.level().saturating_sub(self.step);
        self.sink.set_volume(level);
    }

    /// Clear the mute flag if the sink was raised externally while muted
    ///
    /// Returns true when the flag changed.
    pub fn sync(&mut self) -> bool {
        if self.muted && self.level() > 0 {
            self.muted = false;
            self.pre_mute_level = None;
            return true;
        }
        false
    }
}
