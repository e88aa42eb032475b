//! Vehicle control
//!
//! Turns keyboard, gamepad and racing wheel samples into fixed-format control
//! frames. See [`CommandEncoder`] for the per-tick entry point.

pub mod encoder;
pub mod frame;
pub mod gear;
pub mod keymap;
pub mod latch;
pub mod mapping;
pub mod profile;
pub mod sample;
pub mod volume;

pub use encoder::{CommandEncoder, EncoderConfig, EncoderState};
pub use frame::{ControlFrame, FrameLayout, SoundCue};
pub use gear::{Gear, Transmission};
pub use latch::{Action, DebounceLatch};
pub use profile::{classify, DeviceProfile};
pub use sample::{ButtonState, DeviceSample};
pub use volume::{AudioSink, MemoryAudioSink, VolumeControl};
