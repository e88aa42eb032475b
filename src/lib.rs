//! rc-teleop - Remote vehicle teleoperation client
//!
//! Encodes keyboard, gamepad and racing wheel input into compact control
//! frames and streams them to a vehicle over a relay, once a WebRTC session
//! with the vehicle has been negotiated.

pub mod config;
pub mod control;
pub mod drive;
pub mod error;
pub mod events;
pub mod input;
pub mod transport;
pub mod utils;
pub mod webrtc;

pub use error::{AppError, Result};
