//! Utility modules shared across the control loop and negotiation code.

pub mod throttle;

pub use throttle::LogThrottler;
