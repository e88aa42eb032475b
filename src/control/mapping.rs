//! Continuous axis mapping
//!
//! All functions are pure and saturating: any finite input yields a value
//! within the requested output bounds.

use super::frame::{CHANNEL_MAX, CHANNEL_MID, CHANNEL_MIN};

/// Linearly rescale `value` from `[in_min, in_max]` to `[out_min, out_max]`
///
/// The result is rounded to nearest and clamped to the output bounds.
/// `out_min` may be greater than `out_max` for inverted outputs.
///
/// ```
/// use rc_teleop::control::mapping::map_to_range;
/// assert_eq!(map_to_range(0.5, 0.1, 1.0, 127.0, 255.0), 184);
/// ```
pub fn map_to_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> u8 {
    let lo = out_min.min(out_max).max(CHANNEL_MIN as f32);
    let hi = out_min.max(out_max).min(CHANNEL_MAX as f32);

    let span = in_max - in_min;
    if !value.is_finite() || span.abs() < f32::EPSILON {
        return out_min.clamp(lo, hi).round() as u8;
    }

    let t = (value - in_min) / span;
    let out = out_min + t * (out_max - out_min);
    (out + 0.5).floor().clamp(lo, hi) as u8
}

/// Map a centred axis in [-1, 1] onto `[out_min, out_max]` around 127
///
/// Values within `[-deadzone, deadzone]` map to exactly 127.
pub fn map_axis_bounded(value: f32, deadzone: f32, out_min: u8, out_max: u8) -> u8 {
    let d = deadzone.clamp(0.0, 0.99);
    let mid = CHANNEL_MID as f32;
    if value > d {
        map_to_range(value, d, 1.0, mid, out_max as f32)
    } else if value < -d {
        map_to_range(value, -1.0, -d, out_min as f32, mid)
    } else {
        CHANNEL_MID
    }
}

/// Map a centred axis onto the full channel range
pub fn map_axis(value: f32, deadzone: f32) -> u8 {
    map_axis_bounded(value, deadzone, CHANNEL_MIN, CHANNEL_MAX)
}

/// Combine gas and brake pressures in [0, 1] into an ESC value
///
/// Brake wins whenever it is at least as deep as the gas.
pub fn esc_from_pedals(gas: f32, brake: f32, deadzone: f32) -> u8 {
    let mid = CHANNEL_MID as f32;
    if brake > deadzone && brake >= gas {
        map_to_range(brake, deadzone, 1.0, mid, CHANNEL_MIN as f32)
    } else if gas > deadzone {
        map_to_range(gas, deadzone, 1.0, mid, CHANNEL_MAX as f32)
    } else {
        CHANNEL_MID
    }
}

/// Convert a wheel pedal axis (rest +1, fully pressed -1) to a pressure in [0, 1]
pub fn pedal_pressure(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    ((1.0 - raw) / 2.0).clamp(0.0, 1.0)
}

/// Per-tick camera integrator step for a rate in [-1, 1]
///
/// Zero inside the dead-zone, otherwise `rate * step` truncated toward zero
/// with a minimum magnitude of 1.
pub fn camera_delta(rate: f32, deadzone: f32, step: u8) -> i16 {
    if !rate.is_finite() || rate.abs() <= deadzone || step == 0 {
        return 0;
    }
    let magnitude = ((rate.abs().min(1.0) * step as f32).trunc() as i16).max(1);
    if rate > 0.0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Apply a signed offset to a channel value, saturating at the channel bounds
pub fn offset_channel(value: u8, offset: i16) -> u8 {
    (value as i16 + offset).clamp(CHANNEL_MIN as i16, CHANNEL_MAX as i16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_example() {
        assert_eq!(map_to_range(0.5, 0.1, 1.0, 127.0, 255.0), 184);
        assert_eq!(map_axis(0.5, 0.1), 184);
    }

    #[test]
    fn test_axis_endpoints() {
        assert_eq!(map_axis(1.0, 0.1), 255);
        assert_eq!(map_axis(-1.0, 0.1), 0);
        assert_eq!(map_axis(0.0, 0.1), 127);
        assert_eq!(map_axis(0.1, 0.1), 127);
        assert_eq!(map_axis(-0.1, 0.1), 127);
    }

    #[test]
    fn test_axis_monotonic_and_bounded() {
        let mut prev = 0u8;
        for i in 0..=2000 {
            let v = -1.0 + i as f32 * 0.001;
            let out = map_axis(v, 0.1);
            assert!(out >= prev, "not monotonic at {}: {} < {}", v, out, prev);
            prev = out;
        }
        assert_eq!(map_axis(5.0, 0.1), 255);
        assert_eq!(map_axis(-5.0, 0.1), 0);
        assert_eq!(map_axis(f32::NAN, 0.1), 127);
    }

    #[test]
    fn test_bounded_output() {
        for i in 0..=200 {
            let v = -1.0 + i as f32 * 0.01;
            let out = map_axis_bounded(v, 0.05, 40, 210);
            assert!((40..=210).contains(&out));
        }
    }

    #[test]
    fn test_inverted_range() {
        assert_eq!(map_to_range(1.0, 0.0, 1.0, 127.0, 0.0), 0);
        assert_eq!(map_to_range(0.0, 0.0, 1.0, 127.0, 0.0), 127);
    }

    #[test]
    fn test_pedals() {
        assert_eq!(esc_from_pedals(0.0, 0.0, 0.1), 127);
        assert_eq!(esc_from_pedals(1.0, 0.0, 0.1), 255);
        assert_eq!(esc_from_pedals(0.0, 1.0, 0.1), 0);
        // brake wins a tie
        assert_eq!(esc_from_pedals(1.0, 1.0, 0.1), 0);
        assert!(esc_from_pedals(0.9, 0.5, 0.1) > 127);

        assert_eq!(pedal_pressure(1.0), 0.0);
        assert_eq!(pedal_pressure(-1.0), 1.0);
        assert_eq!(pedal_pressure(0.0), 0.5);
    }

    #[test]
    fn test_camera_delta() {
        assert_eq!(camera_delta(0.1, 0.2, 3), 0);
        assert_eq!(camera_delta(0.25, 0.2, 3), 1);
        assert_eq!(camera_delta(0.7, 0.2, 3), 2);
        assert_eq!(camera_delta(1.0, 0.2, 3), 3);
        assert_eq!(camera_delta(-1.0, 0.2, 3), -3);
        assert_eq!(camera_delta(-1.0, 0.2, 1), -1);
    }

    #[test]
    fn test_offset_channel_saturates() {
        assert_eq!(offset_channel(250, 50), 255);
        assert_eq!(offset_channel(10, -50), 0);
        assert_eq!(offset_channel(127, -2), 125);
    }
}
