//! Gear state machine
//!
//! ```text
//! upshift:   R -> N -> 1 -> 2 -> ... -> max   (saturates at max)
//! downshift: max -> ... -> 1 -> N -> R        (saturates at R)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire value reserved for reverse
pub const REVERSE_BYTE: u8 = 255;
/// Wire value for neutral
pub const NEUTRAL_BYTE: u8 = 0;
/// Default number of forward gears
pub const DEFAULT_MAX_GEAR: u8 = 6;

/// Selected gear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gear {
    Reverse,
    #[default]
    Neutral,
    Forward(u8),
}

impl Gear {
    pub fn to_byte(self) -> u8 {
        match self {
            Gear::Reverse => REVERSE_BYTE,
            Gear::Neutral => NEUTRAL_BYTE,
            Gear::Forward(n) => n,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Reverse => write!(f, "R"),
            Gear::Neutral => write!(f, "N"),
            Gear::Forward(n) => write!(f, "{}", n),
        }
    }
}

/// Sequential gearbox with a fixed number of forward gears
#[derive(Debug, Clone)]
pub struct Transmission {
    gear: Gear,
    max_gear: u8,
}

impl Transmission {
    /// Create a gearbox in neutral
    ///
    /// `max_gear` is clamped to `1..=254` so forward gears never collide with
    /// the reverse sentinel.
    pub fn new(max_gear: u8) -> Self {
        Self {
            gear: Gear::Neutral,
            max_gear: max_gear.clamp(1, REVERSE_BYTE - 1),
        }
    }

    pub fn gear(&self) -> Gear {
        self.gear
    }

    pub fn max_gear(&self) -> u8 {
        self.max_gear
    }

    /// Shift up one gear, returning true if the gear changed
    pub fn upshift(&mut self) -> bool {
        let next = match self.gear {
            Gear::Reverse => Gear::Neutral,
            Gear::Neutral => Gear::Forward(1),
            Gear::Forward(n) if n < self.max_gear => Gear::Forward(n + 1),
            Gear::Forward(n) => Gear::Forward(n),
        };
        self.set(next)
    }

    /// Shift down one gear, returning true if the gear changed
    pub fn downshift(&mut self) -> bool {
        let next = match self.gear {
            Gear::Reverse => Gear::Reverse,
            Gear::Neutral => Gear::Reverse,
            Gear::Forward(1) => Gear::Neutral,
            Gear::Forward(n) => Gear::Forward(n - 1),
        };
        self.set(next)
    }

    fn set(&mut self, next: Gear) -> bool {
        let changed = next != self.gear;
        self.gear = next;
        changed
    }
}

impl Default for Transmission {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upshift_saturates() {
        let mut t = Transmission::new(6);
        let mut seen = vec![t.gear()];
        for _ in 0..10 {
            t.upshift();
            seen.push(t.gear());
        }
        assert_eq!(
            &seen[..8],
            &[
                Gear::Neutral,
                Gear::Forward(1),
                Gear::Forward(2),
                Gear::Forward(3),
                Gear::Forward(4),
                Gear::Forward(5),
                Gear::Forward(6),
                Gear::Forward(6),
            ]
        );
        assert!(!t.upshift());
        assert_eq!(t.gear(), Gear::Forward(6));
    }

    #[test]
    fn test_downshift_from_neutral_reaches_reverse() {
        let mut t = Transmission::new(6);
        assert!(t.downshift());
        assert_eq!(t.gear(), Gear::Reverse);
        assert!(!t.downshift());
        assert_eq!(t.gear(), Gear::Reverse);
    }

    #[test]
    fn test_full_walk_down() {
        let mut t = Transmission::new(3);
        for _ in 0..3 {
            t.upshift();
        }
        assert_eq!(t.gear(), Gear::Forward(3));
        t.downshift();
        t.downshift();
        assert_eq!(t.gear(), Gear::Forward(1));
        t.downshift();
        assert_eq!(t.gear(), Gear::Neutral);
        t.upshift();
        t.downshift();
        t.downshift();
        assert_eq!(t.gear(), Gear::Reverse);
        t.upshift();
        assert_eq!(t.gear(), Gear::Neutral);
    }

    #[test]
    fn test_max_gear_clamped() {
        assert_eq!(Transmission::new(0).max_gear(), 1);
        assert_eq!(Transmission::new(255).max_gear(), 254);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Gear::Reverse.to_byte(), 255);
        assert_eq!(Gear::Neutral.to_byte(), 0);
        assert_eq!(Gear::Forward(4).to_byte(), 4);
        assert_eq!(Gear::Forward(2).to_string(), "2");
    }
}
