//! Keyboard key identifiers
//!
//! Keys are identified by the lowercased browser `KeyboardEvent.key` value,
//! with the space bar spelled `space`.

/// Normalized key identifiers used by the keyboard profile
pub mod key {
    pub const W: &str = "w";
    pub const A: &str = "a";
    pub const S: &str = "s";
    pub const D: &str = "d";
    pub const E: &str = "e";
    pub const Q: &str = "q";
    pub const M: &str = "m";
    pub const COMMA: &str = ",";
    pub const PERIOD: &str = ".";
    pub const LEFT_BRACKET: &str = "[";
    pub const RIGHT_BRACKET: &str = "]";
    pub const SPACE: &str = "space";
    pub const DIGIT_1: &str = "1";
    pub const DIGIT_2: &str = "2";
    pub const DIGIT_3: &str = "3";
    pub const DIGIT_4: &str = "4";
    pub const ARROW_LEFT: &str = "arrowleft";
    pub const ARROW_RIGHT: &str = "arrowright";
    pub const ARROW_UP: &str = "arrowup";
    pub const ARROW_DOWN: &str = "arrowdown";
}

/// Normalize a key identifier
///
/// Lowercases, maps `" "`/`"Spacebar"` to `space` and the pre-standard
/// `Left`/`Right`/`Up`/`Down` names to their `Arrow*` forms.
pub fn normalize(raw: &str) -> String {
    if raw == " " {
        return key::SPACE.to_string();
    }
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "spacebar" => key::SPACE.to_string(),
        "left" => key::ARROW_LEFT.to_string(),
        "right" => key::ARROW_RIGHT.to_string(),
        "up" => key::ARROW_UP.to_string(),
        "down" => key::ARROW_DOWN.to_string(),
        _ => lower,
    }
}
