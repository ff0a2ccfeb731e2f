//! Input Sanitization
//!
//! Numeric helpers that keep scoring inputs and outputs inside their contracts.
//!
//! Functions:
//! - Leading-integer parsing for free-form answers
//! - Answer value clamping
//! - Half-up rounding and score clamping

use crate::types::{DEFAULT_ANSWER_VALUE, MAX_ANSWER_VALUE, MAX_SCORE, MIN_ANSWER_VALUE};

/// Parses the leading integer of a string: optional whitespace, optional sign, digits.
/// Trailing garbage is ignored (`"4 stars"` -> 4); no digits yields `None`.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        &rest[..end]
    };

    if digits.is_empty() {
        return None;
    }

    // Saturate absurdly long digit runs; they clamp to the top of the scale anyway.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Maps a parsed integer onto the 1..=5 answer scale. Zero counts as "no answer".
pub fn normalize_answer_value(value: i64) -> u8 {
    if value == 0 {
        return DEFAULT_ANSWER_VALUE;
    }
    value.clamp(MIN_ANSWER_VALUE as i64, MAX_ANSWER_VALUE as i64) as u8
}

/// Rounds half away from negative infinity, like `Math.round`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Clamps an intermediate score into 0..=100.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(0, MAX_SCORE as i64) as u8
}

/// Linear interpolation onto an integer range, `t` clamped to [0, 1].
pub fn lerp_u8(low: u8, high_inclusive: u8, t: f64) -> u8 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let span = (high_inclusive - low) as f64;
    low + round_half_up(span * t) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("4"), Some(4));
        assert_eq!(parse_leading_int("  12abc"), Some(12));
        assert_eq!(parse_leading_int("-2"), Some(-2));
        assert_eq!(parse_leading_int("+5"), Some(5));
        assert_eq!(parse_leading_int("4.7"), Some(4));
        assert_eq!(parse_leading_int("xyz"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn test_normalize_answer_value() {
        assert_eq!(normalize_answer_value(4), 4);
        assert_eq!(normalize_answer_value(0), DEFAULT_ANSWER_VALUE);
        assert_eq!(normalize_answer_value(9), 5);
        assert_eq!(normalize_answer_value(-3), 1);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(66.5), 67);
        assert_eq!(round_half_up(66.4999), 66);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-4), 0);
        assert_eq!(clamp_score(55), 55);
        assert_eq!(clamp_score(110), 100);
    }

    #[test]
    fn test_lerp_u8_bounds() {
        assert_eq!(lerp_u8(50, 99, 0.0), 50);
        assert_eq!(lerp_u8(50, 99, 1.0), 99);
        assert_eq!(lerp_u8(50, 99, 2.0), 99);
        assert_eq!(lerp_u8(50, 99, f64::NAN), 50);
    }
}
