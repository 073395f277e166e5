//! DWM1001 shell output parsing
//!
//! In ranging mode the tag prints one text line per update. Lines carrying
//! a position solution embed an `est[x,y,z,q]` token; anchor-distance-only
//! lines omit it.

use crate::reading::{Reading, Source, Value};

/// Double carriage return wakes the module into shell mode
pub const ENTER_SHELL: &[u8] = b"\r\r";
/// `les` toggles location-engine streaming on and off
pub const TOGGLE_RANGING: &[u8] = b"les\n";
/// `quit` leaves shell mode
pub const EXIT_SHELL: &[u8] = b"quit\n";
/// Longest line the shell emits
pub const MAX_LINE_LEN: usize = 256;

/// Last position solution reported by the tag
///
/// Coordinates are meters in the anchor network frame; `quality` is the
/// module's 0-100 confidence figure.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub quality: u8,
}

impl PositionEstimate {
    /// Fold one shell line into the estimate
    ///
    /// Returns whether the line carried a complete solution. Lines without
    /// one leave the previous estimate untouched, so consumers see the last
    /// known position with the fix flag lowered.
    pub fn update_from_line(&mut self, line: &str) -> bool {
        match parse_estimate_token(line) {
            Some(estimate) => {
                *self = estimate;
                true
            }
            None => false,
        }
    }

    /// Flatten the estimate into a ranging reading
    pub fn to_reading(&self, fix_ok: bool) -> Reading {
        let mut reading = Reading::new(Source::Ranging);
        reading.push("px", Value::Float(self.x));
        reading.push("py", Value::Float(self.y));
        reading.push("pz", Value::Float(self.z));
        reading.push("qf", Value::Int(self.quality as i64));
        reading.push("uwbFixOk", Value::Flag(fix_ok));
        reading
    }
}

/// Extract the `est[x,y,z,q]` token from a shell line
///
/// All four leading fields must parse or the token is rejected whole;
/// a partial solution is never taken. Trailing extra fields inside the
/// brackets are ignored.
pub fn parse_estimate_token(line: &str) -> Option<PositionEstimate> {
    let start = line.find("est[")? + 4;
    let rest = &line[start..];
    let inner = &rest[..rest.find(']')?];

    let mut parts = inner.split(',');
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    let z = parts.next()?.trim().parse().ok()?;
    let quality = parts.next()?.trim().parse().ok()?;
    Some(PositionEstimate { x, y, z, quality })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_estimate_token() {
        let estimate = parse_estimate_token("POS: est[5.25,1.17,0.62,53]").unwrap();
        assert_eq!(estimate.x, 5.25);
        assert_eq!(estimate.y, 1.17);
        assert_eq!(estimate.z, 0.62);
        assert_eq!(estimate.quality, 53);
    }

    #[test]
    fn test_parse_ignores_trailing_fields() {
        let estimate = parse_estimate_token("est[1.0,2.0,3.0,77,9,9]").unwrap();
        assert_eq!(estimate.quality, 77);
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        // No token at all
        assert!(parse_estimate_token("DIST: AN0 1.2 AN1 3.4").is_none());
        // Unterminated bracket
        assert!(parse_estimate_token("est[1.0,2.0,3.0,53").is_none());
        // Non-numeric coordinate
        assert!(parse_estimate_token("est[1.0,nan?,3.0,53]").is_none());
        // Too few fields
        assert!(parse_estimate_token("est[1.0,2.0,3.0]").is_none());
    }

    #[test]
    fn test_update_keeps_previous_estimate_on_failure() {
        let mut estimate = PositionEstimate::default();
        assert!(estimate.update_from_line("est[1.5,2.5,3.5,80]"));
        assert!(!estimate.update_from_line("est[broken"));
        assert_eq!(estimate.x, 1.5);
        assert_eq!(estimate.quality, 80);
    }

    #[test]
    fn test_reading_fields() {
        let estimate = PositionEstimate {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            quality: 50,
        };
        let reading = estimate.to_reading(true);
        assert_eq!(reading.get("px"), Some(Value::Float(1.0)));
        assert_eq!(reading.get("py"), Some(Value::Float(2.0)));
        assert_eq!(reading.get("pz"), Some(Value::Float(3.0)));
        assert_eq!(reading.get("qf"), Some(Value::Int(50)));
        assert_eq!(reading.get("uwbFixOk"), Some(Value::Flag(true)));

        let reading = estimate.to_reading(false);
        assert_eq!(reading.get("uwbFixOk"), Some(Value::Flag(false)));
    }
}
