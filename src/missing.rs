//! Missing-data sentinels
//!
//! Absent values are represented by a reserved numeric sentinel rather than
//! an option type, and arithmetic propagates the sentinel instead of raising
//! an error. Every consumer of grid values must treat the sentinel as "no
//! data", never as a numeric zero.

/// Sentinel for a missing floating-point value.
pub const MISSING: f32 = -99999.0;

/// Sentinel for a missing grid index.
pub const MISSING_INDEX: i32 = -99999;

/// Check whether a value is the missing sentinel.
#[inline(always)]
pub fn is_missing(value: f32) -> bool {
    value == MISSING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_detection() {
        assert!(is_missing(MISSING));
        assert!(!is_missing(0.0));
        assert!(!is_missing(-99998.0));
    }
}
