//! Codes of the messages the linker emits.

use std::ops::RangeInclusive;

/// Valid error codes.
pub const ERROR_CODES: RangeInclusive<u32> = 1000..=2000;

/// Valid warning codes.
pub const WARNING_CODES: RangeInclusive<u32> = 2001..=6000;

/// A preserve directive names no member of its scope, or its scope type does not exist.
pub const UNRESOLVED_PRESERVE_TARGET: u32 = 1040;

/// A preserve directive names more than one member of its scope.
pub const AMBIGUOUS_PRESERVE_TARGET: u32 = 1041;

/// A root handed to the marking engine is not an entity of the graph.
pub const ROOT_NOT_FOUND: u32 = 2010;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_in_range() {
        assert!(ERROR_CODES.contains(&UNRESOLVED_PRESERVE_TARGET));
        assert!(ERROR_CODES.contains(&AMBIGUOUS_PRESERVE_TARGET));
        assert!(WARNING_CODES.contains(&ROOT_NOT_FOUND));
        assert!(!WARNING_CODES.contains(&2000));
    }
}
