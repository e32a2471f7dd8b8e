//! Type codes
//!
//! One byte leads every node on the wire and every value pre-image fed to the
//! hasher. Tuples occupy nine consecutive codes, one per arity.

/// 256-bit number
pub const NUM: u8 = 0;
/// Reference to one instruction of a code segment
pub const CODE_POINT_STUB: u8 = 1;
/// Out-of-line marker: a 32-byte hash follows instead of an inline value
pub const HASH_PRE_IMAGE: u8 = 2;
/// Tuple of arity 0; arity `k` uses `TUPLE + k`
pub const TUPLE: u8 = 3;
/// Binary tree of 32-byte leaves
pub const BUFFER: u8 = TUPLE + 9;
/// Full instruction list of a segment
pub const CODE_SEGMENT: u8 = BUFFER + 1;

/// Largest tuple arity the wire format can express
pub const MAX_TUPLE_SIZE: usize = 8;

/// Type code for a tuple of the given arity
///
/// Returns `None` when the arity has no code.
pub fn tuple_code(arity: usize) -> Option<u8> {
    if arity > MAX_TUPLE_SIZE {
        return None;
    }
    u8::try_from(arity).ok().map(|a| TUPLE + a)
}

/// Arity encoded by a tuple type code, or `None` for any other code
pub fn tuple_arity(code: u8) -> Option<usize> {
    let arity = usize::from(code.checked_sub(TUPLE)?);
    (arity <= MAX_TUPLE_SIZE).then_some(arity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let fixed = [NUM, CODE_POINT_STUB, HASH_PRE_IMAGE, BUFFER, CODE_SEGMENT];
        for code in fixed {
            assert_eq!(tuple_arity(code), None, "code {} overlaps tuples", code);
        }
    }

    #[test]
    fn test_tuple_code_range() {
        assert_eq!(tuple_code(0), Some(TUPLE));
        assert_eq!(tuple_code(8), Some(TUPLE + 8));
        assert_eq!(tuple_code(9), None);
        assert_eq!(tuple_arity(TUPLE + 3), Some(3));
        assert_eq!(tuple_arity(TUPLE + 9), None);
    }
}
