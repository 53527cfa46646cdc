//! Cryptographic utilities
//!
//! ## Security Patterns
//!
//! - **Constant-Time Comparison**: Prevents timing attacks on secret comparisons

use subtle::ConstantTimeEq;

/// Performs constant-time comparison of two byte slices.
///
/// Standard comparison (`==`) returns as soon as it finds a mismatching byte,
/// which creates a timing side-channel an attacker can use to discover secret
/// values one byte at a time. The `subtle` crate's comparison takes the same
/// amount of time regardless of where (or if) the inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time comparison of two strings.
///
/// Convenience wrapper around [`constant_time_eq`].
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq_same() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(constant_time_str_eq("secret123", "secret123"));
    }

    #[test]
    fn test_constant_time_eq_different() {
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_str_eq("secret123", "secret456"));
    }

    #[test]
    fn test_constant_time_eq_different_lengths() {
        assert!(!constant_time_eq(b"short", b"longer"));
    }

    #[test]
    fn test_empty() {
        assert!(constant_time_eq(b"", b""));
    }
}
