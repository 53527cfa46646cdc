//! Opaque token generation and encoding
//!
//! A single codec handles both credential carriers: session cookie values and
//! password reset tokens. Values travel as URL-safe unpadded base64, a
//! reversible transport encoding rather than encryption. Secrets get their
//! unguessability from the CSPRNG, not from the encoding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

use crate::error::{AuthError, Result};

/// Generates and encodes opaque random tokens; decodes carrier values.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    length: usize,
}

impl TokenCodec {
    /// Create a codec generating secrets of `length` bytes.
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Configured secret length in bytes, before encoding.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a fresh random secret, returned in encoded form.
    ///
    /// Uses the operating system CSPRNG. Two calls never produce the same
    /// value for any practical token length.
    pub fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.length];
        OsRng.fill_bytes(&mut bytes);
        Self::encode(&bytes)
    }

    /// Encode raw bytes for transport.
    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decode a carrier value back into raw bytes.
    ///
    /// Failure is `Malformed`: an undecodable value never reaches a store
    /// lookup and is never conflated with "not found".
    pub fn decode(value: &str) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| AuthError::malformed("failed to decode credential value").with_details(e.to_string()))
    }

    /// Decode a carrier value that must contain UTF-8 text (session ids).
    pub fn decode_str(value: &str) -> Result<String> {
        let bytes = Self::decode(value)?;
        String::from_utf8(bytes)
            .map_err(|e| AuthError::malformed("credential value is not valid text").with_details(e.to_string()))
    }

    /// Check a decoded value against the configured entropy.
    ///
    /// Reset tokens shorter than configured cannot have come from this
    /// codec and are rejected before any lookup.
    pub fn validate(&self, value: &str) -> Result<()> {
        let bytes = Self::decode(value)?;
        if bytes.len() != self.length {
            return Err(AuthError::malformed("reset token has unexpected length"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashSet;

    #[test]
    fn test_generate_round_trip() {
        let codec = TokenCodec::new(32);
        let token = codec.generate();
        let bytes = TokenCodec::decode(&token).unwrap();
        assert_eq!(bytes.len(), 32);
        assert!(codec.validate(&token).is_ok());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let codec = TokenCodec::new(32);
        let tokens: HashSet<String> = (0..100).map(|_| codec.generate()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_decode_malformed() {
        let err = TokenCodec::decode("not//valid==base64!").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }

    #[test]
    fn test_decode_str() {
        let encoded = TokenCodec::encode(b"session-id-123");
        assert_eq!(TokenCodec::decode_str(&encoded).unwrap(), "session-id-123");
    }

    #[test]
    fn test_decode_str_non_utf8() {
        let encoded = TokenCodec::encode(&[0xff, 0xfe, 0xfd]);
        let err = TokenCodec::decode_str(&encoded).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }

    #[test]
    fn test_validate_wrong_length() {
        let codec = TokenCodec::new(32);
        let short = TokenCodec::encode(&[0u8; 16]);
        let err = codec.validate(&short).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }
}
