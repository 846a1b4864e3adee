//! Chunk-safe base64 transport (§4.1 "Base64 transport").
//!
//! Payloads routinely exceed 100 KiB. The encoder processes input in
//! fixed chunks so it never depends on stack depth for arbitrarily
//! large arrays; the decoder processes the whole string in one pass,
//! because splitting a base64 *ciphertext* string anywhere but an
//! encoder-chosen chunk boundary corrupts the decoded bytes (and, for
//! an AEAD ciphertext, corrupts integrity). This module intentionally
//! exposes no chunked-decode function.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::{CryptoError, Result};

/// Encoder chunk size: the largest multiple of 3 not exceeding 32 KiB.
///
/// Base64 encodes 3 input bytes to 4 output chars with no padding
/// introduced until the final group; chunking on a multiple of 3 means
/// concatenating the per-chunk base64 strings is byte-for-byte
/// identical to encoding the whole input at once.
pub const ENCODE_CHUNK_SIZE: usize = 32_766;

const _: () = assert!(ENCODE_CHUNK_SIZE % 3 == 0);

/// Base64-encode arbitrary-length input by chunking at
/// [`ENCODE_CHUNK_SIZE`]-byte boundaries and concatenating the
/// per-chunk encodings.
///
/// Equivalent to `STANDARD.encode(data)` for any input, but never
/// materializes more than one chunk's worth of intermediate encoding
/// state at a time.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(ENCODE_CHUNK_SIZE) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Decode a base64 string in a single pass.
///
/// Never split `encoded` before calling this — only whole, complete
/// base64 strings (as produced by [`encode`] or an equivalent encoder)
/// decode correctly. A caller who chunks ciphertext before decoding it
/// will silently corrupt AEAD integrity; this function's single-call
/// contract is the fix.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Base64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_roundtrip(len: usize) {
        let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap_or_else(|_| panic!("decode failed for len {len}"));
        assert_eq!(decoded, data, "roundtrip mismatch for len {len}");
    }

    #[test]
    fn roundtrips_boundary_sizes() {
        for len in [0usize, 1, 2, 3, 4096, 65536, 262_144] {
            check_roundtrip(len);
        }
    }

    #[test]
    fn matches_single_shot_encoding() {
        let data = vec![0xABu8; 100_000];
        assert_eq!(encode(&data), STANDARD.encode(&data));
    }

    #[test]
    fn chunk_count_scales_with_input() {
        let data = vec![0u8; ENCODE_CHUNK_SIZE * 3 + 7];
        // Just verifies the multi-chunk path also roundtrips exactly.
        let encoded = encode(&data);
        assert_eq!(decode(&encoded).expect("decode"), data);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode("not valid base64!!").is_err());
    }
}
