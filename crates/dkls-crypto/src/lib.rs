//! # dkls-crypto
//!
//! The Envelope Codec (C1, §4.1) and the passphrase KDF used to derive
//! the keystore-at-rest key (§4.4).
//!
//! This crate is pure: no I/O, no global state. Every failure mode is a
//! typed error; nothing is silently truncated.
//!
//! ## Modules
//!
//! - [`aead`] — AES-256-GCM seal/open with the §4.1 associated-data contract.
//! - [`b64`] — chunk-safe base64 encode, single-pass decode.
//! - [`kdf`] — Argon2id passphrase-based key derivation.

pub mod aead;
pub mod b64;
pub mod kdf;

/// Error types for the envelope codec and KDF.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD seal or open failed (tag mismatch or AD disagreement).
    #[error("decrypt failed: AEAD authentication did not verify")]
    DecryptFailed,

    /// Base64 input was malformed.
    #[error("base64 decode failed: {0}")]
    Base64(String),

    /// Argon2id key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// A caller-supplied argument violated a precondition.
    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
