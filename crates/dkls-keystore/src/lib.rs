//! # dkls-keystore
//!
//! The Keystore (C4, §4.4): a pluggable mapping from `key_name` to an
//! opaque, already-sealed byte string, plus the binary codec for the
//! persisted key-share blob (§6 "Persisted key-share blob").
//!
//! `dkls-keystore` does not decide *whether* or *how* to derive a
//! sealing key from a user passphrase — that policy belongs to
//! `dkls-sdk`, the sole caller that knows whether a passphrase is
//! configured (§4.4: "already sealed by the Facade before reaching the
//! Keystore"). This crate owns the storage contract itself: the three
//! canonical backends, and the fixed binary layout the sealed bytes
//! take.
//!
//! ## Modules
//!
//! - [`backend`] — the `KeystoreBackend` trait and its three canonical
//!   implementations (in-memory, filesystem, browser-local-shaped).
//! - [`blob`] — `seal_share`/`open_share`, the §6 binary layout codec.

pub mod backend;
pub mod blob;

pub use backend::{FilesystemBackend, InMemoryBackend, KeystoreBackend, StubBrowserLocalBackend};

/// Errors raised by the Keystore.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// The backend is not usable in the current host (e.g. private
    /// browsing mode, or a non-wasm host asking for browser-local
    /// storage).
    #[error("keystore backend unavailable: {0}")]
    Unavailable(String),

    /// The underlying storage medium (filesystem, browser API) failed.
    #[error("keystore storage error: {0}")]
    Storage(String),

    /// A persisted blob failed to parse, or its magic/version did not
    /// match, or AEAD authentication failed.
    #[error("keystore blob invalid: {0}")]
    InvalidBlob(String),
}

pub type Result<T> = std::result::Result<T, KeystoreError>;

/// `key_name = "keyshare_" || group_id_hex || "_" || party_index` (§4.4).
///
/// Re-exported from `dkls_types` for convenience; kept as a single
/// source of truth there since the format is also part of the data
/// model (§3 "Key Share").
pub use dkls_types::share::keystore_key_name;
