//! The facade-level error taxonomy (§7), wrapping every component
//! error with `#[from]` the way `ochra_frost::FrostCoordError` wraps
//! its lower-level crypto errors.

use dkls_types::group::GroupId;

/// Errors surfaced by [`crate::client::SdkClient`].
///
/// Every lower crate's error taxonomy already maps 1:1 onto a §7
/// kind; this enum only adds the facade-level ones that have no
/// single originating crate (`SessionFailed` carries the group id so
/// a caller can decide whether to retry or discard, per §7 "Partial
/// side effects").
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Transport(#[from] dkls_transport::TransportError),

    #[error(transparent)]
    Keyring(#[from] dkls_keyring::KeyringError),

    #[error(transparent)]
    Keystore(#[from] dkls_keystore::KeystoreError),

    #[error(transparent)]
    Bootstrap(#[from] dkls_bootstrap::BootstrapError),

    #[error(transparent)]
    Protocol(#[from] dkls_protocol::ProtocolError),

    #[error(transparent)]
    Crypto(#[from] dkls_crypto::CryptoError),

    #[error(transparent)]
    Types(#[from] dkls_types::TypesError),

    /// An AEAD envelope failed to open. Fatal for the session in
    /// progress; never retried (§4.8 "Failure semantics").
    #[error("decrypt failed: AEAD authentication did not verify")]
    Decrypt,

    /// A session failed after it had already made partial progress,
    /// e.g. a group was created but its keygen did not complete.
    #[error("session for group {group_id} failed: {reason}")]
    SessionFailed { group_id: GroupId, reason: String },

    /// A caller-supplied argument violated a documented precondition.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// No key share is on record for the requested `(group_id, party_index)`.
    #[error("no key share found for group {0}")]
    NoSuchShare(GroupId),

    /// The keystore entry exists but a passphrase is required to open
    /// it and none (or the wrong one) was supplied.
    #[error("passphrase required or incorrect for keystore entry")]
    WrongPassphrase,
}

pub type Result<T> = std::result::Result<T, SdkError>;
