//! # dkls-types
//!
//! Shared data model for the threshold-ECDSA SDK (§3 of the design).
//!
//! This crate holds plain value types only — no I/O, no cryptography,
//! no async. Every other crate in the workspace depends on it so that
//! `Party`, `Group`, `Envelope`, `Session`, and `KeyShare` have exactly
//! one definition.
//!
//! ## Modules
//!
//! - [`party`] — party identity and the relay-issued bearer token.
//! - [`group`] — group membership, threshold/participant invariants.
//! - [`envelope`] — the wire envelope exchanged over the relay.
//! - [`session`] — session identity and protocol kind.
//! - [`share`] — the persisted key-share artifact.
//! - [`handshake`] — the out-of-band invite blob.

pub mod envelope;
pub mod group;
pub mod handshake;
pub mod party;
pub mod session;
pub mod share;

/// Error type for data-model invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A caller-supplied value violated a documented precondition.
    #[error("invalid value: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
