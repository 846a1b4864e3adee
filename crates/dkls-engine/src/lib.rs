//! # dkls-engine
//!
//! The MpcEngine capability boundary (§6 "External capabilities"). The
//! threshold-ECDSA round math itself — DKG, DSG, key rotation, recovery —
//! is explicitly out of scope for this workspace (§1 Non-goals); what
//! lives here is the *trait* that any such engine must implement to be
//! driven by the Round Processor (`dkls-protocol`), plus the value types
//! that cross the boundary (public keys, digests, signatures) and a
//! deterministic test-double implementation used only by this
//! workspace's own tests.
//!
//! ## Modules
//!
//! - [`traits`] — `MpcEngine`, `EngineFactory`, and the message/artifact
//!   types exchanged across the boundary.
//! - [`fixture`] — a non-cryptographic-grade, Shamir-secret-sharing-based
//!   engine used by `dkls-integration-tests` to exercise the rest of the
//!   workspace end to end. It is not a DKLS implementation and must never
//!   be mistaken for one.
//! - [`verify`] — ECDSA signature verification against a secp256k1
//!   public key, used to check signing artifacts produced by either a
//!   real engine or the fixture.

pub mod fixture;
pub mod traits;
pub mod verify;

pub use traits::{
    Artifact, EngineError, EngineFactory, EngineMessage, EngineRecipient, InboundMessage,
    MpcEngine, Result, SessionParams,
};
