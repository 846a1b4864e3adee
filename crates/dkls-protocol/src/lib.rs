//! # dkls-protocol
//!
//! The Round Processor (C5, §4.5) and Protocol Manager (C6, §4.6): the
//! part of the workspace that drives an [`dkls_engine::MpcEngine`]
//! round by round from buffered inbound payloads, and that owns the
//! single-flight policy deciding which protocol may run against a
//! group at any one time.
//!
//! Neither module touches the network or AEAD sealing directly —
//! `dkls-bootstrap` and `dkls-sdk` hand this crate already-opened round
//! payloads (from `dkls-crypto::aead::open_envelope`) and forward its
//! outbound [`dkls_engine::EngineMessage`] values back out to
//! `dkls-transport` after sealing them.
//!
//! ## Modules
//!
//! - [`processor`] — [`processor::RoundProcessor`], the per-session
//!   state machine.
//! - [`manager`] — [`manager::ProtocolManager`], single-flight routing
//!   across groups.

pub mod manager;
pub mod processor;

pub use manager::{ProtocolManager, RoutedOutcome};
pub use processor::{ProcessorState, RoundProcessor};

/// Error taxonomy for this crate (§7 `Engine`/`Timeout`/`Busy`/`Invalid`/`Cancelled`).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The engine itself failed, after exhausting the per-round retry
    /// budget (§4.5).
    #[error("engine error: {0}")]
    Engine(#[from] dkls_engine::EngineError),

    /// A round, or the session as a whole, did not reach fan-in before
    /// its deadline.
    #[error("{scope} timed out")]
    Timeout { scope: String },

    /// `start_*` was called for a group with a session already active.
    #[error("a session is already active for this group")]
    Busy,

    /// A caller-supplied argument violated a precondition.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// The session was cancelled before it reached a terminal state.
    #[error("session cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
