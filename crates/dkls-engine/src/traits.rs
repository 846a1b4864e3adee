//! The MpcEngine capability boundary itself.
//!
//! An engine is a single-session, single-threaded state machine: it is
//! constructed for exactly one `(group, protocol, party_index)` tuple,
//! driven round by round through [`MpcEngine::first_message`] and
//! [`MpcEngine::handle`], and eventually yields an [`Artifact`]. The
//! Round Processor owns all transport, buffering, and retry policy; the
//! engine never sees a `PartyId`, a wire envelope, or a timer, only
//! `PartyIndex`-addressed payloads.

use dkls_types::party::PartyIndex;
use dkls_types::session::ProtocolKind;
use dkls_types::share::PublicKeyBytes;

/// Errors an engine implementation may surface.
///
/// The Round Processor treats all of these as fatal to the current
/// session; the Protocol Manager is responsible for deciding whether a
/// fresh session is worth starting (§4.5 attempt budget).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A caller-supplied parameter did not meet the engine's preconditions.
    #[error("invalid session parameters: {0}")]
    InvalidParams(String),

    /// An inbound payload could not be parsed or did not belong to the
    /// current round.
    #[error("malformed round message: {0}")]
    MalformedMessage(String),

    /// The round computation itself failed (e.g. an arithmetic
    /// precondition the engine relies on did not hold).
    #[error("round computation failed: {0}")]
    ComputationFailed(String),

    /// Serializing or restoring engine state failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// This protocol, or this step of it, is not implemented by the
    /// engine in use.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Where an outbound engine message should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRecipient {
    /// Deliver to every other participant in the session.
    Broadcast,
    /// Deliver only to the named participant.
    Peer(PartyIndex),
}

/// A single outbound message produced by a round.
#[derive(Debug, Clone)]
pub struct EngineMessage {
    pub to: EngineRecipient,
    pub payload: Vec<u8>,
}

/// A single inbound message handed to the engine for the current round.
///
/// The Round Processor has already demultiplexed this by
/// `(group_id, protocol_kind, round_index)` and resolved the sender's
/// `PartyId` down to its `PartyIndex` before calling
/// [`MpcEngine::handle`]; the engine need not know anything about wire
/// identities.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: PartyIndex,
    pub payload: Vec<u8>,
}

/// The result of a completed ceremony.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// A key share produced by DKG or key rotation.
    Share {
        serialized: Vec<u8>,
        public_key: PublicKeyBytes,
    },
    /// A signature produced by DSG, over the digest supplied at
    /// construction time.
    Signature { r: [u8; 32], s: [u8; 32] },
}

/// Parameters used to construct a new engine session (§6 "construct-session").
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub protocol_kind: ProtocolKind,
    pub party_index: PartyIndex,
    /// Every participant in this session, `self` included, in the fixed
    /// order the engine uses to index polynomial evaluation points.
    pub participants: Vec<PartyIndex>,
    pub threshold: u8,
    /// Required for `Dsg`: the 32-byte pre-image digest to sign.
    pub digest: Option<[u8; 32]>,
    /// Required for `Dsg`, `Rotation`, and `Recovery`: this party's
    /// existing key share, as produced by a prior `Dkg` or `Rotation`
    /// artifact's `serialized` bytes.
    pub existing_share: Option<Vec<u8>>,
}

/// A single-session, single-threaded MPC round state machine.
///
/// Implementations are driven by exactly one thread, and exactly one
/// session at a time: `first_message` is called once, then `handle` is
/// called once per round with that round's fully gathered inbound
/// messages, until `completed` returns `Some`.
pub trait MpcEngine: Send {
    /// Produce this party's round-1 outbound messages. Called exactly
    /// once, immediately after construction.
    fn first_message(&mut self) -> Result<Vec<EngineMessage>>;

    /// Advance the state machine given all of the current round's
    /// inbound messages (one per other participant). Returns the next
    /// round's outbound messages, or an empty vector if this was the
    /// final round — in which case [`MpcEngine::completed`] must
    /// thereafter return `Some`.
    fn handle(&mut self, round_index: u32, inbound: &[InboundMessage]) -> Result<Vec<EngineMessage>>;

    /// `Some` once the ceremony has produced its artifact.
    fn completed(&self) -> Option<Artifact>;

    /// Serialize engine state for at-rest persistence (key shares only;
    /// mid-ceremony engine state is never persisted — §4.5 sessions do
    /// not survive a process restart).
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

/// Constructs engines for a session.
///
/// A concrete `EngineFactory` is the thing an application wires up to
/// provide real DKLS round math; `dkls-engine` itself only ships
/// [`crate::fixture::FixtureEngineFactory`], a test double. §6's
/// "from-bytes" capability is `SessionParams::existing_share` plus this
/// same `construct` call — there is no separate entry point, since a
/// `Dsg`, `Rotation`, or `Recovery` session always needs its own fresh
/// `SessionParams` (participants, threshold, digest) alongside the
/// restored share.
pub trait EngineFactory: Send + Sync {
    fn construct(&self, params: &SessionParams) -> Result<Box<dyn MpcEngine>>;
}
