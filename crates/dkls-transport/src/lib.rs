//! # dkls-transport
//!
//! The Relay Client (C2, §4.2): one authenticated WebSocket connection per
//! SDK instance, plus the JSON HTTP control plane used for party and group
//! management.
//!
//! This crate knows nothing about AEAD sealing or the MPC engine; it moves
//! [`dkls_types::envelope::Envelope`] values and JSON control-plane bodies
//! across the network and back, matching the wire contract fixed in §6.
//!
//! ## Modules
//!
//! - [`wire`] — the JSON shape of an envelope and heartbeat control frames
//!   as they appear on the WebSocket, and their conversion to/from the
//!   internal [`dkls_types::envelope::Envelope`].
//! - [`http`] — the four control-plane endpoints (`/party/register`,
//!   `/group/create`, `/group/join`, `/group/info`).
//! - [`ws`] — the WebSocket connection: outbound queue, heartbeat,
//!   reconnect with backoff.
//! - [`client`] — [`client::RelayClient`], the public C2 surface combining
//!   both.
//! - [`relay`] — [`relay::RelayControlPlane`], the trait boundary the
//!   rest of the workspace programs against so tests can substitute an
//!   in-process fake relay.

pub mod client;
pub mod http;
pub mod relay;
pub mod ws;
pub mod wire;

pub use client::RelayClient;
pub use relay::RelayControlPlane;

/// Error taxonomy for the Relay Client (§7 `Transport`/`Protocol`/`Backpressure`).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connect failed, read/write error, or the socket closed. Retried
    /// internally per the reconnect policy; surfaced only once that
    /// budget is exhausted.
    #[error("transport error: {0}")]
    Transport(String),

    /// The relay rejected a control-plane request, or a response did not
    /// match the expected schema.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The outbound queue is full (`MAX_PENDING`, §4.2).
    #[error("outbound queue is full")]
    Backpressure,

    /// A caller-supplied argument violated a precondition.
    #[error("invalid argument: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
