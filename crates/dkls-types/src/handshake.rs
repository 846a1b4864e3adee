//! The out-of-band invite blob (§6 "Handshake blob (invite)").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The protocol kind an invite bootstraps into. Distinct from
/// [`crate::session::ProtocolKind`]: the wire field names here are the
/// exact strings §6 specifies (`"keygen" | "sign" | "rotation"`), and
/// an invite is never issued for recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteKind {
    Keygen,
    Sign,
    Rotation,
}

/// Canonical handshake blob shape, exactly as specified in §6.
///
/// Field names intentionally use the wire's camelCase rather than the
/// Rust-idiomatic snake_case used elsewhere, since this struct's job is
/// to (de)serialize the literal JSON the UI layer puts in a QR/link.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakeBlob {
    #[serde(rename = "type")]
    pub kind: InviteKind,
    pub version: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
    pub threshold: u32,
    #[serde(rename = "totalParties")]
    pub total_parties: u32,
    pub timeout: u64,
    pub timestamp: u64,
    #[serde(rename = "aesKey")]
    pub aes_key: String,
    #[serde(rename = "messageHash", skip_serializing_if = "Option::is_none")]
    pub message_hash: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// The handshake blob version this SDK emits and accepts.
pub const HANDSHAKE_VERSION: &str = "1.0";
