//! The wire envelope carried by the relay (§3 "Envelope", §6).

use serde::{Deserialize, Serialize};

use crate::party::PartyId;

/// The addressed recipient of an envelope: a specific party, or the
/// distinguished "broadcast" value delivered to every current group
/// member except the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipient {
    Broadcast,
    Party(PartyId),
}

impl Recipient {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Recipient::Broadcast)
    }
}

/// A sealed, addressed, round-tagged message between two parties via
/// the relay.
///
/// `sealed_payload` is AEAD ciphertext; `dkls-crypto` is the only
/// crate that opens it. This type is pure data — no decryption logic
/// lives here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub from_party: PartyId,
    pub to: Recipient,
    pub round_index: u32,
    /// 12-byte AES-GCM nonce, base64 on the wire.
    pub nonce: [u8; 12],
    pub sealed_payload: Vec<u8>,
}

impl Envelope {
    /// The associated data bound into the AEAD seal: `from || to || round`.
    ///
    /// Matches §4.1: `AD = from_party || to_party_or_broadcast || round_index`.
    pub fn associated_data(&self) -> Vec<u8> {
        let mut ad = Vec::with_capacity(33 + 33 + 4);
        ad.extend_from_slice(self.from_party.as_bytes());
        match self.to {
            Recipient::Broadcast => ad.extend_from_slice(b"broadcast"),
            Recipient::Party(p) => ad.extend_from_slice(p.as_bytes()),
        }
        ad.extend_from_slice(&self.round_index.to_be_bytes());
        ad
    }
}
