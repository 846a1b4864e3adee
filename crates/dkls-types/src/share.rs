//! The persisted key-share artifact (§3 "Key Share", §6 binary layout).

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::group::GroupId;
use crate::party::{BearerToken, PartyId, PartyIndex};

/// A compressed secp256k1 public key, 33 bytes.
///
/// The SDK core treats this as an opaque byte string; `dkls-engine` is
/// where it is interpreted cryptographically.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub [u8; 33]);

impl std::fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKeyBytes({})", hex::encode(self.0))
    }
}

/// A key share produced by DKG or Rotation (§3 "Key Share").
///
/// `serialized` is the opaque engine-state byte string; it is
/// zeroized on drop since it is the sensitive half of the share. The
/// persisted, AEAD-sealed form of this type lives in `dkls-keystore`.
#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct KeyShare {
    #[zeroize(skip)]
    pub public_key: PublicKeyBytes,
    #[zeroize(skip)]
    pub party_index: PartyIndex,
    #[zeroize(skip)]
    pub threshold: u8,
    #[zeroize(skip)]
    pub participants: Vec<PartyId>,
    #[zeroize(skip)]
    pub group_id: GroupId,
    #[zeroize(skip)]
    pub relay_token: Option<BearerToken>,
    /// Opaque engine-state bytes (the sensitive secret material).
    pub serialized: Vec<u8>,
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("public_key", &self.public_key)
            .field("party_index", &self.party_index)
            .field("threshold", &self.threshold)
            .field("participants", &self.participants.len())
            .field("group_id", &self.group_id)
            .field("serialized", &"<redacted>")
            .finish()
    }
}

/// `key_name = "keyshare_" || group_id_hex || "_" || party_index` (§4.4).
pub fn keystore_key_name(group_id: &GroupId, party_index: PartyIndex) -> String {
    format!("keyshare_{}_{}", group_id.to_hex(), party_index.0)
}
