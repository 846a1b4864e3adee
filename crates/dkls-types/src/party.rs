//! Party identity (§3 "Party").

use serde::{Deserialize, Serialize};

use crate::{Result, TypesError};

/// A 33-byte compressed-point-shaped party identifier.
///
/// The leading byte is `0x02` or `0x03` by construction — the same
/// convention a secp256k1 compressed public key uses — but `PartyId`
/// itself carries no cryptographic meaning here; it is simply the wire
/// identity the relay and other parties address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId([u8; 33]);

impl PartyId {
    /// Build a `PartyId` from raw bytes, validating the leading byte.
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self> {
        match bytes[0] {
            0x02 | 0x03 => Ok(Self(bytes)),
            other => Err(TypesError::Invalid(format!(
                "party id leading byte must be 0x02 or 0x03, got {other:#04x}"
            ))),
        }
    }

    /// The raw 33 bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Hex encoding (66 chars), the wire format used in §6.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 66-char hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| TypesError::Invalid(format!("party id hex decode failed: {e}")))?;
        let arr: [u8; 33] = bytes
            .try_into()
            .map_err(|_| TypesError::Invalid("party id must be exactly 33 bytes".to_string()))?;
        Self::from_bytes(arr)
    }
}

impl std::fmt::Debug for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartyId({})", self.to_hex())
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for PartyId {
    type Error = TypesError;
    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<PartyId> for String {
    fn from(value: PartyId) -> Self {
        value.to_hex()
    }
}

/// The 0-based engine-internal slot assigned to a party by join order.
///
/// Distinct from [`PartyId`]: `PartyIndex` is never used on the wire
/// with the relay, only internally and in persisted key shares. Per
/// §9, `dkls-bootstrap` is the sole authority that assigns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyIndex(pub u8);

impl PartyIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A relay-issued opaque bearer token, held for the lifetime of a
/// process and never persisted across a user-initiated reset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself.
        write!(f, "BearerToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(leading: u8) -> [u8; 33] {
        let mut b = [0x11u8; 33];
        b[0] = leading;
        b
    }

    #[test]
    fn accepts_compressed_point_prefixes() {
        assert!(PartyId::from_bytes(raw(0x02)).is_ok());
        assert!(PartyId::from_bytes(raw(0x03)).is_ok());
    }

    #[test]
    fn rejects_other_prefixes() {
        assert!(PartyId::from_bytes(raw(0x04)).is_err());
    }

    #[test]
    fn hex_roundtrip() {
        let id = PartyId::from_bytes(raw(0x02)).expect("valid");
        let hex = id.to_hex();
        assert_eq!(hex.len(), 66);
        let back = PartyId::from_hex(&hex).expect("parse");
        assert_eq!(id, back);
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let tok = BearerToken::new("super-secret".to_string());
        assert!(!format!("{tok:?}").contains("super-secret"));
    }
}
