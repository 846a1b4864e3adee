//! Group identity, membership and lifecycle (§3 "Group").

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::party::{PartyId, PartyIndex};
use crate::{Result, TypesError};

/// A 32-byte group identifier, chosen by the relay on creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId([u8; 32]);

impl GroupId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| TypesError::Invalid(format!("group id hex decode failed: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TypesError::Invalid("group id must be exactly 32 bytes".to_string()))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupId({})", self.to_hex())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for GroupId {
    type Error = TypesError;
    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<GroupId> for String {
    fn from(value: GroupId) -> Self {
        value.to_hex()
    }
}

/// Lifecycle state of a group (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    /// Accepting joins.
    Open,
    /// `n` members reached; no further joins accepted.
    Full,
    /// Bound to an in-flight keygen session.
    Bound,
    /// DKG completed; the group id is now a routing namespace for
    /// subsequent DSG/rotation sessions.
    Closed,
}

/// A group member, in join-arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub party_id: PartyId,
    pub party_index: PartyIndex,
}

/// The `(t, n)` configuration of a group, validated at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub threshold: u8,
    pub total_parties: u8,
}

impl ThresholdConfig {
    /// Validate `1 <= t <= n <= 255` (§3 invariant).
    pub fn new(threshold: u8, total_parties: u8) -> Result<Self> {
        if threshold == 0 || threshold > total_parties {
            return Err(TypesError::Invalid(format!(
                "threshold must satisfy 1 <= t <= n, got t={threshold} n={total_parties}"
            )));
        }
        Ok(Self {
            threshold,
            total_parties,
        })
    }
}

/// Full group record as tracked by the SDK.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub config: ThresholdConfig,
    pub creator: PartyId,
    /// Wall-clock duration after which the relay rejects joins.
    #[serde(with = "duration_secs")]
    pub admission_timeout: Duration,
    pub members: Vec<GroupMember>,
    pub status: GroupStatus,
}

impl Group {
    pub fn new(
        group_id: GroupId,
        config: ThresholdConfig,
        creator: PartyId,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            group_id,
            config,
            creator,
            admission_timeout,
            members: Vec::new(),
            status: GroupStatus::Open,
        }
    }

    /// Whether the membership list has reached `n`.
    pub fn is_full(&self) -> bool {
        self.members.len() as u8 >= self.config.total_parties
    }

    /// Admit a party, assigning it the next `PartyIndex` by arrival
    /// order. Fails if the group is not `Open` or already full.
    pub fn admit(&mut self, party_id: PartyId) -> Result<PartyIndex> {
        if !matches!(self.status, GroupStatus::Open) {
            return Err(TypesError::Invalid(format!(
                "group {} is not open for joins",
                self.group_id
            )));
        }
        if self.is_full() {
            return Err(TypesError::Invalid(format!(
                "group {} is already full",
                self.group_id
            )));
        }
        let index = PartyIndex(self.members.len() as u8);
        self.members.push(GroupMember {
            party_id,
            party_index: index,
        });
        if self.is_full() {
            self.status = GroupStatus::Full;
        }
        Ok(index)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(byte: u8) -> PartyId {
        let mut b = [byte; 33];
        b[0] = 0x02;
        PartyId::from_bytes(b).expect("valid")
    }

    #[test]
    fn threshold_config_rejects_t_greater_than_n() {
        assert!(ThresholdConfig::new(3, 2).is_err());
    }

    #[test]
    fn threshold_config_rejects_zero_threshold() {
        assert!(ThresholdConfig::new(0, 5).is_err());
    }

    #[test]
    fn admit_assigns_indices_in_arrival_order() {
        let cfg = ThresholdConfig::new(2, 2).expect("valid");
        let mut group = Group::new(
            GroupId::from_bytes([1u8; 32]),
            cfg,
            party(1),
            Duration::from_secs(60),
        );
        let idx1 = group.admit(party(1)).expect("admit");
        let idx2 = group.admit(party(2)).expect("admit");
        assert_eq!(idx1, PartyIndex(0));
        assert_eq!(idx2, PartyIndex(1));
        assert!(matches!(group.status, GroupStatus::Full));
    }

    #[test]
    fn admit_rejects_past_full() {
        let cfg = ThresholdConfig::new(1, 1).expect("valid");
        let mut group = Group::new(
            GroupId::from_bytes([2u8; 32]),
            cfg,
            party(1),
            Duration::from_secs(60),
        );
        group.admit(party(1)).expect("admit");
        assert!(group.admit(party(2)).is_err());
    }
}
