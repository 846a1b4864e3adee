//! Session identity (§3 "Session").

use serde::{Deserialize, Serialize};

use crate::group::GroupId;

/// The kind of MPC protocol a session drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Dkg,
    Dsg,
    Rotation,
    /// Included in the engine capability (§6) but not exercised by any
    /// §8 end-to-end scenario (§9 open question).
    Recovery,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProtocolKind::Dkg => "dkg",
            ProtocolKind::Dsg => "dsg",
            ProtocolKind::Rotation => "rotation",
            ProtocolKind::Recovery => "recovery",
        };
        write!(f, "{s}")
    }
}

/// Session identity: `(group_id, protocol_kind)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    pub group_id: GroupId,
    pub protocol_kind: ProtocolKind,
}

impl SessionId {
    pub fn new(group_id: GroupId, protocol_kind: ProtocolKind) -> Self {
        Self {
            group_id,
            protocol_kind,
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group_id, self.protocol_kind)
    }
}
