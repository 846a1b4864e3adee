//! The HTTP control plane (§4.2 "HTTP surface consumed", §6 "Relay HTTP").
//!
//! Request/response bodies are JSON, snake_case, exactly as specified.
//! Every endpoint but `/party/register` carries the bearer token in an
//! `Authorization: Bearer <token>` header.

use serde::{Deserialize, Serialize};

use dkls_types::group::GroupStatus;
use dkls_types::party::{BearerToken, PartyId};

use crate::{Result, TransportError};

#[derive(Debug, Serialize)]
struct RegisterRequest {}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    party_id: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateGroupRequest {
    threshold: u8,
    participants: u8,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct CreateGroupResponse {
    group_id: String,
    #[serde(default)]
    members: Vec<MemberInfo>,
}

#[derive(Debug, Serialize)]
struct JoinGroupRequest {
    group_id: String,
}

#[derive(Debug, Serialize)]
struct GroupInfoRequest {
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupInfoResponse {
    #[serde(default)]
    members: Vec<MemberInfo>,
    status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInfo {
    pub party_id: String,
    pub party_index: u8,
}

/// Outcome of `POST /party/register`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub party_id: PartyId,
    pub token: BearerToken,
}

/// Outcome of `POST /group/create`.
#[derive(Debug, Clone)]
pub struct CreatedGroup {
    pub group_id: String,
    pub members: Vec<MemberInfo>,
}

/// Outcome of `POST /group/info` (and the membership snapshot returned
/// by `join`, since a joiner needs the same shape to know whether
/// admission has closed).
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub members: Vec<MemberInfo>,
    pub status: GroupStatus,
}

fn parse_status(raw: &str) -> Result<GroupStatus> {
    match raw {
        "open" => Ok(GroupStatus::Open),
        "full" => Ok(GroupStatus::Full),
        "bound" => Ok(GroupStatus::Bound),
        "closed" => Ok(GroupStatus::Closed),
        other => Err(TransportError::Protocol(format!(
            "unrecognized group status {other:?}"
        ))),
    }
}

/// The relay's JSON HTTP control plane (§4.2).
pub struct RelayHttpClient {
    base_url: url::Url,
    http: reqwest::Client,
}

impl RelayHttpClient {
    pub fn new(base_url: url::Url) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Invalid(format!("bad relay base url: {e}")))
    }

    /// `POST /party/register` → `{ party_id, token }`. The only endpoint
    /// that carries no bearer token, since none exists yet.
    pub async fn register(&self) -> Result<Registration> {
        let url = self.endpoint("party/register")?;
        let resp: RegisterResponse = self
            .http
            .post(url)
            .json(&RegisterRequest {})
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let party_id = PartyId::from_hex(&resp.party_id)
            .map_err(|e| TransportError::Protocol(format!("bad party_id: {e}")))?;
        Ok(Registration {
            party_id,
            token: BearerToken::new(resp.token),
        })
    }

    /// `POST /group/create` → `{ group_id, members[] }`.
    pub async fn create_group(
        &self,
        token: &BearerToken,
        threshold: u8,
        participants: u8,
        timeout_secs: u64,
    ) -> Result<CreatedGroup> {
        let url = self.endpoint("group/create")?;
        let resp: CreateGroupResponse = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .json(&CreateGroupRequest {
                threshold,
                participants,
                timeout: timeout_secs,
            })
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        Ok(CreatedGroup {
            group_id: resp.group_id,
            members: resp.members,
        })
    }

    /// `POST /group/join` `{ group_id }`.
    pub async fn join_group(&self, token: &BearerToken, group_id: &str) -> Result<()> {
        let url = self.endpoint("group/join")?;
        self.http
            .post(url)
            .bearer_auth(token.as_str())
            .json(&JoinGroupRequest {
                group_id: group_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Transport(e.to_string()))?;
        Ok(())
    }

    /// `POST /group/info` → `{ members[], status }`.
    pub async fn group_info(&self, token: &BearerToken, group_id: &str) -> Result<GroupInfo> {
        let url = self.endpoint("group/info")?;
        let resp: GroupInfoResponse = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .json(&GroupInfoRequest {
                group_id: group_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        Ok(GroupInfo {
            members: resp.members,
            status: parse_status(&resp.status)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert!(matches!(parse_status("open"), Ok(GroupStatus::Open)));
        assert!(matches!(parse_status("full"), Ok(GroupStatus::Full)));
        assert!(matches!(parse_status("bound"), Ok(GroupStatus::Bound)));
        assert!(matches!(parse_status("closed"), Ok(GroupStatus::Closed)));
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(parse_status("quantum").is_err());
    }
}
