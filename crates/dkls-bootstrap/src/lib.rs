//! # dkls-bootstrap
//!
//! Session Bootstrap (C7, §4.7): group creation and joining, handshake
//! blob construction and validation, and admission polling until a
//! group is full.
//!
//! This crate composes [`dkls_transport::RelayControlPlane`] (for the
//! control-plane round trips) and [`dkls_keyring::SessionKeyRing`] (to
//! install the session key once it is known), and is the sole authority
//! that assigns a party its [`PartyIndex`] — every other crate receives
//! that index already resolved, from a completed bootstrap or a
//! restored key share.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand_core::RngCore;
use serde_json::Value;

use dkls_keyring::SessionKeyRing;
use dkls_transport::http::MemberInfo;
use dkls_transport::RelayControlPlane;
use dkls_types::group::GroupId;
use dkls_types::handshake::{HandshakeBlob, InviteKind, HANDSHAKE_VERSION};
use dkls_types::party::{BearerToken, PartyId, PartyIndex};

/// Base polling interval while waiting for a group to fill (§4.7).
const ADMISSION_POLL_BASE: Duration = Duration::from_millis(200);
/// Cap on the exponential-backoff polling interval.
const ADMISSION_POLL_CAP: Duration = Duration::from_millis(500);
/// Overall admission deadline.
const ADMISSION_DEADLINE: Duration = Duration::from_secs(60);
const ADMISSION_BACKOFF_FACTOR: f64 = 1.5;

/// Error taxonomy for this crate (§7 `Transport`/`Timeout`/`Invalid`).
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Transport(#[from] dkls_transport::TransportError),

    #[error(transparent)]
    Keyring(#[from] dkls_keyring::KeyringError),

    #[error(transparent)]
    Types(#[from] dkls_types::TypesError),

    #[error("{scope} timed out")]
    Timeout { scope: String },

    #[error("invalid handshake blob: {0}")]
    InvalidHandshake(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Outcome of bootstrapping as the group's creator.
#[derive(Debug, Clone)]
pub struct CreatorSession {
    pub group_id: GroupId,
    pub party_id: PartyId,
    pub party_index: PartyIndex,
    pub token: BearerToken,
    pub threshold: u8,
    pub total_parties: u8,
}

/// Outcome of bootstrapping as a joiner.
#[derive(Debug, Clone)]
pub struct JoinedSession {
    pub group_id: GroupId,
    pub party_id: PartyId,
    pub token: BearerToken,
    pub threshold: u8,
    pub total_parties: u8,
    pub kind: InviteKind,
}

/// Draw a fresh 256-bit session key and generate the handshake blob a
/// creator hands out of band (§4.7 step 4).
///
/// `relay` must already be registered and have created the group;
/// `relay.connect` is also performed here so the creator's envelope
/// channel is live before admission polling begins.
pub async fn bootstrap_as_creator<R: RelayControlPlane + ?Sized>(
    relay: &mut R,
    keyring: &mut SessionKeyRing,
    kind: InviteKind,
    threshold: u8,
    total_parties: u8,
    timeout_secs: u64,
) -> Result<(CreatorSession, HandshakeBlob)> {
    let registration = relay.register().await?;
    let created = relay
        .create_group(&registration.token, threshold, total_parties, timeout_secs)
        .await?;
    let group_id = GroupId::from_hex(&created.group_id)?;

    let mut session_key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut session_key);
    keyring.install(group_id, session_key, false)?;

    relay.connect(registration.token.clone(), group_id).await?;

    let blob = HandshakeBlob {
        kind,
        version: HANDSHAKE_VERSION.to_string(),
        group_id: created.group_id.clone(),
        threshold: threshold as u32,
        total_parties: total_parties as u32,
        timeout: timeout_secs,
        timestamp: unix_millis_now(),
        aes_key: dkls_crypto::b64::encode(&session_key),
        message_hash: None,
        metadata: Value::Null,
    };

    tracing::info!(group_id = %group_id, threshold, total_parties, "created group, handshake blob ready");

    let session = CreatorSession {
        group_id,
        party_id: registration.party_id,
        // The creator is admitted first by the relay at group-create
        // time, so it occupies index 0 by join order (§3 "Group").
        party_index: PartyIndex(0),
        token: registration.token,
        threshold,
        total_parties,
    };
    Ok((session, blob))
}

/// Parse and validate a handshake blob, register, join, and install the
/// session key (§4.7, joiner steps 1-3).
pub async fn bootstrap_as_joiner<R: RelayControlPlane + ?Sized>(
    relay: &mut R,
    keyring: &mut SessionKeyRing,
    blob: &HandshakeBlob,
) -> Result<JoinedSession> {
    if blob.version != HANDSHAKE_VERSION {
        return Err(BootstrapError::InvalidHandshake(format!(
            "unsupported handshake version {}",
            blob.version
        )));
    }
    let now = unix_millis_now();
    let age_secs = now.saturating_sub(blob.timestamp) / 1000;
    if age_secs > blob.timeout {
        return Err(BootstrapError::InvalidHandshake(format!(
            "handshake blob is stale ({age_secs}s old, timeout {}s)",
            blob.timeout
        )));
    }
    let group_id = GroupId::from_hex(&blob.group_id)
        .map_err(|e| BootstrapError::InvalidHandshake(format!("bad groupId: {e}")))?;
    let threshold: u8 = blob
        .threshold
        .try_into()
        .map_err(|_| BootstrapError::InvalidHandshake("threshold out of range".into()))?;
    let total_parties: u8 = blob
        .total_parties
        .try_into()
        .map_err(|_| BootstrapError::InvalidHandshake("totalParties out of range".into()))?;
    let session_key: [u8; 32] = dkls_crypto::b64::decode(&blob.aes_key)
        .map_err(|e| BootstrapError::InvalidHandshake(format!("bad aesKey: {e}")))?
        .try_into()
        .map_err(|_| BootstrapError::InvalidHandshake("aesKey must be 32 bytes".into()))?;

    let registration = relay.register().await?;
    relay.join_group(&registration.token, &blob.group_id).await?;
    keyring.install(group_id, session_key, false)?;
    relay.connect(registration.token.clone(), group_id).await?;

    tracing::info!(group_id = %group_id, "joined group");

    Ok(JoinedSession {
        group_id,
        party_id: registration.party_id,
        token: registration.token,
        threshold,
        total_parties,
        kind: blob.kind,
    })
}

/// Poll `group/info` until membership reaches `total_parties`, or fail
/// with [`BootstrapError::Timeout`] past the 60 s admission deadline
/// (§4.7 "Admission close").
pub async fn await_admission<R: RelayControlPlane + ?Sized>(
    relay: &R,
    token: &BearerToken,
    group_id: &GroupId,
    total_parties: u8,
) -> Result<Vec<MemberInfo>> {
    let group_id_hex = group_id.to_hex();
    let deadline = tokio::time::Instant::now() + ADMISSION_DEADLINE;
    let mut interval = ADMISSION_POLL_BASE;

    loop {
        let info = relay.group_info(token, &group_id_hex).await?;
        if info.members.len() as u8 >= total_parties {
            return Ok(info.members);
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(BootstrapError::Timeout {
                scope: "admission".into(),
            });
        }
        let wait = interval.min(deadline - now);
        tokio::time::sleep(wait).await;
        interval = ADMISSION_POLL_CAP.min(interval.mul_f64(ADMISSION_BACKOFF_FACTOR));
    }
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(timestamp: u64, timeout: u64) -> HandshakeBlob {
        HandshakeBlob {
            kind: InviteKind::Keygen,
            version: HANDSHAKE_VERSION.to_string(),
            group_id: "ab".repeat(32),
            threshold: 2,
            total_parties: 3,
            timeout,
            timestamp,
            aes_key: dkls_crypto::b64::encode(&[0x42u8; 32]),
            message_hash: None,
            metadata: Value::Null,
        }
    }

    #[test]
    fn fresh_blob_age_is_within_timeout() {
        let now = unix_millis_now();
        let b = blob(now, 60);
        let age_secs = now.saturating_sub(b.timestamp) / 1000;
        assert!(age_secs <= b.timeout);
    }

    #[test]
    fn stale_blob_age_exceeds_timeout() {
        let now = unix_millis_now();
        let b = blob(now.saturating_sub(120_000), 60);
        let age_secs = now.saturating_sub(b.timestamp) / 1000;
        assert!(age_secs > b.timeout);
    }

    #[test]
    fn unix_millis_now_is_plausible() {
        // Sanity bound: some time after this module was written, well
        // before any plausible clock-rollback bug.
        assert!(unix_millis_now() > 1_700_000_000_000);
    }
}
