//! An in-process fake relay implementing [`RelayControlPlane`] (§4.2,
//! §6), shared across every `SdkClient` in a scenario via a cloned
//! handle to the same [`Hub`].
//!
//! This is not a model of the wire protocol (no JSON, no sockets); it
//! is the smallest thing that satisfies the trait's contract —
//! envelopes addressed to a party are only ever delivered to that
//! party, broadcast envelopes fan out to every other current member,
//! and a party's queue survives a `disconnect`/`connect` cycle the way
//! a real relay persists undelivered envelopes across a socket drop
//! (§4.2 "on reconnect ... does not replay already-sent envelopes" —
//! i.e. it doesn't replay what the *peer* already sent and we already
//! consumed, not that the relay discards what it never delivered).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use dkls_transport::http::{CreatedGroup, GroupInfo, MemberInfo, Registration};
use dkls_transport::relay::RelayControlPlane;
use dkls_transport::{Result, TransportError};
use dkls_types::envelope::{Envelope, Recipient};
use dkls_types::group::{Group, GroupId, ThresholdConfig};
use dkls_types::party::{BearerToken, PartyId};

struct HubState {
    next_seq: u32,
    party_by_token: HashMap<String, PartyId>,
    groups: HashMap<GroupId, Group>,
    queues: HashMap<PartyId, VecDeque<Envelope>>,
    notifies: HashMap<PartyId, Arc<Notify>>,
}

impl HubState {
    fn new() -> Self {
        Self {
            next_seq: 0,
            party_by_token: HashMap::new(),
            groups: HashMap::new(),
            queues: HashMap::new(),
            notifies: HashMap::new(),
        }
    }

    fn fresh_seq(&mut self) -> u32 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// A handle to a shared fake relay. Clone it once per party in a
/// scenario and hand each clone to a [`FakeRelay::new`].
#[derive(Clone)]
pub struct Hub(Arc<Mutex<HubState>>);

impl Hub {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(HubState::new())))
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// One party's view of the [`Hub`] — what `dkls-bootstrap` and
/// `dkls-sdk` drive through the [`RelayControlPlane`] trait instead of
/// [`dkls_transport::RelayClient`].
pub struct FakeRelay {
    hub: Hub,
    party_id: Option<PartyId>,
    group_id: Option<GroupId>,
}

impl FakeRelay {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            party_id: None,
            group_id: None,
        }
    }

    fn member_info(group: &Group) -> Vec<MemberInfo> {
        group
            .members
            .iter()
            .map(|m| MemberInfo {
                party_id: m.party_id.to_hex(),
                party_index: m.party_index.0,
            })
            .collect()
    }

    fn fresh_party_id(seq: u32) -> PartyId {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[1..5].copy_from_slice(&seq.to_be_bytes());
        PartyId::from_bytes(bytes).expect("0x02 leading byte is always valid")
    }

    fn fresh_group_id(seq: u32) -> GroupId {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&seq.to_be_bytes());
        GroupId::from_bytes(bytes)
    }
}

#[async_trait]
impl RelayControlPlane for FakeRelay {
    async fn register(&self) -> Result<Registration> {
        let mut hub = self.hub.0.lock().unwrap();
        let seq = hub.fresh_seq();
        let party_id = Self::fresh_party_id(seq);
        let token = BearerToken::new(format!("fake-token-{seq}"));
        hub.party_by_token.insert(token.as_str().to_string(), party_id);
        Ok(Registration { party_id, token })
    }

    async fn create_group(
        &self,
        token: &BearerToken,
        threshold: u8,
        participants: u8,
        timeout_secs: u64,
    ) -> Result<CreatedGroup> {
        let mut hub = self.hub.0.lock().unwrap();
        let creator = *hub
            .party_by_token
            .get(token.as_str())
            .ok_or_else(|| TransportError::Protocol("unknown bearer token".into()))?;
        let seq = hub.fresh_seq();
        let group_id = Self::fresh_group_id(seq);
        let config = ThresholdConfig::new(threshold, participants)
            .map_err(|e| TransportError::Invalid(e.to_string()))?;
        let mut group = Group::new(group_id, config, creator, Duration::from_secs(timeout_secs));
        group
            .admit(creator)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        let members = Self::member_info(&group);
        hub.groups.insert(group_id, group);
        Ok(CreatedGroup {
            group_id: group_id.to_hex(),
            members,
        })
    }

    async fn join_group(&self, token: &BearerToken, group_id: &str) -> Result<()> {
        let mut hub = self.hub.0.lock().unwrap();
        let party_id = *hub
            .party_by_token
            .get(token.as_str())
            .ok_or_else(|| TransportError::Protocol("unknown bearer token".into()))?;
        let gid = GroupId::from_hex(group_id).map_err(|e| TransportError::Protocol(e.to_string()))?;
        let group = hub
            .groups
            .get_mut(&gid)
            .ok_or_else(|| TransportError::Protocol("unknown group".into()))?;
        group
            .admit(party_id)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn group_info(&self, _token: &BearerToken, group_id: &str) -> Result<GroupInfo> {
        let hub = self.hub.0.lock().unwrap();
        let gid = GroupId::from_hex(group_id).map_err(|e| TransportError::Protocol(e.to_string()))?;
        let group = hub
            .groups
            .get(&gid)
            .ok_or_else(|| TransportError::Protocol("unknown group".into()))?;
        Ok(GroupInfo {
            members: Self::member_info(group),
            status: group.status,
        })
    }

    async fn connect(&mut self, token: BearerToken, group_id: GroupId) -> Result<()> {
        let party_id = {
            let hub = self.hub.0.lock().unwrap();
            *hub.party_by_token
                .get(token.as_str())
                .ok_or_else(|| TransportError::Protocol("unknown bearer token".into()))?
        };
        self.party_id = Some(party_id);
        self.group_id = Some(group_id);
        Ok(())
    }

    fn send_envelope(&self, envelope: Envelope) -> Result<()> {
        let group_id = self
            .group_id
            .ok_or_else(|| TransportError::Invalid("send_envelope called before connect".into()))?;
        let mut hub = self.hub.0.lock().unwrap();
        let group = hub
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| TransportError::Protocol("unknown group".into()))?;

        let targets: Vec<PartyId> = match envelope.to {
            Recipient::Broadcast => group
                .members
                .iter()
                .map(|m| m.party_id)
                .filter(|&p| p != envelope.from_party)
                .collect(),
            Recipient::Party(p) => vec![p],
        };

        for target in targets {
            hub.queues.entry(target).or_default().push_back(envelope.clone());
            if let Some(notify) = hub.notifies.get(&target) {
                notify.notify_one();
            }
        }
        Ok(())
    }

    async fn recv_envelope(&self) -> Option<Envelope> {
        let party_id = self.party_id?;
        loop {
            let notify = {
                let mut hub = self.hub.0.lock().unwrap();
                if let Some(envelope) = hub.queues.get_mut(&party_id).and_then(VecDeque::pop_front) {
                    return Some(envelope);
                }
                hub.notifies
                    .entry(party_id)
                    .or_insert_with(|| Arc::new(Notify::new()))
                    .clone()
            };
            notify.notified().await;
        }
    }

    async fn disconnect(&mut self) {
        // The hub's queue for this party is untouched: a real relay
        // persists envelopes across a dropped socket (§4.2), it is the
        // WebSocket, not the mailbox, that goes away.
        self.group_id = None;
    }
}
