//! The Facade (C8, §4.8): the single public capability object a host
//! application constructs and drives. Owns the Relay Client, the
//! Session Key Ring, the Protocol Manager, and the Keystore, and is
//! the only thing in the workspace that knows how they compose.

use std::collections::HashMap;
use std::time::Duration;

use rand_core::RngCore;
use tokio::sync::broadcast;
use zeroize::Zeroizing;

use dkls_engine::{Artifact, EngineFactory, EngineMessage, EngineRecipient, SessionParams};
use dkls_keyring::SessionKeyRing;
use dkls_keystore::backend::{FilesystemBackend, InMemoryBackend, KeystoreBackend, StubBrowserLocalBackend};
use dkls_protocol::{ProtocolManager, RoutedOutcome};
use dkls_transport::http::MemberInfo;
use dkls_transport::{RelayClient, RelayControlPlane};
use dkls_types::envelope::Recipient;
use dkls_types::group::{GroupId, GroupMember};
use dkls_types::handshake::{HandshakeBlob, InviteKind};
use dkls_types::party::{BearerToken, PartyId, PartyIndex};
use dkls_types::session::ProtocolKind;
use dkls_types::share::KeyShare;

use crate::config::{KeystoreBackendKind, SdkConfig};
use crate::error::{Result, SdkError};
use crate::events::{EventBus, SdkEvent};

/// Name of the keystore entry holding the random storage-local
/// sealing key used when no passphrase is configured (§4.4 "a
/// per-installation key with no user-supplied secret").
const STORAGE_KEY_ENTRY: &str = "dkls_storage_key";

/// Everything the Facade has learned about one group: who is in it,
/// and this party's own slot in it. Only complete (every field
/// populated, `members.len() == total_parties`) once
/// [`SdkClient::await_admission`] has returned.
#[derive(Clone, Debug)]
struct GroupContext {
    party_id: PartyId,
    party_index: Option<PartyIndex>,
    token: BearerToken,
    threshold: u8,
    total_parties: u8,
    members: Vec<GroupMember>,
}

impl GroupContext {
    fn is_complete(&self) -> bool {
        self.party_index.is_some() && self.members.len() == self.total_parties as usize
    }

    fn self_index(&self) -> PartyIndex {
        self.party_index.expect("GroupContext::is_complete checked before use")
    }

    fn party_id_of(&self, idx: PartyIndex) -> Option<PartyId> {
        self.members.iter().find(|m| m.party_index == idx).map(|m| m.party_id)
    }

    fn party_index_of(&self, id: &PartyId) -> Option<PartyIndex> {
        self.members.iter().find(|m| &m.party_id == id).map(|m| m.party_index)
    }

    fn participant_indices(&self) -> Vec<PartyIndex> {
        let mut indices: Vec<PartyIndex> = self.members.iter().map(|m| m.party_index).collect();
        indices.sort();
        indices
    }
}

/// The public Facade object (§4.8).
///
/// One `SdkClient` owns exactly one Relay Client, hence exactly one
/// live WebSocket (§4.2); multiple concurrent groups from one process
/// means multiple `SdkClient`s, not one client juggling many sockets.
pub struct SdkClient {
    config: SdkConfig,
    relay: Box<dyn RelayControlPlane>,
    keyring: SessionKeyRing,
    keystore: Box<dyn KeystoreBackend>,
    manager: ProtocolManager,
    events: EventBus,
    passphrase: Option<Zeroizing<Vec<u8>>>,
    groups: HashMap<GroupId, GroupContext>,
}

impl SdkClient {
    /// Construct a client over an already-built relay control plane.
    /// The indirection through [`RelayControlPlane`] is what lets
    /// `dkls-integration-tests` hand this an in-process fake instead
    /// of a real [`RelayClient`].
    pub fn new(
        config: SdkConfig,
        relay: Box<dyn RelayControlPlane>,
        engine_factory: Box<dyn EngineFactory>,
    ) -> Result<Self> {
        let keystore = build_keystore(&config)?;
        let manager = ProtocolManager::with_round_timeout(engine_factory, Duration::from_secs(config.round_timeout_secs));
        let events = EventBus::new(config.event_capacity);
        Ok(Self {
            config,
            relay,
            keyring: SessionKeyRing::new(),
            keystore,
            manager,
            events,
            passphrase: None,
            groups: HashMap::new(),
        })
    }

    /// Construct a client that speaks to a real relay over HTTP/WebSocket
    /// (§4.8's usual construction path; `new` is for tests and hosts
    /// that already have their own control-plane implementation).
    pub fn connect(config: SdkConfig, engine_factory: Box<dyn EngineFactory>) -> Result<Self> {
        let http_base = url::Url::parse(&config.relay_http_url)
            .map_err(|e| SdkError::Invalid(format!("bad relay_http_url: {e}")))?;
        let relay: Box<dyn RelayControlPlane> = match &config.relay_ws_url {
            Some(ws) => {
                let ws_base = url::Url::parse(ws).map_err(|e| SdkError::Invalid(format!("bad relay_ws_url: {e}")))?;
                Box::new(RelayClient::with_ws_url(http_base, ws_base))
            }
            None => Box::new(RelayClient::new(http_base)?),
        };
        Self::new(config, relay, engine_factory)
    }

    /// Configure a passphrase used to derive the keystore sealing key
    /// (§4.4). Without one, a random storage-local key is generated
    /// once and persisted in the keystore itself, which protects
    /// confidentiality only against an external filesystem reader, not
    /// against anyone who can also read the keystore backend.
    pub fn with_passphrase(mut self, passphrase: impl Into<Vec<u8>>) -> Self {
        self.passphrase = Some(Zeroizing::new(passphrase.into()));
        self
    }

    /// Subscribe to the event channel (§9 "typed event channel").
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.events.subscribe()
    }

    /// Whether a session is currently active for `group_id` (§4.6
    /// single-flight).
    pub fn is_busy(&self, group_id: &GroupId) -> bool {
        self.manager.is_busy(group_id)
    }

    /// Cancel the active session for `group_id`, if any (§4.6/§4.8).
    pub fn cancel(&mut self, group_id: &GroupId) -> bool {
        let cancelled = self.manager.cancel(group_id);
        if cancelled {
            self.events.emit(SdkEvent::Error {
                group_id: Some(*group_id),
                message: "session cancelled".to_string(),
            });
        }
        cancelled
    }

    /// Create a group as its first member and produce the handshake
    /// blob to hand out of band (§4.7 creator path).
    pub async fn create_group(
        &mut self,
        kind: InviteKind,
        threshold: u8,
        total_parties: u8,
        timeout_secs: u64,
    ) -> Result<HandshakeBlob> {
        let (session, blob) = dkls_bootstrap::bootstrap_as_creator(
            self.relay.as_mut(),
            &mut self.keyring,
            kind,
            threshold,
            total_parties,
            timeout_secs,
        )
        .await?;

        let ctx = GroupContext {
            party_id: session.party_id,
            party_index: Some(session.party_index),
            token: session.token,
            threshold: session.threshold,
            total_parties: session.total_parties,
            members: vec![GroupMember {
                party_id: session.party_id,
                party_index: session.party_index,
            }],
        };
        self.groups.insert(session.group_id, ctx);
        self.events.emit(SdkEvent::Connected { group_id: session.group_id });
        Ok(blob)
    }

    /// Join a group from a handshake blob (§4.7 joiner path). The
    /// returned group id is not yet "complete" — call
    /// [`Self::await_admission`] to learn this party's own index and
    /// the full membership once the group fills.
    pub async fn join_group(&mut self, blob: &HandshakeBlob) -> Result<GroupId> {
        let session = dkls_bootstrap::bootstrap_as_joiner(self.relay.as_mut(), &mut self.keyring, blob).await?;

        let ctx = GroupContext {
            party_id: session.party_id,
            party_index: None,
            token: session.token,
            threshold: session.threshold,
            total_parties: session.total_parties,
            members: Vec::new(),
        };
        self.groups.insert(session.group_id, ctx);
        self.events.emit(SdkEvent::Connected { group_id: session.group_id });
        Ok(session.group_id)
    }

    /// Poll until `group_id` fills, then resolve this party's own
    /// index and the full membership list (§4.7 "Admission close").
    pub async fn await_admission(&mut self, group_id: GroupId) -> Result<Vec<MemberInfo>> {
        let ctx = self
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;

        let members = dkls_bootstrap::await_admission(self.relay.as_ref(), &ctx.token, &group_id, ctx.total_parties)
            .await?;

        let parsed = members
            .iter()
            .map(|m| {
                Ok(GroupMember {
                    party_id: PartyId::from_hex(&m.party_id)?,
                    party_index: PartyIndex(m.party_index),
                })
            })
            .collect::<std::result::Result<Vec<GroupMember>, dkls_types::TypesError>>()?;

        let entry = self
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;
        if let Some(own) = parsed.iter().find(|m| m.party_id == entry.party_id) {
            entry.party_index = Some(own.party_index);
        }
        entry.members = parsed;

        Ok(members)
    }

    /// Run a Distributed Key Generation ceremony to completion and
    /// persist the resulting share (§6 DKG, §7 "no partial share
    /// written on failure").
    pub async fn start_keygen(&mut self, group_id: GroupId) -> Result<KeyShare> {
        let ctx = self.active_context(&group_id)?;
        let params = SessionParams {
            protocol_kind: ProtocolKind::Dkg,
            party_index: ctx.self_index(),
            participants: ctx.participant_indices(),
            threshold: ctx.threshold,
            digest: None,
            existing_share: None,
        };
        let artifact = self.drive_session(group_id, ProtocolKind::Dkg, params).await?;
        let Artifact::Share { serialized, public_key } = artifact else {
            return Err(SdkError::Invalid("dkg engine returned a non-share artifact".into()));
        };

        let share = KeyShare {
            public_key,
            party_index: ctx.self_index(),
            threshold: ctx.threshold,
            participants: ctx.members.iter().map(|m| m.party_id).collect(),
            group_id,
            relay_token: Some(ctx.token.clone()),
            serialized,
        };
        self.save_share(&share).await?;
        self.events.emit(SdkEvent::KeygenComplete {
            group_id,
            public_key: share.public_key,
        });
        Ok(share)
    }

    /// Run a Distributed Signature Generation ceremony over `digest`
    /// (§6 DSG). `signers` is the subset of the group's current
    /// participants taking part; defaults to the full group if `None`.
    /// This party's own index must be among them.
    pub async fn start_signing(
        &mut self,
        group_id: GroupId,
        digest: [u8; 32],
        signers: Option<Vec<PartyIndex>>,
    ) -> Result<([u8; 32], [u8; 32])> {
        let ctx = self.active_context(&group_id)?;
        let share = self.load_share(&group_id).await?;
        let participants = signers.unwrap_or_else(|| ctx.participant_indices());
        if !participants.contains(&ctx.self_index()) {
            return Err(SdkError::Invalid("signer set must include this party".into()));
        }
        if (participants.len() as u8) < ctx.threshold {
            return Err(SdkError::Invalid(format!(
                "signer set of {} is below the group's threshold of {}",
                participants.len(),
                ctx.threshold
            )));
        }

        let params = SessionParams {
            protocol_kind: ProtocolKind::Dsg,
            party_index: ctx.self_index(),
            participants,
            threshold: ctx.threshold,
            digest: Some(digest),
            existing_share: Some(share.serialized.clone()),
        };
        let artifact = self.drive_session(group_id, ProtocolKind::Dsg, params).await?;
        let Artifact::Signature { r, s } = artifact else {
            return Err(SdkError::Invalid("dsg engine returned a non-signature artifact".into()));
        };
        self.events.emit(SdkEvent::SignComplete { group_id, r, s });
        Ok((r, s))
    }

    /// Rotate the existing key share, replacing it only once the
    /// engine confirms the public key is unchanged (§8 invariant 2,
    /// §7 "Partial side effects": the old share survives any failure).
    pub async fn start_rotation(&mut self, group_id: GroupId) -> Result<KeyShare> {
        let ctx = self.active_context(&group_id)?;
        let old_share = self.load_share(&group_id).await?;
        let params = SessionParams {
            protocol_kind: ProtocolKind::Rotation,
            party_index: ctx.self_index(),
            participants: ctx.participant_indices(),
            threshold: ctx.threshold,
            digest: None,
            existing_share: Some(old_share.serialized.clone()),
        };
        let artifact = self.drive_session(group_id, ProtocolKind::Rotation, params).await?;
        let Artifact::Share { serialized, public_key } = artifact else {
            return Err(SdkError::Invalid("rotation engine returned a non-share artifact".into()));
        };
        if public_key != old_share.public_key {
            return Err(SdkError::Invalid(
                "rotation produced a different public key; old share left untouched".into(),
            ));
        }

        let new_share = KeyShare {
            public_key,
            party_index: ctx.self_index(),
            threshold: ctx.threshold,
            participants: old_share.participants.clone(),
            group_id,
            relay_token: Some(ctx.token.clone()),
            serialized,
        };
        self.save_share(&new_share).await?;
        self.events.emit(SdkEvent::KeygenComplete {
            group_id,
            public_key: new_share.public_key,
        });
        Ok(new_share)
    }

    /// Run a Recovery ceremony. Routable per §6's engine capability,
    /// but — per §9's open question — never exercised by a §8
    /// end-to-end scenario, so no fixture engine implements it; a real
    /// engine that does is required to drive this to completion.
    /// `existing_share_bytes` is whatever material the chosen engine's
    /// `SessionParams::existing_share` contract requires; the Facade
    /// does not assume it came from this party's own Keystore entry,
    /// since recovery is precisely the case where that entry may be
    /// missing or corrupt.
    pub async fn start_recovery(
        &mut self,
        group_id: GroupId,
        participants: Vec<PartyIndex>,
        threshold: u8,
        existing_share_bytes: Vec<u8>,
    ) -> Result<KeyShare> {
        let ctx = self.active_context(&group_id)?;
        let params = SessionParams {
            protocol_kind: ProtocolKind::Recovery,
            party_index: ctx.self_index(),
            participants,
            threshold,
            digest: None,
            existing_share: Some(existing_share_bytes),
        };
        let artifact = self.drive_session(group_id, ProtocolKind::Recovery, params).await?;
        let Artifact::Share { serialized, public_key } = artifact else {
            return Err(SdkError::Invalid("recovery engine returned a non-share artifact".into()));
        };

        let share = KeyShare {
            public_key,
            party_index: ctx.self_index(),
            threshold,
            participants: ctx.members.iter().map(|m| m.party_id).collect(),
            group_id,
            relay_token: Some(ctx.token.clone()),
            serialized,
        };
        self.save_share(&share).await?;
        self.events.emit(SdkEvent::KeygenComplete {
            group_id,
            public_key: share.public_key,
        });
        Ok(share)
    }

    /// Load this party's persisted share for `group_id`, without
    /// running any protocol.
    pub async fn load_share(&self, group_id: &GroupId) -> Result<KeyShare> {
        let ctx = self
            .groups
            .get(group_id)
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;
        let name = dkls_types::share::keystore_key_name(group_id, ctx.self_index());
        let bytes = self
            .keystore
            .load(&name)
            .await?
            .ok_or(SdkError::NoSuchShare(*group_id))?;
        let salt = dkls_keystore::blob::read_salt(&bytes)?;
        let key = self.sealing_key(&salt).await?;
        dkls_keystore::blob::open_share(&key, &bytes).map_err(|e| {
            if self.passphrase.is_some() {
                SdkError::WrongPassphrase
            } else {
                SdkError::Keystore(e)
            }
        })
    }

    /// Remove this party's persisted share for `group_id`.
    pub async fn delete_share(&self, group_id: &GroupId) -> Result<()> {
        let ctx = self
            .groups
            .get(group_id)
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;
        let name = dkls_types::share::keystore_key_name(group_id, ctx.self_index());
        self.keystore.remove(&name).await?;
        Ok(())
    }

    /// List every key name the configured keystore backend holds.
    pub async fn list_shares(&self) -> Result<Vec<String>> {
        Ok(self.keystore.list().await?)
    }

    /// Close the relay connection for the current group (§4.2).
    pub async fn disconnect(&mut self, group_id: GroupId) {
        self.relay.disconnect().await;
        self.events.emit(SdkEvent::Disconnected { group_id });
    }

    /// Re-open the envelope channel for a group this client already
    /// bootstrapped (§4.2 reconnect tolerance). Unlike `create_group`
    /// or `join_group`, this repeats no admission step: the relay is
    /// expected to have kept whatever was already queued for this
    /// party while the channel was down.
    pub async fn reconnect(&mut self, group_id: GroupId) -> Result<()> {
        let ctx = self
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;
        self.relay.connect(ctx.token, group_id).await?;
        self.events.emit(SdkEvent::Connected { group_id });
        Ok(())
    }

    fn active_context(&self, group_id: &GroupId) -> Result<GroupContext> {
        let ctx = self
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| SdkError::Invalid(format!("group {group_id} has not been bootstrapped")))?;
        if !ctx.is_complete() {
            return Err(SdkError::Invalid(format!(
                "group {group_id} admission is not complete; call await_admission first"
            )));
        }
        Ok(ctx)
    }

    /// Drive one protocol session end to end: send the first round,
    /// then alternate opening inbound envelopes and sending whatever
    /// the engine produces, bounded by the overall protocol deadline
    /// (§5 "Full-protocol: 60s default").
    async fn drive_session(
        &mut self,
        group_id: GroupId,
        protocol_kind: ProtocolKind,
        params: SessionParams,
    ) -> Result<Artifact> {
        let ctx = self.active_context(&group_id)?;
        let session_key = *self
            .keyring
            .get(&group_id)
            .ok_or(dkls_keyring::KeyringError::NotFound(group_id))?;
        let deadline = Duration::from_secs(self.config.protocol_timeout_secs);

        match tokio::time::timeout(deadline, self.run_protocol(group_id, protocol_kind, params, session_key, &ctx)).await
        {
            Ok(result) => result,
            Err(_) => {
                self.manager.cancel(&group_id);
                self.events.emit(SdkEvent::Error {
                    group_id: Some(group_id),
                    message: "protocol timed out".to_string(),
                });
                Err(SdkError::Protocol(dkls_protocol::ProtocolError::Timeout {
                    scope: "protocol".to_string(),
                }))
            }
        }
    }

    async fn run_protocol(
        &mut self,
        group_id: GroupId,
        protocol_kind: ProtocolKind,
        params: SessionParams,
        session_key: [u8; 32],
        ctx: &GroupContext,
    ) -> Result<Artifact> {
        let first_messages = self.manager.start(group_id, params)?;
        let mut round: u32 = 1;
        self.seal_and_send(&session_key, ctx, round, first_messages)?;

        loop {
            let envelope = self.relay.recv_envelope().await.ok_or_else(|| {
                SdkError::Transport(dkls_transport::TransportError::Transport("relay connection closed".into()))
            })?;

            let payload = match dkls_crypto::aead::open_envelope(&session_key, &envelope) {
                Ok(payload) => payload,
                Err(_) => return Err(SdkError::Decrypt),
            };

            let Some(from_index) = ctx.party_index_of(&envelope.from_party) else {
                tracing::warn!(group_id = %group_id, "dropping envelope from an unrecognized party id");
                continue;
            };

            let outcome = self
                .manager
                .ingest(group_id, protocol_kind, envelope.round_index, from_index, payload)?;

            match outcome {
                RoutedOutcome::Dropped => continue,
                RoutedOutcome::Continue { messages } => {
                    if !messages.is_empty() {
                        round += 1;
                        self.events.emit(SdkEvent::RoundComplete {
                            group_id,
                            protocol: protocol_kind,
                            round,
                        });
                        self.seal_and_send(&session_key, ctx, round, messages)?;
                    }
                }
                RoutedOutcome::Completed { messages, artifact } => {
                    if !messages.is_empty() {
                        round += 1;
                        self.seal_and_send(&session_key, ctx, round, messages)?;
                    }
                    return Ok(artifact);
                }
                RoutedOutcome::Failed { reason } => {
                    self.events.emit(SdkEvent::Error {
                        group_id: Some(group_id),
                        message: reason.clone(),
                    });
                    return Err(SdkError::SessionFailed { group_id, reason });
                }
            }
        }
    }

    fn seal_and_send(
        &self,
        session_key: &[u8; 32],
        ctx: &GroupContext,
        round: u32,
        messages: Vec<EngineMessage>,
    ) -> Result<()> {
        for message in messages {
            let to = match message.to {
                EngineRecipient::Broadcast => Recipient::Broadcast,
                EngineRecipient::Peer(idx) => {
                    let party_id = ctx
                        .party_id_of(idx)
                        .ok_or_else(|| SdkError::Invalid(format!("unknown recipient party index {}", idx.0)))?;
                    Recipient::Party(party_id)
                }
            };
            let envelope = dkls_crypto::aead::seal_envelope(session_key, ctx.party_id, to, round, &message.payload)?;
            self.relay.send_envelope(envelope)?;
        }
        Ok(())
    }

    async fn sealing_key(&self, salt: &[u8; 16]) -> Result<[u8; 32]> {
        match &self.passphrase {
            Some(passphrase) => Ok(dkls_crypto::kdf::derive_key(passphrase, salt)?),
            None => self.storage_local_key().await,
        }
    }

    /// A random key generated once and reused on every subsequent save
    /// (§4.4): protects a keystore entry from a reader who only has
    /// the raw bytes at rest, e.g. a stolen disk image, not from
    /// anyone who can also read the keystore backend itself.
    async fn storage_local_key(&self) -> Result<[u8; 32]> {
        if let Some(bytes) = self.keystore.load(STORAGE_KEY_ENTRY).await? {
            let key: [u8; 32] = bytes
                .try_into()
                .map_err(|_| SdkError::Invalid("storage-local key entry is corrupt".into()))?;
            return Ok(key);
        }
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        self.keystore.save(STORAGE_KEY_ENTRY, &key).await?;
        Ok(key)
    }

    async fn save_share(&self, share: &KeyShare) -> Result<()> {
        let salt = dkls_crypto::kdf::generate_salt();
        let key = self.sealing_key(&salt).await?;
        let blob = dkls_keystore::blob::seal_share(&key, salt, share)?;
        let name = dkls_types::share::keystore_key_name(&share.group_id, share.party_index);
        self.keystore.save(&name, &blob).await?;
        Ok(())
    }
}

fn build_keystore(config: &SdkConfig) -> Result<Box<dyn KeystoreBackend>> {
    Ok(match config.keystore_backend {
        KeystoreBackendKind::InMemory => Box::new(InMemoryBackend::new()),
        KeystoreBackendKind::Filesystem => {
            let dir = config
                .keystore_dir
                .clone()
                .ok_or_else(|| SdkError::Invalid("keystore_dir is required for the filesystem backend".into()))?;
            Box::new(FilesystemBackend::new(dir))
        }
        KeystoreBackendKind::BrowserLocal => Box::new(StubBrowserLocalBackend),
    })
}
