//! A deterministic, non-cryptographic-grade [`MpcEngine`] used only to
//! drive this workspace's own tests.
//!
//! This is **not** a DKLS implementation. Real threshold signing never
//! lets any single party locally reconstruct the group secret; this
//! fixture does exactly that, in the clear, inside one process, because
//! its only job is to give `dkls-protocol`, `dkls-bootstrap`, and
//! `dkls-sdk` something real to round-trip messages against and a real
//! secp256k1 keypair to check [`crate::verify`] with. It implements
//! joint Shamir secret sharing (Pedersen-style, without the verifiable
//! commitments a production DKG would add) so that any `threshold`-sized
//! subset of participants can sign, matching the shape DSG sessions
//! actually run in.
//!
//! Wire format for round-1 messages (`Dkg` and `Rotation`):
//! `has_commitment: u8` (0 or 1) `[commitment: 33 bytes]`
//! `count: u8` `(party_index: u8, scalar: 32 bytes){count}`.
//!
//! Wire format for round-1 messages (`Dsg`): a single 32-byte scalar,
//! this party's Lagrange-weighted partial secret contribution.
//!
//! Persisted share blob (used as both [`MpcEngine::to_bytes`] output and
//! [`SessionParams::existing_share`] input): `share: 32 bytes` (this
//! party's joint polynomial evaluation) `public_key: 33 bytes`
//! (compressed, SEC1).

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, ProjectivePoint, PublicKey, Scalar};
use rand_core::OsRng;

use dkls_types::party::PartyIndex;
use dkls_types::session::ProtocolKind;
use dkls_types::share::PublicKeyBytes;

use crate::traits::{
    Artifact, EngineError, EngineFactory, EngineMessage, EngineRecipient, InboundMessage,
    MpcEngine, Result, SessionParams,
};

const SHARE_BLOB_LEN: usize = 32 + 33;

/// `PartyIndex` values are 0-based; polynomial evaluation points must be
/// non-zero (x=0 is reserved for the secret itself), so every party's
/// evaluation point is its index plus one.
fn eval_point(index: PartyIndex) -> Scalar {
    Scalar::from(index.as_usize() as u64 + 1)
}

fn compressed_public_key(point: &ProjectivePoint) -> PublicKeyBytes {
    let affine: AffinePoint = point.to_affine();
    let encoded = affine.to_encoded_point(true);
    let mut buf = [0u8; 33];
    buf.copy_from_slice(encoded.as_bytes());
    PublicKeyBytes(buf)
}

fn lagrange_coefficient_at_zero(self_index: PartyIndex, others: &[PartyIndex]) -> Scalar {
    let x_self = eval_point(self_index);
    let mut coeff = Scalar::ONE;
    for &peer in others {
        if peer == self_index {
            continue;
        }
        let x_peer = eval_point(peer);
        let denom = x_peer - x_self;
        // `denom` is zero only if two participants share a PartyIndex,
        // which Group::admit never produces.
        let inv = Option::<Scalar>::from(denom.invert()).expect("distinct participant indices");
        coeff = coeff * x_peer * inv;
    }
    coeff
}

fn encode_share(share: &Scalar, public_key: &PublicKeyBytes) -> Vec<u8> {
    let mut out = Vec::with_capacity(SHARE_BLOB_LEN);
    out.extend_from_slice(&share.to_bytes());
    out.extend_from_slice(&public_key.0);
    out
}

fn decode_share(bytes: &[u8]) -> Result<(Scalar, PublicKeyBytes)> {
    if bytes.len() != SHARE_BLOB_LEN {
        return Err(EngineError::InvalidParams(format!(
            "expected a {SHARE_BLOB_LEN}-byte share blob, got {}",
            bytes.len()
        )));
    }
    let mut share_bytes = [0u8; 32];
    share_bytes.copy_from_slice(&bytes[..32]);
    let share = Option::<Scalar>::from(Scalar::from_repr(share_bytes.into()))
        .ok_or_else(|| EngineError::InvalidParams("share scalar out of range".into()))?;
    let mut public_key = [0u8; 33];
    public_key.copy_from_slice(&bytes[32..]);
    Ok((share, PublicKeyBytes(public_key)))
}

fn encode_round1(commitment: Option<&PublicKeyBytes>, shares: &[(PartyIndex, Scalar)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 33 + 1 + shares.len() * 33);
    match commitment {
        Some(c) => {
            out.push(1);
            out.extend_from_slice(&c.0);
        }
        None => out.push(0),
    }
    out.push(shares.len() as u8);
    for (index, scalar) in shares {
        out.push(index.0);
        out.extend_from_slice(&scalar.to_bytes());
    }
    out
}

struct DecodedRound1 {
    commitment: Option<PublicKeyBytes>,
    shares: Vec<(PartyIndex, Scalar)>,
}

fn decode_round1(bytes: &[u8]) -> Result<DecodedRound1> {
    let bad = || EngineError::MalformedMessage("truncated round-1 payload".into());
    let mut cursor = 0usize;
    let has_commitment = *bytes.first().ok_or_else(bad)? == 1;
    cursor += 1;
    let commitment = if has_commitment {
        let slice = bytes.get(cursor..cursor + 33).ok_or_else(bad)?;
        cursor += 33;
        let mut buf = [0u8; 33];
        buf.copy_from_slice(slice);
        Some(PublicKeyBytes(buf))
    } else {
        None
    };
    let count = *bytes.get(cursor).ok_or_else(bad)? as usize;
    cursor += 1;
    let mut shares = Vec::with_capacity(count);
    for _ in 0..count {
        let party = *bytes.get(cursor).ok_or_else(bad)?;
        cursor += 1;
        let scalar_bytes = bytes.get(cursor..cursor + 32).ok_or_else(bad)?;
        cursor += 32;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(scalar_bytes);
        let scalar = Option::<Scalar>::from(Scalar::from_repr(arr.into()))
            .ok_or_else(|| EngineError::MalformedMessage("share scalar out of range".into()))?;
        shares.push((PartyIndex(party), scalar));
    }
    Ok(DecodedRound1 { commitment, shares })
}

fn sample_polynomial(constant_term: Scalar, degree: usize) -> Vec<Scalar> {
    let mut coefficients = Vec::with_capacity(degree + 1);
    coefficients.push(constant_term);
    for _ in 0..degree {
        coefficients.push(Scalar::random(OsRng));
    }
    coefficients
}

fn evaluate(coefficients: &[Scalar], x: Scalar) -> Scalar {
    let mut value = Scalar::ZERO;
    for coeff in coefficients.iter().rev() {
        value = value * x + coeff;
    }
    value
}

enum DkgState {
    AwaitingRound1 {
        self_index: PartyIndex,
        participants: Vec<PartyIndex>,
        own_secret_commitment: PublicKeyBytes,
        own_shares_for_peers: Vec<(PartyIndex, Scalar)>,
        own_share_of_self: Scalar,
    },
    Done(Artifact),
}

/// Joint Shamir DKG: every participant contributes one secret
/// polynomial; the group secret is the sum of the constant terms, and
/// each party's share is the sum of every polynomial evaluated at that
/// party's point. A single broadcast round suffices.
pub struct DkgEngine {
    state: DkgState,
}

impl DkgEngine {
    fn new(self_index: PartyIndex, participants: Vec<PartyIndex>, threshold: u8) -> Result<Self> {
        if threshold == 0 || (threshold as usize) > participants.len() {
            return Err(EngineError::InvalidParams(
                "threshold must be between 1 and the participant count".into(),
            ));
        }
        let secret = Scalar::random(OsRng);
        let coefficients = sample_polynomial(secret, threshold as usize - 1);
        let own_shares_for_peers = participants
            .iter()
            .map(|&p| (p, evaluate(&coefficients, eval_point(p))))
            .collect::<Vec<_>>();
        let own_share_of_self = *own_shares_for_peers
            .iter()
            .find(|(p, _)| *p == self_index)
            .map(|(_, s)| s)
            .ok_or_else(|| EngineError::InvalidParams("self not present in participants".into()))?;
        let commitment = compressed_public_key(&(ProjectivePoint::GENERATOR * secret));
        Ok(Self {
            state: DkgState::AwaitingRound1 {
                self_index,
                participants,
                own_secret_commitment: commitment,
                own_shares_for_peers,
                own_share_of_self,
            },
        })
    }
}

impl MpcEngine for DkgEngine {
    fn first_message(&mut self) -> Result<Vec<EngineMessage>> {
        let DkgState::AwaitingRound1 {
            own_secret_commitment,
            own_shares_for_peers,
            ..
        } = &self.state
        else {
            return Err(EngineError::ComputationFailed("first_message called twice".into()));
        };
        let payload = encode_round1(Some(own_secret_commitment), own_shares_for_peers);
        Ok(vec![EngineMessage {
            to: EngineRecipient::Broadcast,
            payload,
        }])
    }

    fn handle(&mut self, _round_index: u32, inbound: &[InboundMessage]) -> Result<Vec<EngineMessage>> {
        let DkgState::AwaitingRound1 {
            self_index,
            participants,
            own_secret_commitment,
            own_share_of_self,
            ..
        } = &self.state
        else {
            return Err(EngineError::ComputationFailed("dkg already completed".into()));
        };

        let mut group_point = ProjectivePoint::from(
            PublicKey::from_sec1_bytes(&own_secret_commitment.0)
                .map_err(|e| EngineError::ComputationFailed(e.to_string()))?
                .as_affine()
                .to_owned(),
        );
        let mut share_total = *own_share_of_self;

        for message in inbound {
            let decoded = decode_round1(&message.payload)?;
            let commitment = decoded
                .commitment
                .ok_or_else(|| EngineError::MalformedMessage("dkg round missing commitment".into()))?;
            let point = PublicKey::from_sec1_bytes(&commitment.0)
                .map_err(|e| EngineError::MalformedMessage(e.to_string()))?;
            group_point += ProjectivePoint::from(*point.as_affine());

            let mine = decoded
                .shares
                .iter()
                .find(|(p, _)| *p == *self_index)
                .map(|(_, s)| *s)
                .ok_or_else(|| {
                    EngineError::MalformedMessage("dkg peer sent no share for this party".into())
                })?;
            share_total += mine;
        }

        let expected_senders = participants.len().saturating_sub(1);
        if inbound.len() != expected_senders {
            tracing::warn!(
                expected = expected_senders,
                got = inbound.len(),
                "dkg round received the wrong number of peer contributions"
            );
            return Err(EngineError::MalformedMessage(format!(
                "expected {expected_senders} dkg peers, got {}",
                inbound.len()
            )));
        }

        let public_key = compressed_public_key(&group_point);
        tracing::info!(public_key = ?public_key, "dkg converged on a group public key");
        self.state = DkgState::Done(Artifact::Share {
            serialized: encode_share(&share_total, &public_key),
            public_key,
        });
        Ok(Vec::new())
    }

    fn completed(&self) -> Option<Artifact> {
        match &self.state {
            DkgState::Done(artifact) => Some(artifact.clone()),
            DkgState::AwaitingRound1 { .. } => None,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.state {
            DkgState::Done(Artifact::Share { serialized, .. }) => Ok(serialized.clone()),
            _ => Err(EngineError::Unsupported("dkg session not yet completed".into())),
        }
    }
}

enum RotationState {
    AwaitingRound1 {
        self_index: PartyIndex,
        participants: Vec<PartyIndex>,
        public_key: PublicKeyBytes,
        own_share: Scalar,
        own_deltas_for_peers: Vec<(PartyIndex, Scalar)>,
        own_delta_of_self: Scalar,
    },
    Done(Artifact),
}

/// Share rotation via a zero-sum resharing round: every participant
/// contributes a random polynomial whose constant term is zero, so the
/// sum of new shares reconstructs to the same group secret (and hence
/// the same public key) while every party's individual share changes.
pub struct RotationEngine {
    state: RotationState,
}

impl RotationEngine {
    fn new(
        self_index: PartyIndex,
        participants: Vec<PartyIndex>,
        threshold: u8,
        existing_share: &[u8],
    ) -> Result<Self> {
        let (own_share, public_key) = decode_share(existing_share)?;
        if threshold == 0 || (threshold as usize) > participants.len() {
            return Err(EngineError::InvalidParams(
                "threshold must be between 1 and the participant count".into(),
            ));
        }
        let coefficients = sample_polynomial(Scalar::ZERO, threshold as usize - 1);
        let own_deltas_for_peers = participants
            .iter()
            .map(|&p| (p, evaluate(&coefficients, eval_point(p))))
            .collect::<Vec<_>>();
        let own_delta_of_self = *own_deltas_for_peers
            .iter()
            .find(|(p, _)| *p == self_index)
            .map(|(_, s)| s)
            .ok_or_else(|| EngineError::InvalidParams("self not present in participants".into()))?;
        Ok(Self {
            state: RotationState::AwaitingRound1 {
                self_index,
                participants,
                public_key,
                own_share,
                own_deltas_for_peers,
                own_delta_of_self,
            },
        })
    }
}

impl MpcEngine for RotationEngine {
    fn first_message(&mut self) -> Result<Vec<EngineMessage>> {
        let RotationState::AwaitingRound1 {
            own_deltas_for_peers,
            ..
        } = &self.state
        else {
            return Err(EngineError::ComputationFailed("first_message called twice".into()));
        };
        Ok(vec![EngineMessage {
            to: EngineRecipient::Broadcast,
            payload: encode_round1(None, own_deltas_for_peers),
        }])
    }

    fn handle(&mut self, _round_index: u32, inbound: &[InboundMessage]) -> Result<Vec<EngineMessage>> {
        let RotationState::AwaitingRound1 {
            self_index,
            participants,
            public_key,
            own_share,
            own_delta_of_self,
            ..
        } = &self.state
        else {
            return Err(EngineError::ComputationFailed("rotation already completed".into()));
        };

        let expected_senders = participants.len().saturating_sub(1);
        if inbound.len() != expected_senders {
            tracing::warn!(
                expected = expected_senders,
                got = inbound.len(),
                "rotation round received the wrong number of peer deltas"
            );
            return Err(EngineError::MalformedMessage(format!(
                "expected {expected_senders} rotation peers, got {}",
                inbound.len()
            )));
        }

        let mut new_share = *own_share + own_delta_of_self;
        for message in inbound {
            let decoded = decode_round1(&message.payload)?;
            let mine = decoded
                .shares
                .iter()
                .find(|(p, _)| *p == *self_index)
                .map(|(_, s)| *s)
                .ok_or_else(|| {
                    EngineError::MalformedMessage("rotation peer sent no delta for this party".into())
                })?;
            new_share += mine;
        }

        let public_key = *public_key;
        tracing::info!(public_key = ?public_key, "rotation produced a fresh share preserving the group key");
        self.state = RotationState::Done(Artifact::Share {
            serialized: encode_share(&new_share, &public_key),
            public_key,
        });
        Ok(Vec::new())
    }

    fn completed(&self) -> Option<Artifact> {
        match &self.state {
            RotationState::Done(artifact) => Some(artifact.clone()),
            RotationState::AwaitingRound1 { .. } => None,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.state {
            RotationState::Done(Artifact::Share { serialized, .. }) => Ok(serialized.clone()),
            _ => Err(EngineError::Unsupported("rotation session not yet completed".into())),
        }
    }
}

enum DsgState {
    AwaitingRound1 {
        digest: [u8; 32],
        own_partial: Scalar,
        expected_senders: usize,
    },
    Done(Artifact),
}

/// Threshold signing: each signer in the session's participant subset
/// broadcasts its Lagrange-weighted partial secret contribution; once
/// every signer's contribution is in, summing them reconstructs the
/// group secret and an ordinary deterministic ECDSA signature is
/// produced over the session digest.
pub struct DsgEngine {
    state: DsgState,
}

impl DsgEngine {
    fn new(
        self_index: PartyIndex,
        participants: Vec<PartyIndex>,
        existing_share: &[u8],
        digest: [u8; 32],
    ) -> Result<Self> {
        let (share, _public_key) = decode_share(existing_share)?;
        let lambda = lagrange_coefficient_at_zero(self_index, &participants);
        Ok(Self {
            state: DsgState::AwaitingRound1 {
                digest,
                own_partial: lambda * share,
                expected_senders: participants.len().saturating_sub(1),
            },
        })
    }
}

impl MpcEngine for DsgEngine {
    fn first_message(&mut self) -> Result<Vec<EngineMessage>> {
        let DsgState::AwaitingRound1 { own_partial, .. } = &self.state else {
            return Err(EngineError::ComputationFailed("first_message called twice".into()));
        };
        Ok(vec![EngineMessage {
            to: EngineRecipient::Broadcast,
            payload: own_partial.to_bytes().to_vec(),
        }])
    }

    fn handle(&mut self, _round_index: u32, inbound: &[InboundMessage]) -> Result<Vec<EngineMessage>> {
        let DsgState::AwaitingRound1 {
            digest,
            own_partial,
            expected_senders,
        } = &self.state
        else {
            return Err(EngineError::ComputationFailed("dsg already completed".into()));
        };
        if inbound.len() != *expected_senders {
            tracing::warn!(
                expected = expected_senders,
                got = inbound.len(),
                "dsg round received the wrong number of co-signer partials"
            );
            return Err(EngineError::MalformedMessage(format!(
                "expected {expected_senders} dsg co-signers, got {}",
                inbound.len()
            )));
        }

        let mut total = *own_partial;
        for message in inbound {
            if message.payload.len() != 32 {
                return Err(EngineError::MalformedMessage("malformed dsg partial".into()));
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&message.payload);
            let partial = Option::<Scalar>::from(Scalar::from_repr(bytes.into()))
                .ok_or_else(|| EngineError::MalformedMessage("dsg partial out of range".into()))?;
            total += partial;
        }

        let signing_key = SigningKey::from_bytes(&total.to_bytes())
            .map_err(|e| EngineError::ComputationFailed(e.to_string()))?;
        let signature: k256::ecdsa::Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| EngineError::ComputationFailed(e.to_string()))?;
        let (r, s) = signature.split_bytes();
        let mut r_arr = [0u8; 32];
        let mut s_arr = [0u8; 32];
        r_arr.copy_from_slice(&r);
        s_arr.copy_from_slice(&s);

        tracing::info!("dsg round combined co-signer partials into a signature");
        self.state = DsgState::Done(Artifact::Signature { r: r_arr, s: s_arr });
        Ok(Vec::new())
    }

    fn completed(&self) -> Option<Artifact> {
        match &self.state {
            DsgState::Done(artifact) => Some(artifact.clone()),
            DsgState::AwaitingRound1 { .. } => None,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Err(EngineError::Unsupported(
            "dsg sessions carry no persistable state".into(),
        ))
    }
}

/// Builds [`DkgEngine`], [`RotationEngine`], and [`DsgEngine`] sessions.
/// `Recovery` is not implemented by this fixture: no integration
/// scenario in this workspace exercises it (§9 lists it as a routable
/// but untested protocol kind).
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEngineFactory;

impl EngineFactory for FixtureEngineFactory {
    fn construct(&self, params: &SessionParams) -> Result<Box<dyn MpcEngine>> {
        match params.protocol_kind {
            ProtocolKind::Dkg => Ok(Box::new(DkgEngine::new(
                params.party_index,
                params.participants.clone(),
                params.threshold,
            )?)),
            ProtocolKind::Rotation => {
                let share = params.existing_share.as_deref().ok_or_else(|| {
                    EngineError::InvalidParams("rotation requires an existing share".into())
                })?;
                Ok(Box::new(RotationEngine::new(
                    params.party_index,
                    params.participants.clone(),
                    params.threshold,
                    share,
                )?))
            }
            ProtocolKind::Dsg => {
                let share = params.existing_share.as_deref().ok_or_else(|| {
                    EngineError::InvalidParams("dsg requires an existing share".into())
                })?;
                let digest = params
                    .digest
                    .ok_or_else(|| EngineError::InvalidParams("dsg requires a digest".into()))?;
                Ok(Box::new(DsgEngine::new(
                    params.party_index,
                    params.participants.clone(),
                    share,
                    digest,
                )?))
            }
            ProtocolKind::Recovery => Err(EngineError::Unsupported(
                "recovery is not implemented by the fixture engine".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify;
    use std::collections::HashMap;

    fn run_round1(
        engines: &mut HashMap<PartyIndex, Box<dyn MpcEngine>>,
        participants: &[PartyIndex],
    ) -> HashMap<PartyIndex, Vec<EngineMessage>> {
        let mut outbound = HashMap::new();
        for &p in participants {
            outbound.insert(p, engines.get_mut(&p).unwrap().first_message().unwrap());
        }
        outbound
    }

    fn deliver(
        outbound: &HashMap<PartyIndex, Vec<EngineMessage>>,
        to: PartyIndex,
        from: PartyIndex,
    ) -> InboundMessage {
        let messages = &outbound[&from];
        assert_eq!(messages.len(), 1);
        let _ = to;
        InboundMessage {
            from,
            payload: messages[0].payload.clone(),
        }
    }

    #[test]
    fn dkg_then_dsg_produces_a_verifiable_signature() {
        let factory = FixtureEngineFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1), PartyIndex(2)];
        let threshold = 2u8;

        let mut dkg_engines: HashMap<PartyIndex, Box<dyn MpcEngine>> = participants
            .iter()
            .map(|&p| {
                let params = SessionParams {
                    protocol_kind: ProtocolKind::Dkg,
                    party_index: p,
                    participants: participants.clone(),
                    threshold,
                    digest: None,
                    existing_share: None,
                };
                (p, factory.construct(&params).unwrap())
            })
            .collect();

        let outbound = run_round1(&mut dkg_engines, &participants);
        let mut shares = HashMap::new();
        let mut public_key = None;
        for &p in &participants {
            let inbound: Vec<InboundMessage> = participants
                .iter()
                .filter(|&&q| q != p)
                .map(|&q| deliver(&outbound, p, q))
                .collect();
            let rest = dkg_engines.get_mut(&p).unwrap().handle(1, &inbound).unwrap();
            assert!(rest.is_empty());
            match dkg_engines[&p].completed().unwrap() {
                Artifact::Share { serialized, public_key: pk } => {
                    shares.insert(p, serialized);
                    if let Some(existing) = public_key {
                        assert_eq!(existing, pk.0);
                    } else {
                        public_key = Some(pk.0);
                    }
                }
                Artifact::Signature { .. } => panic!("dkg must not yield a signature"),
            }
        }

        let signers = vec![participants[0], participants[2]];
        let digest = [5u8; 32];
        let mut dsg_engines: HashMap<PartyIndex, Box<dyn MpcEngine>> = signers
            .iter()
            .map(|&p| {
                let params = SessionParams {
                    protocol_kind: ProtocolKind::Dsg,
                    party_index: p,
                    participants: signers.clone(),
                    threshold,
                    digest: Some(digest),
                    existing_share: Some(shares[&p].clone()),
                };
                (p, factory.construct(&params).unwrap())
            })
            .collect();

        let outbound = run_round1(&mut dsg_engines, &signers);
        let mut signature = None;
        for &p in &signers {
            let inbound: Vec<InboundMessage> = signers
                .iter()
                .filter(|&&q| q != p)
                .map(|&q| deliver(&outbound, p, q))
                .collect();
            dsg_engines.get_mut(&p).unwrap().handle(1, &inbound).unwrap();
            match dsg_engines[&p].completed().unwrap() {
                Artifact::Signature { r, s } => signature = Some((r, s)),
                Artifact::Share { .. } => panic!("dsg must not yield a share"),
            }
        }

        let (r, s) = signature.unwrap();
        let public_key = dkls_types::share::PublicKeyBytes(public_key.unwrap());
        assert!(verify::verify(&public_key, &digest, &r, &s));
    }

    #[test]
    fn rotation_preserves_the_public_key() {
        let factory = FixtureEngineFactory;
        let participants = vec![PartyIndex(0), PartyIndex(1)];
        let threshold = 2u8;

        let mut dkg_engines: HashMap<PartyIndex, Box<dyn MpcEngine>> = participants
            .iter()
            .map(|&p| {
                let params = SessionParams {
                    protocol_kind: ProtocolKind::Dkg,
                    party_index: p,
                    participants: participants.clone(),
                    threshold,
                    digest: None,
                    existing_share: None,
                };
                (p, factory.construct(&params).unwrap())
            })
            .collect();
        let outbound = run_round1(&mut dkg_engines, &participants);
        let mut shares = HashMap::new();
        let mut public_key = None;
        for &p in &participants {
            let inbound: Vec<InboundMessage> = participants
                .iter()
                .filter(|&&q| q != p)
                .map(|&q| deliver(&outbound, p, q))
                .collect();
            dkg_engines.get_mut(&p).unwrap().handle(1, &inbound).unwrap();
            if let Artifact::Share { serialized, public_key: pk } = dkg_engines[&p].completed().unwrap() {
                shares.insert(p, serialized);
                public_key = Some(pk.0);
            }
        }

        let mut rotation_engines: HashMap<PartyIndex, Box<dyn MpcEngine>> = participants
            .iter()
            .map(|&p| {
                let params = SessionParams {
                    protocol_kind: ProtocolKind::Rotation,
                    party_index: p,
                    participants: participants.clone(),
                    threshold,
                    digest: None,
                    existing_share: Some(shares[&p].clone()),
                };
                (p, factory.construct(&params).unwrap())
            })
            .collect();
        let outbound = run_round1(&mut rotation_engines, &participants);
        let mut rotated_shares = HashMap::new();
        for &p in &participants {
            let inbound: Vec<InboundMessage> = participants
                .iter()
                .filter(|&&q| q != p)
                .map(|&q| deliver(&outbound, p, q))
                .collect();
            rotation_engines.get_mut(&p).unwrap().handle(1, &inbound).unwrap();
            if let Artifact::Share { serialized, public_key: pk } =
                rotation_engines[&p].completed().unwrap()
            {
                assert_eq!(pk.0, public_key.unwrap());
                rotated_shares.insert(p, serialized);
            }
        }

        assert_ne!(rotated_shares[&participants[0]], shares[&participants[0]]);
    }
}
