//! The JSON shape of an envelope on the WebSocket (§6 "Relay WebSocket"),
//! and the ping/pong control frame used for heartbeat.

use serde::{Deserialize, Serialize};

use dkls_types::envelope::{Envelope, Recipient};
use dkls_types::party::PartyId;

use crate::{TransportError, Result};

const BROADCAST: &str = "broadcast";

/// The literal JSON envelope shape §6 specifies: hex party ids, base64
/// nonce/payload, a plain integer round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub from_party: String,
    pub to_party: String,
    pub round: u32,
    pub nonce: String,
    pub payload: String,
}

impl WireEnvelope {
    /// Build the wire JSON form of an already-sealed [`Envelope`].
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let to_party = match envelope.to {
            Recipient::Broadcast => BROADCAST.to_string(),
            Recipient::Party(p) => p.to_hex(),
        };
        Self {
            from_party: envelope.from_party.to_hex(),
            to_party,
            round: envelope.round_index,
            nonce: dkls_crypto::b64::encode(&envelope.nonce),
            payload: dkls_crypto::b64::encode(&envelope.sealed_payload),
        }
    }

    /// Parse and validate the wire JSON form back into an [`Envelope`].
    pub fn into_envelope(self) -> Result<Envelope> {
        let from_party = PartyId::from_hex(&self.from_party)
            .map_err(|e| TransportError::Protocol(format!("bad from_party: {e}")))?;
        let to = if self.to_party == BROADCAST {
            Recipient::Broadcast
        } else {
            Recipient::Party(
                PartyId::from_hex(&self.to_party)
                    .map_err(|e| TransportError::Protocol(format!("bad to_party: {e}")))?,
            )
        };
        let nonce_bytes = dkls_crypto::b64::decode(&self.nonce)
            .map_err(|e| TransportError::Protocol(format!("bad nonce: {e}")))?;
        let nonce: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| TransportError::Protocol("nonce must be 12 bytes".into()))?;
        let sealed_payload = dkls_crypto::b64::decode(&self.payload)
            .map_err(|e| TransportError::Protocol(format!("bad payload: {e}")))?;
        Ok(Envelope {
            from_party,
            to,
            round_index: self.round,
            nonce,
            sealed_payload,
        })
    }
}

/// Heartbeat and envelope frames multiplexed on the same socket. An
/// incoming text frame is untagged JSON: either `{"type":"ping"|"pong"}`
/// or an envelope object with no `type` field at all.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireFrame {
    Control { r#type: ControlFrameType },
    Envelope(WireEnvelope),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlFrameType {
    Ping,
    Pong,
}

pub fn ping_frame_json() -> String {
    serde_json::json!({"type": "ping"}).to_string()
}

pub fn pong_frame_json() -> String {
    serde_json::json!({"type": "pong"}).to_string()
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
    fn envelope_roundtrips_through_wire_json() {
        let envelope = Envelope {
            from_party: party(1),
            to: Recipient::Party(party(2)),
            round_index: 3,
            nonce: [7u8; 12],
            sealed_payload: vec![1, 2, 3, 4, 5],
        };
        let wire = WireEnvelope::from_envelope(&envelope);
        assert_eq!(wire.to_party.len(), 66);
        let back = wire.into_envelope().expect("parse");
        assert_eq!(back.from_party, envelope.from_party);
        assert_eq!(back.round_index, envelope.round_index);
        assert_eq!(back.nonce, envelope.nonce);
        assert_eq!(back.sealed_payload, envelope.sealed_payload);
    }

    #[test]
    fn broadcast_recipient_uses_the_literal_string() {
        let envelope = Envelope {
            from_party: party(1),
            to: Recipient::Broadcast,
            round_index: 1,
            nonce: [0u8; 12],
            sealed_payload: vec![],
        };
        let wire = WireEnvelope::from_envelope(&envelope);
        assert_eq!(wire.to_party, "broadcast");
        let back = wire.into_envelope().expect("parse");
        assert!(back.to.is_broadcast());
    }

    #[test]
    fn control_frames_parse_distinctly_from_envelopes() {
        let ping: WireFrame = serde_json::from_str(&ping_frame_json()).expect("parse ping");
        assert!(matches!(
            ping,
            WireFrame::Control {
                r#type: ControlFrameType::Ping
            }
        ));

        let envelope = Envelope {
            from_party: party(1),
            to: Recipient::Broadcast,
            round_index: 1,
            nonce: [0u8; 12],
            sealed_payload: vec![9],
        };
        let wire = WireEnvelope::from_envelope(&envelope);
        let json = serde_json::to_string(&wire).expect("serialize");
        let parsed: WireFrame = serde_json::from_str(&json).expect("parse envelope frame");
        assert!(matches!(parsed, WireFrame::Envelope(_)));
    }

    #[test]
    fn rejects_malformed_nonce_length() {
        let wire = WireEnvelope {
            from_party: party(1).to_hex(),
            to_party: "broadcast".to_string(),
            round: 1,
            nonce: dkls_crypto::b64::encode(&[0u8; 4]),
            payload: dkls_crypto::b64::encode(b"x"),
        };
        assert!(wire.into_envelope().is_err());
    }
}
