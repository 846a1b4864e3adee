//! AES-256-GCM seal/open (§4.1 "Sealing" / "Opening").

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::RngCore;

use dkls_types::envelope::{Envelope, Recipient};
use dkls_types::party::PartyId;

use crate::{CryptoError, Result};

/// Nonce size for AES-256-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Key size for AES-256-GCM (256 bits).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits).
pub const TAG_SIZE: usize = 16;

/// Draw a fresh 96-bit nonce from the OS CSPRNG.
///
/// Nonces are never reused under a given session key (§4.1 invariant);
/// the Session Key Ring is responsible for rekeying a long-lived group
/// before 2^48 seals under one key.
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key`, authenticating `aad`.
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Decrypt `ciphertext` (with appended tag) under `key`, checking `aad`.
///
/// Fails with [`CryptoError::DecryptFailed`] if the tag does not
/// verify or if `aad` disagrees with what was used to seal.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Seal a cleartext round payload into a wire [`Envelope`].
///
/// `AD = from_party || to_party_or_broadcast || round_index`, exactly
/// the §4.1 contract; building the envelope first and then hashing its
/// own `associated_data()` keeps the AD derivation in one place
/// ([`dkls_types::envelope::Envelope::associated_data`]).
pub fn seal_envelope(
    session_key: &[u8; KEY_SIZE],
    from_party: PartyId,
    to: Recipient,
    round_index: u32,
    plaintext: &[u8],
) -> Result<Envelope> {
    let nonce = random_nonce();
    let mut envelope = Envelope {
        from_party,
        to,
        round_index,
        nonce,
        sealed_payload: Vec::new(),
    };
    let ad = envelope.associated_data();
    envelope.sealed_payload = encrypt(session_key, &nonce, plaintext, &ad)?;
    Ok(envelope)
}

/// Open a wire [`Envelope`], returning the cleartext round payload.
pub fn open_envelope(session_key: &[u8; KEY_SIZE], envelope: &Envelope) -> Result<Vec<u8>> {
    let ad = envelope.associated_data();
    decrypt(session_key, &envelope.nonce, &envelope.sealed_payload, &ad)
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
    fn raw_roundtrip() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = random_nonce();
        let ct = encrypt(&key, &nonce, b"hello", b"aad").expect("encrypt");
        let pt = decrypt(&key, &nonce, &ct, b"aad").expect("decrypt");
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = [0x01u8; KEY_SIZE];
        let key2 = [0x02u8; KEY_SIZE];
        let nonce = random_nonce();
        let ct = encrypt(&key1, &nonce, b"hello", b"").expect("encrypt");
        assert!(decrypt(&key2, &nonce, &ct, b"").is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce = random_nonce();
        let ct = encrypt(&key, &nonce, b"hello", b"aad1").expect("encrypt");
        assert!(decrypt(&key, &nonce, &ct, b"aad2").is_err());
    }

    #[test]
    fn envelope_roundtrip() {
        let key = [0x07u8; KEY_SIZE];
        let envelope =
            seal_envelope(&key, party(1), Recipient::Broadcast, 1, b"round payload").expect("seal");
        let opened = open_envelope(&key, &envelope).expect("open");
        assert_eq!(opened, b"round payload");
    }

    #[test]
    fn envelope_open_fails_on_tampered_header() {
        let key = [0x07u8; KEY_SIZE];
        let mut envelope =
            seal_envelope(&key, party(1), Recipient::Broadcast, 1, b"round payload").expect("seal");
        envelope.round_index = 2;
        assert!(open_envelope(&key, &envelope).is_err());
    }

    #[test]
    fn envelope_open_fails_on_wrong_key() {
        let key1 = [0x07u8; KEY_SIZE];
        let key2 = [0x08u8; KEY_SIZE];
        let envelope =
            seal_envelope(&key1, party(1), Recipient::Broadcast, 1, b"payload").expect("seal");
        assert!(open_envelope(&key2, &envelope).is_err());
    }
}
