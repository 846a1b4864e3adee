//! The persisted key-share blob (§6 "Persisted key-share blob"):
//!
//! ```text
//! magic(4B="DSHD") || version(1B) || kdf_salt(16B) || nonce(12B) || aead_tag(16B) || ciphertext(rest)
//! ```
//!
//! `dkls_crypto::aead::encrypt` returns `ciphertext || tag` as one
//! slice (the `aes-gcm` crate's usual output shape); this module splits
//! the trailing tag back out so the tag lands between the nonce and
//! the ciphertext on disk, matching the external layout above. The
//! header (magic, version, salt) is the AEAD associated data, binding
//! it to the ciphertext it was written with.
//!
//! Hand-rolled rather than derived through `serde`, matching how the
//! rest of this workspace keeps wire JSON (`serde`) and binary
//! at-rest layouts (hand-written `to_bytes`/`from_bytes`) on separate
//! tracks.

use dkls_crypto::aead::{decrypt, encrypt, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use dkls_types::share::KeyShare;

use crate::{KeystoreError, Result};

const MAGIC: [u8; 4] = *b"DSHD";
const VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_SIZE;
const PREFIX_LEN: usize = HEADER_LEN + NONCE_SIZE + TAG_SIZE;

/// Seal a [`KeyShare`] into the binary blob persisted by the Keystore.
///
/// `key` is whatever 32-byte sealing key the caller has already
/// decided on (passphrase-derived via `dkls_crypto::kdf`, or a random
/// storage-local key); `salt` is only meaningful to the caller in the
/// passphrase case, but is always stored so the header layout is fixed
/// regardless of sealing mode.
pub fn seal_share(key: &[u8; KEY_SIZE], salt: [u8; SALT_SIZE], share: &KeyShare) -> Result<Vec<u8>> {
    let plaintext = serde_json::to_vec(share)
        .map_err(|e| KeystoreError::InvalidBlob(format!("share serialization failed: {e}")))?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&MAGIC);
    header.push(VERSION);
    header.extend_from_slice(&salt);

    let nonce = dkls_crypto::aead::random_nonce();
    let sealed = encrypt(key, &nonce, &plaintext, &header)
        .map_err(|e| KeystoreError::InvalidBlob(e.to_string()))?;
    if sealed.len() < TAG_SIZE {
        return Err(KeystoreError::InvalidBlob("sealed output shorter than one tag".into()));
    }
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_SIZE + TAG_SIZE + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(tag);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Read the KDF salt out of a blob's header without decrypting it, so
/// a passphrase-sealed entry's key can be re-derived before opening.
pub fn read_salt(bytes: &[u8]) -> Result<[u8; SALT_SIZE]> {
    check_header(bytes)?;
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&bytes[MAGIC.len() + 1..HEADER_LEN]);
    Ok(salt)
}

/// Open a blob produced by [`seal_share`].
pub fn open_share(key: &[u8; KEY_SIZE], bytes: &[u8]) -> Result<KeyShare> {
    check_header(bytes)?;
    if bytes.len() < PREFIX_LEN {
        return Err(KeystoreError::InvalidBlob("blob truncated before tag".into()));
    }
    let header = &bytes[..HEADER_LEN];
    let nonce: [u8; NONCE_SIZE] = bytes[HEADER_LEN..HEADER_LEN + NONCE_SIZE]
        .try_into()
        .expect("slice length matches NONCE_SIZE");
    let tag = &bytes[HEADER_LEN + NONCE_SIZE..PREFIX_LEN];
    let ciphertext = &bytes[PREFIX_LEN..];

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext =
        decrypt(key, &nonce, &sealed, header).map_err(|_| KeystoreError::InvalidBlob("decrypt failed".into()))?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| KeystoreError::InvalidBlob(format!("share deserialization failed: {e}")))
}

fn check_header(bytes: &[u8]) -> Result<()> {
    if bytes.len() < HEADER_LEN {
        return Err(KeystoreError::InvalidBlob("blob truncated before header".into()));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(KeystoreError::InvalidBlob("bad magic".into()));
    }
    let version = bytes[MAGIC.len()];
    if version != VERSION {
        return Err(KeystoreError::InvalidBlob(format!("unsupported blob version {version}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dkls_types::group::GroupId;
    use dkls_types::party::PartyIndex;
    use dkls_types::share::PublicKeyBytes;

    fn sample_share() -> KeyShare {
        KeyShare {
            public_key: PublicKeyBytes([0x02; 33]),
            party_index: PartyIndex(1),
            threshold: 2,
            participants: Vec::new(),
            group_id: GroupId::from_bytes([9u8; 32]),
            relay_token: None,
            serialized: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn seals_and_opens_a_share() {
        let key = [0x11u8; KEY_SIZE];
        let salt = [0x22u8; SALT_SIZE];
        let share = sample_share();

        let blob = seal_share(&key, salt, &share).expect("seal");
        assert_eq!(read_salt(&blob).expect("read salt"), salt);

        let opened = open_share(&key, &blob).expect("open");
        assert_eq!(opened.serialized, share.serialized);
        assert_eq!(opened.party_index, share.party_index);
        assert_eq!(opened.threshold, share.threshold);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let share = sample_share();
        let blob = seal_share(&[0x01u8; KEY_SIZE], [0u8; SALT_SIZE], &share).expect("seal");
        assert!(open_share(&[0x02u8; KEY_SIZE], &blob).is_err());
    }

    #[test]
    fn tampered_magic_is_rejected() {
        let share = sample_share();
        let mut blob = seal_share(&[0x01u8; KEY_SIZE], [0u8; SALT_SIZE], &share).expect("seal");
        blob[0] ^= 0xFF;
        assert!(open_share(&[0x01u8; KEY_SIZE], &blob).is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(open_share(&[0x01u8; KEY_SIZE], &[0u8; 3]).is_err());
    }

    #[test]
    fn tag_is_placed_between_nonce_and_ciphertext() {
        let key = [0x33u8; KEY_SIZE];
        let salt = [0x44u8; SALT_SIZE];
        let share = sample_share();
        let plaintext_len = serde_json::to_vec(&share).expect("serialize").len();

        let blob = seal_share(&key, salt, &share).expect("seal");
        // GCM ciphertext is the same length as the plaintext it encrypts,
        // so the blob's total length pins down exactly where the tag ends
        // and the ciphertext begins.
        assert_eq!(blob.len(), PREFIX_LEN + plaintext_len);
    }
}
