//! Argon2id passphrase KDF for keystore-at-rest encryption (§4.4, §6).

use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::RngCore;

use crate::{CryptoError, Result};

/// Salt size persisted alongside each keystore entry (§6 binary layout).
pub const SALT_SIZE: usize = 16;

/// Derived key size, matching the AES-256-GCM key size.
pub const OUTPUT_LEN: usize = 32;

/// Default Argon2id parameters for passphrase-derived keystore keys:
/// 64 MiB memory, 3 iterations, 4 parallelism lanes.
pub const M_COST_KIB: u32 = 65_536;
pub const T_COST: u32 = 3;
pub const P_COST: u32 = 4;

/// Derive a 256-bit key from a user passphrase and a persisted salt.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_SIZE]) -> Result<[u8; OUTPUT_LEN]> {
    let params = Params::new(M_COST_KIB, T_COST, P_COST, Some(OUTPUT_LEN))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; OUTPUT_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(output)
}

/// Generate a fresh random salt for a new keystore entry.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [0x11u8; SALT_SIZE];
        let k1 = derive_key(b"correct horse battery staple", &salt).expect("derive");
        let k2 = derive_key(b"correct horse battery staple", &salt).expect("derive");
        assert_eq!(k1, k2);
    }

    #[test]
    fn differs_by_passphrase() {
        let salt = [0x11u8; SALT_SIZE];
        let k1 = derive_key(b"passphrase-one", &salt).expect("derive");
        let k2 = derive_key(b"passphrase-two", &salt).expect("derive");
        assert_ne!(k1, k2);
    }

    #[test]
    fn differs_by_salt() {
        let k1 = derive_key(b"same passphrase", &[0x01u8; SALT_SIZE]).expect("derive");
        let k2 = derive_key(b"same passphrase", &[0x02u8; SALT_SIZE]).expect("derive");
        assert_ne!(k1, k2);
    }

    #[test]
    fn salts_are_random() {
        let s1 = generate_salt();
        let s2 = generate_salt();
        assert_ne!(s1, s2);
    }
}
