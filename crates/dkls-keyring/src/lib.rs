//! # dkls-keyring
//!
//! The Session Key Ring (C3, §4.3): holds at most one installed
//! AES-256-GCM session key per active group, never persisted in clear.
//!
//! The ring is owned by a single SDK instance (§5 "Shared mutable
//! state") — it is not process-global, and callers are expected to
//! construct one per `SdkClient`.

use std::collections::HashMap;

use zeroize::Zeroize;

use dkls_types::group::GroupId;

/// Errors raised by the Session Key Ring.
#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    /// `install` was called for a group that already has a key, without
    /// `replace: true`. Catches accidental double-bootstrap.
    #[error("a session key is already installed for group {0}")]
    AlreadyInstalled(GroupId),

    /// `get` or `drop` was called for a group with no installed key.
    #[error("no session key installed for group {0}")]
    NotFound(GroupId),
}

pub type Result<T> = std::result::Result<T, KeyringError>;

/// A 256-bit AES-256-GCM session key, zeroized on drop.
struct SessionKey([u8; 32]);

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Holds at most one session key per group.
#[derive(Default)]
pub struct SessionKeyRing {
    keys: HashMap<GroupId, SessionKey>,
}

impl SessionKeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session key for `group_id`.
    ///
    /// Fails with [`KeyringError::AlreadyInstalled`] if one is already
    /// present, unless `replace` is `true`.
    pub fn install(&mut self, group_id: GroupId, key: [u8; 32], replace: bool) -> Result<()> {
        if !replace && self.keys.contains_key(&group_id) {
            return Err(KeyringError::AlreadyInstalled(group_id));
        }
        self.keys.insert(group_id, SessionKey(key));
        tracing::debug!(group_id = %group_id, "session key installed");
        Ok(())
    }

    /// Borrow the installed key for `group_id`, for use directly by the
    /// envelope codec's seal/open calls.
    pub fn get(&self, group_id: &GroupId) -> Option<&[u8; 32]> {
        self.keys.get(group_id).map(|k| &k.0)
    }

    /// Remove and zeroize the key installed for `group_id`.
    pub fn drop_key(&mut self, group_id: &GroupId) -> Result<()> {
        self.keys.remove(group_id).ok_or(KeyringError::NotFound(*group_id))?;
        tracing::debug!(group_id = %group_id, "session key dropped");
        Ok(())
    }

    /// Whether a key is currently installed for `group_id`.
    pub fn contains(&self, group_id: &GroupId) -> bool {
        self.keys.contains_key(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid(byte: u8) -> GroupId {
        GroupId::from_bytes([byte; 32])
    }

    #[test]
    fn install_then_get_returns_the_key() {
        let mut ring = SessionKeyRing::new();
        let key = [0x42u8; 32];
        ring.install(gid(1), key, false).expect("install");
        assert_eq!(ring.get(&gid(1)), Some(&key));
    }

    #[test]
    fn install_twice_without_replace_fails() {
        let mut ring = SessionKeyRing::new();
        ring.install(gid(1), [0x01u8; 32], false).expect("first install");
        let err = ring.install(gid(1), [0x02u8; 32], false).unwrap_err();
        assert!(matches!(err, KeyringError::AlreadyInstalled(_)));
    }

    #[test]
    fn install_twice_with_replace_overwrites() {
        let mut ring = SessionKeyRing::new();
        ring.install(gid(1), [0x01u8; 32], false).expect("first install");
        ring.install(gid(1), [0x02u8; 32], true).expect("replace");
        assert_eq!(ring.get(&gid(1)), Some(&[0x02u8; 32]));
    }

    #[test]
    fn get_on_unknown_group_is_none() {
        let ring = SessionKeyRing::new();
        assert_eq!(ring.get(&gid(9)), None);
    }

    #[test]
    fn drop_key_removes_it() {
        let mut ring = SessionKeyRing::new();
        ring.install(gid(1), [0x01u8; 32], false).expect("install");
        ring.drop_key(&gid(1)).expect("drop");
        assert_eq!(ring.get(&gid(1)), None);
        assert!(!ring.contains(&gid(1)));
    }

    #[test]
    fn drop_key_on_unknown_group_fails() {
        let mut ring = SessionKeyRing::new();
        assert!(matches!(ring.drop_key(&gid(1)), Err(KeyringError::NotFound(_))));
    }
}
