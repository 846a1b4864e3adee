//! SDK-wide configuration (§4.8 construction parameters).
//!
//! Unlike the teacher daemon's `DaemonConfig`, this struct is never
//! read from a fixed home directory by the SDK itself — it has no
//! process-wide home the way a daemon does (§5 "Multiple SDK
//! instances ... are independent and share nothing"). A host
//! application that wants a config *file* loads and parses it and
//! hands the resulting `SdkConfig` to [`crate::client::SdkClient::new`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Which [`dkls_keystore::backend::KeystoreBackend`] to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeystoreBackendKind {
    /// Nothing survives process exit. Default: safe for tests and
    /// ephemeral hosts, useless for a real wallet.
    #[default]
    InMemory,
    /// One file per key share under `keystore_dir`.
    Filesystem,
    /// A wasm-hosted `localStorage`-shaped backend (§9 "three blessed
    /// implementations"). Always reports unavailable on this native
    /// workspace.
    BrowserLocal,
}

/// Top-level SDK configuration (§4.8: `{relayer_base_url,
/// websocket_url, keystore_backend}`, plus the timeout knobs §5 and
/// §4.5 leave per-call-configurable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// The relay's HTTP control-plane base URL.
    pub relay_http_url: String,

    /// The relay's WebSocket base URL. `None` derives it from
    /// `relay_http_url` by swapping scheme and appending `/ws`
    /// (`dkls_transport::client::RelayClient::new`'s default).
    #[serde(default)]
    pub relay_ws_url: Option<String>,

    #[serde(default)]
    pub keystore_backend: KeystoreBackendKind,

    /// Base directory for [`KeystoreBackendKind::Filesystem`].
    #[serde(default)]
    pub keystore_dir: Option<PathBuf>,

    /// Per-round fan-in deadline (§4.5, default 30s).
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,

    /// Overall per-session deadline spanning every round (§5
    /// "Full-protocol: 60s default. Both configurable per call.");
    /// the admission deadline itself stays the fixed 60s §4.7 already
    /// bakes into `dkls_bootstrap::await_admission`.
    #[serde(default = "default_protocol_timeout_secs")]
    pub protocol_timeout_secs: u64,

    /// Event channel ring-buffer capacity (§9 event channel).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_round_timeout_secs() -> u64 {
    30
}

fn default_protocol_timeout_secs() -> u64 {
    60
}

fn default_event_capacity() -> usize {
    crate::events::DEFAULT_EVENT_CAPACITY
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            relay_http_url: "http://127.0.0.1:8080/".to_string(),
            relay_ws_url: None,
            keystore_backend: KeystoreBackendKind::default(),
            keystore_dir: None,
            round_timeout_secs: default_round_timeout_secs(),
            protocol_timeout_secs: default_protocol_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SdkConfig {
    /// Parse a TOML document into an `SdkConfig`.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SdkError::Invalid(format!("invalid SDK config: {e}")))
    }

    /// Serialize back to TOML, e.g. to write out a starter config.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Invalid(format!("config serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = SdkConfig::default();
        assert_eq!(cfg.round_timeout_secs, 30);
        assert_eq!(cfg.protocol_timeout_secs, 60);
        assert!(matches!(cfg.keystore_backend, KeystoreBackendKind::InMemory));
    }

    #[test]
    fn roundtrips_through_toml() {
        let cfg = SdkConfig::default();
        let toml_str = cfg.to_toml_string().expect("serialize");
        let parsed = SdkConfig::from_toml_str(&toml_str).expect("parse");
        assert_eq!(parsed.relay_http_url, cfg.relay_http_url);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = SdkConfig::from_toml_str(r#"relay_http_url = "https://relay.example.com/""#)
            .expect("parse minimal config");
        assert_eq!(cfg.round_timeout_secs, 30);
        assert!(cfg.relay_ws_url.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(SdkConfig::from_toml_str("not = [valid").is_err());
    }
}
