//! Shared scaffolding for the end-to-end scenario tests (§8 S1-S6).

use std::sync::Once;

use dkls_engine::fixture::FixtureEngineFactory;
use dkls_sdk::{SdkClient, SdkConfig};
use dkls_types::group::GroupId;
use dkls_types::handshake::HandshakeBlob;

use dkls_integration_tests::fake_relay::{FakeRelay, Hub};

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber once per test binary, the way
/// `ochra-daemon`'s own entry point does (`EnvFilter::from_default_env`
/// so a run's verbosity is controlled with `RUST_LOG`).
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Build one party's `SdkClient`, wired to the shared fake relay and
/// the workspace's deterministic test-double engine (§6 `MpcEngine`).
pub fn client(hub: &Hub) -> SdkClient {
    init_tracing();
    SdkClient::new(
        SdkConfig::default(),
        Box::new(FakeRelay::new(hub.clone())),
        Box::new(FixtureEngineFactory),
    )
    .expect("SdkClient::new")
}

/// Parse the `groupId` a creator's handshake blob carries (§6).
pub fn group_id_from_blob(blob: &HandshakeBlob) -> GroupId {
    GroupId::from_hex(&blob.group_id).expect("handshake blob carries a valid groupId")
}

/// A deterministic 32-byte digest for DSG scenarios (§8 S2: `0x00 01
/// 02 ... 1f`).
pub fn fixed_digest() -> [u8; 32] {
    let mut digest = [0u8; 32];
    for (i, byte) in digest.iter_mut().enumerate() {
        *byte = i as u8;
    }
    digest
}
