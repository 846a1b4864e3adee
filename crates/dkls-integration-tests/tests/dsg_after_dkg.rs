//! S2: 2-of-2 DSG after S1 (§8).
//!
//! Both parties complete a DKG, then both sign the same fixed digest;
//! the resulting `(r, s)` must verify under the shared public key.

mod common;

use dkls_engine::verify;
use dkls_types::handshake::InviteKind;

#[tokio::test]
async fn two_of_two_dsg_produces_a_verifiable_signature() {
    let hub = dkls_integration_tests::fake_relay::Hub::new();
    let mut creator = common::client(&hub);
    let mut joiner = common::client(&hub);

    let blob = creator
        .create_group(InviteKind::Keygen, 2, 2, 60)
        .await
        .expect("create_group");
    let group_id = common::group_id_from_blob(&blob);
    joiner.join_group(&blob).await.expect("join_group");

    tokio::join!(creator.await_admission(group_id), joiner.await_admission(group_id));

    let (creator_share, joiner_share) =
        tokio::join!(creator.start_keygen(group_id), joiner.start_keygen(group_id));
    let creator_share = creator_share.expect("creator keygen");
    let joiner_share = joiner_share.expect("joiner keygen");
    assert_eq!(creator_share.public_key, joiner_share.public_key);

    let digest = common::fixed_digest();
    let (creator_sig, joiner_sig) = tokio::join!(
        creator.start_signing(group_id, digest, None),
        joiner.start_signing(group_id, digest, None),
    );
    let (r1, s1) = creator_sig.expect("creator dsg");
    let (r2, s2) = joiner_sig.expect("joiner dsg");

    assert!(verify::verify(&creator_share.public_key, &digest, &r1, &s1));
    assert!(verify::verify(&joiner_share.public_key, &digest, &r2, &s2));
}
