//! S1: 2-of-2 DKG, happy path (§8).
//!
//! Creator and joiner each drive a real `SdkClient` over a shared
//! in-process fake relay; both must terminate with an identical
//! public key within the default timeouts.

mod common;

use dkls_types::handshake::InviteKind;

#[tokio::test]
async fn two_of_two_dkg_converges_on_one_public_key() {
    let hub = dkls_integration_tests::fake_relay::Hub::new();
    let mut creator = common::client(&hub);
    let mut joiner = common::client(&hub);

    let blob = creator
        .create_group(InviteKind::Keygen, 2, 2, 60)
        .await
        .expect("create_group");
    let group_id = joiner.join_group(&blob).await.expect("join_group");
    let creator_group_id = common::group_id_from_blob(&blob);
    assert_eq!(group_id, creator_group_id);

    let (creator_members, joiner_members) = tokio::join!(
        creator.await_admission(creator_group_id),
        joiner.await_admission(group_id),
    );
    assert_eq!(creator_members.expect("creator admission").len(), 2);
    assert_eq!(joiner_members.expect("joiner admission").len(), 2);

    let (creator_share, joiner_share) = tokio::join!(
        creator.start_keygen(creator_group_id),
        joiner.start_keygen(group_id),
    );
    let creator_share = creator_share.expect("creator keygen");
    let joiner_share = joiner_share.expect("joiner keygen");

    assert_eq!(creator_share.public_key, joiner_share.public_key);
    assert_ne!(creator_share.party_index, joiner_share.party_index);
}
