//! S3/S4: 3-of-5 DKG with all parties online, then DSG from two
//! different size-3 signer subsets (§8).

mod common;

use futures_util::future::join_all;

use dkls_engine::verify;
use dkls_sdk::SdkClient;
use dkls_types::group::GroupId;
use dkls_types::handshake::InviteKind;
use dkls_types::party::PartyIndex;
use dkls_types::share::PublicKeyBytes;

/// Clients are kept as `Option<SdkClient>` so [`sign_subset`] can take
/// temporary ownership of just the signers in a subset — `Vec::iter_mut`
/// gives disjoint `&mut` borrows for free, but an arbitrary
/// non-contiguous index subset needs ownership instead.
async fn run_dkg(hub: &dkls_integration_tests::fake_relay::Hub) -> (GroupId, Vec<Option<SdkClient>>) {
    let mut creator = common::client(hub);
    let mut joiners: Vec<SdkClient> = (0..4).map(|_| common::client(hub)).collect();

    let blob = creator
        .create_group(InviteKind::Keygen, 3, 5, 60)
        .await
        .expect("create_group");
    let group_id = common::group_id_from_blob(&blob);
    for joiner in joiners.iter_mut() {
        joiner.join_group(&blob).await.expect("join_group");
    }

    let mut clients: Vec<SdkClient> = std::iter::once(creator).chain(joiners).collect();
    join_all(clients.iter_mut().map(|c| c.await_admission(group_id)))
        .await
        .into_iter()
        .for_each(|r| {
            r.expect("admission");
        });

    let shares = join_all(clients.iter_mut().map(|c| c.start_keygen(group_id))).await;
    let public_keys: Vec<PublicKeyBytes> = shares.into_iter().map(|s| s.expect("keygen").public_key).collect();
    for pk in &public_keys[1..] {
        assert_eq!(*pk, public_keys[0], "every party's share carries the same public key");
    }

    (group_id, clients.into_iter().map(Some).collect())
}

async fn sign_subset(
    clients: &mut [Option<SdkClient>],
    group_id: GroupId,
    digest: [u8; 32],
    subset: &[PartyIndex],
) -> Vec<([u8; 32], [u8; 32])> {
    let mut taken: Vec<(usize, SdkClient)> = subset
        .iter()
        .map(|idx| {
            let i = idx.as_usize();
            (i, clients[i].take().expect("client slot occupied"))
        })
        .collect();

    let results = join_all(
        taken
            .iter_mut()
            .map(|(_, client)| client.start_signing(group_id, digest, Some(subset.to_vec()))),
    )
    .await;

    for (i, client) in taken {
        clients[i] = Some(client);
    }

    results.into_iter().map(|r| r.expect("dsg")).collect()
}

#[tokio::test]
async fn three_of_five_dkg_converges_on_one_public_key() {
    let hub = dkls_integration_tests::fake_relay::Hub::new();
    let (_group_id, _clients) = run_dkg(&hub).await;
}

#[tokio::test]
async fn three_of_five_dsg_with_two_different_signer_subsets() {
    let hub = dkls_integration_tests::fake_relay::Hub::new();
    let (group_id, mut clients) = run_dkg(&hub).await;
    let public_key = clients[0]
        .as_ref()
        .unwrap()
        .load_share(&group_id)
        .await
        .expect("load share")
        .public_key;

    let digest = common::fixed_digest();

    let subset_a = vec![PartyIndex(0), PartyIndex(1), PartyIndex(2)];
    let sigs_a = sign_subset(&mut clients, group_id, digest, &subset_a).await;
    for (r, s) in &sigs_a {
        assert!(verify::verify(&public_key, &digest, r, s));
    }

    // Overlaps subset A only at index 2.
    let subset_b = vec![PartyIndex(2), PartyIndex(3), PartyIndex(4)];
    let sigs_b = sign_subset(&mut clients, group_id, digest, &subset_b).await;
    for (r, s) in &sigs_b {
        assert!(verify::verify(&public_key, &digest, r, s));
    }

    assert_ne!(
        sigs_a[0], sigs_b[0],
        "a different signer subset produces a different-valued signature"
    );
}
