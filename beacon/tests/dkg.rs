use ark_bls12_381::Fr;
use ark_ff::One;
use beacon::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod common;
use common::*;

fn simple_dkgs(threshold: u32, n: u32) -> Vec<SimpleDkg<E>> {
    let rng = &mut ark_std::test_rng();
    committee_views(n)
        .into_iter()
        .map(|committee| SimpleDkg::new(params(threshold, n), committee, rng).unwrap())
        .collect()
}

fn byzantine_dkgs(threshold: u32, n: u32) -> Vec<ByzantineDkg<E>> {
    let rng = &mut ark_std::test_rng();
    committee_views(n)
        .into_iter()
        .map(|committee| ByzantineDkg::new(params(threshold, n), committee, rng).unwrap())
        .collect()
}

/// The share from `dealer` to `receiver`, with its secret shifted by one
fn tamper(dealer: PartyId, receiver: PartyId) -> impl Fn(PartyId, PartyId, &DkgPayload<E>) -> Delivery<DkgPayload<E>> {
    move |from, to, payload| match payload {
        DkgPayload::Share(share) if from == dealer && to == receiver => {
            let mut share = share.clone();
            share.m += Fr::one();
            Delivery::Replace(DkgPayload::Share(share))
        }
        _ => Delivery::Deliver,
    }
}

fn completed(outcomes: Vec<Outcome<Party<E>>>) -> Vec<Party<E>> {
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            Outcome::Completed(party) => party,
            other => panic!("party did not complete: {:?}", other),
        })
        .collect()
}

fn assert_same_group_key(parties: &[Party<E>]) {
    let gpk = parties[0].group_public_key();
    assert!(parties.iter().all(|party| party.group_public_key() == gpk));
}

#[tokio::test(start_paused = true)]
async fn simple_dkg_over_network() {
    init_logger();
    let (network, inboxes) = LocalNetwork::new().connect(4);
    let handles = spawn_all(simple_dkgs(2, 4), network, inboxes, &params(2, 4));
    let parties = completed(outcomes(handles).await);

    assert_same_group_key(&parties);
    for (i, party) in parties.iter().enumerate() {
        assert_eq!(party.index(), i as PartyId);
        assert_eq!(party.epoch, 7);
        assert_eq!(party.participants().len(), 4);
    }
}

#[tokio::test(start_paused = true)]
async fn retransmission_recovers_lost_shares() {
    init_logger();
    let sent = AtomicUsize::new(0);
    // lose the whole first broadcast round
    let network = LocalNetwork::with_filter(move |_, _, _: &DkgPayload<E>| {
        if sent.fetch_add(1, Ordering::SeqCst) < 12 {
            Delivery::Drop
        } else {
            Delivery::Deliver
        }
    });
    let (network, inboxes) = network.connect(4);
    let start = tokio::time::Instant::now();
    let handles = spawn_all(simple_dkgs(3, 4), network, inboxes, &params(3, 4));
    let parties = completed(outcomes(handles).await);

    assert_same_group_key(&parties);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn simple_dkg_fails_on_invalid_share() {
    init_logger();
    let (network, inboxes) = LocalNetwork::with_filter(tamper(3, 1)).connect(4);
    let handles = spawn_all(simple_dkgs(2, 4), network, inboxes, &params(2, 4));
    let mut outcomes = outcomes(handles).await;

    match outcomes.remove(1) {
        Outcome::Failed(Error::ShareVerification { dealer, .. }) => assert_eq!(dealer, 3),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_same_group_key(&completed(outcomes));
}

#[tokio::test(start_paused = true)]
async fn byzantine_dkg_defended_share_keeps_dealer() {
    init_logger();
    let (network, inboxes) = LocalNetwork::with_filter(tamper(3, 1)).connect(4);
    let handles = spawn_all(byzantine_dkgs(2, 4), network, inboxes, &params(2, 4));
    let parties = completed(outcomes(handles).await);

    assert_same_group_key(&parties);
    assert!(parties.iter().all(|party| party.participants().len() == 4));
}

#[tokio::test(start_paused = true)]
async fn byzantine_dkg_disqualifies_silent_dealer() {
    init_logger();
    let bad_share = tamper(3, 1);
    // party 3 sends an invalid share to 1 and its defends never arrive
    let network = LocalNetwork::with_filter(move |from, to, payload: &DkgPayload<E>| match payload {
        DkgPayload::Defend(_) => Delivery::Drop,
        _ => bad_share(from, to, payload),
    });
    let (network, inboxes) = network.connect(4);
    let start = tokio::time::Instant::now();
    let mut handles = spawn_all(byzantine_dkgs(2, 4), network, inboxes, &params(2, 4));
    // party 3 saw its own defence, but never party 1's echo of its
    // commitment, so it stays undecided while the others agree without it
    let silent = handles.pop().unwrap();
    let parties = completed(outcomes(handles).await);
    assert!(!silent.state().is_terminal());
    silent.shutdown().await;

    assert_same_group_key(&parties);
    for party in parties.iter() {
        assert_eq!(
            party.participants().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }
    // the defend window, then the settle window
    assert!(start.elapsed() >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn byzantine_dkg_disqualifies_equivocating_dealer() {
    init_logger();
    // dealer 2 commits to a different polynomial towards party 1
    let other = Dealing::<E>::new(2, &mut ark_std::test_rng());
    let network = LocalNetwork::with_filter(move |from, to, payload: &DkgPayload<E>| match payload {
        DkgPayload::Share(_) if from == 2 && to == 1 => {
            Delivery::Replace(DkgPayload::Share(other.share_for(1)))
        }
        _ => Delivery::Deliver,
    });
    let (network, inboxes) = network.connect(4);
    let mut handles = spawn_all(byzantine_dkgs(2, 4), network, inboxes, &params(2, 4));

    let mut parties = vec![];
    for index in [0usize, 1, 3].iter() {
        parties.push(handles[*index].outcome().await.completed().unwrap());
    }
    assert_same_group_key(&parties);
    for party in parties.iter() {
        assert_eq!(
            party.participants().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
    }
    for handle in handles {
        handle.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn quorum_loss_fails_the_epoch() {
    init_logger();
    // with T = N = 3, losing dealer 2 leaves too few participants
    let network = LocalNetwork::with_filter(move |from, to, payload: &DkgPayload<E>| match payload {
        DkgPayload::Defend(_) => Delivery::Drop,
        _ => tamper(2, 0)(from, to, payload),
    });
    let (network, inboxes) = network.connect(3);
    let mut handles = spawn_all(byzantine_dkgs(3, 3), network, inboxes, &params(3, 3));

    let mut first = handles.remove(0);
    match first.outcome().await {
        Outcome::Failed(Error::QuorumLost {
            remaining,
            threshold,
            disqualified,
            ..
        }) => {
            assert_eq!((remaining, threshold), (2, 3));
            assert!(disqualified.contains(&2));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(first.state(), RunnerState::DisqualificationFailure);
    first.shutdown().await;
    for handle in handles {
        handle.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_before_completion() {
    init_logger();
    let network = LocalNetwork::with_filter(|_, _, _: &DkgPayload<E>| Delivery::Drop);
    let (network, mut inboxes) = network.connect(2);
    let dkg = simple_dkgs(2, 2).remove(0);
    let cancel = CancellationToken::new();
    let mut handle = spawn(
        dkg,
        network,
        inboxes.remove(0),
        Duration::from_millis(100),
        cancel.child_token(),
    );
    let mut states = handle.watch_state();

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!handle.state().is_terminal());
    cancel.cancel();
    assert!(handle.outcome().await.is_canceled());
    states
        .wait_for(|state| *state == RunnerState::Canceled)
        .await
        .unwrap();
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closed_inbox_cancels() {
    init_logger();
    let network = Arc::new(LocalNetwork::<DkgPayload<E>>::new());
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let mut handle = spawn(
        simple_dkgs(2, 2).remove(0),
        network,
        rx,
        Duration::from_millis(100),
        CancellationToken::new(),
    );
    drop(tx);
    assert!(handle.outcome().await.is_canceled());
    assert_eq!(handle.state(), RunnerState::Canceled);
}

#[tokio::test(start_paused = true)]
async fn completed_party_keeps_serving_peers() {
    init_logger();
    // party 1 hears nothing until party 0 is done
    let released = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let gate = released.clone();
    let network = LocalNetwork::with_filter(move |_, to, _: &DkgPayload<E>| {
        if to == 1 && !gate.load(Ordering::SeqCst) {
            Delivery::Drop
        } else {
            Delivery::Deliver
        }
    });
    let (network, inboxes) = network.connect(2);
    let mut handles = spawn_all(simple_dkgs(2, 2), network, inboxes, &params(2, 2));

    let first = handles[0].outcome().await.completed().unwrap();
    released.store(true, Ordering::SeqCst);
    let second = handles[1].outcome().await.completed().unwrap();
    assert_eq!(first.group_public_key(), second.group_public_key());
    for handle in handles {
        handle.shutdown().await;
    }
}
