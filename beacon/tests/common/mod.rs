#![allow(dead_code)]

pub use ark_bls12_381::Bls12_381 as EllipticCurve;
use beacon::*;
use ed25519_dalek as ed25519;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type E = EllipticCurve;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn keypair(i: u32) -> ed25519::Keypair {
    let secret = ed25519::SecretKey::from_bytes(&[i as u8 + 1; 32]).unwrap();
    let public = ed25519::PublicKey::from(&secret);
    ed25519::Keypair { secret, public }
}

/// Party `i`'s view of an `n` member committee
pub fn committee_views(n: u32) -> Vec<Arc<Committee>> {
    let members = (0..n)
        .map(|i| Member {
            address: format!("node-{:02}.beacon:9000", i),
            signing_key: keypair(i).public,
        })
        .collect::<Vec<_>>();
    (0..n)
        .map(|i| {
            Arc::new(Committee::new(members.clone(), &format!("node-{:02}.beacon:9000", i)).unwrap())
        })
        .collect()
}

pub fn params(threshold: u32, n: u32) -> Params {
    Params {
        tau: 7,
        security_threshold: threshold,
        total_shares: n,
        retry_after: 100,
        defend_window: 1000,
    }
}

/// Spawn one runner per party, each given its own inbox on `network`
pub fn spawn_all<P>(
    instances: Vec<P>,
    network: Arc<LocalNetwork<P::Payload>>,
    inboxes: Vec<tokio::sync::mpsc::UnboundedReceiver<NetMsg<P::Payload>>>,
    params: &Params,
) -> Vec<RunnerHandle<P::Output>>
where
    P: Protocol,
{
    instances
        .into_iter()
        .zip(inboxes)
        .map(|(instance, inbox)| {
            spawn(
                instance,
                network.clone(),
                inbox,
                params.retry_interval(),
                CancellationToken::new(),
            )
        })
        .collect()
}

/// Wait for every handle's outcome, then stop all runners
pub async fn outcomes<T>(handles: Vec<RunnerHandle<T>>) -> Vec<Outcome<T>> {
    let mut results = vec![];
    let mut finished = vec![];
    for mut handle in handles {
        results.push(handle.outcome().await);
        finished.push(handle);
    }
    for handle in finished {
        handle.shutdown().await;
    }
    results
}
