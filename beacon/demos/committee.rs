pub use ark_bls12_381::Bls12_381 as EllipticCurve;
use ark_ff::One;
use beacon::*;
use beacon_common::SignedMessage;
use ed25519_dalek as ed25519;
use measure_time::print_time;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type E = EllipticCurve;

const COMMITTEE_SIZE: u32 = 5;
const ROUNDS: u64 = 3;

/// Deterministic signing keys for the demo committee
pub fn gen_keypairs(num: u32) -> Vec<ed25519::Keypair> {
    (0..num)
        .map(|i| {
            let secret = ed25519::SecretKey::from_bytes(&[i as u8 + 11; 32])
                .expect("32 byte seed");
            let public = ed25519::PublicKey::from(&secret);
            ed25519::Keypair { secret, public }
        })
        .collect()
}

/// Every member's view of the committee
pub fn gen_committee(keypairs: &[ed25519::Keypair]) -> Vec<Arc<Committee>> {
    let members = keypairs
        .iter()
        .enumerate()
        .map(|(i, keypair)| Member {
            address: format!("10.0.0.{}:7071", i + 1),
            signing_key: keypair.public,
        })
        .collect::<Vec<_>>();
    members
        .iter()
        .map(|me| Arc::new(Committee::new(members.clone(), &me.address).expect("valid committee")))
        .collect()
}

/// Run a Byzantine DKG in which the last member deals a bad share to the
/// first one and then has to defend it in public
async fn run_dkg(committees: Vec<Arc<Committee>>, params: Params) -> Vec<Arc<Party<E>>> {
    let rng = &mut ark_std::test_rng();
    let cheater = params.total_shares - 1;
    let network = LocalNetwork::with_filter(move |from, to, payload: &DkgPayload<E>| match payload {
        DkgPayload::Share(share) if from == cheater && to == 0 => {
            let mut share = share.clone();
            share.m += <E as ark_ec::PairingEngine>::Fr::one();
            Delivery::Replace(DkgPayload::Share(share))
        }
        _ => Delivery::Deliver,
    });
    let (network, inboxes) = network.connect(params.total_shares);

    let mut handles = vec![];
    for (committee, inbox) in committees.into_iter().zip(inboxes) {
        let dkg = ByzantineDkg::<E>::new(params, committee, rng).expect("valid parameters");
        handles.push(spawn(
            dkg,
            network.clone(),
            inbox,
            params.retry_interval(),
            CancellationToken::new(),
        ));
    }

    let mut parties = vec![];
    for handle in handles.iter_mut() {
        match handle.outcome().await {
            Outcome::Completed(party) => parties.push(Arc::new(party)),
            other => panic!("DKG did not complete: {:?}", other),
        }
    }
    for handle in handles {
        handle.shutdown().await;
    }
    parties
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let keypairs = gen_keypairs(COMMITTEE_SIZE);
    let committees = gen_committee(&keypairs);
    let params = Params {
        tau: 1,
        security_threshold: threshold_from_percent(67, COMMITTEE_SIZE),
        total_shares: COMMITTEE_SIZE,
        retry_after: 200,
        defend_window: 1000,
    };
    println!(
        "epoch {}: {} of {} members needed to sign",
        params.tau, params.security_threshold, params.total_shares
    );

    let parties = {
        print_time!("distributed key generation");
        run_dkg(committees.clone(), params).await
    };
    let group_key = parties[0].group_public_key();

    // one VRF network, demultiplexed per party by round
    let (network, inboxes) = LocalNetwork::<VrfShareMsg<E>>::new().connect(COMMITTEE_SIZE);
    let routers = inboxes
        .into_iter()
        .map(|mut inbox| {
            let router = Arc::new(Mutex::new(RoundRouter::<E>::new()));
            let feed = router.clone();
            tokio::spawn(async move {
                while let Some(msg) = inbox.recv().await {
                    feed.lock().route(msg);
                }
            });
            router
        })
        .collect::<Vec<_>>();

    let mut previous = RandomOutput::genesis(GENESIS_SEED);
    for round in 1..=ROUNDS {
        print_time!("beacon round");
        let mut handles = parties
            .iter()
            .zip(routers.iter())
            .map(|(party, router)| {
                let inbox = router.lock().begin_round(round);
                spawn(
                    VrfRound::new(party.clone(), round, &previous),
                    network.clone(),
                    inbox,
                    params.retry_interval(),
                    CancellationToken::new(),
                )
            })
            .collect::<Vec<_>>();
        let output = match handles[0].outcome().await {
            Outcome::Completed(output) => output,
            other => panic!("round {} failed: {:?}", round, other),
        };
        for handle in handles {
            handle.shutdown().await;
        }
        assert!(verify_output::<E>(&group_key, round, &previous, &output));

        // what a member would publish: the output, signed with its own key
        let announcement = SignedMessage::sign(params.tau, &output, &keypairs[0]).expect("bincode");
        let (signer, _, _): (PartyId, u64, VrfOutput<E>) = committees[1]
            .authenticate(&announcement)
            .expect("announcement from a committee member");
        println!(
            "round {}: {} (announced by {})",
            round,
            output.output,
            committees[1].address(signer).unwrap_or("?")
        );
        previous = output.output;
    }
}
