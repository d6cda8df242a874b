pub mod router;

use crate::*;
pub use router::*;
use threshold_bls::{verify_signature, ThresholdSignatureError as SignatureError};

const RANDOM_OUTPUT_DOMAIN: &[u8] = b"beacon-vrf-out";

/// Seed of the predecessor of round 1
pub const GENESIS_SEED: &[u8] = b"threshold-beacon-genesis";

/// The randomness a round commits to, a hash of its group signature
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RandomOutput(pub [u8; 32]);

impl RandomOutput {
    fn hash(input: &[u8]) -> Self {
        let hash = blake2b_simd::Params::new()
            .hash_length(32)
            .personal(RANDOM_OUTPUT_DOMAIN)
            .hash(input);
        let mut output = [0u8; 32];
        output.copy_from_slice(hash.as_bytes());
        RandomOutput(output)
    }

    /// The fixed predecessor of the first round
    pub fn genesis(seed: &[u8]) -> Self {
        Self::hash(seed)
    }

    pub fn from_signature<E: PairingEngine>(signature: &GroupSignature<E>) -> Self {
        Self::hash(&signature.to_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RandomOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RandomOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomOutput({})", self)
    }
}

/// The message signed in `round`: the round number, little endian,
/// followed by the previous round's output
pub fn challenge(round: u64, previous: &RandomOutput) -> Vec<u8> {
    let mut message = Vec::with_capacity(8 + 32);
    message.extend_from_slice(&round.to_le_bytes());
    message.extend_from_slice(previous.as_bytes());
    message
}

/// A finalized round, checkable by anyone holding the group public key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct VrfOutput<E: PairingEngine> {
    pub round: u64,
    pub output: RandomOutput,
    pub signature: GroupSignature<E>,
}

/// Check that `output` is round `round`'s signature over its challenge
/// under the group key, and that its randomness is derived from it
pub fn verify_output<E: PairingEngine>(
    group_public_key: &E::G1Affine,
    round: u64,
    previous: &RandomOutput,
    output: &VrfOutput<E>,
) -> bool {
    output.round == round
        && RandomOutput::from_signature(&output.signature) == output.output
        && verify_signature::<E>(
            group_public_key,
            &challenge(round, previous),
            &output.signature.0,
        )
}

/// One beacon round at one party: sign the challenge, collect the peers'
/// signature shares, and combine the first `T` valid ones.
///
/// There is no complaint mechanism here; an invalid share fails the round.
pub struct VrfRound<E: PairingEngine> {
    party: Arc<Party<E>>,
    round: u64,
    challenge: Vec<u8>,
    my_share: SignatureShare<E>,
    shares: BTreeMap<PartyId, SignatureShare<E>>,
}

impl<E: PairingEngine> VrfRound<E> {
    pub fn new(party: Arc<Party<E>>, round: u64, previous: &RandomOutput) -> Self {
        let challenge = challenge(round, previous);
        let my_share = party.sign(&challenge);
        let mut shares = BTreeMap::new();
        shares.insert(party.index(), my_share);
        Self {
            party,
            round,
            challenge,
            my_share,
            shares,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn share_msg(&self) -> VrfShareMsg<E> {
        VrfShareMsg {
            round: self.round,
            share: self.my_share,
        }
    }

    /// Record a peer's share. Shares for other rounds and from
    /// non-participants are ignored; a share that does not verify is an error.
    pub fn receive_share(&mut self, from: PartyId, msg: VrfShareMsg<E>) -> Result<()> {
        if msg.round != self.round {
            debug!(
                "round {}: ignoring share of {} for round {}",
                self.round, from, msg.round
            );
            return Ok(());
        }
        if !self.party.is_participant(from) {
            warn!(
                "round {}: ignoring share from non-participant {}",
                self.round, from
            );
            return Ok(());
        }
        if !self.party.verify_share(&self.challenge, from, &msg.share) {
            return Err(Error::SignatureShareVerification {
                round: self.round,
                party: from,
            });
        }
        self.shares.insert(from, msg.share);
        Ok(())
    }

    pub fn has_quorum(&self) -> bool {
        self.shares.len() >= self.party.threshold as usize
    }

    pub fn finalize(&self) -> Result<VrfOutput<E>> {
        debug_time!("VRF group signature recovery");
        let signature = self.party.recover_group(&self.challenge, &self.shares)?;
        if !self.party.verify_group(&self.challenge, &signature) {
            return Err(SignatureError::GroupVerificationFailed.into());
        }
        let output = RandomOutput::from_signature(&signature);
        info!("round {}: random output {}", self.round, output);
        Ok(VrfOutput {
            round: self.round,
            output,
            signature,
        })
    }
}

impl<E: PairingEngine> Protocol for VrfRound<E> {
    type Payload = VrfShareMsg<E>;
    type Output = VrfOutput<E>;

    fn name(&self) -> String {
        format!("vrf round {} party {}", self.round, self.party.index())
    }

    fn me(&self) -> PartyId {
        self.party.index()
    }

    fn peers(&self) -> Vec<PartyId> {
        let me = self.party.index();
        self.party
            .participants()
            .iter()
            .copied()
            .filter(|party| *party != me)
            .collect()
    }

    fn start(&mut self, _now: Instant) -> Result<Vec<Outgoing<VrfShareMsg<E>>>> {
        Ok(vec![Outgoing::Broadcast(self.share_msg())])
    }

    fn handle(
        &mut self,
        msg: NetMsg<VrfShareMsg<E>>,
        _now: Instant,
    ) -> Result<Vec<Outgoing<VrfShareMsg<E>>>> {
        self.receive_share(msg.peer, msg.payload)?;
        Ok(vec![])
    }

    fn retransmit(&mut self, _now: Instant) -> Result<Vec<Outgoing<VrfShareMsg<E>>>> {
        Ok(vec![Outgoing::Broadcast(self.share_msg())])
    }

    fn poll_output(&mut self, _now: Instant) -> Result<Option<VrfOutput<E>>> {
        if self.has_quorum() {
            self.finalize().map(Some)
        } else {
            Ok(None)
        }
    }
}
