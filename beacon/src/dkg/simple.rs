use super::{ignore_unknown_party, share_messages};
use crate::*;

/// Feldman VSS based key generation for a fixed committee. Every member
/// deals a random polynomial; the group key is the sum over all dealers.
///
/// Any share that fails verification is fatal here; see [`ByzantineDkg`]
/// for the variant that turns it into a complaint.
#[derive(Debug)]
pub struct SimpleDkg<E: PairingEngine> {
    pub params: Params,
    committee: Arc<Committee>,
    dealing: Dealing<E>,
    /// Valid shares by dealer, our own included
    receipts: BTreeMap<PartyId, KeyShare<E>>,
    excluded: BTreeSet<PartyId>,
}

impl<E: PairingEngine> SimpleDkg<E> {
    /// Deal a fresh polynomial for this epoch. `committee` is the local
    /// node's view, which fixes our own `PartyId`.
    pub fn new<R: Rng>(params: Params, committee: Arc<Committee>, rng: &mut R) -> Result<Self> {
        params.validate_for(&committee)?;
        let dealing = Dealing::new(params.security_threshold, rng);
        let me = committee.my_id();
        let mut receipts = BTreeMap::new();
        receipts.insert(me, dealing.share_for(me));
        Ok(Self {
            params,
            committee,
            dealing,
            receipts,
            excluded: BTreeSet::new(),
        })
    }

    pub fn me(&self) -> PartyId {
        self.committee.my_id()
    }

    pub fn committee(&self) -> &Arc<Committee> {
        &self.committee
    }

    pub fn threshold(&self) -> u32 {
        self.params.security_threshold
    }

    pub fn commitment(&self) -> &FeldmanCommitment<E> {
        self.dealing.commitment()
    }

    /// The share we owe party `index`
    pub fn get_share_for(&self, index: PartyId) -> Result<KeyShare<E>> {
        if !self.committee.contains(index) {
            return Err(Error::UnknownParty(index));
        }
        Ok(self.dealing.share_for(index))
    }

    /// Check a share from `from` without recording it
    pub fn verify_share(&self, from: PartyId, share: &KeyShare<E>) -> Result<()> {
        if !self.committee.contains(from) {
            return Err(Error::UnknownParty(from));
        }
        if share.v.threshold() != self.threshold() as usize {
            return Err(Error::ShareVerification {
                dealer: from,
                reason: "commitment has the wrong degree",
            });
        }
        if !share.verify(self.me()) {
            return Err(Error::ShareVerification {
                dealer: from,
                reason: "share does not open the commitment",
            });
        }
        Ok(())
    }

    /// Verify and record a share. A repeated share from the same dealer
    /// replaces the earlier one; shares from excluded dealers are ignored.
    pub fn receive_share(&mut self, from: PartyId, share: KeyShare<E>) -> Result<()> {
        if self.excluded.contains(&from) {
            warn!("ignoring share from excluded dealer {}", from);
            return Ok(());
        }
        self.verify_share(from, &share)?;
        let was_done = self.is_done();
        if let Some(previous) = self.receipts.insert(from, share) {
            if previous.v != self.receipts[&from].v {
                warn!("dealer {} changed its commitment", from);
            }
        }
        if !was_done && self.is_done() {
            debug!(
                "party {} holds a valid share from every participant",
                self.me()
            );
        }
        Ok(())
    }

    pub fn has_share_from(&self, dealer: PartyId) -> bool {
        self.receipts.contains_key(&dealer)
    }

    pub fn received(&self, dealer: PartyId) -> Option<&KeyShare<E>> {
        self.receipts.get(&dealer)
    }

    /// Members whose dealings count towards the group key
    pub fn participants(&self) -> BTreeSet<PartyId> {
        self.committee
            .ids()
            .filter(|id| !self.excluded.contains(id))
            .collect()
    }

    /// Participants we do not yet hold a valid share from
    pub fn missing(&self) -> Vec<PartyId> {
        self.participants()
            .into_iter()
            .filter(|id| !self.receipts.contains_key(id))
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.missing().is_empty()
    }

    /// Drop a dealer's contribution for the rest of the epoch. Returns
    /// false if it was already excluded.
    pub fn exclude(&mut self, dealer: PartyId) -> bool {
        self.receipts.remove(&dealer);
        self.excluded.insert(dealer)
    }

    pub fn is_excluded(&self, dealer: PartyId) -> bool {
        self.excluded.contains(&dealer)
    }

    /// Store a publicly defended share as authoritative, replacing whatever
    /// was held for `dealer`. The caller has verified it.
    pub fn accept_defended_share(&mut self, dealer: PartyId, share: KeyShare<E>) {
        if self.excluded.contains(&dealer) {
            return;
        }
        self.receipts.insert(dealer, share);
    }

    /// Sum the shares and commitments of all participants into this party's
    /// signing capability
    pub fn finalize(&self) -> Result<Party<E>> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(Error::Incomplete { missing });
        }
        let participants = self.participants();
        let threshold = self.threshold();
        if participants.len() < threshold as usize {
            return Err(Error::QuorumLost {
                committee_size: self.committee.size(),
                threshold,
                remaining: participants.len(),
                disqualified: self.excluded.clone(),
            });
        }
        debug_time!("DKG finalize");
        let secret = self
            .receipts
            .values()
            .map(|share| share.m)
            .sum::<E::Fr>();
        let commitment = FeldmanCommitment::aggregate(
            self.receipts.values().map(|share| &share.v),
            threshold as usize,
        );
        let party = Party::new(
            self.params.tau,
            threshold,
            PrivateKeyShare::new(self.me(), secret),
            PublicKeyShares::new(commitment.coeffs)?,
            participants,
        )?;
        info!(
            "party {} finalized epoch {} with {} participants",
            self.me(),
            self.params.tau,
            party.participants().len()
        );
        Ok(party)
    }
}

impl<E: PairingEngine> Protocol for SimpleDkg<E> {
    type Payload = DkgPayload<E>;
    type Output = Party<E>;

    fn name(&self) -> String {
        format!("dkg epoch {} party {}", self.params.tau, self.me())
    }

    fn me(&self) -> PartyId {
        self.committee.my_id()
    }

    fn peers(&self) -> Vec<PartyId> {
        self.committee.peers().collect()
    }

    fn start(&mut self, _now: Instant) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        share_messages(self)
    }

    fn handle(
        &mut self,
        msg: NetMsg<DkgPayload<E>>,
        _now: Instant,
    ) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        match msg.payload {
            DkgPayload::Share(share) => {
                ignore_unknown_party(self.receive_share(msg.peer, share).map(|_| vec![]))
            }
            DkgPayload::Complaint(_) | DkgPayload::Defend(_) | DkgPayload::Echo(_) => {
                warn!(
                    "party {} ignoring byzantine traffic from {}",
                    self.me(),
                    msg.peer
                );
                Ok(vec![])
            }
        }
    }

    fn retransmit(&mut self, _now: Instant) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        share_messages(self)
    }

    fn poll_output(&mut self, _now: Instant) -> Result<Option<Party<E>>> {
        if self.is_done() {
            self.finalize().map(Some)
        } else {
            Ok(None)
        }
    }
}
