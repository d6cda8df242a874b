use super::{ignore_unknown_party, share_messages};
use crate::*;

/// Progress of one complaint, keyed by `(complainer, accused)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplaintStatus {
    /// Waiting for the accused to defend until `deadline`
    Complained { deadline: Instant },
    /// A defend arrived and verified
    Defended,
    /// The window closed, or the defend did not verify
    DisqualifyPending,
    Resolved { disqualified: bool },
}

/// [`SimpleDkg`] with complaints: an invalid share is answered with a
/// broadcast complaint, the accused dealer re-broadcasts the disputed share,
/// and every party re-verifies it. A dealer whose defence fails, or never
/// arrives within the defend window, is disqualified for the epoch.
///
/// Every party also echoes the digest of each commitment it holds. The key
/// is only fixed once all participants have echoed all commitments, and a
/// dealer whose commitments differ between receivers is disqualified.
#[derive(Debug)]
pub struct ByzantineDkg<E: PairingEngine> {
    inner: SimpleDkg<E>,
    complaints: BTreeMap<(PartyId, PartyId), ComplaintStatus>,
    /// Defends that overtook their complaint, same key as `complaints`
    early_defends: BTreeMap<(PartyId, PartyId), KeyShare<E>>,
    disqualified: BTreeSet<PartyId>,
    my_complaints: BTreeSet<PartyId>,
    /// by complainer
    my_defends: BTreeMap<PartyId, DefendMsg<E>>,
    /// Echoed commitment digests, by dealer then echoer
    echoes: BTreeMap<PartyId, BTreeMap<PartyId, CommitmentDigest>>,
    /// Digests of the commitments we hold, by dealer
    my_echoes: BTreeMap<PartyId, CommitmentDigest>,
    /// Echoes not yet broadcast
    unsent_echoes: Vec<EchoMsg>,
    done_since: Option<Instant>,
}

impl<E: PairingEngine> ByzantineDkg<E> {
    pub fn new<R: Rng>(params: Params, committee: Arc<Committee>, rng: &mut R) -> Result<Self> {
        let mut dkg = Self {
            inner: SimpleDkg::new(params, committee, rng)?,
            complaints: BTreeMap::new(),
            early_defends: BTreeMap::new(),
            disqualified: BTreeSet::new(),
            my_complaints: BTreeSet::new(),
            my_defends: BTreeMap::new(),
            echoes: BTreeMap::new(),
            my_echoes: BTreeMap::new(),
            unsent_echoes: vec![],
            done_since: None,
        };
        dkg.note_commitment(dkg.me())?;
        Ok(dkg)
    }

    pub fn inner(&self) -> &SimpleDkg<E> {
        &self.inner
    }

    pub fn me(&self) -> PartyId {
        self.inner.me()
    }

    pub fn get_share_for(&self, index: PartyId) -> Result<KeyShare<E>> {
        self.inner.get_share_for(index)
    }

    fn defend_window(&self) -> Duration {
        self.inner.params.defend_timeout()
    }

    fn check_member(&self, party: PartyId) -> Result<()> {
        if self.inner.committee().contains(party) {
            Ok(())
        } else {
            Err(Error::UnknownParty(party))
        }
    }

    /// Record a share, or complain about it. Returns the complaint to
    /// broadcast the first time a dealer's share fails verification.
    pub fn receive_share(
        &mut self,
        from: PartyId,
        share: KeyShare<E>,
        now: Instant,
    ) -> Result<Option<ComplaintMsg>> {
        if self.disqualified.contains(&from) {
            warn!(
                "party {} ignoring share from disqualified dealer {}",
                self.me(),
                from
            );
            return Ok(None);
        }
        match self.inner.verify_share(from, &share) {
            Ok(()) => {
                if let Some(held) = self.inner.received(from) {
                    if held.v != share.v {
                        warn!(
                            "party {} received two commitments from dealer {}",
                            self.me(),
                            from
                        );
                        self.disqualify(from)?;
                        return Ok(None);
                    }
                }
                self.inner.receive_share(from, share)?;
                self.note_commitment(from)?;
                Ok(None)
            }
            Err(Error::ShareVerification { reason, .. }) => {
                if self.inner.has_share_from(from) {
                    warn!(
                        "party {} already holds a valid share from {}, ignoring an invalid copy: {}",
                        self.me(),
                        from,
                        reason
                    );
                    return Ok(None);
                }
                if !self.my_complaints.insert(from) {
                    return Ok(None);
                }
                warn!(
                    "party {} complains against dealer {}: {}",
                    self.me(),
                    from,
                    reason
                );
                self.record_complaint(self.me(), from, now)?;
                Ok(Some(ComplaintMsg { against: from }))
            }
            Err(e) => Err(e),
        }
    }

    /// Record `from`'s complaint against `against` and open its defend
    /// window. When we are the accused, returns our defence.
    pub fn receive_complaint(
        &mut self,
        from: PartyId,
        against: PartyId,
        now: Instant,
    ) -> Result<Option<DefendMsg<E>>> {
        self.check_member(from)?;
        self.check_member(against)?;
        if from == against {
            warn!("party {} complained about itself", from);
            return Ok(None);
        }
        if self.disqualified.contains(&from) {
            debug!(
                "party {} ignoring complaint of disqualified party {}",
                self.me(),
                from
            );
            return Ok(None);
        }
        if self.disqualified.contains(&against)
            || self.complaints.contains_key(&(from, against))
        {
            return Ok(None);
        }
        debug!(
            "party {} records complaint of {} against {}",
            self.me(),
            from,
            against
        );
        self.record_complaint(from, against, now)?;

        if against != self.me() {
            return Ok(None);
        }
        let defend = DefendMsg {
            defending: against,
            complainer: from,
            share: self.inner.get_share_for(from)?,
        };
        info!("party {} defends its share to {}", against, from);
        self.my_defends.insert(from, defend.clone());
        self.apply_defend(defend.clone())?;
        Ok(Some(defend))
    }

    /// Re-verify a publicly defended share. Only the accused dealer may
    /// defend itself. A defend that overtook its complaint is held until the
    /// complaint is recorded.
    pub fn receive_defend(&mut self, from: PartyId, defend: DefendMsg<E>) -> Result<()> {
        if from != defend.defending {
            warn!(
                "party {} sent a defend on behalf of {}",
                from, defend.defending
            );
            return Ok(());
        }
        self.check_member(defend.defending)?;
        self.check_member(defend.complainer)?;
        if self.disqualified.contains(&defend.defending) {
            return Ok(());
        }
        let key = (defend.complainer, defend.defending);
        match self.complaints.get(&key) {
            None => {
                debug!(
                    "party {} holds defend of {} until the complaint of {} arrives",
                    self.me(),
                    defend.defending,
                    defend.complainer
                );
                self.early_defends.insert(key, defend.share);
                Ok(())
            }
            Some(ComplaintStatus::Complained { .. }) => self.apply_defend(defend),
            Some(_) => Ok(()),
        }
    }

    /// Record `from`'s echo of the commitment it holds for `echo.dealer`.
    /// Only the first echo per echoer and dealer counts.
    pub fn receive_echo(&mut self, from: PartyId, echo: EchoMsg) -> Result<()> {
        self.check_member(from)?;
        self.check_member(echo.dealer)?;
        if from == self.me()
            || self.disqualified.contains(&from)
            || self.disqualified.contains(&echo.dealer)
        {
            return Ok(());
        }
        let echoes = self.echoes.entry(echo.dealer).or_insert_with(BTreeMap::new);
        match echoes.get(&from).copied() {
            Some(digest) if digest != echo.digest => {
                warn!(
                    "party {} echoed a second commitment of dealer {}",
                    from, echo.dealer
                );
                return Ok(());
            }
            Some(_) => return Ok(()),
            None => {
                echoes.insert(from, echo.digest);
            }
        }
        self.check_echoes(echo.dealer)
    }

    /// Our echoes, one per dealer whose share we have held, including
    /// dealers disqualified since
    pub fn echoes(&self) -> Vec<EchoMsg> {
        self.my_echoes
            .iter()
            .map(|(dealer, digest)| EchoMsg {
                dealer: *dealer,
                digest: *digest,
            })
            .collect()
    }

    /// `(dealer, echoer)` pairs still to be heard from before the key can
    /// be fixed
    pub fn missing_echoes(&self) -> Vec<(PartyId, PartyId)> {
        let participants = self.inner.participants();
        let me = self.me();
        participants
            .iter()
            .flat_map(|dealer| {
                participants
                    .iter()
                    .filter(move |echoer| **echoer != me)
                    .map(move |echoer| (*dealer, *echoer))
            })
            .filter(|(dealer, echoer)| {
                !self
                    .echoes
                    .get(dealer)
                    .map_or(false, |echoes| echoes.contains_key(echoer))
            })
            .collect()
    }

    /// Disqualify every accused dealer whose defend window has closed
    pub fn expire(&mut self, now: Instant) -> Result<()> {
        let me = self.me();
        for ((complainer, accused), status) in self.complaints.iter_mut() {
            if let ComplaintStatus::Complained { deadline } = *status {
                if deadline <= now {
                    warn!(
                        "party {}: {} did not defend against the complaint of {} in time",
                        me, accused, complainer
                    );
                    *status = ComplaintStatus::DisqualifyPending;
                }
            }
        }
        self.settle()
    }

    /// Exclude `party` for the rest of the epoch. Returns false if it was
    /// already disqualified.
    pub fn disqualify(&mut self, party: PartyId) -> Result<bool> {
        if !self.disqualified.insert(party) {
            return Ok(false);
        }
        warn!("party {} disqualifies dealer {}", self.me(), party);
        self.inner.exclude(party);
        self.early_defends.retain(|(_, accused), _| *accused != party);
        self.echoes.remove(&party);
        for echoes in self.echoes.values_mut() {
            echoes.remove(&party);
        }
        for ((_, accused), status) in self.complaints.iter_mut() {
            if *accused == party && matches!(status, ComplaintStatus::Complained { .. }) {
                *status = ComplaintStatus::Resolved { disqualified: true };
            }
        }
        self.check_quorum()?;
        Ok(true)
    }

    pub fn get_disqualified(&self) -> BTreeSet<PartyId> {
        self.disqualified.clone()
    }

    pub fn complaint_status(&self, complainer: PartyId, accused: PartyId) -> Option<ComplaintStatus> {
        self.complaints.get(&(complainer, accused)).copied()
    }

    /// Complaints still waiting for a defend
    pub fn open_complaints(&self) -> usize {
        self.complaints
            .values()
            .filter(|status| matches!(status, ComplaintStatus::Complained { .. }))
            .count()
    }

    /// `N - |disqualified| >= T`
    pub fn check_quorum(&self) -> Result<()> {
        let committee_size = self.inner.committee().size();
        let remaining = committee_size - self.disqualified.len();
        let threshold = self.inner.threshold();
        if remaining < threshold as usize {
            return Err(Error::QuorumLost {
                committee_size,
                threshold,
                remaining,
                disqualified: self.disqualified.clone(),
            });
        }
        Ok(())
    }

    /// Every remaining dealer's share is held, every participant has
    /// echoed every commitment and no complaint is open
    pub fn is_done(&self) -> bool {
        self.inner.is_done() && self.open_complaints() == 0 && self.missing_echoes().is_empty()
    }

    pub fn finalize(&self) -> Result<Party<E>> {
        self.check_quorum()?;
        self.inner.finalize()
    }

    fn record_complaint(&mut self, from: PartyId, against: PartyId, now: Instant) -> Result<()> {
        let deadline = now + self.defend_window();
        self.complaints
            .insert((from, against), ComplaintStatus::Complained { deadline });
        self.done_since = None;
        if let Some(share) = self.early_defends.remove(&(from, against)) {
            self.apply_defend(DefendMsg {
                defending: against,
                complainer: from,
                share,
            })?;
        }
        Ok(())
    }

    /// The defended share must open the dealer's commitment at the
    /// complainer's point, with the commitment we already hold if any
    fn check_defend(&self, defend: &DefendMsg<E>) -> bool {
        let share = &defend.share;
        if share.v.threshold() != self.inner.threshold() as usize
            || !share.verify(defend.complainer)
        {
            return false;
        }
        match self.inner.received(defend.defending) {
            Some(held) => held.v == share.v,
            None => true,
        }
    }

    fn apply_defend(&mut self, defend: DefendMsg<E>) -> Result<()> {
        let key = (defend.complainer, defend.defending);
        let status = if self.check_defend(&defend) {
            info!(
                "party {}: {} defended its share to {}",
                self.me(),
                defend.defending,
                defend.complainer
            );
            if defend.complainer == self.me() {
                self.inner
                    .accept_defended_share(defend.defending, defend.share);
                self.note_commitment(defend.defending)?;
            }
            ComplaintStatus::Defended
        } else {
            warn!(
                "party {}: defend of {} to {} failed verification",
                self.me(),
                defend.defending,
                defend.complainer
            );
            ComplaintStatus::DisqualifyPending
        };
        self.complaints.insert(key, status);
        self.settle()
    }

    /// Queue an echo of the commitment now held for `dealer`
    fn note_commitment(&mut self, dealer: PartyId) -> Result<()> {
        let digest = match self.inner.received(dealer) {
            Some(share) => share.v.digest(),
            None => return Ok(()),
        };
        if self.my_echoes.insert(dealer, digest) == Some(digest) {
            return Ok(());
        }
        self.unsent_echoes.push(EchoMsg { dealer, digest });
        self.check_echoes(dealer)
    }

    /// A dealer is disqualified as soon as two parties hold different
    /// commitments from it
    fn check_echoes(&mut self, dealer: PartyId) -> Result<()> {
        let mut digests = self
            .echoes
            .get(&dealer)
            .into_iter()
            .flat_map(|echoes| echoes.values().copied())
            .collect::<BTreeSet<_>>();
        digests.extend(self.my_echoes.get(&dealer).copied());
        if digests.len() > 1 {
            warn!(
                "party {}: dealer {} committed to {} different polynomials",
                self.me(),
                dealer,
                digests.len()
            );
            self.disqualify(dealer)?;
        }
        Ok(())
    }

    fn take_echoes(&mut self) -> Vec<Outgoing<DkgPayload<E>>> {
        std::mem::take(&mut self.unsent_echoes)
            .into_iter()
            .map(|echo| Outgoing::Broadcast(DkgPayload::Echo(echo)))
            .collect()
    }

    fn settle(&mut self) -> Result<()> {
        let mut disqualify = vec![];
        for ((_, accused), status) in self.complaints.iter_mut() {
            match *status {
                ComplaintStatus::Defended => {
                    *status = ComplaintStatus::Resolved {
                        disqualified: false,
                    }
                }
                ComplaintStatus::DisqualifyPending => {
                    *status = ComplaintStatus::Resolved { disqualified: true };
                    disqualify.push(*accused);
                }
                _ => {}
            }
        }
        for party in disqualify {
            self.disqualify(party)?;
        }
        Ok(())
    }

    fn extra_messages(&self) -> Vec<Outgoing<DkgPayload<E>>> {
        self.my_complaints
            .iter()
            .map(|against| Outgoing::Broadcast(DkgPayload::Complaint(ComplaintMsg { against: *against })))
            .chain(
                self.my_defends
                    .values()
                    .map(|defend| Outgoing::Broadcast(DkgPayload::Defend(defend.clone()))),
            )
            .chain(
                self.echoes()
                    .into_iter()
                    .map(|echo| Outgoing::Broadcast(DkgPayload::Echo(echo))),
            )
            .collect()
    }
}

impl<E: PairingEngine> Protocol for ByzantineDkg<E> {
    type Payload = DkgPayload<E>;
    type Output = Party<E>;

    fn name(&self) -> String {
        format!("byzantine dkg epoch {} party {}", self.inner.params.tau, self.me())
    }

    fn me(&self) -> PartyId {
        self.inner.me()
    }

    fn peers(&self) -> Vec<PartyId> {
        self.inner.committee().peers().collect()
    }

    fn start(&mut self, _now: Instant) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        let mut outgoing = share_messages(&self.inner)?;
        outgoing.extend(self.take_echoes());
        Ok(outgoing)
    }

    fn handle(
        &mut self,
        msg: NetMsg<DkgPayload<E>>,
        now: Instant,
    ) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        let from = msg.peer;
        let outgoing: Result<Vec<Outgoing<DkgPayload<E>>>> = match msg.payload {
            DkgPayload::Share(share) => self.receive_share(from, share, now).map(|complaint| {
                complaint
                    .map(|complaint| Outgoing::Broadcast(DkgPayload::Complaint(complaint)))
                    .into_iter()
                    .collect()
            }),
            DkgPayload::Complaint(complaint) => self
                .receive_complaint(from, complaint.against, now)
                .map(|defend| {
                    defend
                        .map(|defend| Outgoing::Broadcast(DkgPayload::Defend(defend)))
                        .into_iter()
                        .collect()
                }),
            DkgPayload::Defend(defend) => self.receive_defend(from, defend).map(|_| vec![]),
            DkgPayload::Echo(echo) => self.receive_echo(from, echo).map(|_| vec![]),
        };
        let mut outgoing = ignore_unknown_party(outgoing)?;
        outgoing.extend(self.take_echoes());
        Ok(outgoing)
    }

    fn retransmit(&mut self, now: Instant) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
        self.expire(now)?;
        self.unsent_echoes.clear();
        let mut outgoing = share_messages(&self.inner)?;
        outgoing.extend(self.extra_messages());
        Ok(outgoing)
    }

    /// Completes once the view has been complete and free of open
    /// complaints for a whole defend window, so that a late complaint from
    /// a slower peer still reaches us before we fix our key
    fn poll_output(&mut self, now: Instant) -> Result<Option<Party<E>>> {
        self.expire(now)?;
        self.check_quorum()?;
        if !self.is_done() {
            self.done_since = None;
            return Ok(None);
        }
        let since = *self.done_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.defend_window() {
            self.finalize().map(Some)
        } else {
            Ok(None)
        }
    }
}
