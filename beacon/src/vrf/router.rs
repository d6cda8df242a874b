use crate::*;
use tokio::sync::mpsc;

type ShareInbox<E> = mpsc::UnboundedSender<NetMsg<VrfShareMsg<E>>>;

/// What [`RoundRouter::route`] did with a share
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    Forwarded,
    /// Held until its round begins
    Buffered,
    Dropped,
}

/// Demultiplexes one party's VRF traffic onto the current round's inbox.
///
/// Shares for the next round are held, at most one per sender, and released
/// when that round begins. Shares for past rounds, or for rounds further
/// ahead, are dropped.
pub struct RoundRouter<E: PairingEngine> {
    current: u64,
    target: Option<ShareInbox<E>>,
    buffered: BTreeMap<u64, BTreeMap<PartyId, NetMsg<VrfShareMsg<E>>>>,
}

impl<E: PairingEngine> RoundRouter<E> {
    pub fn new() -> Self {
        Self {
            current: 0,
            target: None,
            buffered: BTreeMap::new(),
        }
    }

    pub fn current_round(&self) -> u64 {
        self.current
    }

    /// Switch to `round` and return the inbox for its runner, already
    /// holding any shares that arrived early
    pub fn begin_round(&mut self, round: u64) -> mpsc::UnboundedReceiver<NetMsg<VrfShareMsg<E>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let later = match round.checked_add(1) {
            Some(next) => self.buffered.split_off(&next),
            None => BTreeMap::new(),
        };
        let mut early = std::mem::replace(&mut self.buffered, later);
        if let Some(shares) = early.remove(&round) {
            for msg in shares.into_values() {
                let _ = tx.send(msg);
            }
        }
        let discarded = early.values().map(BTreeMap::len).sum::<usize>();
        if discarded > 0 {
            debug!("discarding {} shares for rounds before {}", discarded, round);
        }
        self.current = round;
        self.target = Some(tx);
        rx
    }

    pub fn route(&mut self, msg: NetMsg<VrfShareMsg<E>>) -> Routed {
        let round = msg.payload.round;
        if round < self.current || (round == self.current && self.target.is_none()) {
            trace!("dropping share of {} for past round {}", msg.peer, round);
            return Routed::Dropped;
        }
        if round > self.current.saturating_add(1) {
            debug!("dropping share of {} for round {}, too far ahead", msg.peer, round);
            return Routed::Dropped;
        }
        if round > self.current {
            self.buffered
                .entry(round)
                .or_insert_with(BTreeMap::new)
                .entry(msg.peer)
                .or_insert(msg);
            return Routed::Buffered;
        }
        match &self.target {
            Some(target) if target.send(msg).is_ok() => Routed::Forwarded,
            _ => {
                trace!("round {} is no longer listening", round);
                Routed::Dropped
            }
        }
    }
}

impl<E: PairingEngine> Default for RoundRouter<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::vrf::test_common::*;
    use crate::*;

    fn share(parties: &[Arc<Party<E>>], from: usize, round: u64) -> NetMsg<VrfShareMsg<E>> {
        let previous = RandomOutput::genesis(GENESIS_SEED);
        NetMsg {
            peer: from as PartyId,
            payload: VrfRound::new(parties[from].clone(), round, &previous).share_msg(),
        }
    }

    #[test]
    fn test_routes_by_round() {
        let parties = epoch(2, 3);
        let mut router = RoundRouter::<E>::new();
        let mut first = router.begin_round(1);

        assert_eq!(router.route(share(&parties, 1, 1)), Routed::Forwarded);
        assert_eq!(router.route(share(&parties, 1, 2)), Routed::Buffered);
        assert_eq!(router.route(share(&parties, 2, 2)), Routed::Buffered);
        // only the first share per sender and round is kept
        assert_eq!(router.route(share(&parties, 2, 2)), Routed::Buffered);
        assert_eq!(router.route(share(&parties, 2, 3)), Routed::Dropped);
        assert_eq!(first.try_recv().unwrap().payload.round, 1);
        assert!(first.try_recv().is_err());

        let mut second = router.begin_round(2);
        assert_eq!(router.current_round(), 2);
        let peers = [second.try_recv().unwrap(), second.try_recv().unwrap()]
            .iter()
            .map(|msg| (msg.peer, msg.payload.round))
            .collect::<Vec<_>>();
        assert_eq!(peers, vec![(1, 2), (2, 2)]);
        assert!(second.try_recv().is_err());

        assert_eq!(router.route(share(&parties, 0, 1)), Routed::Dropped);
        assert_eq!(router.route(share(&parties, 0, 3)), Routed::Buffered);
        let mut third = router.begin_round(3);
        assert_eq!(third.try_recv().unwrap().peer, 0);
    }

    #[test]
    fn test_skipped_rounds_are_discarded() {
        let parties = epoch(2, 3);
        let mut router = RoundRouter::<E>::new();
        assert_eq!(router.route(share(&parties, 1, 0)), Routed::Dropped);
        assert_eq!(router.route(share(&parties, 1, 1)), Routed::Buffered);
        assert_eq!(router.route(share(&parties, 1, 3)), Routed::Dropped);

        let mut inbox = router.begin_round(2);
        assert!(inbox.try_recv().is_err());
        assert_eq!(router.route(share(&parties, 1, 3)), Routed::Buffered);
        let mut inbox = router.begin_round(3);
        assert_eq!(inbox.try_recv().unwrap().payload.round, 3);
    }

    #[test]
    fn test_last_round() {
        let parties = epoch(2, 3);
        let mut router = RoundRouter::<E>::new();
        let _ = router.begin_round(u64::MAX - 1);
        assert_eq!(router.route(share(&parties, 1, u64::MAX)), Routed::Buffered);
        let mut inbox = router.begin_round(u64::MAX);
        assert_eq!(inbox.try_recv().unwrap().payload.round, u64::MAX);
        assert_eq!(router.route(share(&parties, 2, u64::MAX)), Routed::Forwarded);
    }

    #[test]
    fn test_closed_round_drops() {
        let parties = epoch(2, 3);
        let mut router = RoundRouter::<E>::new();
        drop(router.begin_round(1));
        assert_eq!(router.route(share(&parties, 1, 1)), Routed::Dropped);
    }
}
