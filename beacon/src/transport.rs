use crate::*;
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Best-effort delivery of protocol messages. Loss is tolerated: the
/// runner retransmits, and receivers treat duplicates as no-ops.
pub trait Transport<P>: Send + Sync + 'static {
    fn send(&self, to: PartyId, msg: NetMsg<P>);
}

/// What a [`LocalNetwork`] filter does with one message
pub enum Delivery<P> {
    Deliver,
    Drop,
    /// Deliver this payload instead of the original
    Replace(P),
}

/// Inspects every message as `(from, to, payload)` before delivery
pub type Filter<P> = Box<dyn Fn(PartyId, PartyId, &P) -> Delivery<P> + Send + Sync>;

/// In-process transport connecting a committee through unbounded channels,
/// with an optional filter for injecting loss and tampering
pub struct LocalNetwork<P> {
    inboxes: RwLock<BTreeMap<PartyId, mpsc::UnboundedSender<NetMsg<P>>>>,
    filter: Option<Filter<P>>,
}

impl<P: Send + 'static> LocalNetwork<P> {
    pub fn new() -> Self {
        Self {
            inboxes: RwLock::new(BTreeMap::new()),
            filter: None,
        }
    }

    pub fn with_filter<F>(filter: F) -> Self
    where
        F: Fn(PartyId, PartyId, &P) -> Delivery<P> + Send + Sync + 'static,
    {
        Self {
            inboxes: RwLock::new(BTreeMap::new()),
            filter: Some(Box::new(filter)),
        }
    }

    /// Attach party `id`, replacing any earlier registration
    pub fn register(&self, id: PartyId) -> mpsc::UnboundedReceiver<NetMsg<P>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.write().insert(id, tx);
        rx
    }

    /// Register parties `0..n` and return their inboxes in order
    pub fn connect(self, n: u32) -> (Arc<Self>, Vec<mpsc::UnboundedReceiver<NetMsg<P>>>) {
        let inboxes = (0..n).map(|id| self.register(id)).collect();
        (Arc::new(self), inboxes)
    }

    pub fn disconnect(&self, id: PartyId) {
        self.inboxes.write().remove(&id);
    }
}

impl<P: Send + 'static> Default for LocalNetwork<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + 'static> Transport<P> for LocalNetwork<P> {
    fn send(&self, to: PartyId, mut msg: NetMsg<P>) {
        if let Some(filter) = &self.filter {
            match filter(msg.peer, to, &msg.payload) {
                Delivery::Deliver => {}
                Delivery::Drop => {
                    trace!("dropping message from {} to {}", msg.peer, to);
                    return;
                }
                Delivery::Replace(payload) => msg.payload = payload,
            }
        }
        match self.inboxes.read().get(&to) {
            Some(inbox) => {
                if inbox.send(msg).is_err() {
                    trace!("party {} has stopped listening", to);
                }
            }
            None => debug!("no party {} on this network", to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filter_drops_and_replaces() {
        let network = LocalNetwork::with_filter(|from, to, payload: &u32| match (from, to) {
            (0, 1) => Delivery::Drop,
            (0, 2) => Delivery::Replace(payload + 100),
            _ => Delivery::Deliver,
        });
        let (network, mut inboxes) = network.connect(3);
        for to in 1..3 {
            network.send(to, NetMsg { peer: 0, payload: 7 });
        }
        network.send(1, NetMsg { peer: 2, payload: 8 });

        assert_eq!(inboxes[2].recv().await.unwrap().payload, 107);
        assert_eq!(
            inboxes[1].recv().await.unwrap(),
            NetMsg { peer: 2, payload: 8 }
        );
        assert!(inboxes[1].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnected_party_receives_nothing() {
        let (network, mut inboxes) = LocalNetwork::<u32>::new().connect(2);
        network.disconnect(1);
        network.send(1, NetMsg { peer: 0, payload: 1 });
        assert!(inboxes[1].recv().await.is_none());
    }
}
