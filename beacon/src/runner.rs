//! One task per protocol instance: a single inbox, a retransmission timer
//! and a cancellation token, combined in one `select!`. The task is the only
//! writer of the instance's state.

use crate::*;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A message a protocol step asks the runner to send
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing<P> {
    To(PartyId, P),
    /// To every peer of the instance
    Broadcast(P),
}

/// A protocol instance driven by [`spawn`]. Every call receives the
/// current time; an `Err` from any of them is fatal for the instance.
pub trait Protocol: Send + 'static {
    type Payload: Clone + Send + 'static;
    type Output: Send + 'static;

    /// Used to prefix log lines, e.g. "dkg epoch 3 party 1"
    fn name(&self) -> String;

    fn me(&self) -> PartyId;

    fn peers(&self) -> Vec<PartyId>;

    fn start(&mut self, now: Instant) -> Result<Vec<Outgoing<Self::Payload>>>;

    fn handle(
        &mut self,
        msg: NetMsg<Self::Payload>,
        now: Instant,
    ) -> Result<Vec<Outgoing<Self::Payload>>>;

    /// Messages to resend on every timer tick. Receivers must treat them as
    /// idempotent.
    fn retransmit(&mut self, now: Instant) -> Result<Vec<Outgoing<Self::Payload>>>;

    /// The instance's result, once it has one. Not called again after the
    /// first `Some`.
    fn poll_output(&mut self, now: Instant) -> Result<Option<Self::Output>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Start,
    Broadcasting,
    AwaitingShares,
    Retransmitting,
    Completed,
    DisqualificationFailure,
    Failed,
    Canceled,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Completed
                | RunnerState::DisqualificationFailure
                | RunnerState::Failed
                | RunnerState::Canceled
        )
    }
}

/// The terminal result of an instance. Cancellation is neither success nor
/// failure.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Canceled,
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }
}

pub struct RunnerHandle<T> {
    outcome: Option<oneshot::Receiver<Outcome<T>>>,
    state: watch::Receiver<RunnerState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T> RunnerHandle<T> {
    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RunnerState> {
        self.state.clone()
    }

    /// Wait for the terminal result. The instance keeps serving its peers
    /// after completing, until it is canceled or its inbox closes.
    ///
    /// Only the first call observes the result; later calls report
    /// `Canceled`.
    pub async fn outcome(&mut self) -> Outcome<T> {
        match self.outcome.take() {
            Some(outcome) => outcome.await.unwrap_or(Outcome::Canceled),
            None => Outcome::Canceled,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the instance and wait for its task to stop
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("protocol task ended abnormally: {}", e);
        }
    }
}

/// Run `protocol` on its own task until it is canceled, fails, or its inbox
/// closes. The first `Some` from [`Protocol::poll_output`] is delivered
/// through the handle.
pub fn spawn<P, T>(
    protocol: P,
    transport: Arc<T>,
    inbox: mpsc::UnboundedReceiver<NetMsg<P::Payload>>,
    retry_after: Duration,
    cancel: CancellationToken,
) -> RunnerHandle<P::Output>
where
    P: Protocol,
    T: Transport<P::Payload> + ?Sized,
{
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (state_tx, state_rx) = watch::channel(RunnerState::Start);
    let task = tokio::spawn(run(
        protocol,
        transport,
        inbox,
        retry_after,
        cancel.clone(),
        state_tx,
        outcome_tx,
    ));
    RunnerHandle {
        outcome: Some(outcome_rx),
        state: state_rx,
        cancel,
        task,
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

struct Reporter<T> {
    name: String,
    state: watch::Sender<RunnerState>,
    outcome: Option<oneshot::Sender<Outcome<T>>>,
}

impl<T> Reporter<T> {
    fn set(&self, state: RunnerState) {
        let _ = self.state.send(state);
    }

    fn finished(&self) -> bool {
        self.outcome.is_none()
    }

    fn report(&mut self, state: RunnerState, outcome: Outcome<T>) {
        if let Some(tx) = self.outcome.take() {
            self.set(state);
            let _ = tx.send(outcome);
        }
    }

    /// Fatal before completion; once a result went out, errors are only logged
    fn error(&mut self, error: Error) {
        if self.finished() {
            warn!("{}: ignoring error after completion: {}", self.name, error);
            return;
        }
        warn!("{}: {}", self.name, error);
        let state = match error {
            Error::QuorumLost { .. } => RunnerState::DisqualificationFailure,
            _ => RunnerState::Failed,
        };
        self.report(state, Outcome::Failed(error));
    }
}

fn dispatch<P, T>(transport: &T, me: PartyId, peers: &[PartyId], outgoing: Vec<Outgoing<P>>)
where
    P: Clone,
    T: Transport<P> + ?Sized,
{
    for msg in outgoing {
        match msg {
            Outgoing::To(to, payload) => transport.send(to, NetMsg { peer: me, payload }),
            Outgoing::Broadcast(payload) => {
                for to in peers {
                    transport.send(
                        *to,
                        NetMsg {
                            peer: me,
                            payload: payload.clone(),
                        },
                    );
                }
            }
        }
    }
}

async fn run<P, T>(
    mut protocol: P,
    transport: Arc<T>,
    mut inbox: mpsc::UnboundedReceiver<NetMsg<P::Payload>>,
    retry_after: Duration,
    cancel: CancellationToken,
    state: watch::Sender<RunnerState>,
    outcome: oneshot::Sender<Outcome<P::Output>>,
) where
    P: Protocol,
    T: Transport<P::Payload> + ?Sized,
{
    let mut reporter = Reporter {
        name: protocol.name(),
        state,
        outcome: Some(outcome),
    };
    let me = protocol.me();
    let peers = protocol.peers();
    info!("{}: starting with {} peers", reporter.name, peers.len());

    reporter.set(RunnerState::Broadcasting);
    match protocol.start(now()) {
        Ok(outgoing) => dispatch(&*transport, me, &peers, outgoing),
        Err(e) => return reporter.error(e),
    }
    reporter.set(RunnerState::AwaitingShares);

    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + retry_after, retry_after);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // a committee of one is complete before any message arrives
        if !reporter.finished() {
            match protocol.poll_output(now()) {
                Ok(Some(output)) => {
                    info!("{}: completed", reporter.name);
                    reporter.report(RunnerState::Completed, Outcome::Completed(output));
                }
                Ok(None) => {}
                Err(e) => return reporter.error(e),
            }
        }

        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if !reporter.finished() {
                    info!("{}: canceled", reporter.name);
                    reporter.report(RunnerState::Canceled, Outcome::Canceled);
                }
                return;
            }
            msg = inbox.recv() => match msg {
                Some(msg) => {
                    trace!("{}: message from {}", reporter.name, msg.peer);
                    protocol.handle(msg, now())
                }
                None => {
                    debug!("{}: inbox closed", reporter.name);
                    reporter.report(RunnerState::Canceled, Outcome::Canceled);
                    return;
                }
            },
            _ = ticker.tick() => {
                if !reporter.finished() {
                    reporter.set(RunnerState::Retransmitting);
                }
                let step = protocol.retransmit(now());
                if !reporter.finished() {
                    reporter.set(RunnerState::AwaitingShares);
                }
                step
            }
        };

        match step {
            Ok(outgoing) => dispatch(&*transport, me, &peers, outgoing),
            Err(e) => {
                let fatal = !reporter.finished();
                reporter.error(e);
                if fatal {
                    return;
                }
            }
        }
    }
}
