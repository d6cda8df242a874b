use crate::*;

/// Failures of a DKG or VRF instance. Messages name parties and rounds,
/// never key material.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dealer's share does not open its Feldman commitment
    #[error("share from dealer {dealer} failed verification: {reason}")]
    ShareVerification { dealer: PartyId, reason: &'static str },

    #[error("signature share of party {party} for round {round} failed verification")]
    SignatureShareVerification { round: u64, party: PartyId },

    /// Too many disqualifications to ever reach the threshold
    #[error(
        "quorum lost: {remaining} of {committee_size} parties remain for threshold {threshold}, disqualified {disqualified:?}"
    )]
    QuorumLost {
        committee_size: usize,
        threshold: u32,
        remaining: usize,
        disqualified: BTreeSet<PartyId>,
    },

    #[error("party {0} is not in the committee")]
    UnknownParty(PartyId),

    #[error("DKG finalized while still waiting on shares from {missing:?}")]
    Incomplete { missing: Vec<PartyId> },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Threshold(#[from] ThresholdSignatureError),
}

pub type Result<T> = std::result::Result<T, Error>;
