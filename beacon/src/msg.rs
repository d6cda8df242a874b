use crate::*;

/// The protocol envelope exchanged over the transport. `peer` is the
/// sender as seen by the receiver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetMsg<P> {
    pub peer: PartyId,
    pub payload: P,
}

/// Accuse a dealer of sending a share that fails verification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintMsg {
    pub against: PartyId,
}

/// Public re-broadcast, by the accused dealer, of the share it owes
/// `complainer`, so that every party can check it at the complainer's point
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DefendMsg<E: PairingEngine> {
    pub defending: PartyId,
    pub complainer: PartyId,
    pub share: KeyShare<E>,
}

/// The digest of the commitment the sender holds for `dealer`, broadcast so
/// that every party learns whether the dealer committed to the same
/// polynomial towards everyone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoMsg {
    pub dealer: PartyId,
    pub digest: CommitmentDigest,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum DkgPayload<E: PairingEngine> {
    Share(KeyShare<E>),
    Complaint(ComplaintMsg),
    Defend(DefendMsg<E>),
    Echo(EchoMsg),
}

/// One party's signature share over a beacon round's challenge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct VrfShareMsg<E: PairingEngine> {
    pub round: u64,
    pub share: SignatureShare<E>,
}
