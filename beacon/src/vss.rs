pub mod feldman;

use crate::*;
pub use feldman::*;

/// The share `(m, v)` a dealer owes one receiver: its polynomial evaluated
/// at the receiver's point, and the commitment to check it against
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct KeyShare<E: PairingEngine> {
    #[serde(with = "beacon_common::ark_serde")]
    pub m: E::Fr,
    pub v: FeldmanCommitment<E>,
}

impl<E: PairingEngine> fmt::Debug for KeyShare<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("threshold", &self.v.threshold())
            .finish_non_exhaustive()
    }
}

impl<E: PairingEngine> KeyShare<E> {
    /// Does `m` open the commitment at `receiver`'s evaluation point
    pub fn verify(&self, receiver: PartyId) -> bool {
        self.v.verify(receiver, &self.m)
    }
}
