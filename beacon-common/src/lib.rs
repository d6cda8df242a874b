//! Primitives shared by the threshold beacon crates: party identifiers,
//! the committee directory, signed message envelopes and serde adapters
//! for arkworks types.

pub mod committee;
pub use committee::*;
pub mod signed;
pub use signed::*;

/// Stable index of a committee member for one DKG epoch, in `[0, N)`.
pub type PartyId = u32;

impl Rng for ark_std::rand::prelude::StdRng {}

pub trait Rng: ark_std::rand::CryptoRng + ark_std::rand::RngCore {}

/// Routes arkworks `CanonicalSerialize` values through serde as byte strings,
/// for use with `#[serde(with = "beacon_common::ark_serde")]`.
pub mod ark_serde {
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde_bytes::{Deserialize, Serialize};

    pub fn serialize<S, T>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: CanonicalSerialize,
    {
        use serde::ser::Error;
        let mut bytes = vec![];
        data.serialize(&mut bytes).map_err(S::Error::custom)?;
        serde_bytes::Bytes::new(&bytes).serialize(serializer)
    }

    pub fn deserialize<'d, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'d>,
        T: CanonicalDeserialize,
    {
        use serde::de::Error;
        let bytes = <serde_bytes::ByteBuf>::deserialize(deserializer)?;
        T::deserialize(bytes.as_slice()).map_err(D::Error::custom)
    }
}
