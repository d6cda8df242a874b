use crate::*;
use std::fmt;

/// One party's signature share `H(m)^{s_i}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SignatureShare<E: PairingEngine>(
    #[serde(with = "beacon_common::ark_serde")] pub E::G2Affine,
);

/// The group signature `H(m)^{f(0)}`, identical whichever shares produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GroupSignature<E: PairingEngine>(
    #[serde(with = "beacon_common::ark_serde")] pub E::G2Affine,
);

impl<E: PairingEngine> GroupSignature<E> {
    /// Compressed encoding of the signature point
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.serialized_size());
        self.0
            .serialize(&mut bytes)
            .expect("serializing into a Vec does not fail");
        bytes
    }
}

impl<E: PairingEngine> fmt::Display for GroupSignature<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

/// Check `e(pk, H(m)) == e(g1, sig)`
pub fn verify_signature<E: PairingEngine>(
    public_key: &E::G1Affine,
    message: &[u8],
    signature: &E::G2Affine,
) -> bool {
    if public_key.is_zero() || signature.is_zero() {
        return false;
    }
    let g_inv = -E::G1Affine::prime_subgroup_generator();
    E::product_of_pairings(&[
        (
            E::G1Prepared::from(*public_key),
            E::G2Prepared::from(hash_to_g2::<E>(message)),
        ),
        (E::G1Prepared::from(g_inv), E::G2Prepared::from(*signature)),
    ]) == E::Fqk::one()
}
