use crate::*;
use std::fmt;

/// A party's share `s_i = f(x_i)` of the group secret `f(0)`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PrivateKeyShare<E: PairingEngine> {
    pub index: PartyId,
    #[serde(with = "beacon_common::ark_serde")]
    secret: E::Fr,
}

impl<E: PairingEngine> fmt::Debug for PrivateKeyShare<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyShare")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<E: PairingEngine> PrivateKeyShare<E> {
    pub fn new(index: PartyId, secret: E::Fr) -> Self {
        Self { index, secret }
    }

    pub fn secret(&self) -> &E::Fr {
        &self.secret
    }

    /// `g1^{s_i}`
    pub fn public_key(&self) -> E::G1Affine {
        E::G1Affine::prime_subgroup_generator()
            .mul(self.secret)
            .into_affine()
    }

    /// `H(m)^{s_i}`
    pub fn sign(&self, message: &[u8]) -> SignatureShare<E> {
        SignatureShare(hash_to_g2::<E>(message).mul(self.secret).into_affine())
    }
}

/// Feldman commitment to the group polynomial, `[g1^{a_0}, .., g1^{a_{t-1}}]`.
///
/// `A_0` is the group public key, and evaluating the commitment "in the
/// exponent" at `x_i` yields the public key share of party `i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicKeyShares<E: PairingEngine> {
    #[serde(with = "beacon_common::ark_serde")]
    coeffs: Vec<E::G1Affine>,
}

impl<E: PairingEngine> PublicKeyShares<E> {
    pub fn new(coeffs: Vec<E::G1Affine>) -> Result<Self> {
        if coeffs.is_empty() {
            return Err(ThresholdSignatureError::InvalidThreshold {
                threshold: 0,
                participants: 0,
            });
        }
        Ok(Self { coeffs })
    }

    pub fn coeffs(&self) -> &[E::G1Affine] {
        &self.coeffs
    }

    /// Degree of the committed polynomial plus one
    pub fn threshold(&self) -> usize {
        self.coeffs.len()
    }

    pub fn group_public_key(&self) -> E::G1Affine {
        self.coeffs.first().copied().unwrap_or_else(E::G1Affine::zero)
    }

    /// `Y_i = prod_k A_k^{x_i^k}`
    pub fn public_key_share(&self, index: PartyId) -> E::G1Affine {
        evaluate_commitment::<E>(&self.coeffs, index)
    }
}

/// Evaluate a G1 commitment to a polynomial at party `index`'s point, by
/// Horner's rule in the exponent
pub fn evaluate_commitment<E: PairingEngine>(
    coeffs: &[E::G1Affine],
    index: PartyId,
) -> E::G1Affine {
    let x = evaluation_point::<E::Fr>(index);
    let mut acc = E::G1Projective::zero();
    for coeff in coeffs.iter().rev() {
        acc *= x;
        acc.add_assign_mixed(coeff);
    }
    acc.into_affine()
}
