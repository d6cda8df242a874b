use crate::*;

const COMMITMENT_DOMAIN: &[u8] = b"beacon-feldman";

/// BLAKE2b-256 of a commitment's compressed coefficients
pub type CommitmentDigest = [u8; 32];

/// Feldman commitment `[g1^{a_0}, .., g1^{a_{T-1}}]` to a dealer's polynomial
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct FeldmanCommitment<E: PairingEngine> {
    #[serde(with = "beacon_common::ark_serde")]
    pub coeffs: Vec<E::G1Affine>,
}

impl<E: PairingEngine> FeldmanCommitment<E> {
    pub fn threshold(&self) -> usize {
        self.coeffs.len()
    }

    /// `g1^{f(x_i)}`, computed from the commitment alone
    pub fn evaluate(&self, index: PartyId) -> E::G1Affine {
        threshold_bls::evaluate_commitment::<E>(&self.coeffs, index)
    }

    /// Check that `m` is the committed polynomial evaluated at `index`'s point
    pub fn verify(&self, index: PartyId, m: &E::Fr) -> bool {
        !self.coeffs.is_empty()
            && E::G1Affine::prime_subgroup_generator().mul(*m).into_affine()
                == self.evaluate(index)
    }

    /// What peers echo to each other to agree on a dealer's commitment
    pub fn digest(&self) -> CommitmentDigest {
        let mut state = blake2b_simd::Params::new()
            .hash_length(32)
            .personal(COMMITMENT_DOMAIN)
            .to_state();
        self.coeffs
            .serialize(&mut state)
            .expect("hashing does not fail");
        let mut digest = [0u8; 32];
        digest.copy_from_slice(state.finalize().as_bytes());
        digest
    }

    /// Coefficient-wise product, a commitment to the sum of the polynomials
    pub fn aggregate<'a, I>(commitments: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
        E: 'a,
    {
        let mut coeffs = vec![E::G1Projective::zero(); threshold];
        for commitment in commitments {
            for (acc, coeff) in coeffs.iter_mut().zip(commitment.coeffs.iter()) {
                acc.add_assign_mixed(coeff);
            }
        }
        Self {
            coeffs: E::G1Projective::batch_normalization_into_affine(&coeffs),
        }
    }
}

/// A dealer's secret polynomial of degree `T - 1` for one epoch, with its
/// public commitment
pub struct Dealing<E: PairingEngine> {
    poly: DensePolynomial<E::Fr>,
    commitment: FeldmanCommitment<E>,
}

impl<E: PairingEngine> fmt::Debug for Dealing<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dealing")
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl<E: PairingEngine> Dealing<E> {
    pub fn new<R: Rng>(threshold: u32, rng: &mut R) -> Self {
        debug_time!("Feldman dealing");
        let coeffs = (0..threshold)
            .map(|_| E::Fr::rand(rng))
            .collect::<Vec<_>>();
        let g = E::G1Affine::prime_subgroup_generator();
        let commitment = FeldmanCommitment {
            coeffs: fast_multiexp(&coeffs, g.into_projective()),
        };
        Self {
            poly: DensePolynomial::from_coefficients_vec(coeffs),
            commitment,
        }
    }

    pub fn commitment(&self) -> &FeldmanCommitment<E> {
        &self.commitment
    }

    /// Deterministic in the dealing: asking twice yields the same share
    pub fn share_for(&self, index: PartyId) -> KeyShare<E> {
        KeyShare {
            m: self.poly.evaluate(&evaluation_point(index)),
            v: self.commitment.clone(),
        }
    }
}
