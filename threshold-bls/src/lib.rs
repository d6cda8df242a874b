//! Threshold BLS signatures: signature shares in G2 under key shares whose
//! public counterparts live in G1, with Lagrange recovery of the group
//! signature from any `threshold` valid shares.

use ark_ec::{msm::FixedBaseMSM, AffineCurve, PairingEngine, ProjectiveCurve};
use ark_ff::{One, PrimeField, UniformRand, Zero};
use ark_poly::{univariate::DensePolynomial, Polynomial, UVPolynomial};
use ark_serialize::CanonicalSerialize;
use beacon_common::PartyId;
use itertools::izip;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

mod hash_to_curve;
pub use hash_to_curve::*;
mod key_share;
pub use key_share::*;
mod signature;
pub use signature::*;
mod combine;
pub use combine::*;
mod party;
pub use party::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThresholdSignatureError {
    #[error("{received} signature shares received, {required} required")]
    InsufficientShares { required: usize, received: usize },

    #[error("signature share of party {party} failed verification")]
    ShareVerificationFailed { party: PartyId },

    /// The party is unknown or was disqualified from the epoch
    #[error("party {party} is not a participant of this epoch")]
    UnknownParty { party: PartyId },

    #[error("evaluation points are not distinct")]
    DuplicateEvaluationPoint,

    #[error("group signature verification failed")]
    GroupVerificationFailed,

    #[error("threshold {threshold} cannot be met by {participants} participants")]
    InvalidThreshold { threshold: u32, participants: usize },

    /// The private key share does not open the public commitment at the
    /// party's evaluation point
    #[error("key share of party {party} is inconsistent with the group commitment")]
    InconsistentKeyShare { party: PartyId },
}

pub type Result<T> = std::result::Result<T, ThresholdSignatureError>;

/// The x-coordinate at which party `id` holds its share, `id + 1`.
/// Zero is never an evaluation point since `f(0)` is the group secret.
pub fn evaluation_point<F: PrimeField>(id: PartyId) -> F {
    F::from(id as u64 + 1)
}

/// Fixed-base multi-exponentiation: `[base * s for s in scalars]` in affine form
pub fn fast_multiexp<Projective: ProjectiveCurve>(
    scalars: &[Projective::ScalarField],
    base: Projective,
) -> Vec<Projective::Affine> {
    let window_size = FixedBaseMSM::get_mul_window_size(scalars.len());
    let scalar_bits = <Projective::ScalarField as PrimeField>::size_in_bits();
    let base_table = FixedBaseMSM::get_window_table(scalar_bits, window_size, base);
    let products = FixedBaseMSM::multi_scalar_mul::<Projective>(
        scalar_bits,
        window_size,
        &base_table,
        scalars,
    );
    Projective::batch_normalization_into_affine(&products)
}

/// Deal a fresh group key from a single trusted dealer, for tests and
/// benchmarks where no DKG is run. Every party of `0..shares_num` takes part.
pub fn setup<E: PairingEngine, R: RngCore>(
    threshold: u32,
    shares_num: u32,
    rng: &mut R,
) -> Result<Vec<Party<E>>> {
    if threshold == 0 || threshold > shares_num {
        return Err(ThresholdSignatureError::InvalidThreshold {
            threshold,
            participants: shares_num as usize,
        });
    }
    let coeffs = (0..threshold)
        .map(|_| E::Fr::rand(rng))
        .collect::<Vec<_>>();
    let g = E::G1Affine::prime_subgroup_generator();
    let public_key_shares =
        PublicKeyShares::<E>::new(fast_multiexp(&coeffs, g.into_projective()))?;
    let poly = DensePolynomial::from_coefficients_vec(coeffs);
    let participants = (0..shares_num).collect::<BTreeSet<_>>();

    (0..shares_num)
        .map(|index| {
            let secret = poly.evaluate(&evaluation_point(index));
            Party::new(
                0,
                threshold,
                PrivateKeyShare::new(index, secret),
                public_key_shares.clone(),
                participants.clone(),
            )
        })
        .collect()
}
