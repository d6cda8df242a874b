//! Distributed key generation for a fixed committee, and a randomness
//! beacon that signs each round's challenge with the resulting threshold key.
//!
//! A [`SimpleDkg`] or [`ByzantineDkg`] instance is driven over the network by
//! the generic [`runner`], which yields a [`Party`] once the epoch completes.
//! Each beacon round then runs a [`VrfRound`] on the same runner to produce
//! one [`RandomOutput`].

pub mod config;
pub mod dkg;
pub mod error;
pub mod msg;
pub mod runner;
pub mod transport;
pub mod vrf;
pub mod vss;

pub use config::*;
pub use dkg::*;
pub use error::*;
pub use msg::*;
pub use runner::*;
pub use transport::*;
pub use vrf::*;
pub use vss::*;

pub use beacon_common::{Committee, Member, PartyId, Rng};
pub use threshold_bls::{GroupSignature, Party, SignatureShare};

use ark_ec::{AffineCurve, PairingEngine, ProjectiveCurve};
use ark_ff::{UniformRand, Zero};
use ark_poly::{univariate::DensePolynomial, Polynomial, UVPolynomial};
use ark_serialize::CanonicalSerialize;
use log::{debug, info, trace, warn};
use measure_time::debug_time;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threshold_bls::{
    evaluation_point, fast_multiexp, PrivateKeyShare, PublicKeyShares, ThresholdSignatureError,
};
