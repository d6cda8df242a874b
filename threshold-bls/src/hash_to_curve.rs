use crate::*;

/// blake2b personalization, at most 16 bytes
const HASH_TO_G2_DOMAIN: &[u8] = b"beacon-bls-h2g2_";

/// Hash a message onto the prime order subgroup of G2.
///
/// Try-and-increment: the message is expanded with a counter into enough
/// bytes to decode a candidate point, and the first candidate that decodes
/// to a curve point is multiplied by the cofactor. Deterministic in the
/// message, so every party derives the same point.
pub fn hash_to_g2<E: PairingEngine>(message: &[u8]) -> E::G2Affine {
    let mut counter = 0u64;
    loop {
        let candidate = expand_message(message, counter);
        if let Some(point) = E::G2Affine::from_random_bytes(&candidate) {
            let point = point.mul_by_cofactor();
            if !point.is_zero() {
                return point;
            }
        }
        counter += 1;
    }
}

fn expand_message(message: &[u8], counter: u64) -> Vec<u8> {
    let mut expanded = Vec::with_capacity(128);
    for block in 0u8..2 {
        let hash = blake2b_simd::Params::new()
            .hash_length(64)
            .personal(HASH_TO_G2_DOMAIN)
            .to_state()
            .update(&counter.to_le_bytes())
            .update(&[block])
            .update(message)
            .finalize();
        expanded.extend_from_slice(hash.as_bytes());
    }
    expanded
}
