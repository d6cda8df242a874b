use crate::*;

/// Lagrange coefficients `lambda_i = prod_{j != i} x_j / (x_j - x_i)` for
/// interpolating at zero from the given parties' evaluation points
pub fn lagrange_coefficients_at_zero<F: PrimeField>(parties: &[PartyId]) -> Result<Vec<F>> {
    if parties.iter().collect::<BTreeSet<_>>().len() != parties.len() {
        return Err(ThresholdSignatureError::DuplicateEvaluationPoint);
    }
    let points = parties
        .iter()
        .map(|id| evaluation_point::<F>(*id))
        .collect::<Vec<_>>();

    let mut numerators = Vec::with_capacity(points.len());
    let mut denominators = Vec::with_capacity(points.len());
    for (i, x_i) in points.iter().enumerate() {
        let mut numerator = F::one();
        let mut denominator = F::one();
        for (j, x_j) in points.iter().enumerate() {
            if i != j {
                numerator *= x_j;
                denominator *= *x_j - x_i;
            }
        }
        numerators.push(numerator);
        denominators.push(denominator);
    }
    ark_ff::batch_inversion(&mut denominators);
    Ok(izip!(numerators, denominators)
        .map(|(numerator, inverse)| numerator * inverse)
        .collect())
}

/// `prod_i sigma_i^{lambda_i}` over the given shares. Shares are assumed
/// verified; an invalid share silently yields a wrong signature.
pub fn combine_signature_shares<E: PairingEngine>(
    shares: &BTreeMap<PartyId, SignatureShare<E>>,
) -> Result<GroupSignature<E>> {
    let parties = shares.keys().copied().collect::<Vec<_>>();
    let lagrange = lagrange_coefficients_at_zero::<E::Fr>(&parties)?;
    let signature = izip!(shares.values(), lagrange.iter())
        .map(|(share, lambda)| share.0.mul(*lambda))
        .sum::<E::G2Projective>()
        .into_affine();
    Ok(GroupSignature(signature))
}

/// Interpolate `f(0)` from scalar evaluations `f(x_i)`
pub fn recover_secret<F: PrimeField>(evaluations: &BTreeMap<PartyId, F>) -> Result<F> {
    let parties = evaluations.keys().copied().collect::<Vec<_>>();
    let lagrange = lagrange_coefficients_at_zero::<F>(&parties)?;
    Ok(izip!(evaluations.values(), lagrange)
        .map(|(evaluation, lambda)| *evaluation * lambda)
        .sum())
}
