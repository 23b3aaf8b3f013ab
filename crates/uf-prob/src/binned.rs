//! Binned probabilities and range-restricted sampling.

use rand::RngCore;
use uf_core::{Binning, Error, Result, TruthDensity};

/// Minimum probability mass a density must place inside the binning range.
pub const MIN_RANGE_MASS: f64 = 1e-12;

/// Per-bin probabilities of `density` truncated to the binning range (sum to 1).
///
/// Fails with [`Error::Configuration`] if the density has no usable mass in `[lo, hi)`.
pub fn bin_probabilities(density: &dyn TruthDensity, binning: &Binning) -> Result<Vec<f64>> {
    let cdf: Vec<f64> = binning.edges().iter().map(|&e| density.cdf(e)).collect();
    let mass = cdf[cdf.len() - 1] - cdf[0];
    if !mass.is_finite() || mass < MIN_RANGE_MASS {
        return Err(Error::Configuration(format!(
            "density '{}' has no mass inside [{}, {}) (mass = {mass:e})",
            density.name(),
            binning.lo(),
            binning.hi()
        )));
    }
    let raw: Vec<f64> = cdf.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    let sum: f64 = raw.iter().sum();
    Ok(raw.into_iter().map(|p| p / sum).collect())
}

/// Draw from `density` restricted to `[lo, hi)` by rejection.
///
/// Returns [`Error::Computation`] after `max_attempts` draws outside the range.
pub fn sample_truncated(
    density: &dyn TruthDensity,
    lo: f64,
    hi: f64,
    rng: &mut dyn RngCore,
    max_attempts: usize,
) -> Result<f64> {
    for _ in 0..max_attempts {
        let x = density.sample(rng);
        if x >= lo && x < hi {
            return Ok(x);
        }
    }
    Err(Error::Computation(format!(
        "no '{}' draw inside [{lo}, {hi}) after {max_attempts} attempts",
        density.name()
    )))
}
