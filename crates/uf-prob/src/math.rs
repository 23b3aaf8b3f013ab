//! Small numeric helpers shared by the densities.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Standard normal CDF `Φ(z)`.
#[inline]
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * statrs::function::erf::erfc(-z * FRAC_1_SQRT_2)
}

/// Probability that `N(mu, sigma)` falls in `[lo, hi)`.
///
/// Uses the upper tail when both edges are above the mean so that far-tail
/// intervals do not lose precision to `1 - 1` cancellation.
pub fn normal_interval_prob(lo: f64, hi: f64, mu: f64, sigma: f64) -> f64 {
    let z_lo = (lo - mu) / sigma;
    let z_hi = (hi - mu) / sigma;
    let p = if z_lo > 0.0 {
        standard_normal_cdf(-z_lo) - standard_normal_cdf(-z_hi)
    } else {
        standard_normal_cdf(z_hi) - standard_normal_cdf(z_lo)
    };
    p.max(0.0)
}

/// Cauchy (Breit-Wigner) CDF with location `mu` and half width at half maximum `gamma`.
#[inline]
pub fn cauchy_cdf(x: f64, mu: f64, gamma: f64) -> f64 {
    0.5 + ((x - mu) / gamma).atan() / PI
}
