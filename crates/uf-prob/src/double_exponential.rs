//! Double-sided exponential (Laplace) density.

use rand::{Rng, RngCore};
use uf_core::{Error, Result, TruthDensity};

/// `exp(-|x - mean| / width) / (2 width)`.
#[derive(Debug, Clone)]
pub struct DoubleExponential {
    mean: f64,
    width: f64,
}

impl DoubleExponential {
    /// Laplace density with scale `width`.
    pub fn new(mean: f64, width: f64) -> Result<Self> {
        if !mean.is_finite() || !width.is_finite() || width <= 0.0 {
            return Err(Error::Validation(format!(
                "double_exponential needs finite mean and width > 0, got mean={mean}, width={width}"
            )));
        }
        Ok(Self { mean, width })
    }
}

impl TruthDensity for DoubleExponential {
    fn name(&self) -> &str {
        "double_exponential"
    }

    fn pdf(&self, x: f64) -> f64 {
        (-(x - self.mean).abs() / self.width).exp() / (2.0 * self.width)
    }

    fn cdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.width;
        if z < 0.0 { 0.5 * z.exp() } else { 1.0 - 0.5 * (-z).exp() }
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        // Inverse CDF on u in (-1/2, 1/2).
        let u: f64 = rng.random::<f64>() - 0.5;
        let tail = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
        self.mean - self.width * u.signum() * tail.ln()
    }
}
