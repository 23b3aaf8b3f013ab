//! Gaussian density.

use rand::RngCore;
use rand_distr::{Distribution, Normal};
use uf_core::{Error, Result, TruthDensity};

use crate::math::standard_normal_cdf;

/// Natural log of `sqrt(2π)`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// `N(mean, width)`.
#[derive(Debug, Clone)]
pub struct Gaussian {
    mean: f64,
    width: f64,
    normal: Normal<f64>,
}

impl Gaussian {
    /// Gaussian with standard deviation `width`.
    pub fn new(mean: f64, width: f64) -> Result<Self> {
        if !mean.is_finite() || !width.is_finite() || width <= 0.0 {
            return Err(Error::Validation(format!(
                "gaussian needs finite mean and width > 0, got mean={mean}, width={width}"
            )));
        }
        let normal = Normal::new(mean, width)
            .map_err(|e| Error::Validation(format!("gaussian: {e}")))?;
        Ok(Self { mean, width, normal })
    }
}

impl TruthDensity for Gaussian {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.width;
        (-0.5 * z * z - self.width.ln() - LN_SQRT_2PI).exp()
    }

    fn cdf(&self, x: f64) -> f64 {
        standard_normal_cdf((x - self.mean) / self.width)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.normal.sample(rng)
    }
}
