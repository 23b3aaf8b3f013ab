//! Breit-Wigner (Cauchy) densities.

use std::f64::consts::PI;

use rand::{Rng, RngCore};
use rand_distr::{Cauchy, Distribution};
use uf_core::{Error, Result, TruthDensity};

use crate::math::cauchy_cdf;

fn check(mean: f64, width: f64, what: &str) -> Result<()> {
    if !mean.is_finite() || !width.is_finite() || width <= 0.0 {
        return Err(Error::Validation(format!(
            "{what} needs finite mean and width > 0, got mean={mean}, width={width}"
        )));
    }
    Ok(())
}

/// Breit-Wigner with peak `mean` and full width at half maximum `width`.
#[derive(Debug, Clone)]
pub struct BreitWigner {
    mean: f64,
    gamma: f64,
    cauchy: Cauchy<f64>,
}

impl BreitWigner {
    /// Breit-Wigner with FWHM `width`.
    pub fn new(mean: f64, width: f64) -> Result<Self> {
        check(mean, width, "breit_wigner")?;
        let gamma = 0.5 * width;
        let cauchy =
            Cauchy::new(mean, gamma).map_err(|e| Error::Validation(format!("breit_wigner: {e}")))?;
        Ok(Self { mean, gamma, cauchy })
    }
}

impl TruthDensity for BreitWigner {
    fn name(&self) -> &str {
        "breit_wigner"
    }

    fn pdf(&self, x: f64) -> f64 {
        let d = x - self.mean;
        self.gamma / (PI * (d * d + self.gamma * self.gamma))
    }

    fn cdf(&self, x: f64) -> f64 {
        cauchy_cdf(x, self.mean, self.gamma)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.cauchy.sample(rng)
    }
}

/// Equal mixture of two Breit-Wigners peaked at `mean - width` and `mean + width`,
/// each with FWHM `width`.
#[derive(Debug, Clone)]
pub struct DoubleBreitWigner {
    low: BreitWigner,
    high: BreitWigner,
}

impl DoubleBreitWigner {
    /// Two peaks separated by `2 * width`.
    pub fn new(mean: f64, width: f64) -> Result<Self> {
        check(mean, width, "double_breit_wigner")?;
        Ok(Self {
            low: BreitWigner::new(mean - width, width)?,
            high: BreitWigner::new(mean + width, width)?,
        })
    }
}

impl TruthDensity for DoubleBreitWigner {
    fn name(&self) -> &str {
        "double_breit_wigner"
    }

    fn pdf(&self, x: f64) -> f64 {
        0.5 * (self.low.pdf(x) + self.high.pdf(x))
    }

    fn cdf(&self, x: f64) -> f64 {
        0.5 * (self.low.cdf(x) + self.high.cdf(x))
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        if rng.random::<bool>() { self.high.sample(rng) } else { self.low.sample(rng) }
    }
}
