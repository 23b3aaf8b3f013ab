//! Flat density on a finite range.

use rand::{Rng, RngCore};
use uf_core::{Error, Result, TruthDensity};

/// Uniform density on `[lo, hi)`.
#[derive(Debug, Clone)]
pub struct Flat {
    lo: f64,
    hi: f64,
}

impl Flat {
    /// Uniform on `[lo, hi)`.
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(Error::Validation(format!(
                "flat density needs finite lo < hi, got ({lo}, {hi})"
            )));
        }
        Ok(Self { lo, hi })
    }
}

impl TruthDensity for Flat {
    fn name(&self) -> &str {
        "flat"
    }

    fn pdf(&self, x: f64) -> f64 {
        if x >= self.lo && x < self.hi { 1.0 / (self.hi - self.lo) } else { 0.0 }
    }

    fn cdf(&self, x: f64) -> f64 {
        ((x - self.lo) / (self.hi - self.lo)).clamp(0.0, 1.0)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.lo + (self.hi - self.lo) * rng.random::<f64>()
    }
}
