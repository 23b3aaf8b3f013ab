//! Signal density plus a flat background component.

use rand::{Rng, RngCore};
use uf_core::{Error, Result, TruthDensity};

use crate::flat::Flat;

/// `(1 - f) * signal + f * flat(lo, hi)`.
pub struct WithBackground {
    signal: Box<dyn TruthDensity>,
    background: Flat,
    fraction: f64,
}

impl WithBackground {
    /// Mix `fraction` of flat background over `[lo, hi)` into `signal`.
    pub fn new(signal: Box<dyn TruthDensity>, fraction: f64, lo: f64, hi: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(Error::Validation(format!(
                "background_fraction must be in [0, 1), got {fraction}"
            )));
        }
        Ok(Self { signal, background: Flat::new(lo, hi)?, fraction })
    }
}

impl TruthDensity for WithBackground {
    fn name(&self) -> &str {
        self.signal.name()
    }

    fn pdf(&self, x: f64) -> f64 {
        (1.0 - self.fraction) * self.signal.pdf(x) + self.fraction * self.background.pdf(x)
    }

    fn cdf(&self, x: f64) -> f64 {
        (1.0 - self.fraction) * self.signal.cdf(x) + self.fraction * self.background.cdf(x)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        if rng.random::<f64>() < self.fraction {
            self.background.sample(rng)
        } else {
            self.signal.sample(rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaussian::Gaussian;

    #[test]
    fn test_mixture_cdf() {
        let g = Box::new(Gaussian::new(0.0, 1.0).unwrap());
        let m = WithBackground::new(g, 0.2, -5.0, 5.0).unwrap();
        assert!((m.cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((m.cdf(5.0) - (0.8 * Gaussian::new(0.0, 1.0).unwrap().cdf(5.0) + 0.2)).abs() < 1e-12);
        assert_eq!(m.name(), "gaussian");
    }

    #[test]
    fn test_invalid_fraction() {
        let g = Box::new(Gaussian::new(0.0, 1.0).unwrap());
        assert!(WithBackground::new(g, 1.0, -1.0, 1.0).is_err());
    }
}
