//! Falling exponential density.

use rand::RngCore;
use rand_distr::{Distribution, Exp};
use uf_core::{Error, Result, TruthDensity};

/// `exp(-(x - origin) / slope) / slope` for `x >= origin`.
#[derive(Debug, Clone)]
pub struct Exponential {
    origin: f64,
    slope: f64,
    exp: Exp<f64>,
}

impl Exponential {
    /// Exponential with decay length `slope` starting at `origin`.
    pub fn new(slope: f64, origin: f64) -> Result<Self> {
        if !slope.is_finite() || slope <= 0.0 || !origin.is_finite() {
            return Err(Error::Validation(format!(
                "exponential needs finite origin and slope > 0, got slope={slope}, origin={origin}"
            )));
        }
        let exp =
            Exp::new(1.0 / slope).map_err(|e| Error::Validation(format!("exponential: {e}")))?;
        Ok(Self { origin, slope, exp })
    }
}

impl TruthDensity for Exponential {
    fn name(&self) -> &str {
        "exponential"
    }

    fn pdf(&self, x: f64) -> f64 {
        if x < self.origin {
            return 0.0;
        }
        (-(x - self.origin) / self.slope).exp() / self.slope
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= self.origin {
            return 0.0;
        }
        -(-(x - self.origin) / self.slope).exp_m1()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.origin + self.exp.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_support() {
        let e = Exponential::new(2.0, 1.0).unwrap();
        assert_eq!(e.pdf(0.5), 0.0);
        assert_eq!(e.cdf(0.5), 0.0);
    }

    #[test]
    fn test_median() {
        let e = Exponential::new(2.0, 0.0).unwrap();
        let median = 2.0 * 2f64.ln();
        assert!((e.cdf(median) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_slope() {
        assert!(Exponential::new(0.0, 0.0).is_err());
        assert!(Exponential::new(-1.0, 0.0).is_err());
    }
}
