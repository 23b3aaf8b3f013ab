//! Serializable density specifications and their construction.

use serde::{Deserialize, Serialize};
use uf_core::{Error, Result, TruthDensity};

use crate::background::WithBackground;
use crate::breit_wigner::{BreitWigner, DoubleBreitWigner};
use crate::double_exponential::DoubleExponential;
use crate::exponential::Exponential;
use crate::flat::Flat;
use crate::gaussian::Gaussian;

/// Shape of a truth density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PdfShape {
    /// Flat over the truth range.
    Flat,
    /// Gaussian with standard deviation `width`.
    Gaussian {
        /// Peak position.
        mean: f64,
        /// Standard deviation.
        width: f64,
    },
    /// Breit-Wigner with FWHM `width`.
    BreitWigner {
        /// Peak position.
        mean: f64,
        /// Full width at half maximum.
        width: f64,
    },
    /// Two Breit-Wigners at `mean ± width`.
    DoubleBreitWigner {
        /// Midpoint between the peaks.
        mean: f64,
        /// Peak offset and FWHM of each peak.
        width: f64,
    },
    /// Falling exponential starting at `origin`.
    Exponential {
        /// Decay length.
        slope: f64,
        /// Start of the support.
        #[serde(default)]
        origin: f64,
    },
    /// Laplace density.
    DoubleExponential {
        /// Peak position.
        mean: f64,
        /// Scale.
        width: f64,
    },
}

/// A truth density: shape plus an optional flat background fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfSpec {
    /// Density shape and its parameters.
    #[serde(flatten)]
    pub shape: PdfShape,
    /// Fraction of flat background over the truth range, in `[0, 1)`.
    #[serde(default)]
    pub background_fraction: f64,
}

impl PdfSpec {
    /// Spec without background.
    pub fn new(shape: PdfShape) -> Self {
        Self { shape, background_fraction: 0.0 }
    }

    /// Builder-style background fraction.
    pub fn with_background(mut self, fraction: f64) -> Self {
        self.background_fraction = fraction;
        self
    }

    /// Build the density for a truth range `[lo, hi)`.
    ///
    /// Parameter problems are reported as [`Error::Configuration`].
    pub fn build(&self, lo: f64, hi: f64) -> Result<Box<dyn TruthDensity>> {
        self.build_inner(lo, hi).map_err(|e| match e {
            Error::Validation(msg) => Error::Configuration(msg),
            other => other,
        })
    }

    fn build_inner(&self, lo: f64, hi: f64) -> Result<Box<dyn TruthDensity>> {
        let signal: Box<dyn TruthDensity> = match self.shape {
            PdfShape::Flat => Box::new(Flat::new(lo, hi)?),
            PdfShape::Gaussian { mean, width } => Box::new(Gaussian::new(mean, width)?),
            PdfShape::BreitWigner { mean, width } => Box::new(BreitWigner::new(mean, width)?),
            PdfShape::DoubleBreitWigner { mean, width } => {
                Box::new(DoubleBreitWigner::new(mean, width)?)
            }
            PdfShape::Exponential { slope, origin } => Box::new(Exponential::new(slope, origin)?),
            PdfShape::DoubleExponential { mean, width } => {
                Box::new(DoubleExponential::new(mean, width)?)
            }
        };
        if self.background_fraction == 0.0 {
            return Ok(signal);
        }
        Ok(Box::new(WithBackground::new(signal, self.background_fraction, lo, hi)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_background() {
        let spec: PdfSpec = serde_json::from_str(
            r#"{"kind": "gaussian", "mean": 0.0, "width": 2.5, "background_fraction": 0.1}"#,
        )
        .unwrap();
        assert_eq!(spec.shape, PdfShape::Gaussian { mean: 0.0, width: 2.5 });
        assert_eq!(spec.background_fraction, 0.1);
        let d = spec.build(-10.0, 10.0).unwrap();
        assert_eq!(d.name(), "gaussian");
    }

    #[test]
    fn test_parse_defaults() {
        let spec: PdfSpec = serde_json::from_str(r#"{"kind": "exponential", "slope": 3.0}"#).unwrap();
        assert_eq!(spec.shape, PdfShape::Exponential { slope: 3.0, origin: 0.0 });
        assert_eq!(spec.background_fraction, 0.0);
        let flat: PdfSpec = serde_json::from_str(r#"{"kind": "flat"}"#).unwrap();
        assert_eq!(flat.shape, PdfShape::Flat);
    }

    #[test]
    fn test_bad_parameters_are_configuration_errors() {
        let spec = PdfSpec::new(PdfShape::BreitWigner { mean: 0.0, width: -1.0 });
        assert!(matches!(spec.build(0.0, 1.0), Err(Error::Configuration(_))));
        let spec = PdfSpec::new(PdfShape::Flat).with_background(1.5);
        assert!(matches!(spec.build(0.0, 1.0), Err(Error::Configuration(_))));
    }
}
