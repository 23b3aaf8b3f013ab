//! Smearing kernels: how a true value migrates to a measured value.

use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use uf_core::{Error, Result};

use crate::math::normal_interval_prob;

/// Measured-value model given a true value `x`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Smearing {
    /// Measured value equals the true value.
    #[default]
    None,
    /// Measured value is `x + bias + N(0, width)`.
    Gaussian {
        /// Constant shift of the measured value.
        #[serde(default)]
        bias: f64,
        /// Resolution (standard deviation).
        width: f64,
    },
}

impl Smearing {
    /// Check the kernel parameters.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Smearing::None => Ok(()),
            Smearing::Gaussian { bias, width } => {
                if !bias.is_finite() || !width.is_finite() || width <= 0.0 {
                    return Err(Error::Configuration(format!(
                        "gaussian smearing needs finite bias and width > 0, got bias={bias}, width={width}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Probability that true value `x` is measured inside `[lo, hi)`.
    pub fn probability_in(&self, x: f64, lo: f64, hi: f64) -> f64 {
        match *self {
            Smearing::None => {
                if x >= lo && x < hi {
                    1.0
                } else {
                    0.0
                }
            }
            Smearing::Gaussian { bias, width } => normal_interval_prob(lo, hi, x + bias, width),
        }
    }

    /// Draw a measured value for true value `x`.
    pub fn apply(&self, x: f64, rng: &mut dyn RngCore) -> f64 {
        match *self {
            Smearing::None => x,
            Smearing::Gaussian { bias, width } => {
                let z: f64 = StandardNormal.sample(rng);
                x + bias + width * z
            }
        }
    }
}
