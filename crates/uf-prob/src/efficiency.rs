//! Detection efficiency as a function of the true value.

use serde::{Deserialize, Serialize};
use uf_core::{Error, Result};

/// Probability that an event with true value `x` is observed at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Efficiency {
    /// Same efficiency everywhere.
    Constant {
        /// Efficiency in `[0, 1]`.
        value: f64,
    },
    /// Linear from `at_lo` at the low truth edge to `at_hi` at the high truth edge,
    /// held constant outside the range.
    Linear {
        /// Efficiency at the low edge.
        at_lo: f64,
        /// Efficiency at the high edge.
        at_hi: f64,
    },
}

impl Default for Efficiency {
    fn default() -> Self {
        Efficiency::Constant { value: 1.0 }
    }
}

impl Efficiency {
    /// Check all efficiencies lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let values = match *self {
            Efficiency::Constant { value } => [value, value],
            Efficiency::Linear { at_lo, at_hi } => [at_lo, at_hi],
        };
        for v in values {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Configuration(format!("efficiency must be in [0, 1], got {v}")));
            }
        }
        Ok(())
    }

    /// Efficiency at true value `x` for a truth range `[lo, hi]`.
    pub fn eval(&self, x: f64, lo: f64, hi: f64) -> f64 {
        match *self {
            Efficiency::Constant { value } => value,
            Efficiency::Linear { at_lo, at_hi } => {
                let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
                at_lo + (at_hi - at_lo) * t
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation() {
        let e = Efficiency::Linear { at_lo: 0.9, at_hi: 0.7 };
        assert!((e.eval(-10.0, -10.0, 10.0) - 0.9).abs() < 1e-15);
        assert!((e.eval(0.0, -10.0, 10.0) - 0.8).abs() < 1e-15);
        assert!((e.eval(20.0, -10.0, 10.0) - 0.7).abs() < 1e-15);
    }

    #[test]
    fn test_validate() {
        assert!(Efficiency::Constant { value: 1.0 }.validate().is_ok());
        assert!(Efficiency::Constant { value: 1.2 }.validate().is_err());
        assert!(Efficiency::Linear { at_lo: -0.1, at_hi: 0.5 }.validate().is_err());
    }

    #[test]
    fn test_serde_tagged() {
        let e: Efficiency =
            serde_json::from_str(r#"{"kind": "linear", "at_lo": 0.9, "at_hi": 0.7}"#).unwrap();
        assert_eq!(e, Efficiency::Linear { at_lo: 0.9, at_hi: 0.7 });
    }
}
