//! Run configuration: the single immutable record a run is built from.

use rand_distr::Poisson;
use serde::{Deserialize, Serialize};
use uf_core::{AlgorithmOptions, Binning, Error, Result};
use uf_prob::{Efficiency, PdfSpec, Smearing};

/// How many events one toy contains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSize {
    /// Exactly `n` truth events per trial.
    Fixed(u64),
    /// Poisson-fluctuated number of truth events around `expected`.
    Poisson {
        /// Mean number of truth events.
        expected: f64,
    },
}

/// Truth-level toy generation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Multinomial draws of bin occupancies routed through the response (fast path).
    #[default]
    Binned,
    /// Event-by-event: continuous truth draw, efficiency coin, continuous smearing.
    Events,
}

/// A binning as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinningSpec {
    /// `n_bins` equal bins on `[lo, hi)`.
    Uniform {
        /// Number of bins.
        n_bins: usize,
        /// Low edge.
        lo: f64,
        /// High edge.
        hi: f64,
    },
    /// Explicit, strictly increasing edges.
    Edges {
        /// Bin edges.
        edges: Vec<f64>,
    },
}

impl BinningSpec {
    /// Build and validate the binning.
    pub fn build(&self) -> Result<Binning> {
        match self {
            BinningSpec::Uniform { n_bins, lo, hi } => Binning::uniform(*n_bins, *lo, *hi),
            BinningSpec::Edges { edges } => Binning::from_edges(edges.clone()),
        }
    }
}

fn default_integration_points() -> usize {
    32
}

/// Detector model used to build the response and, in event mode, to simulate events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Efficiency as a function of the true value.
    #[serde(default)]
    pub efficiency: Efficiency,
    /// Smearing kernel.
    #[serde(default)]
    pub smearing: Smearing,
    /// Midpoint-rule points per truth bin when integrating the response.
    #[serde(default = "default_integration_points")]
    pub integration_points: usize,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            efficiency: Efficiency::default(),
            smearing: Smearing::default(),
            integration_points: default_integration_points(),
        }
    }
}

/// Algorithm selector plus opaque options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    /// Registry name (`passthrough`, `bin_by_bin`, `invert`, `bayes`) or a caller-chosen label.
    pub name: String,
    /// Passed to the algorithm unchanged.
    #[serde(default)]
    pub options: AlgorithmOptions,
}

impl AlgorithmSpec {
    /// Selector without options.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), options: AlgorithmOptions::new() }
    }

    /// Builder-style option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

fn default_coverage_sigma() -> f64 {
    1.0
}

fn default_threads() -> usize {
    1
}

/// Complete description of one harness run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of independent trials.
    pub n_trials: usize,
    /// Per-trial sample size policy.
    pub sample_size: SampleSize,
    /// Base seed; trial `i` uses `seed.wrapping_add(i)`.
    pub seed: u64,
    /// Truth binning (also the layout of every unfolding result).
    pub truth_binning: BinningSpec,
    /// Measured binning.
    pub measured_binning: BinningSpec,
    /// Density toys are drawn from.
    pub truth_pdf: PdfSpec,
    /// Density weighting truth values inside each truth bin when building the response.
    /// Defaults to `truth_pdf`.
    #[serde(default)]
    pub training_pdf: Option<PdfSpec>,
    /// Detector model.
    #[serde(default)]
    pub response: ResponseSpec,
    /// Toy generation strategy.
    #[serde(default)]
    pub generation: GenerationMode,
    /// Algorithm under test.
    pub algorithm: AlgorithmSpec,
    /// A pull is "covered" when `|pull| <= coverage_sigma`.
    #[serde(default = "default_coverage_sigma")]
    pub coverage_sigma: f64,
    /// Uncertainties at or below this value leave the pull undefined.
    #[serde(default)]
    pub min_uncertainty: f64,
    /// Per-call deadline for the algorithm, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// `1` = sequential, `0` = rayon default pool, `n` = dedicated pool of `n` threads.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Keep every trial's toy dataset in the run output.
    #[serde(default)]
    pub keep_toys: bool,
}

impl RunConfig {
    /// Configuration with defaults for every optional field.
    pub fn new(
        n_trials: usize,
        sample_size: SampleSize,
        truth_binning: BinningSpec,
        measured_binning: BinningSpec,
        truth_pdf: PdfSpec,
        algorithm: AlgorithmSpec,
    ) -> Self {
        Self {
            n_trials,
            sample_size,
            seed: 0,
            truth_binning,
            measured_binning,
            truth_pdf,
            training_pdf: None,
            response: ResponseSpec::default(),
            generation: GenerationMode::default(),
            algorithm,
            coverage_sigma: default_coverage_sigma(),
            min_uncertainty: 0.0,
            timeout_ms: None,
            threads: default_threads(),
            keep_toys: false,
        }
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Density used for the response weighting.
    pub fn training_pdf(&self) -> &PdfSpec {
        self.training_pdf.as_ref().unwrap_or(&self.truth_pdf)
    }

    /// Scalar sanity checks. Binnings, densities and the detector model are
    /// validated when they are built.
    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(Error::Configuration("n_trials must be > 0".to_string()));
        }
        match self.sample_size {
            SampleSize::Fixed(_) => {}
            SampleSize::Poisson { expected } => {
                if !expected.is_finite() || expected < 0.0 {
                    return Err(Error::Configuration(format!(
                        "poisson expected count must be finite and >= 0, got {expected}"
                    )));
                }
                if expected > 0.0 {
                    Poisson::new(expected).map_err(|e| {
                        Error::Configuration(format!("poisson expected count {expected}: {e}"))
                    })?;
                }
            }
        }
        if !self.coverage_sigma.is_finite() || self.coverage_sigma <= 0.0 {
            return Err(Error::Configuration(format!(
                "coverage_sigma must be finite and > 0, got {}",
                self.coverage_sigma
            )));
        }
        if !self.min_uncertainty.is_finite() || self.min_uncertainty < 0.0 {
            return Err(Error::Configuration(format!(
                "min_uncertainty must be finite and >= 0, got {}",
                self.min_uncertainty
            )));
        }
        if self.response.integration_points == 0 {
            return Err(Error::Configuration("integration_points must be > 0".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::Configuration("timeout_ms must be > 0 when set".to_string()));
        }
        if self.algorithm.name.trim().is_empty() {
            return Err(Error::Configuration("algorithm name must be non-empty".to_string()));
        }
        self.response.efficiency.validate()?;
        self.response.smearing.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uf_prob::PdfShape;

    const MINIMAL: &str = r#"{
        "n_trials": 10,
        "sample_size": {"fixed": 1000},
        "seed": 7,
        "truth_binning": {"n_bins": 10, "lo": -5.0, "hi": 5.0},
        "measured_binning": {"edges": [-5.0, -2.0, 0.0, 2.0, 5.0]},
        "truth_pdf": {"kind": "gaussian", "mean": 0.0, "width": 1.5},
        "algorithm": {"name": "bayes", "options": {"iterations": 3}}
    }"#;

    #[test]
    fn test_parse_minimal_with_defaults() {
        let cfg = RunConfig::from_json(MINIMAL).unwrap();
        assert_eq!(cfg.n_trials, 10);
        assert_eq!(cfg.sample_size, SampleSize::Fixed(1000));
        assert_eq!(cfg.truth_binning.build().unwrap().n_bins(), 10);
        assert_eq!(cfg.measured_binning.build().unwrap().n_bins(), 4);
        assert_eq!(cfg.generation, GenerationMode::Binned);
        assert_eq!(cfg.coverage_sigma, 1.0);
        assert_eq!(cfg.threads, 1);
        assert_eq!(cfg.response.integration_points, 32);
        assert_eq!(cfg.algorithm.options["iterations"], serde_json::json!(3));
        assert_eq!(cfg.training_pdf().shape, PdfShape::Gaussian { mean: 0.0, width: 1.5 });
        cfg.validate().unwrap();
    }

    #[test]
    fn test_parse_poisson_and_events() {
        let text = MINIMAL
            .replace(r#"{"fixed": 1000}"#, r#"{"poisson": {"expected": 250.0}}"#)
            .replace(r#""seed": 7,"#, r#""seed": 7, "generation": "events","#);
        let cfg = RunConfig::from_json(&text).unwrap();
        assert_eq!(cfg.sample_size, SampleSize::Poisson { expected: 250.0 });
        assert_eq!(cfg.generation, GenerationMode::Events);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = MINIMAL.replace(r#""seed": 7,"#, r#""seed": 7, "n_toys": 3,"#);
        assert!(RunConfig::from_json(&text).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_scalars() {
        let base = RunConfig::from_json(MINIMAL).unwrap();

        let mut c = base.clone();
        c.n_trials = 0;
        assert!(matches!(c.validate(), Err(Error::Configuration(_))));

        let mut c = base.clone();
        c.coverage_sigma = 0.0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.sample_size = SampleSize::Poisson { expected: f64::NAN };
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.sample_size = SampleSize::Poisson { expected: 1e20 };
        assert!(matches!(c.validate(), Err(Error::Configuration(_))));

        let mut c = base.clone();
        c.sample_size = SampleSize::Poisson { expected: 0.0 };
        assert!(c.validate().is_ok());

        let mut c = base.clone();
        c.response.smearing = Smearing::Gaussian { bias: 0.0, width: -1.0 };
        assert!(c.validate().is_err());

        let mut c = base;
        c.timeout_ms = Some(0);
        assert!(c.validate().is_err());
    }
}
