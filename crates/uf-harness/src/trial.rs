//! One trial: GENERATE -> UNFOLD -> DIAGNOSE.

use std::fmt;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uf_core::{
    AlgorithmOptions, Error, ResponseModel, UnfoldContext, UnfoldingAlgorithm, UnfoldingResult,
};

use crate::sampler::{Sampler, ToyDataset};

/// Trial stage at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStage {
    /// Toy generation.
    Generate,
    /// Algorithm call.
    Unfold,
    /// Checking the algorithm's output and computing residuals.
    Diagnose,
}

/// Failure classification used for the report's per-reason counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Toy generation failed.
    Generation,
    /// The algorithm reported an error.
    Unfolding,
    /// The algorithm exceeded its deadline.
    Timeout,
    /// The algorithm returned a result with the wrong layout or invalid values.
    InvalidResult,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Generation => "generation",
            FailureKind::Unfolding => "unfolding",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidResult => "invalid_result",
        };
        f.write_str(s)
    }
}

/// A trial that did not produce diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    /// Index of the failed trial.
    pub trial_index: usize,
    /// Stage that failed.
    pub stage: TrialStage,
    /// Classification.
    pub kind: FailureKind,
    /// Diagnostic message from the failing component.
    pub message: String,
}

/// Per-bin comparison of estimate and true realization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinDiagnostic {
    /// True content of the bin for this trial.
    pub truth: f64,
    /// Estimated content.
    pub estimate: f64,
    /// Reported standard deviation.
    pub uncertainty: f64,
    /// `estimate - truth`.
    pub residual: f64,
    /// `residual / uncertainty`; `None` when the uncertainty is zero (or below threshold).
    pub pull: Option<f64>,
    /// `pull²`; `Some(0.0)` for an exact estimate without uncertainty, otherwise `None`
    /// when the pull is undefined.
    pub chi_square: Option<f64>,
}

/// Diagnostics of one successful trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDiagnostics {
    /// Trial index.
    pub trial_index: usize,
    /// One entry per truth bin.
    pub bins: Vec<BinDiagnostic>,
    /// Sum of the defined per-bin chi-square contributions.
    pub chi_square_diag: f64,
    /// `rᵀ V⁻¹ r` when the algorithm returned an invertible covariance.
    pub chi_square_cov: Option<f64>,
}

impl TrialDiagnostics {
    /// Number of bins whose pull is undefined.
    pub fn undefined_pulls(&self) -> usize {
        self.bins.iter().filter(|b| b.pull.is_none()).count()
    }
}

/// Either diagnostics or a failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Trial completed.
    Success(TrialDiagnostics),
    /// Trial failed; excluded from the statistics but counted.
    Failure(TrialFailure),
}

/// Outcome plus the toy dataset when retention was requested.
#[derive(Debug, Clone)]
pub struct TrialOutput {
    /// Diagnostics or failure.
    pub outcome: TrialOutcome,
    /// The toy, if kept (and if generation succeeded).
    pub toy: Option<ToyDataset>,
}

/// Thresholds applied while diagnosing a trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticSettings {
    /// Uncertainties `<=` this leave the pull undefined.
    pub min_uncertainty: f64,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self { min_uncertainty: 0.0 }
    }
}

/// Runs single trials against a fixed response, sampler and algorithm.
pub struct TrialRunner<'a> {
    response: &'a ResponseModel,
    sampler: &'a Sampler,
    algorithm: &'a dyn UnfoldingAlgorithm,
    options: &'a AlgorithmOptions,
    settings: DiagnosticSettings,
    timeout: Option<Duration>,
    keep_toys: bool,
}

impl<'a> TrialRunner<'a> {
    /// Runner with default settings, no timeout and no toy retention.
    pub fn new(
        response: &'a ResponseModel,
        sampler: &'a Sampler,
        algorithm: &'a dyn UnfoldingAlgorithm,
        options: &'a AlgorithmOptions,
    ) -> Self {
        Self {
            response,
            sampler,
            algorithm,
            options,
            settings: DiagnosticSettings::default(),
            timeout: None,
            keep_toys: false,
        }
    }

    /// Diagnostic thresholds.
    pub fn with_settings(mut self, settings: DiagnosticSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Per-call deadline for the algorithm.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep each trial's toy dataset in its output.
    pub fn keep_toys(mut self, keep: bool) -> Self {
        self.keep_toys = keep;
        self
    }

    /// Run trial `trial_index` on the given random stream.
    ///
    /// Never returns an error: every per-trial problem becomes a [`TrialFailure`].
    pub fn run_one(&self, trial_index: usize, rng: &mut dyn RngCore) -> TrialOutput {
        let fail = |stage, kind, message: String| {
            log::debug!("trial {trial_index} failed ({kind}): {message}");
            TrialOutcome::Failure(TrialFailure { trial_index, stage, kind, message })
        };

        // GENERATE
        let toy = match self.sampler.generate(self.response, trial_index, rng) {
            Ok(toy) => toy,
            Err(e) => {
                let outcome = fail(TrialStage::Generate, FailureKind::Generation, e.to_string());
                return TrialOutput { outcome, toy: None };
            }
        };

        // UNFOLD
        let started = Instant::now();
        let ctx = UnfoldContext::with_deadline(self.options, self.timeout.map(|t| started + t));
        let result = self.algorithm.unfold(self.response, &toy.measured, &ctx);
        let elapsed = started.elapsed();

        let outcome = match result {
            Err(Error::Timeout(msg)) => fail(TrialStage::Unfold, FailureKind::Timeout, msg),
            Err(e) => fail(TrialStage::Unfold, FailureKind::Unfolding, e.to_string()),
            Ok(_) if self.timeout.is_some_and(|t| elapsed > t) => fail(
                TrialStage::Unfold,
                FailureKind::Timeout,
                format!(
                    "{} took {} ms, limit {} ms",
                    self.algorithm.name(),
                    elapsed.as_millis(),
                    self.timeout.map(|t| t.as_millis()).unwrap_or_default()
                ),
            ),
            // DIAGNOSE
            Ok(result) => match result.validate(self.response.truth_binning()) {
                Err(e) => fail(TrialStage::Diagnose, FailureKind::InvalidResult, e.to_string()),
                Ok(()) => TrialOutcome::Success(diagnose(
                    trial_index,
                    toy.truth.counts(),
                    &result,
                    &self.settings,
                )),
            },
        };

        TrialOutput { outcome, toy: self.keep_toys.then_some(toy) }
    }
}

/// Compare an unfolding result with the true realization bin by bin.
pub fn diagnose(
    trial_index: usize,
    truth: &[f64],
    result: &UnfoldingResult,
    settings: &DiagnosticSettings,
) -> TrialDiagnostics {
    let bins: Vec<BinDiagnostic> = truth
        .iter()
        .zip(&result.estimate)
        .zip(&result.uncertainties)
        .map(|((&t, &est), &sigma)| {
            let residual = est - t;
            let defined = sigma.is_finite() && sigma > settings.min_uncertainty && sigma > 0.0;
            let (pull, chi_square) = if defined {
                let pull = residual / sigma;
                (Some(pull), Some(pull * pull))
            } else if residual == 0.0 {
                (None, Some(0.0))
            } else {
                (None, None)
            };
            BinDiagnostic { truth: t, estimate: est, uncertainty: sigma, residual, pull, chi_square }
        })
        .collect();

    let chi_square_diag: f64 = bins.iter().filter_map(|b| b.chi_square).sum();
    let residuals: Vec<f64> = bins.iter().map(|b| b.residual).collect();
    let chi_square_cov = result.covariance.as_deref().and_then(|cov| covariance_chi_square(&residuals, cov));

    TrialDiagnostics { trial_index, bins, chi_square_diag, chi_square_cov }
}

/// `rᵀ V⁻¹ r` via Cholesky; `None` if `V` is not positive definite.
fn covariance_chi_square(residuals: &[f64], covariance: &[f64]) -> Option<f64> {
    let n = residuals.len();
    if covariance.len() != n * n {
        return None;
    }
    let v = DMatrix::from_row_slice(n, n, covariance);
    let chol = v.cholesky()?;
    let r = DVector::from_column_slice(residuals);
    let x = chol.solve(&r);
    let chi2 = r.dot(&x);
    chi2.is_finite().then_some(chi2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationMode, SampleSize};
    use crate::response::{Detector, build_response};
    use rand::SeedableRng;
    use uf_core::{Binning, Histogram, Result};
    use uf_prob::flat::Flat;

    /// Returns a canned result, or fails when there is none.
    struct Fixed(Option<UnfoldingResult>);

    impl UnfoldingAlgorithm for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn unfold(
            &self,
            _response: &ResponseModel,
            _measured: &Histogram,
            _ctx: &UnfoldContext<'_>,
        ) -> Result<UnfoldingResult> {
            self.0.clone().ok_or_else(|| Error::Unfolding("did not converge".into()))
        }
    }

    struct Slow;

    impl UnfoldingAlgorithm for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn unfold(
            &self,
            _response: &ResponseModel,
            measured: &Histogram,
            _ctx: &UnfoldContext<'_>,
        ) -> Result<UnfoldingResult> {
            std::thread::sleep(Duration::from_millis(30));
            Ok(UnfoldingResult::new(measured.counts().to_vec(), vec![1.0; measured.n_bins()]))
        }
    }

    fn fixture() -> (ResponseModel, Sampler) {
        let b = Binning::uniform(3, 0.0, 3.0).unwrap();
        let flat = Flat::new(0.0, 3.0).unwrap();
        let r = build_response(&Detector::ideal(), &b, &b, &flat, 4).unwrap();
        let s = Sampler::new(
            b,
            Box::new(flat),
            Detector::ideal(),
            SampleSize::Fixed(300),
            GenerationMode::Binned,
        )
        .unwrap();
        (r, s)
    }

    #[test]
    fn test_diagnose_pull_and_chi_square() {
        let result = UnfoldingResult::new(vec![12.0, 5.0, 7.0], vec![2.0, 0.0, 0.0]);
        let d = diagnose(3, &[10.0, 5.0, 9.0], &result, &DiagnosticSettings::default());
        assert_eq!(d.trial_index, 3);
        assert_eq!(d.bins[0].residual, 2.0);
        assert_eq!(d.bins[0].pull, Some(1.0));
        assert_eq!(d.bins[0].chi_square, Some(1.0));
        // Zero uncertainty, exact: pull undefined, contributes 0.
        assert_eq!(d.bins[1].pull, None);
        assert_eq!(d.bins[1].chi_square, Some(0.0));
        // Zero uncertainty, off: pull and chi-square undefined, residual kept.
        assert_eq!(d.bins[2].pull, None);
        assert_eq!(d.bins[2].chi_square, None);
        assert_eq!(d.bins[2].residual, -2.0);
        assert_eq!(d.chi_square_diag, 1.0);
        assert_eq!(d.undefined_pulls(), 2);
        assert_eq!(d.chi_square_cov, None);
    }

    #[test]
    fn test_min_uncertainty_threshold() {
        let result = UnfoldingResult::new(vec![1.0], vec![1e-6]);
        let settings = DiagnosticSettings { min_uncertainty: 1e-3 };
        let d = diagnose(0, &[0.0], &result, &settings);
        assert_eq!(d.bins[0].pull, None);
    }

    #[test]
    fn test_covariance_chi_square() {
        // Diagonal covariance: matches the diagonal sum.
        let result = UnfoldingResult::from_covariance(vec![2.0, 1.0], vec![4.0, 0.0, 0.0, 1.0]);
        let d = diagnose(0, &[0.0, 0.0], &result, &DiagnosticSettings::default());
        assert!((d.chi_square_cov.unwrap() - 2.0).abs() < 1e-12);
        assert!((d.chi_square_diag - 2.0).abs() < 1e-12);
        // Singular covariance: no covariance chi-square.
        let result = UnfoldingResult::from_covariance(vec![2.0, 1.0], vec![1.0, 1.0, 1.0, 1.0]);
        let d = diagnose(0, &[0.0, 0.0], &result, &DiagnosticSettings::default());
        assert_eq!(d.chi_square_cov, None);
    }

    #[test]
    fn test_failure_is_recorded_not_raised() {
        let (r, s) = fixture();
        let algo = Fixed(None);
        let opts = AlgorithmOptions::new();
        let runner = TrialRunner::new(&r, &s, &algo, &opts);
        let out = runner.run_one(7, &mut rand::rngs::StdRng::seed_from_u64(7));
        match out.outcome {
            TrialOutcome::Failure(f) => {
                assert_eq!(f.trial_index, 7);
                assert_eq!(f.stage, TrialStage::Unfold);
                assert_eq!(f.kind, FailureKind::Unfolding);
                assert!(f.message.contains("did not converge"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_layout_is_invalid_result() {
        let (r, s) = fixture();
        let algo = Fixed(Some(UnfoldingResult::new(vec![1.0, 2.0], vec![1.0, 1.0])));
        let opts = AlgorithmOptions::new();
        let out = TrialRunner::new(&r, &s, &algo, &opts)
            .run_one(0, &mut rand::rngs::StdRng::seed_from_u64(0));
        assert!(matches!(
            out.outcome,
            TrialOutcome::Failure(TrialFailure { kind: FailureKind::InvalidResult, stage: TrialStage::Diagnose, .. })
        ));
    }

    #[test]
    fn test_nan_covariance_is_invalid_result() {
        let (r, s) = fixture();
        let mut cov = vec![0.0; 9];
        cov[0] = f64::NAN;
        cov[4] = 1.0;
        cov[8] = 1.0;
        let algo = Fixed(Some(UnfoldingResult::from_covariance(vec![1.0, 2.0, 3.0], cov)));
        let opts = AlgorithmOptions::new();
        let out = TrialRunner::new(&r, &s, &algo, &opts)
            .run_one(0, &mut rand::rngs::StdRng::seed_from_u64(0));
        assert!(matches!(
            out.outcome,
            TrialOutcome::Failure(TrialFailure { kind: FailureKind::InvalidResult, stage: TrialStage::Diagnose, .. })
        ));
    }

    #[test]
    fn test_overrun_is_timeout() {
        let (r, s) = fixture();
        let opts = AlgorithmOptions::new();
        let out = TrialRunner::new(&r, &s, &Slow, &opts)
            .with_timeout(Some(Duration::from_millis(1)))
            .run_one(0, &mut rand::rngs::StdRng::seed_from_u64(0));
        assert!(matches!(
            out.outcome,
            TrialOutcome::Failure(TrialFailure { kind: FailureKind::Timeout, .. })
        ));
    }

    #[test]
    fn test_reproducible_and_keeps_toy() {
        let (r, s) = fixture();
        let opts = AlgorithmOptions::new();
        let runner = TrialRunner::new(&r, &s, &Slow, &opts).keep_toys(true);
        let a = runner.run_one(1, &mut rand::rngs::StdRng::seed_from_u64(42));
        let b = runner.run_one(1, &mut rand::rngs::StdRng::seed_from_u64(42));
        assert_eq!(a.outcome, b.outcome);
        let toy = a.toy.unwrap();
        assert_eq!(toy.trial_index, 1);
        assert_eq!(toy.truth.total(), 300.0);
    }
}
