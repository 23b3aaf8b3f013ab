//! Final report of a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::trial::{FailureKind, TrialFailure};

/// Report layout version, bumped on incompatible field changes.
pub const REPORT_SCHEMA_VERSION: &str = "unfoldtest_report_v1";

/// Per-truth-bin summary over all successful trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinReport {
    /// Truth bin index.
    pub index: usize,
    /// Mean true content.
    pub mean_truth: f64,
    /// Mean estimated content.
    pub mean_estimate: f64,
    /// Mean of `estimate - truth`.
    pub mean_residual: f64,
    /// Spread of the residual across toys.
    pub residual_std_dev: Option<f64>,
    /// Mean reported uncertainty (compare with `residual_std_dev`).
    pub mean_uncertainty: f64,
    /// Mean pull over trials with a defined pull.
    pub mean_pull: Option<f64>,
    /// Pull standard deviation (`None` with fewer than two defined pulls).
    pub pull_std_dev: Option<f64>,
    /// Number of defined pulls.
    pub pull_count: u64,
    /// Trials where the pull was undefined (zero or sub-threshold uncertainty).
    pub undefined_pull_count: u64,
    /// Fraction of defined pulls with `|pull| <= coverage_sigma`; 0 when there are none.
    pub coverage_fraction: f64,
    /// Mean chi-square contribution over trials where it is defined.
    pub chi_square_mean: Option<f64>,
}

/// Immutable snapshot of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    /// See [`REPORT_SCHEMA_VERSION`].
    pub schema_version: String,
    /// Configuration the run used, when known.
    pub config: Option<RunConfig>,
    /// Name of the algorithm under test.
    pub algorithm: String,
    /// Trials requested.
    pub n_trials_requested: usize,
    /// Trials that ran (successful or failed). Less than requested after cancellation.
    pub n_trials_completed: usize,
    /// Trials contributing to the statistics.
    pub n_successful: usize,
    /// Trials that failed.
    pub failed_trial_count: usize,
    /// Failure counts by reason.
    pub failure_counts: BTreeMap<FailureKind, usize>,
    /// Every failure, ordered by trial index.
    pub failures: Vec<TrialFailure>,
    /// `true` if the run stopped early.
    pub cancelled: bool,
    /// Degrees of freedom of the per-trial chi-square (number of truth bins).
    pub ndf: usize,
    /// Coverage threshold in units of the reported uncertainty.
    pub coverage_sigma: f64,
    /// Per-bin summaries.
    pub bins: Vec<BinReport>,
    /// Coverage over all (trial, bin) pairs with a defined pull.
    pub coverage_fraction: f64,
    /// Sum of per-trial chi-square over all successful trials.
    pub chi_square_sum: f64,
    /// Mean per-trial chi-square.
    pub chi_square_mean: Option<f64>,
    /// Spread of the per-trial chi-square.
    pub chi_square_std_dev: Option<f64>,
    /// Mean covariance chi-square, over trials that reported an invertible covariance.
    pub chi_square_cov_mean: Option<f64>,
}

impl ReportModel {
    /// Pretty JSON.
    pub fn to_json(&self) -> uf_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
