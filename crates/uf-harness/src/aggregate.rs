//! Run-level accumulation of trial diagnostics.

use std::collections::BTreeMap;

use uf_core::{Error, Result};

use crate::config::RunConfig;
use crate::report::{BinReport, REPORT_SCHEMA_VERSION, ReportModel};
use crate::trial::{TrialDiagnostics, TrialFailure, TrialOutcome};
use crate::welford::RunningStats;

#[derive(Debug, Clone, Default)]
struct BinAccumulator {
    truth: RunningStats,
    estimate: RunningStats,
    residual: RunningStats,
    uncertainty: RunningStats,
    pull: RunningStats,
    chi_square: RunningStats,
    covered: u64,
    undefined_pulls: u64,
}

impl BinAccumulator {
    fn merge(&mut self, other: &BinAccumulator) {
        self.truth.merge(&other.truth);
        self.estimate.merge(&other.estimate);
        self.residual.merge(&other.residual);
        self.uncertainty.merge(&other.uncertainty);
        self.pull.merge(&other.pull);
        self.chi_square.merge(&other.chi_square);
        self.covered += other.covered;
        self.undefined_pulls += other.undefined_pulls;
    }
}

/// Accumulates trial outcomes into per-bin and global statistics.
///
/// Accumulation order does not matter beyond rounding: partial aggregators built
/// on disjoint trial sets can be combined with [`TrialAggregator::merge`].
#[derive(Debug, Clone)]
pub struct TrialAggregator {
    coverage_sigma: f64,
    bins: Vec<BinAccumulator>,
    chi_square: RunningStats,
    chi_square_cov: RunningStats,
    n_successful: usize,
    failures: Vec<TrialFailure>,
    algorithm: String,
    config: Option<RunConfig>,
    n_trials_requested: usize,
    cancelled: bool,
    report: Option<ReportModel>,
}

impl TrialAggregator {
    /// Empty aggregator for `n_bins` truth bins.
    pub fn new(n_bins: usize, coverage_sigma: f64) -> Self {
        Self {
            coverage_sigma,
            bins: vec![BinAccumulator::default(); n_bins],
            chi_square: RunningStats::new(),
            chi_square_cov: RunningStats::new(),
            n_successful: 0,
            failures: Vec::new(),
            algorithm: String::new(),
            config: None,
            n_trials_requested: 0,
            cancelled: false,
            report: None,
        }
    }

    /// Attach the run configuration (copied into the report).
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.algorithm = config.algorithm.name.clone();
        self.config = Some(config);
        self
    }

    /// Add `n` to the number of trials this aggregator is meant to cover.
    ///
    /// Merging sums these counts, so each partial aggregator should announce only
    /// its own share.
    pub fn expect_trials(&mut self, n: usize) {
        self.n_trials_requested += n;
    }

    /// Number of truth bins.
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    /// Successful plus failed trials seen so far.
    pub fn n_trials(&self) -> usize {
        self.n_successful + self.failures.len()
    }

    /// `true` once [`finalize`](Self::finalize) has been called.
    pub fn is_finalized(&self) -> bool {
        self.report.is_some()
    }

    fn ensure_open(&self, what: &str) -> Result<()> {
        if self.is_finalized() {
            return Err(Error::State(format!("cannot {what}: aggregator already finalized")));
        }
        Ok(())
    }

    /// Add one successful trial.
    pub fn accumulate(&mut self, diagnostics: &TrialDiagnostics) -> Result<()> {
        self.ensure_open("accumulate")?;
        if diagnostics.bins.len() != self.bins.len() {
            return Err(Error::State(format!(
                "trial {} has {} bins, aggregator has {}",
                diagnostics.trial_index,
                diagnostics.bins.len(),
                self.bins.len()
            )));
        }
        for (acc, bin) in self.bins.iter_mut().zip(&diagnostics.bins) {
            acc.truth.push(bin.truth);
            acc.estimate.push(bin.estimate);
            acc.residual.push(bin.residual);
            acc.uncertainty.push(bin.uncertainty);
            match bin.pull {
                Some(p) => {
                    acc.pull.push(p);
                    if p.abs() <= self.coverage_sigma {
                        acc.covered += 1;
                    }
                }
                None => acc.undefined_pulls += 1,
            }
            if let Some(c) = bin.chi_square {
                acc.chi_square.push(c);
            }
        }
        self.chi_square.push(diagnostics.chi_square_diag);
        if let Some(c) = diagnostics.chi_square_cov {
            self.chi_square_cov.push(c);
        }
        self.n_successful += 1;
        Ok(())
    }

    /// Count one failed trial.
    pub fn record_failure(&mut self, failure: TrialFailure) -> Result<()> {
        self.ensure_open("record a failure")?;
        self.failures.push(failure);
        Ok(())
    }

    /// Dispatch on the outcome.
    pub fn accept(&mut self, outcome: TrialOutcome) -> Result<()> {
        match outcome {
            TrialOutcome::Success(d) => self.accumulate(&d),
            TrialOutcome::Failure(f) => self.record_failure(f),
        }
    }

    /// Fold another partial aggregator (over disjoint trials) into this one.
    pub fn merge(&mut self, other: TrialAggregator) -> Result<()> {
        self.ensure_open("merge")?;
        if other.is_finalized() {
            return Err(Error::State("cannot merge a finalized aggregator".to_string()));
        }
        if other.bins.len() != self.bins.len() {
            return Err(Error::State(format!(
                "cannot merge aggregators with {} and {} bins",
                self.bins.len(),
                other.bins.len()
            )));
        }
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            a.merge(b);
        }
        self.chi_square.merge(&other.chi_square);
        self.chi_square_cov.merge(&other.chi_square_cov);
        self.n_successful += other.n_successful;
        self.n_trials_requested += other.n_trials_requested;
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
        Ok(())
    }

    /// Record that the run stopped before every requested trial ran.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Produce the report.
    ///
    /// The first call freezes the aggregator; later calls return the same report.
    /// Fails with [`Error::State`] if no trial has completed.
    pub fn finalize(&mut self) -> Result<ReportModel> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        if self.n_trials() == 0 {
            return Err(Error::State("no trial has completed; nothing to report".to_string()));
        }

        self.failures.sort_by_key(|f| f.trial_index);
        let mut failure_counts = BTreeMap::new();
        for f in &self.failures {
            *failure_counts.entry(f.kind).or_insert(0) += 1;
        }

        let bins: Vec<BinReport> = self
            .bins
            .iter()
            .enumerate()
            .map(|(index, acc)| BinReport {
                index,
                mean_truth: acc.truth.mean().unwrap_or(0.0),
                mean_estimate: acc.estimate.mean().unwrap_or(0.0),
                mean_residual: acc.residual.mean().unwrap_or(0.0),
                residual_std_dev: acc.residual.std_dev(),
                mean_uncertainty: acc.uncertainty.mean().unwrap_or(0.0),
                mean_pull: acc.pull.mean(),
                pull_std_dev: acc.pull.std_dev(),
                pull_count: acc.pull.count(),
                undefined_pull_count: acc.undefined_pulls,
                coverage_fraction: fraction(acc.covered, acc.pull.count()),
                chi_square_mean: acc.chi_square.mean(),
            })
            .collect();

        let covered: u64 = self.bins.iter().map(|b| b.covered).sum();
        let defined: u64 = self.bins.iter().map(|b| b.pull.count()).sum();
        let undefined: u64 = self.bins.iter().map(|b| b.undefined_pulls).sum();
        if undefined > 0 {
            log::warn!(
                "{undefined} of {} (trial, bin) pulls undefined (uncertainty zero or below threshold); excluded from pull statistics",
                undefined + defined
            );
        }

        let n_trials_completed = self.n_trials();
        let report = ReportModel {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            config: self.config.clone(),
            algorithm: self.algorithm.clone(),
            n_trials_requested: self.n_trials_requested.max(n_trials_completed),
            n_trials_completed,
            n_successful: self.n_successful,
            failed_trial_count: self.failures.len(),
            failure_counts,
            failures: self.failures.clone(),
            cancelled: self.cancelled,
            ndf: self.bins.len(),
            coverage_sigma: self.coverage_sigma,
            bins,
            coverage_fraction: fraction(covered, defined),
            chi_square_sum: self.chi_square.sum(),
            chi_square_mean: self.chi_square.mean(),
            chi_square_std_dev: self.chi_square.std_dev(),
            chi_square_cov_mean: self.chi_square_cov.mean(),
        };
        self.report = Some(report.clone());
        Ok(report)
    }
}

fn fraction(k: u64, n: u64) -> f64 {
    if n == 0 { 0.0 } else { k as f64 / n as f64 }
}
