//! Run orchestration: build everything once, then schedule trials.
//!
//! Trial `i` always draws from `StdRng::seed_from_u64(seed.wrapping_add(i))`, so
//! results do not depend on the scheduling mode or the number of worker threads.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::SeedableRng;
use rayon::prelude::*;
use uf_core::{Error, ResponseModel, Result, UnfoldingAlgorithm};

use crate::aggregate::TrialAggregator;
use crate::algorithms::build_algorithm;
use crate::config::RunConfig;
use crate::report::ReportModel;
use crate::response::{Detector, build_response};
use crate::sampler::{Sampler, ToyDataset};
use crate::trial::{DiagnosticSettings, TrialOutput, TrialRunner};

/// Cooperative cancellation flag, checked before each trial.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Trials already running finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Report plus retained toys (when `keep_toys` is set).
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Final report.
    pub report: ReportModel,
    /// Toys in trial order, if requested.
    pub toys: Option<Vec<ToyDataset>>,
}

/// Partial result over a set of trials.
struct Partial {
    aggregator: TrialAggregator,
    toys: Vec<ToyDataset>,
}

impl Partial {
    fn absorb(&mut self, output: TrialOutput) -> Result<()> {
        if let Some(toy) = output.toy {
            self.toys.push(toy);
        }
        self.aggregator.accept(output.outcome)
    }

    fn merge(&mut self, other: Partial) -> Result<()> {
        self.toys.extend(other.toys);
        self.aggregator.merge(other.aggregator)
    }
}

/// A configured run: response, sampler and algorithm built once and shared read-only by all trials.
pub struct Harness {
    config: RunConfig,
    response: ResponseModel,
    sampler: Sampler,
    algorithm: Box<dyn UnfoldingAlgorithm>,
}

impl Harness {
    /// Build a run using one of the reference algorithms, selected by `config.algorithm.name`.
    pub fn new(config: RunConfig) -> Result<Self> {
        let algorithm = build_algorithm(&config.algorithm.name)?;
        Self::with_algorithm(config, algorithm)
    }

    /// Build a run around a caller-supplied algorithm.
    ///
    /// Every configuration problem surfaces here as [`Error::Configuration`], before any trial runs.
    pub fn with_algorithm(config: RunConfig, algorithm: Box<dyn UnfoldingAlgorithm>) -> Result<Self> {
        config.validate()?;
        let truth = config.truth_binning.build()?;
        let measured = config.measured_binning.build()?;
        let detector = Detector {
            efficiency: config.response.efficiency.clone(),
            smearing: config.response.smearing.clone(),
        };

        let training = config.training_pdf().build(truth.lo(), truth.hi())?;
        let response = build_response(
            &detector,
            &truth,
            &measured,
            training.as_ref(),
            config.response.integration_points,
        )?;

        let density = config.truth_pdf.build(truth.lo(), truth.hi())?;
        let sampler = Sampler::new(truth, density, detector, config.sample_size, config.generation)?;
        sampler.check_compatible(&response)?;

        algorithm.prepare(&response, &config.algorithm.options).map_err(|e| match e {
            Error::Configuration(_) => e,
            other => Error::Configuration(format!(
                "algorithm '{}' rejected the configuration: {other}",
                algorithm.name()
            )),
        })?;

        log::info!(
            "configured '{}': {} trials, {} truth / {} measured bins",
            algorithm.name(),
            config.n_trials,
            response.n_truth(),
            response.n_measured()
        );
        Ok(Self { config, response, sampler, algorithm })
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The shared response.
    pub fn response(&self) -> &ResponseModel {
        &self.response
    }

    /// The toy sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Run every configured trial.
    pub fn run(&self) -> Result<RunOutput> {
        self.run_with_cancel(&CancelToken::new())
    }

    /// Run every configured trial, stopping early once `cancel` is set.
    ///
    /// A cancelled run still reports the trials that completed; it fails with
    /// [`Error::State`] only if none did.
    pub fn run_with_cancel(&self, cancel: &CancelToken) -> Result<RunOutput> {
        let mut partial = self.run_partial(0..self.config.n_trials, cancel)?;
        let report = partial.aggregator.finalize()?;

        if report.failed_trial_count > 0 {
            log::warn!(
                "{} of {} trials failed ({:?})",
                report.failed_trial_count,
                report.n_trials_completed,
                report.failure_counts
            );
        }
        if report.cancelled {
            log::warn!(
                "run cancelled after {} of {} trials",
                report.n_trials_completed,
                report.n_trials_requested
            );
        }

        let toys = self.config.keep_toys.then(|| {
            let mut toys = partial.toys;
            toys.sort_by_key(|t| t.trial_index);
            toys
        });
        Ok(RunOutput { report, toys })
    }

    /// Aggregate a sub-range of trial indices without finalizing.
    ///
    /// Aggregators from disjoint ranges can be merged and then finalized; the
    /// result equals a single pass over the union. Each aggregator counts only
    /// `trials.len()` as requested.
    pub fn aggregate_range(&self, trials: Range<usize>, cancel: &CancelToken) -> Result<TrialAggregator> {
        Ok(self.run_partial(trials, cancel)?.aggregator)
    }

    fn empty_partial(&self) -> Partial {
        Partial {
            aggregator: TrialAggregator::new(self.response.n_truth(), self.config.coverage_sigma)
                .with_config(self.config.clone()),
            toys: Vec::new(),
        }
    }

    fn run_trial(&self, trial_index: usize) -> TrialOutput {
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.config.seed.wrapping_add(trial_index as u64));
        TrialRunner::new(
            &self.response,
            &self.sampler,
            self.algorithm.as_ref(),
            &self.config.algorithm.options,
        )
        .with_settings(DiagnosticSettings { min_uncertainty: self.config.min_uncertainty })
        .with_timeout(self.config.timeout_ms.map(Duration::from_millis))
        .keep_toys(self.config.keep_toys)
        .run_one(trial_index, &mut rng)
    }

    fn step(&self, mut part: Partial, trial_index: usize, cancel: &CancelToken) -> Result<Partial> {
        if cancel.is_cancelled() {
            part.aggregator.mark_cancelled();
            return Ok(part);
        }
        part.absorb(self.run_trial(trial_index))?;
        Ok(part)
    }

    fn run_partial(&self, trials: Range<usize>, cancel: &CancelToken) -> Result<Partial> {
        let requested = trials.len();
        let mut part = self.schedule(trials, cancel)?;
        part.aggregator.expect_trials(requested);
        Ok(part)
    }

    fn schedule(&self, trials: Range<usize>, cancel: &CancelToken) -> Result<Partial> {
        if self.config.threads == 1 {
            let mut part = self.empty_partial();
            for i in trials {
                if cancel.is_cancelled() {
                    part.aggregator.mark_cancelled();
                    break;
                }
                part.absorb(self.run_trial(i))?;
            }
            return Ok(part);
        }

        let run_parallel = || {
            trials
                .clone()
                .into_par_iter()
                .try_fold(|| self.empty_partial(), |part, i| self.step(part, i, cancel))
                .try_reduce(
                    || self.empty_partial(),
                    |mut a, b| {
                        a.merge(b)?;
                        Ok(a)
                    },
                )
        };

        if self.config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;
            pool.install(run_parallel)
        } else {
            run_parallel()
        }
    }
}

/// Build and run one configuration with a reference algorithm.
pub fn run(config: &RunConfig) -> Result<RunOutput> {
    Harness::new(config.clone())?.run()
}

/// [`run`] with a cancellation token.
pub fn run_with_cancel(config: &RunConfig, cancel: &CancelToken) -> Result<RunOutput> {
    Harness::new(config.clone())?.run_with_cancel(cancel)
}

/// Run several configurations back to back, each with fresh state.
///
/// Stops at the first configuration error.
pub fn run_many(configs: &[RunConfig]) -> Result<Vec<ReportModel>> {
    configs.iter().map(|c| run(c).map(|out| out.report)).collect()
}
