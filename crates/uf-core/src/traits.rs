//! Core traits for the harness
//!
//! The harness depends only on these seams: it never knows how a density is
//! parameterised or how an unfolding method works internally.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::RngCore;

use crate::{Error, Histogram, ResponseModel, Result, UnfoldingResult};

/// Opaque algorithm options, passed through from the run configuration.
pub type AlgorithmOptions = BTreeMap<String, serde_json::Value>;

/// Per-call context handed to an [`UnfoldingAlgorithm`].
#[derive(Debug, Clone, Copy)]
pub struct UnfoldContext<'a> {
    /// Algorithm-specific options (e.g. number of iterations).
    pub options: &'a AlgorithmOptions,
    /// Wall-clock deadline for the call, if the run configures a timeout.
    pub deadline: Option<Instant>,
}

impl<'a> UnfoldContext<'a> {
    /// Context without a deadline.
    pub fn new(options: &'a AlgorithmOptions) -> Self {
        Self { options, deadline: None }
    }

    /// Context with an optional deadline.
    pub fn with_deadline(options: &'a AlgorithmOptions, deadline: Option<Instant>) -> Self {
        Self { options, deadline }
    }

    /// `Err(Error::Timeout)` once the deadline has passed. Iterative methods call this between steps.
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(d) if Instant::now() >= d => {
                Err(Error::Timeout("deadline exceeded during unfolding".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Non-negative integer option, or `default` if absent.
    pub fn option_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.options.get(key) {
            None => Ok(default),
            Some(v) => v.as_u64().map(|x| x as usize).ok_or_else(|| {
                Error::Configuration(format!("option '{key}' must be a non-negative integer, got {v}"))
            }),
        }
    }

    /// Floating-point option, or `default` if absent.
    pub fn option_f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.options.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| Error::Configuration(format!("option '{key}' must be a number, got {v}"))),
        }
    }
}

/// The unfolding algorithm under test.
///
/// Given the response and one measured histogram, return an estimate of the truth
/// histogram with per-bin uncertainties. Failures are reported as
/// [`Error::Unfolding`] (or [`Error::Timeout`]) and only invalidate the current trial.
pub trait UnfoldingAlgorithm: Send + Sync {
    /// Short identifier (e.g. `"bayes"`).
    fn name(&self) -> &str;

    /// Called once before the first trial. Reject responses or options the method
    /// cannot work with; errors here abort the run as configuration errors.
    fn prepare(&self, _response: &ResponseModel, _options: &AlgorithmOptions) -> Result<()> {
        Ok(())
    }

    /// Unfold `measured` through `response`.
    ///
    /// Honouring `ctx.deadline` is part of the contract: the harness cannot
    /// preempt a call, so any method that may run long (iterations, scans, fits)
    /// must call [`UnfoldContext::check_deadline`] between steps and return its
    /// [`Error::Timeout`]. Calls that overrun without checking are still counted as
    /// timeouts once they return.
    fn unfold(
        &self,
        response: &ResponseModel,
        measured: &Histogram,
        ctx: &UnfoldContext<'_>,
    ) -> Result<UnfoldingResult>;
}

/// A one-dimensional probability density used to generate truth values.
pub trait TruthDensity: Send + Sync {
    /// Short identifier (e.g. `"gaussian"`).
    fn name(&self) -> &str;

    /// Density at `x` (unnormalised densities are fine; only ratios and CDF differences are used).
    fn pdf(&self, x: f64) -> f64;

    /// Cumulative distribution at `x`.
    fn cdf(&self, x: f64) -> f64;

    /// Draw one value.
    fn sample(&self, rng: &mut dyn RngCore) -> f64;
}
