//! Binned detector response: per-truth-bin distribution over measured bins plus non-observation.
//!
//! The response is built once per run and shared read-only by every trial.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::{Binning, Error, Result};

/// Tolerance on `Σ_i P(i|j) + P(miss|j) = 1`.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-9;

/// Distribution of one truth bin over `{measured bins} ∪ {not observed}`.
#[derive(Debug, Clone, Copy)]
pub struct Conditional<'a> {
    /// `P(measured bin i | truth bin j)` for every measured bin.
    pub observed: &'a [f64],
    /// `P(not observed | truth bin j)`, including migration out of the measured range.
    pub missed: f64,
}

impl Conditional<'_> {
    /// Total probability (should be 1 within [`NORMALIZATION_TOLERANCE`]).
    pub fn total(&self) -> f64 {
        self.observed.iter().sum::<f64>() + self.missed
    }
}

/// Immutable truth × measured probability table.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseModel {
    truth: Binning,
    measured: Binning,
    /// Row-major `[truth][measured]`.
    table: Vec<f64>,
    missed: Vec<f64>,
    /// Normalized truth-bin probabilities of the training sample.
    prior: Vec<f64>,
}

impl ResponseModel {
    /// Build from explicit conditional probabilities `table[j][i] = P(measured i | truth j)`.
    ///
    /// Non-observation is the complement of each row. `prior` defaults to uniform.
    /// Fails with [`Error::Configuration`] if a row is not a valid sub-distribution.
    pub fn from_probabilities(
        truth: Binning,
        measured: Binning,
        table: Vec<Vec<f64>>,
        prior: Option<Vec<f64>>,
    ) -> Result<Self> {
        let n_truth = truth.n_bins();
        let n_meas = measured.n_bins();
        if table.len() != n_truth {
            return Err(Error::Configuration(format!(
                "response has {} truth rows, truth binning has {n_truth} bins",
                table.len()
            )));
        }

        let mut flat = Vec::with_capacity(n_truth * n_meas);
        let mut missed = Vec::with_capacity(n_truth);
        for (j, row) in table.iter().enumerate() {
            if row.len() != n_meas {
                return Err(Error::Configuration(format!(
                    "response row {j} has {} entries, measured binning has {n_meas} bins",
                    row.len()
                )));
            }
            if let Some(&p) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(Error::Configuration(format!(
                    "response row {j} contains invalid probability {p}"
                )));
            }
            let observed: f64 = row.iter().sum();
            if observed > 1.0 + NORMALIZATION_TOLERANCE {
                return Err(Error::Configuration(format!(
                    "response row {j} sums to {observed}, exceeding 1 by more than {NORMALIZATION_TOLERANCE}"
                )));
            }
            flat.extend_from_slice(row);
            missed.push((1.0 - observed).max(0.0));
        }

        let prior = match prior {
            Some(p) => normalize_prior(p, n_truth)?,
            None => vec![1.0 / n_truth as f64; n_truth],
        };

        let model = Self { truth, measured, table: flat, missed, prior };
        let worst = model.normalization_deviation();
        if worst > NORMALIZATION_TOLERANCE {
            return Err(Error::Configuration(format!(
                "response normalization violated: max |Σp - 1| = {worst:e}"
            )));
        }
        Ok(model)
    }

    /// Truth binning.
    pub fn truth_binning(&self) -> &Binning {
        &self.truth
    }

    /// Measured binning.
    pub fn measured_binning(&self) -> &Binning {
        &self.measured
    }

    /// Number of truth bins.
    pub fn n_truth(&self) -> usize {
        self.truth.n_bins()
    }

    /// Number of measured bins.
    pub fn n_measured(&self) -> usize {
        self.measured.n_bins()
    }

    /// Distribution of truth bin `j` over measured bins and non-observation.
    pub fn conditional(&self, j: usize) -> Conditional<'_> {
        let n = self.n_measured();
        Conditional { observed: &self.table[j * n..(j + 1) * n], missed: self.missed[j] }
    }

    /// `P(measured i | truth j)`.
    pub fn probability(&self, measured: usize, truth: usize) -> f64 {
        self.table[truth * self.n_measured() + measured]
    }

    /// Probability that an event in truth bin `j` lands in any measured bin.
    pub fn efficiency(&self, j: usize) -> f64 {
        1.0 - self.missed[j]
    }

    /// Training truth distribution (sums to 1).
    pub fn prior(&self) -> &[f64] {
        &self.prior
    }

    /// Response matrix `R[(i, j)] = P(measured i | truth j)` (measured × truth).
    pub fn as_matrix(&self) -> DMatrix<f64> {
        let (n_meas, n_truth) = (self.n_measured(), self.n_truth());
        DMatrix::from_fn(n_meas, n_truth, |i, j| self.table[j * n_meas + i])
    }

    /// Expected measured content for a truth content vector: `R · truth`.
    pub fn fold(&self, truth: &[f64]) -> Result<Vec<f64>> {
        if truth.len() != self.n_truth() {
            return Err(Error::Validation(format!(
                "fold: expected {} truth bins, got {}",
                self.n_truth(),
                truth.len()
            )));
        }
        let n_meas = self.n_measured();
        let mut out = vec![0.0; n_meas];
        for (j, &t) in truth.iter().enumerate() {
            let row = &self.table[j * n_meas..(j + 1) * n_meas];
            for (o, &p) in out.iter_mut().zip(row) {
                *o += p * t;
            }
        }
        Ok(out)
    }

    /// Largest `|Σ_i P(i|j) + P(miss|j) - 1|` over truth bins.
    pub fn normalization_deviation(&self) -> f64 {
        (0..self.n_truth())
            .map(|j| (self.conditional(j).total() - 1.0).abs())
            .fold(0.0, f64::max)
    }
}

fn normalize_prior(prior: Vec<f64>, n_truth: usize) -> Result<Vec<f64>> {
    if prior.len() != n_truth {
        return Err(Error::Configuration(format!(
            "response prior has {} bins, truth binning has {n_truth}",
            prior.len()
        )));
    }
    if prior.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(Error::Configuration("response prior must be finite and >= 0".to_string()));
    }
    let sum: f64 = prior.iter().sum();
    if sum <= 0.0 {
        return Err(Error::Configuration("response prior has zero total weight".to_string()));
    }
    Ok(prior.into_iter().map(|p| p / sum).collect())
}
