//! Common data types: binnings, histograms and unfolding results.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Relative tolerance used when comparing two binnings edge by edge.
const EDGE_RTOL: f64 = 1e-12;

/// A 1D binning defined by strictly increasing, finite edges.
///
/// Bins are half-open `[edge_i, edge_{i+1})`; values outside `[lo, hi)` belong to no bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Binning {
    edges: Vec<f64>,
}

impl Binning {
    /// `n_bins` equal-width bins on `[lo, hi)`.
    pub fn uniform(n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Configuration("binning must have at least one bin".to_string()));
        }
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(Error::Configuration(format!(
                "binning range must be finite with lo < hi, got ({lo}, {hi})"
            )));
        }
        let width = (hi - lo) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        Ok(Self { edges })
    }

    /// Variable-width binning from explicit edges.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Configuration(format!(
                "binning needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(Error::Configuration(format!("binning edge must be finite, got {bad}")));
        }
        if let Some(w) = edges.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Configuration(format!(
                "binning edges must be strictly increasing, got {} followed by {}",
                w[0], w[1]
            )));
        }
        Ok(Self { edges })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lower edge of the first bin.
    pub fn lo(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    pub fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// All bin edges (`n_bins + 1` values).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// `(low, high)` edges of bin `i`.
    pub fn bin_range(&self, i: usize) -> (f64, f64) {
        (self.edges[i], self.edges[i + 1])
    }

    /// Width of bin `i`.
    pub fn width(&self, i: usize) -> f64 {
        self.edges[i + 1] - self.edges[i]
    }

    /// Center of bin `i`.
    pub fn center(&self, i: usize) -> f64 {
        0.5 * (self.edges[i] + self.edges[i + 1])
    }

    /// Bin index containing `x`, or `None` if `x` is outside `[lo, hi)` or NaN.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        let idx = self.edges.partition_point(|&e| e <= x);
        if idx == 0 || idx > self.n_bins() { None } else { Some(idx - 1) }
    }

    /// `true` if both binnings have the same bin count and edges (to a tight relative tolerance).
    pub fn matches(&self, other: &Binning) -> bool {
        self.edges.len() == other.edges.len()
            && self.edges.iter().zip(&other.edges).all(|(&a, &b)| {
                (a - b).abs() <= EDGE_RTOL * a.abs().max(b.abs()).max(1.0)
            })
    }
}

impl TryFrom<Vec<f64>> for Binning {
    type Error = Error;

    fn try_from(edges: Vec<f64>) -> Result<Self> {
        Self::from_edges(edges)
    }
}

impl From<Binning> for Vec<f64> {
    fn from(binning: Binning) -> Self {
        binning.edges
    }
}

/// A binned histogram of (possibly non-integer) counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    binning: Binning,
    counts: Vec<f64>,
}

impl Histogram {
    /// Empty histogram over `binning`.
    pub fn zeros(binning: Binning) -> Self {
        let n = binning.n_bins();
        Self { binning, counts: vec![0.0; n] }
    }

    /// Histogram with explicit per-bin counts.
    pub fn from_counts(binning: Binning, counts: Vec<f64>) -> Result<Self> {
        if counts.len() != binning.n_bins() {
            return Err(Error::Validation(format!(
                "histogram counts length mismatch: expected {}, got {}",
                binning.n_bins(),
                counts.len()
            )));
        }
        Ok(Self { binning, counts })
    }

    /// The bin layout.
    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    /// Per-bin counts.
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Sum of all bin counts.
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Add `weight` to bin `i`.
    pub fn add(&mut self, i: usize, weight: f64) {
        self.counts[i] += weight;
    }

    /// Fill one unit-weight entry at `x`. Returns `false` if `x` is outside the binning.
    pub fn fill(&mut self, x: f64) -> bool {
        match self.binning.find_bin(x) {
            Some(i) => {
                self.counts[i] += 1.0;
                true
            }
            None => false,
        }
    }
}

/// Result of one unfolding: estimated truth, per-bin uncertainties and optional covariance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfoldingResult {
    /// Estimated truth content per truth bin.
    pub estimate: Vec<f64>,

    /// Per-bin standard deviation of the estimate.
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N), if the algorithm provides one.
    pub covariance: Option<Vec<f64>>,
}

impl UnfoldingResult {
    /// Create a result without covariance.
    pub fn new(estimate: Vec<f64>, uncertainties: Vec<f64>) -> Self {
        Self { estimate, uncertainties, covariance: None }
    }

    /// Create a result from an estimate and a full covariance; uncertainties are `sqrt(diag)`.
    ///
    /// Tiny negative diagonal entries from rounding are clamped to zero. A NaN
    /// diagonal stays NaN so that [`validate`](Self::validate) rejects it.
    pub fn from_covariance(estimate: Vec<f64>, covariance: Vec<f64>) -> Self {
        let n = estimate.len();
        let uncertainties = (0..n)
            .map(|i| {
                let d = covariance.get(i * n + i).copied().unwrap_or(f64::NAN);
                if d < 0.0 { 0.0 } else { d.sqrt() }
            })
            .collect();
        Self { estimate, uncertainties, covariance: Some(covariance) }
    }

    /// Number of truth bins covered by the result.
    pub fn n_bins(&self) -> usize {
        self.estimate.len()
    }

    /// Check the result against the expected truth binning.
    ///
    /// Layout must match exactly, estimates and covariance entries must be finite and
    /// uncertainties non-negative.
    pub fn validate(&self, truth: &Binning) -> Result<()> {
        let n = truth.n_bins();
        if self.estimate.len() != n {
            return Err(Error::Unfolding(format!(
                "estimate has {} bins, truth binning has {n}",
                self.estimate.len()
            )));
        }
        if self.uncertainties.len() != n {
            return Err(Error::Unfolding(format!(
                "uncertainties have {} bins, truth binning has {n}",
                self.uncertainties.len()
            )));
        }
        if let Some(i) = self.estimate.iter().position(|v| !v.is_finite()) {
            return Err(Error::Unfolding(format!("estimate in bin {i} is not finite")));
        }
        if let Some(i) = self.uncertainties.iter().position(|&u| u.is_nan() || u < 0.0) {
            return Err(Error::Unfolding(format!(
                "uncertainty in bin {i} is negative or NaN ({})",
                self.uncertainties[i]
            )));
        }
        if let Some(cov) = &self.covariance {
            if cov.len() != n * n {
                return Err(Error::Unfolding(format!(
                    "covariance has {} entries, expected {}",
                    cov.len(),
                    n * n
                )));
            }
            if let Some(k) = cov.iter().position(|v| !v.is_finite()) {
                return Err(Error::Unfolding(format!(
                    "covariance entry ({}, {}) is not finite",
                    k / n,
                    k % n
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_binning() {
        let b = Binning::uniform(4, 0.0, 2.0).unwrap();
        assert_eq!(b.n_bins(), 4);
        assert_eq!(b.edges(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
        assert!((b.center(1) - 0.75).abs() < 1e-15);
        assert!((b.width(3) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_binning() {
        assert!(Binning::uniform(0, 0.0, 1.0).is_err());
        assert!(Binning::uniform(3, 1.0, 1.0).is_err());
        assert!(Binning::uniform(3, 0.0, f64::INFINITY).is_err());
        assert!(Binning::from_edges(vec![0.0]).is_err());
        assert!(Binning::from_edges(vec![0.0, 1.0, 1.0]).is_err());
        assert!(Binning::from_edges(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_find_bin_half_open() {
        let b = Binning::from_edges(vec![-1.0, 0.0, 2.0, 5.0]).unwrap();
        assert_eq!(b.find_bin(-1.0), Some(0));
        assert_eq!(b.find_bin(-0.5), Some(0));
        assert_eq!(b.find_bin(0.0), Some(1));
        assert_eq!(b.find_bin(4.999), Some(2));
        assert_eq!(b.find_bin(5.0), None);
        assert_eq!(b.find_bin(-1.1), None);
        assert_eq!(b.find_bin(f64::NAN), None);
    }

    #[test]
    fn test_binning_serde_validates() {
        let b: Binning = serde_json::from_str("[0.0, 1.0, 3.0]").unwrap();
        assert_eq!(b.n_bins(), 2);
        assert!(serde_json::from_str::<Binning>("[1.0, 0.0]").is_err());
    }

    #[test]
    fn test_histogram_fill() {
        let mut h = Histogram::zeros(Binning::uniform(2, 0.0, 1.0).unwrap());
        assert!(h.fill(0.1));
        assert!(h.fill(0.9));
        assert!(h.fill(0.95));
        assert!(!h.fill(1.0));
        assert_eq!(h.counts(), &[1.0, 2.0]);
        assert_eq!(h.total(), 3.0);
    }

    #[test]
    fn test_unfolding_result_from_covariance() {
        let r = UnfoldingResult::from_covariance(vec![1.0, 2.0], vec![4.0, 1.0, 1.0, 9.0]);
        assert_eq!(r.uncertainties, vec![2.0, 3.0]);
        let r = UnfoldingResult::from_covariance(vec![1.0, 2.0], vec![-1e-18, 0.0, 0.0, 1.0]);
        assert_eq!(r.uncertainties, vec![0.0, 1.0]);
    }

    #[test]
    fn test_nan_covariance_is_rejected() {
        let truth = Binning::uniform(2, 0.0, 1.0).unwrap();
        let r = UnfoldingResult::from_covariance(vec![1.0, 2.0], vec![f64::NAN, 0.0, 0.0, 1.0]);
        assert!(r.uncertainties[0].is_nan());
        assert!(matches!(r.validate(&truth), Err(Error::Unfolding(_))));

        let off_diagonal =
            UnfoldingResult::from_covariance(vec![1.0, 2.0], vec![1.0, f64::INFINITY, 0.0, 1.0]);
        assert!(matches!(off_diagonal.validate(&truth), Err(Error::Unfolding(_))));
    }

    #[test]
    fn test_unfolding_result_validate() {
        let truth = Binning::uniform(2, 0.0, 1.0).unwrap();
        assert!(UnfoldingResult::new(vec![1.0, 2.0], vec![0.5, 0.0]).validate(&truth).is_ok());
        assert!(UnfoldingResult::new(vec![1.0], vec![0.5]).validate(&truth).is_err());
        assert!(UnfoldingResult::new(vec![1.0, 2.0], vec![0.5, -1.0]).validate(&truth).is_err());
        assert!(UnfoldingResult::new(vec![1.0, f64::NAN], vec![0.5, 1.0]).validate(&truth).is_err());
    }
}
