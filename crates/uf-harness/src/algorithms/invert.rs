//! Direct inversion of the response matrix.

use nalgebra::DVector;
use uf_core::{
    AlgorithmOptions, Error, Histogram, ResponseModel, Result, UnfoldContext, UnfoldingAlgorithm,
    UnfoldingResult,
};

use super::{check_measured, propagate_poisson, require_square};

/// `estimate = R⁻¹ m`, covariance `R⁻¹ diag(m) R⁻ᵀ`.
///
/// Unbiased but with large, anti-correlated fluctuations when the smearing is wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invert;

impl UnfoldingAlgorithm for Invert {
    fn name(&self) -> &str {
        "invert"
    }

    fn prepare(&self, response: &ResponseModel, _options: &AlgorithmOptions) -> Result<()> {
        require_square(self.name(), response)
    }

    fn unfold(
        &self,
        response: &ResponseModel,
        measured: &Histogram,
        _ctx: &UnfoldContext<'_>,
    ) -> Result<UnfoldingResult> {
        check_measured(response, measured)?;
        let n = response.n_truth();
        let inv = response
            .as_matrix()
            .lu()
            .try_inverse()
            .ok_or_else(|| Error::Unfolding("response matrix is singular".to_string()))?;

        let m = DVector::from_column_slice(measured.counts());
        let estimate: Vec<f64> = (&inv * &m).iter().copied().collect();
        if estimate.iter().any(|v| !v.is_finite()) {
            return Err(Error::Unfolding("inverted response produced non-finite estimate".to_string()));
        }

        let u: Vec<f64> = (0..n * n).map(|k| inv[(k / n, k % n)]).collect();
        let covariance = propagate_poisson(&u, n, measured.counts());
        Ok(UnfoldingResult::from_covariance(estimate, covariance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uf_core::Binning;

    fn response(table: Vec<Vec<f64>>) -> ResponseModel {
        let b = Binning::uniform(table.len(), 0.0, 1.0).unwrap();
        ResponseModel::from_probabilities(b.clone(), b, table, None).unwrap()
    }

    #[test]
    fn test_recovers_folded_truth() {
        let r = response(vec![vec![0.8, 0.1], vec![0.2, 0.7]]);
        let truth = [100.0, 300.0];
        let folded = r.fold(&truth).unwrap();
        let m = Histogram::from_counts(r.measured_binning().clone(), folded).unwrap();
        let opts = AlgorithmOptions::new();
        let out = Invert.unfold(&r, &m, &UnfoldContext::new(&opts)).unwrap();
        assert!((out.estimate[0] - 100.0).abs() < 1e-9);
        assert!((out.estimate[1] - 300.0).abs() < 1e-9);
        let cov = out.covariance.as_ref().unwrap();
        assert!((cov[1] - cov[2]).abs() < 1e-9, "covariance must be symmetric");
        assert!(out.uncertainties.iter().all(|&u| u > 0.0));
    }

    #[test]
    fn test_singular_is_unfolding_failure() {
        let r = response(vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
        let m = Histogram::from_counts(r.measured_binning().clone(), vec![10.0, 10.0]).unwrap();
        let opts = AlgorithmOptions::new();
        let err = Invert.unfold(&r, &m, &UnfoldContext::new(&opts)).unwrap_err();
        assert!(matches!(err, Error::Unfolding(_)));
    }

    #[test]
    fn test_rejects_non_square() {
        let t = Binning::uniform(2, 0.0, 1.0).unwrap();
        let m = Binning::uniform(3, 0.0, 1.0).unwrap();
        let r = ResponseModel::from_probabilities(t, m, vec![vec![0.3; 3], vec![0.3; 3]], None)
            .unwrap();
        assert!(matches!(
            Invert.prepare(&r, &AlgorithmOptions::new()),
            Err(Error::Configuration(_))
        ));
    }
}
