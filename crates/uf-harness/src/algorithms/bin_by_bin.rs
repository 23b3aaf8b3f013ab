//! Bin-by-bin correction factors.

use uf_core::{
    AlgorithmOptions, Histogram, ResponseModel, Result, UnfoldContext, UnfoldingAlgorithm,
    UnfoldingResult,
};

use super::{check_measured, require_square};

/// `estimate_j = c_j * m_j` with `c_j = π_j / (R π)_j` from the training prior `π`.
///
/// Uncertainty is the scaled Poisson error `c_j * sqrt(m_j)`. Bins with no folded
/// training content get a zero estimate and zero uncertainty.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinByBin;

impl BinByBin {
    /// Correction factors for a (square) response.
    pub fn factors(response: &ResponseModel) -> Result<Vec<f64>> {
        let prior = response.prior();
        let folded = response.fold(prior)?;
        Ok(prior
            .iter()
            .zip(&folded)
            .map(|(&p, &f)| if f > 0.0 { p / f } else { 0.0 })
            .collect())
    }
}

impl UnfoldingAlgorithm for BinByBin {
    fn name(&self) -> &str {
        "bin_by_bin"
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
        let factors = Self::factors(response)?;
        let (estimate, uncertainties) = factors
            .iter()
            .zip(measured.counts())
            .map(|(&c, &m)| (c * m, c * m.sqrt()))
            .unzip();
        Ok(UnfoldingResult::new(estimate, uncertainties))
    }
}
