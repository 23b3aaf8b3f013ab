//! Identity "unfolding": returns the measured histogram as the estimate.

use uf_core::{
    AlgorithmOptions, Histogram, ResponseModel, Result, UnfoldContext, UnfoldingAlgorithm,
    UnfoldingResult,
};

use super::{check_measured, require_square};

/// Echoes the measured counts with zero reported uncertainty.
///
/// Useful as a bookkeeping baseline: with an ideal detector every residual is zero
/// and every pull is undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl UnfoldingAlgorithm for PassThrough {
    fn name(&self) -> &str {
        "passthrough"
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
        let estimate = measured.counts().to_vec();
        let uncertainties = vec![0.0; estimate.len()];
        Ok(UnfoldingResult::new(estimate, uncertainties))
    }
}
