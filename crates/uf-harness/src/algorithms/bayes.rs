//! Iterative Bayesian (D'Agostini) unfolding.

use uf_core::{
    AlgorithmOptions, Error, Histogram, ResponseModel, Result, UnfoldContext, UnfoldingAlgorithm,
    UnfoldingResult,
};

use super::{check_measured, propagate_poisson};

/// Default number of iterations.
pub const DEFAULT_ITERATIONS: usize = 4;

/// Iterative Bayesian unfolding starting from the response's training prior.
///
/// Options:
/// - `iterations` (integer >= 1, default 4)
///
/// The covariance treats the final unfolding matrix as fixed and propagates the
/// Poisson variance of the measured bins through it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bayes;

fn iterations(ctx: &UnfoldContext<'_>) -> Result<usize> {
    let n = ctx.option_usize("iterations", DEFAULT_ITERATIONS)?;
    if n == 0 {
        return Err(Error::Configuration("bayes: iterations must be >= 1".to_string()));
    }
    Ok(n)
}

impl UnfoldingAlgorithm for Bayes {
    fn name(&self) -> &str {
        "bayes"
    }

    fn prepare(&self, _response: &ResponseModel, options: &AlgorithmOptions) -> Result<()> {
        iterations(&UnfoldContext::new(options)).map(|_| ())
    }

    fn unfold(
        &self,
        response: &ResponseModel,
        measured: &Histogram,
        ctx: &UnfoldContext<'_>,
    ) -> Result<UnfoldingResult> {
        check_measured(response, measured)?;
        let n_iter = iterations(ctx).map_err(|e| Error::Unfolding(e.to_string()))?;
        let (n_t, n_m) = (response.n_truth(), response.n_measured());
        let m = measured.counts();
        let eff: Vec<f64> = (0..n_t).map(|j| response.efficiency(j)).collect();

        let mut prior = response.prior().to_vec();
        let mut estimate = vec![0.0; n_t];
        // Row-major n_t × n_m: estimate = unfold · m.
        let mut unfold = vec![0.0; n_t * n_m];

        for _ in 0..n_iter {
            ctx.check_deadline()?;

            let folded = response.fold(&prior)?;
            unfold.fill(0.0);
            for j in 0..n_t {
                if eff[j] <= 0.0 {
                    continue;
                }
                for i in 0..n_m {
                    if folded[i] > 0.0 {
                        unfold[j * n_m + i] =
                            response.probability(i, j) * prior[j] / (folded[i] * eff[j]);
                    }
                }
            }

            for (j, e) in estimate.iter_mut().enumerate() {
                *e = unfold[j * n_m..(j + 1) * n_m].iter().zip(m).map(|(u, mi)| u * mi).sum();
            }

            let total: f64 = estimate.iter().sum();
            if !total.is_finite() {
                return Err(Error::Unfolding("bayes: estimate diverged".to_string()));
            }
            if total <= 0.0 {
                // Empty measurement: nothing to update the prior with.
                break;
            }
            for (p, &e) in prior.iter_mut().zip(&estimate) {
                *p = e / total;
            }
        }

        let covariance = propagate_poisson(&unfold, n_t, m);
        Ok(UnfoldingResult::from_covariance(estimate, covariance))
    }
}
