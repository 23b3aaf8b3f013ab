//! Response construction from an efficiency curve and a smearing kernel.

use uf_core::{Binning, Error, ResponseModel, Result, TruthDensity};
use uf_prob::{Efficiency, Smearing, bin_probabilities};

/// Efficiency + smearing: everything needed to go from a true value to a measured one.
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    /// Probability of observing an event as a function of its true value.
    pub efficiency: Efficiency,
    /// Migration of the observed value.
    pub smearing: Smearing,
}

impl Detector {
    /// Perfect detector: full efficiency, no smearing.
    pub fn ideal() -> Self {
        Self { efficiency: Efficiency::Constant { value: 1.0 }, smearing: Smearing::None }
    }
}

/// Build the binned response by integrating the detector model over each truth bin.
///
/// Inside truth bin `[a, b)` the true value is weighted by `training` on a
/// `points`-point midpoint grid (uniform weights where the density vanishes).
/// Probability migrating outside the measured range counts as not observed.
pub fn build_response(
    detector: &Detector,
    truth: &Binning,
    measured: &Binning,
    training: &dyn TruthDensity,
    points: usize,
) -> Result<ResponseModel> {
    if points == 0 {
        return Err(Error::Configuration("integration points must be > 0".to_string()));
    }
    detector.efficiency.validate()?;
    detector.smearing.validate()?;

    let (t_lo, t_hi) = (truth.lo(), truth.hi());
    let n_meas = measured.n_bins();
    let mut table = Vec::with_capacity(truth.n_bins());

    for j in 0..truth.n_bins() {
        let (a, b) = truth.bin_range(j);
        let h = (b - a) / points as f64;
        let grid: Vec<f64> = (0..points).map(|k| a + (k as f64 + 0.5) * h).collect();
        let mut weights: Vec<f64> = grid
            .iter()
            .map(|&x| {
                let w = training.pdf(x);
                if w.is_finite() && w > 0.0 { w } else { 0.0 }
            })
            .collect();
        let mut w_sum: f64 = weights.iter().sum();
        if w_sum <= 0.0 {
            weights.fill(1.0);
            w_sum = points as f64;
        }

        let mut row = vec![0.0; n_meas];
        for (&x, &w) in grid.iter().zip(&weights) {
            if w == 0.0 {
                continue;
            }
            let eff = detector.efficiency.eval(x, t_lo, t_hi);
            if eff == 0.0 {
                continue;
            }
            for (i, p) in row.iter_mut().enumerate() {
                let (lo, hi) = measured.bin_range(i);
                *p += w * eff * detector.smearing.probability_in(x, lo, hi);
            }
        }
        for p in &mut row {
            *p /= w_sum;
        }
        table.push(row);
    }

    let prior = bin_probabilities(training, truth)?;
    let response =
        ResponseModel::from_probabilities(truth.clone(), measured.clone(), table, Some(prior))?;
    log::debug!(
        "built {}x{} response, max normalization deviation {:e}",
        response.n_truth(),
        response.n_measured(),
        response.normalization_deviation()
    );
    Ok(response)
}
