//! Toy dataset generation (truth + measured histograms for one trial).

use rand::{Rng, RngCore};
use rand_distr::{Binomial, Distribution, Poisson};
use serde::{Deserialize, Serialize};
use uf_core::{Binning, Error, Histogram, ResponseModel, Result, TruthDensity};
use uf_prob::{bin_probabilities, sample_truncated};

use crate::config::{GenerationMode, SampleSize};
use crate::response::Detector;

/// Minimum truth-range mass for event-by-event generation (rejection sampling budget).
const MIN_EVENT_MODE_MASS: f64 = 1e-4;

/// Rejection attempts per event before the trial is failed.
const MAX_REJECTION_ATTEMPTS: usize = 1_000_000;

/// One trial's synthetic data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyDataset {
    /// Index of the trial that produced it.
    pub trial_index: usize,
    /// True realization (all generated events, observed or not).
    pub truth: Histogram,
    /// What the algorithm under test sees.
    pub measured: Histogram,
}

/// Draws toy datasets from a truth density through a detector.
pub struct Sampler {
    truth_binning: Binning,
    density: Box<dyn TruthDensity>,
    truth_probs: Vec<f64>,
    detector: Detector,
    size: SampleSize,
    mode: GenerationMode,
}

impl Sampler {
    /// Sampler for `density` binned on `truth_binning`.
    ///
    /// Fails with [`Error::Configuration`] if the density has no usable mass on the truth range.
    pub fn new(
        truth_binning: Binning,
        density: Box<dyn TruthDensity>,
        detector: Detector,
        size: SampleSize,
        mode: GenerationMode,
    ) -> Result<Self> {
        let truth_probs = bin_probabilities(density.as_ref(), &truth_binning)?;
        if mode == GenerationMode::Events {
            let mass = density.cdf(truth_binning.hi()) - density.cdf(truth_binning.lo());
            if mass < MIN_EVENT_MODE_MASS {
                return Err(Error::Configuration(format!(
                    "event generation needs at least {MIN_EVENT_MODE_MASS} of '{}' inside the truth range, got {mass:e}",
                    density.name()
                )));
            }
        }
        Ok(Self { truth_binning, density, truth_probs, detector, size, mode })
    }

    /// Expected truth content per bin (mean of the sample size policy times bin probability).
    pub fn expected_truth(&self) -> Vec<f64> {
        let n = match self.size {
            SampleSize::Fixed(n) => n as f64,
            SampleSize::Poisson { expected } => expected,
        };
        self.truth_probs.iter().map(|p| p * n).collect()
    }

    /// Fail with [`Error::Configuration`] unless the response uses this sampler's truth binning.
    pub fn check_compatible(&self, response: &ResponseModel) -> Result<()> {
        if !self.truth_binning.matches(response.truth_binning()) {
            return Err(Error::Configuration(format!(
                "truth density binning ({} bins on [{}, {})) disagrees with response truth binning ({} bins on [{}, {}))",
                self.truth_binning.n_bins(),
                self.truth_binning.lo(),
                self.truth_binning.hi(),
                response.n_truth(),
                response.truth_binning().lo(),
                response.truth_binning().hi()
            )));
        }
        Ok(())
    }

    /// Generate one toy. Only `rng` is advanced.
    pub fn generate(
        &self,
        response: &ResponseModel,
        trial_index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<ToyDataset> {
        self.check_compatible(response)?;
        let n_events = self.draw_event_count(rng)?;
        let (truth, measured) = match self.mode {
            GenerationMode::Binned => self.generate_binned(response, n_events, rng)?,
            GenerationMode::Events => self.generate_events(response, n_events, rng)?,
        };
        Ok(ToyDataset { trial_index, truth, measured })
    }

    fn draw_event_count(&self, rng: &mut dyn RngCore) -> Result<u64> {
        match self.size {
            SampleSize::Fixed(n) => Ok(n),
            SampleSize::Poisson { expected } => {
                if expected <= 0.0 {
                    return Ok(0);
                }
                let pois = Poisson::new(expected)
                    .map_err(|e| Error::Computation(format!("poisson({expected}): {e}")))?;
                let n: f64 = pois.sample(rng);
                Ok(n as u64)
            }
        }
    }

    fn generate_binned(
        &self,
        response: &ResponseModel,
        n_events: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(Histogram, Histogram)> {
        let truth_counts = multinomial(n_events, &self.truth_probs, rng)?;

        let n_meas = response.n_measured();
        let mut measured = Histogram::zeros(response.measured_binning().clone());
        let mut routing = Vec::with_capacity(n_meas + 1);
        for (j, &c) in truth_counts.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let cond = response.conditional(j);
            routing.clear();
            routing.extend_from_slice(cond.observed);
            routing.push(cond.missed);
            let routed = multinomial(c, &routing, rng)?;
            for (i, &k) in routed[..n_meas].iter().enumerate() {
                measured.add(i, k as f64);
            }
        }

        let truth = Histogram::from_counts(
            self.truth_binning.clone(),
            truth_counts.into_iter().map(|c| c as f64).collect(),
        )?;
        Ok((truth, measured))
    }

    fn generate_events(
        &self,
        response: &ResponseModel,
        n_events: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(Histogram, Histogram)> {
        let (lo, hi) = (self.truth_binning.lo(), self.truth_binning.hi());
        let mut truth = Histogram::zeros(self.truth_binning.clone());
        let mut measured = Histogram::zeros(response.measured_binning().clone());
        for _ in 0..n_events {
            let x = sample_truncated(self.density.as_ref(), lo, hi, rng, MAX_REJECTION_ATTEMPTS)?;
            truth.fill(x);
            let eff = self.detector.efficiency.eval(x, lo, hi);
            if rng.random::<f64>() >= eff {
                continue;
            }
            let y = self.detector.smearing.apply(x, rng);
            measured.fill(y);
        }
        Ok((truth, measured))
    }
}

/// Multinomial draw by sequential conditional binomials. The last category takes the remainder.
fn multinomial(n: u64, probs: &[f64], rng: &mut dyn RngCore) -> Result<Vec<u64>> {
    let mut out = vec![0u64; probs.len()];
    let mut remaining = n;
    let mut p_left: f64 = probs.iter().sum();
    let last = probs.len().saturating_sub(1);
    for (k, &p) in probs.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if k == last {
            out[k] = remaining;
            break;
        }
        let q = if p_left > 0.0 { (p / p_left).clamp(0.0, 1.0) } else { 0.0 };
        let x = if q == 0.0 {
            0
        } else if q == 1.0 {
            remaining
        } else {
            Binomial::new(remaining, q)
                .map_err(|e| Error::Computation(format!("binomial({remaining}, {q}): {e}")))?
                .sample(rng)
        };
        out[k] = x;
        remaining -= x;
        p_left -= p;
    }
    Ok(out)
}
