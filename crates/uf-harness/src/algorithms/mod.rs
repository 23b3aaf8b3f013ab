//! Reference unfolding adapters and the name → adapter registry.
//!
//! These exist so the harness can be exercised end to end; any other
//! [`UnfoldingAlgorithm`] implementation can be plugged in through
//! [`crate::run::Harness::with_algorithm`].

use uf_core::{Error, Histogram, ResponseModel, Result, UnfoldingAlgorithm};

mod bayes;
mod bin_by_bin;
mod invert;
mod passthrough;

pub use bayes::Bayes;
pub use bin_by_bin::BinByBin;
pub use invert::Invert;
pub use passthrough::PassThrough;

/// Names accepted by [`build_algorithm`].
pub const ALGORITHM_NAMES: &[&str] = &["passthrough", "bin_by_bin", "invert", "bayes"];

/// Construct a reference adapter by name.
pub fn build_algorithm(name: &str) -> Result<Box<dyn UnfoldingAlgorithm>> {
    match name {
        "passthrough" => Ok(Box::new(PassThrough)),
        "bin_by_bin" => Ok(Box::new(BinByBin)),
        "invert" => Ok(Box::new(Invert)),
        "bayes" => Ok(Box::new(Bayes)),
        other => Err(Error::Configuration(format!(
            "unknown algorithm '{other}' (expected one of: {})",
            ALGORITHM_NAMES.join(", ")
        ))),
    }
}

/// Configuration-time check that truth and measured binnings have the same bin count.
pub(crate) fn require_square(name: &str, response: &ResponseModel) -> Result<()> {
    if response.n_truth() != response.n_measured() {
        return Err(Error::Configuration(format!(
            "{name} needs as many measured as truth bins, got {} measured and {} truth",
            response.n_measured(),
            response.n_truth()
        )));
    }
    Ok(())
}

/// Per-call precondition: `measured` uses the response's measured binning and has sane counts.
pub(crate) fn check_measured(response: &ResponseModel, measured: &Histogram) -> Result<()> {
    if !measured.binning().matches(response.measured_binning()) {
        return Err(Error::Unfolding(format!(
            "measured histogram has {} bins, response expects {}",
            measured.n_bins(),
            response.n_measured()
        )));
    }
    if let Some(i) = measured.counts().iter().position(|c| !c.is_finite() || *c < 0.0) {
        return Err(Error::Unfolding(format!(
            "measured bin {i} has invalid content {}",
            measured.counts()[i]
        )));
    }
    Ok(())
}

/// `U diag(m) Uᵀ` for an `n_truth × n_meas` row-major matrix `u`, as a row-major `n_truth²` vector.
pub(crate) fn propagate_poisson(u: &[f64], n_truth: usize, measured: &[f64]) -> Vec<f64> {
    let n_meas = measured.len();
    let mut cov = vec![0.0; n_truth * n_truth];
    for a in 0..n_truth {
        for b in a..n_truth {
            let mut s = 0.0;
            for (i, &m) in measured.iter().enumerate() {
                s += u[a * n_meas + i] * m * u[b * n_meas + i];
            }
            cov[a * n_truth + b] = s;
            cov[b * n_truth + a] = s;
        }
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        for name in ALGORITHM_NAMES {
            assert_eq!(build_algorithm(name).unwrap().name(), *name);
        }
        let err = build_algorithm("svd").err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("bayes"));
    }

    #[test]
    fn test_propagate_poisson_diagonal() {
        // U = [[2, 0], [0, 3]], m = [1, 4] -> diag(4, 36)
        let cov = propagate_poisson(&[2.0, 0.0, 0.0, 3.0], 2, &[1.0, 4.0]);
        assert_eq!(cov, vec![4.0, 0.0, 0.0, 36.0]);
    }
}
