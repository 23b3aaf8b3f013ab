//! # uf-core
//!
//! Core types and traits for the unfolding toy Monte Carlo harness.
//!
//! This crate provides:
//! - the error taxonomy shared by every crate ([`Error`])
//! - binnings, histograms and unfolding results ([`types`])
//! - the binned detector response ([`response`])
//! - the seams to the algorithm under test and to truth densities ([`traits`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod response;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use response::{Conditional, NORMALIZATION_TOLERANCE, ResponseModel};
pub use traits::{AlgorithmOptions, TruthDensity, UnfoldContext, UnfoldingAlgorithm};
pub use types::{Binning, Histogram, UnfoldingResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
