//! Probability building blocks for toy generation.
//!
//! This crate hosts the densities and detector-effect models the harness samples from:
//! - truth / training densities implementing [`uf_core::TruthDensity`]
//! - efficiency curves and smearing kernels
//! - binned-probability and truncated-sampling helpers

pub mod math;
pub mod background;
pub mod binned;
pub mod breit_wigner;
pub mod double_exponential;
pub mod efficiency;
pub mod exponential;
pub mod flat;
pub mod gaussian;
pub mod smearing;
pub mod spec;

pub use binned::{bin_probabilities, sample_truncated};
pub use efficiency::Efficiency;
pub use smearing::Smearing;
pub use spec::{PdfShape, PdfSpec};
