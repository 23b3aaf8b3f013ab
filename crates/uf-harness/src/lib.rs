//! # uf-harness
//!
//! Toy Monte Carlo validation of unfolding algorithms.
//!
//! A run draws many synthetic datasets from a known truth density, folds them
//! through a detector response, hands each measured histogram to the algorithm
//! under test and compares its estimate with the truth it came from. The report
//! summarizes residuals, pulls, coverage and chi-square per truth bin.
//!
//! ```no_run
//! use uf_harness::{RunConfig, run};
//!
//! let text = std::fs::read_to_string("config.json").unwrap();
//! let config = RunConfig::from_json(&text).unwrap();
//! let output = run(&config).unwrap();
//! println!("coverage: {:.3}", output.report.coverage_fraction);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod algorithms;
pub mod config;
pub mod report;
pub mod response;
pub mod run;
pub mod sampler;
pub mod trial;
pub mod welford;

pub use aggregate::TrialAggregator;
pub use algorithms::{ALGORITHM_NAMES, build_algorithm};
pub use config::{AlgorithmSpec, BinningSpec, GenerationMode, ResponseSpec, RunConfig, SampleSize};
pub use report::{BinReport, REPORT_SCHEMA_VERSION, ReportModel};
pub use response::{Detector, build_response};
pub use run::{CancelToken, Harness, RunOutput, run, run_many, run_with_cancel};
pub use sampler::{Sampler, ToyDataset};
pub use trial::{
    BinDiagnostic, DiagnosticSettings, FailureKind, TrialDiagnostics, TrialFailure, TrialOutcome,
    TrialOutput, TrialRunner, TrialStage,
};
pub use welford::RunningStats;
