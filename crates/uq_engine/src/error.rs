//! Engine error taxonomy.
//!
//! Fatal conditions surface here as [`EngineError`]; anything recoverable
//! (failed samples, dropped levels, starved statistics) degrades the run and
//! lands in the run log instead. `From` conversions cover the layer-1 and
//! layer-2 error types, so a caller assembling marginals, a correlation
//! model, a transform and an engine can propagate with one `?` type.

use thiserror::Error;

use uq_models::correlation_model::ModelError;
use uq_models::marginals::MarginalError;
use uq_models::nataf::NatafError;

use crate::mfmc::ConfigError;

/// Top-level error for building and running estimations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Configuration rejected.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Correlation structure rejected or the transform could not be built.
    #[error("correlation structure: {0}")]
    InvalidCorrelation(#[from] NatafError),

    /// A marginal distribution could not be built.
    #[error("unsupported distribution: {0}")]
    UnsupportedDistribution(#[from] MarginalError),

    /// The joint input model was rejected.
    #[error("input model: {0}")]
    InvalidModel(#[from] ModelError),

    /// No fidelity levels were supplied.
    #[error("at least one fidelity level is required")]
    NoFidelityLevels,

    /// A fidelity level failed validation.
    #[error("fidelity level `{name}`: {reason}")]
    InvalidLevel {
        /// Name of the offending level.
        name: String,
        /// Description of the violation.
        reason: String,
    },

    /// `run` was called under a multi-process configuration.
    #[error(
        "run() covers a single process; drive {n_procs} processes with run_local() and reduce()"
    )]
    DistributedRun {
        /// Configured process count.
        n_procs: usize,
    },

    /// The partial runs handed to `reduce` do not assemble into one run.
    #[error("inconsistent partial runs: {0}")]
    InconsistentPartials(String),
}
