//! Fidelity-level model abstraction.
//!
//! The engine estimates moments of quantities computed by numerical models of
//! differing accuracy and expense. Each model implements [`FidelityModel`];
//! the engine only sees a name, a relative cost and an evaluation function
//! mapping one physical-space input point to one value per quantity of
//! interest.

use thiserror::Error;

/// Failure while evaluating a single sample through one model.
///
/// Evaluation failures are recoverable: the engine excludes the affected
/// sample index from every level and records the event in the run log rather
/// than aborting the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelEvalError {
    /// The model could not produce outputs for this input point.
    #[error("evaluation failed: {0}")]
    Failed(String),
    /// The model returned the wrong number of outputs.
    #[error("expected {expected} outputs, got {actual}")]
    OutputMismatch {
        /// Number of configured quantities of interest.
        expected: usize,
        /// Number of values the model returned.
        actual: usize,
    },
    /// The model returned a NaN or infinite output.
    #[error("non-finite value in output {index}")]
    NonFinite {
        /// Position of the offending output.
        index: usize,
    },
}

/// A numerical model at one fidelity.
///
/// Implementations must be thread safe; the engine evaluates batches from a
/// rayon pool. `cost` is the relative expense of one evaluation in arbitrary
/// but mutually consistent units: only cost ratios enter the allocation.
pub trait FidelityModel: Send + Sync {
    /// Short identifier used in plans, logs and the sample table.
    fn name(&self) -> &str;

    /// Relative cost of one evaluation. Must be finite and positive.
    fn cost(&self) -> f64;

    /// Evaluates one input point, returning one value per quantity of
    /// interest.
    fn evaluate(&self, inputs: &[f64]) -> Result<Vec<f64>, ModelEvalError>;
}

/// Adapter turning a closure into a [`FidelityModel`].
///
/// Handy for in-process surrogates and tests; external simulations implement
/// the trait directly.
///
/// # Examples
///
/// ```rust
/// use uq_engine::fidelity::{ClosureModel, FidelityModel};
///
/// let model = ClosureModel::new("sum", 1.0, |x: &[f64]| Ok(vec![x.iter().sum()]));
/// assert_eq!(model.evaluate(&[1.0, 2.0]).unwrap(), vec![3.0]);
/// ```
pub struct ClosureModel<F> {
    name: String,
    cost: f64,
    eval: F,
}

impl<F> ClosureModel<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ModelEvalError> + Send + Sync,
{
    /// Wraps `eval` as a model with the given name and relative cost.
    pub fn new(name: impl Into<String>, cost: f64, eval: F) -> Self {
        Self {
            name: name.into(),
            cost,
            eval,
        }
    }
}

impl<F> FidelityModel for ClosureModel<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ModelEvalError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn evaluate(&self, inputs: &[f64]) -> Result<Vec<f64>, ModelEvalError> {
        (self.eval)(inputs)
    }
}
