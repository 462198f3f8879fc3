//! Named random variables and the validated joint model.
//!
//! A [`CorrelationModel`] owns an ordered list of [`RandomVariable`]s together
//! with the physical-space correlation matrix over them. Construction is
//! fail-fast: dimensions, duplicate names, finite marginal moments and the
//! positive definiteness of the input matrix are all checked before any
//! transform work starts.

use thiserror::Error;
use uq_core::math::correlation::{CorrelationError, CorrelationMatrix};

use crate::marginals::Marginal;

/// Joint-model construction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Variable count and correlation matrix dimension disagree.
    #[error("{variables} variables but a {matrix_dim}x{matrix_dim} correlation matrix")]
    DimensionMismatch {
        /// Number of variables supplied.
        variables: usize,
        /// Dimension of the correlation matrix.
        matrix_dim: usize,
    },

    /// Two variables share a name.
    #[error("duplicate variable name `{name}`")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// A marginal has an undefined or non-finite mean or deviation.
    #[error("variable `{name}` has non-finite moments")]
    NonFiniteMoments {
        /// Name of the offending variable.
        name: String,
    },

    /// The physical-space correlation matrix is invalid or not positive
    /// definite.
    #[error(transparent)]
    InvalidCorrelation(#[from] CorrelationError),
}

/// A named random variable bound to a marginal distribution.
///
/// Identity is positional: the variable's index inside its
/// [`CorrelationModel`] ties it to a row/column of the correlation matrix and
/// to a column of every sample batch.
#[derive(Debug, Clone)]
pub struct RandomVariable {
    name: String,
    marginal: Marginal,
}

impl RandomVariable {
    /// Bind a name to a marginal.
    pub fn new(name: impl Into<String>, marginal: Marginal) -> Self {
        Self {
            name: name.into(),
            marginal,
        }
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The marginal distribution.
    pub fn marginal(&self) -> &Marginal {
        &self.marginal
    }
}

/// Physical-space mean and standard deviation of one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Mean.
    pub mean: f64,
    /// Standard deviation, strictly positive.
    pub std_dev: f64,
}

/// Ordered random variables plus their physical-space correlation matrix.
///
/// # Example
///
/// ```
/// use uq_core::math::correlation::CorrelationMatrix;
/// use uq_models::correlation_model::{CorrelationModel, RandomVariable};
/// use uq_models::marginals::Marginal;
///
/// let variables = vec![
///     RandomVariable::new("load", Marginal::normal(100.0, 15.0).unwrap()),
///     RandomVariable::new("resistance", Marginal::weibull(2.0, 50.0).unwrap()),
/// ];
/// let model = CorrelationModel::new(variables, CorrelationMatrix::identity(2)).unwrap();
/// assert_eq!(model.index_of("resistance"), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationModel {
    variables: Vec<RandomVariable>,
    correlation: CorrelationMatrix<f64>,
    moments: Vec<Moments>,
}

impl CorrelationModel {
    /// Validate and assemble a joint model.
    ///
    /// # Errors
    ///
    /// [`ModelError::DimensionMismatch`] when the matrix does not match the
    /// variable count, [`ModelError::DuplicateName`] on repeated names,
    /// [`ModelError::NonFiniteMoments`] when a marginal lacks finite mean or
    /// deviation, and [`ModelError::InvalidCorrelation`] when the input matrix
    /// is not positive definite.
    pub fn new(
        variables: Vec<RandomVariable>,
        correlation: CorrelationMatrix<f64>,
    ) -> Result<Self, ModelError> {
        if variables.len() != correlation.dim() {
            return Err(ModelError::DimensionMismatch {
                variables: variables.len(),
                matrix_dim: correlation.dim(),
            });
        }

        for (i, variable) in variables.iter().enumerate() {
            if variables[..i].iter().any(|v| v.name() == variable.name()) {
                return Err(ModelError::DuplicateName {
                    name: variable.name().to_string(),
                });
            }
        }

        let mut moments = Vec::with_capacity(variables.len());
        for variable in &variables {
            let mean = variable.marginal().mean().filter(|m| m.is_finite());
            let std_dev = variable
                .marginal()
                .std_dev()
                .filter(|s| s.is_finite() && *s > 0.0);
            match (mean, std_dev) {
                (Some(mean), Some(std_dev)) => moments.push(Moments { mean, std_dev }),
                _ => {
                    return Err(ModelError::NonFiniteMoments {
                        name: variable.name().to_string(),
                    })
                }
            }
        }

        // Feasibility of the input matrix; the factor itself is recomputed
        // by the transform on the equivalent matrix.
        correlation.cholesky()?;

        Ok(Self {
            variables,
            correlation,
            moments,
        })
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when the model has no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// All variables in positional order.
    pub fn variables(&self) -> &[RandomVariable] {
        &self.variables
    }

    /// Variable at the given position.
    pub fn variable(&self, index: usize) -> &RandomVariable {
        &self.variables[index]
    }

    /// Cached physical-space moments of the variable at the given position.
    pub fn moments(&self, index: usize) -> Moments {
        self.moments[index]
    }

    /// Position of a variable by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name() == name)
    }

    /// Physical-space correlation matrix.
    pub fn correlation(&self) -> &CorrelationMatrix<f64> {
        &self.correlation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_variables() -> Vec<RandomVariable> {
        vec![
            RandomVariable::new("demand", Marginal::normal(10.0, 2.0).unwrap()),
            RandomVariable::new("capacity", Marginal::lognormal_from_moments(20.0, 5.0).unwrap()),
        ]
    }

    #[test]
    fn test_new_accepts_valid_model() {
        let correlation = CorrelationMatrix::new(vec![1.0, 0.3, 0.3, 1.0], 2).unwrap();
        let model = CorrelationModel::new(two_variables(), correlation).unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(model.index_of("demand"), Some(0));
        assert_eq!(model.index_of("capacity"), Some(1));
        assert_eq!(model.index_of("missing"), None);
        assert!(!model.is_empty());
    }

    #[test]
    fn test_moments_are_cached() {
        let model = CorrelationModel::new(two_variables(), CorrelationMatrix::identity(2)).unwrap();
        assert_relative_eq!(model.moments(0).mean, 10.0);
        assert_relative_eq!(model.moments(0).std_dev, 2.0);
        assert_relative_eq!(model.moments(1).mean, 20.0, epsilon = 1e-10);
        assert_relative_eq!(model.moments(1).std_dev, 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_new_rejects_dimension_mismatch() {
        let result = CorrelationModel::new(two_variables(), CorrelationMatrix::identity(3));
        assert_eq!(
            result.unwrap_err(),
            ModelError::DimensionMismatch {
                variables: 2,
                matrix_dim: 3
            }
        );
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let variables = vec![
            RandomVariable::new("x", Marginal::normal(0.0, 1.0).unwrap()),
            RandomVariable::new("x", Marginal::normal(1.0, 1.0).unwrap()),
        ];
        let result = CorrelationModel::new(variables, CorrelationMatrix::identity(2));
        assert_eq!(
            result.unwrap_err(),
            ModelError::DuplicateName {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_new_rejects_infeasible_correlation() {
        let data = vec![1.0, 0.9, -0.9, 0.9, 1.0, 0.9, -0.9, 0.9, 1.0];
        let correlation = CorrelationMatrix::new(data, 3).unwrap();
        let variables = vec![
            RandomVariable::new("a", Marginal::normal(0.0, 1.0).unwrap()),
            RandomVariable::new("b", Marginal::normal(0.0, 1.0).unwrap()),
            RandomVariable::new("c", Marginal::normal(0.0, 1.0).unwrap()),
        ];
        assert!(matches!(
            CorrelationModel::new(variables, correlation),
            Err(ModelError::InvalidCorrelation(_))
        ));
    }
}
