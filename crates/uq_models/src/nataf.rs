//! The Nataf isoprobabilistic transform.
//!
//! Maps between physical space (correlated variables with arbitrary marginals)
//! and independent standard-normal space. Construction solves, for every
//! correlated pair, the correlation-distortion equation
//!
//! ```text
//! ∫∫ ĥᵢ(u)·ĥⱼ(v)·φ₂(u, v; ρ₀) du dv = ρᵢⱼ
//! ```
//!
//! where `ĥ` is the standardized quantile composition `(F⁻¹(Φ(·)) − μ)/σ` and
//! `φ₂` the bivariate standard-normal density. Normal and lognormal pairs use
//! closed forms; everything else is integrated on a Gauss-Legendre tensor grid
//! and solved with Brent's method. The equivalent matrix is then Cholesky
//! factorized once and reused by every map.

use rand::Rng;
use rand_distr::StandardNormal;
use statrs::function::erf::{erfc, erfc_inv};
use thiserror::Error;
use tracing::warn;
use uq_core::math::correlation::{CholeskyFactor, CorrelationError, CorrelationMatrix};
use uq_core::math::quadrature::GaussLegendre;
use uq_core::math::solver::{BrentSolver, SolverConfig, SolverError};

use crate::correlation_model::CorrelationModel;
use crate::marginals::{Marginal, PROBABILITY_FLOOR};

/// Bracket bound for the equivalent-correlation solve, strictly inside
/// `(-1, 1)` so the bivariate density stays defined.
const CORRELATION_BOUND: f64 = 0.999_999;

/// What to do when a pairwise equivalent-correlation solve fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonConvergencePolicy {
    /// Use the physical-space coefficient clamped into the open unit
    /// interval and record a [`NatafWarning`].
    #[default]
    ClampWithWarning,
    /// Fail construction with [`NatafError::NonConvergentPair`].
    Fatal,
}

/// Tuning knobs for the transform construction.
#[derive(Debug, Clone)]
pub struct NatafConfig {
    /// Points per axis of the Gauss-Legendre tensor grid.
    pub quadrature_points: usize,
    /// Half-width of the standard-normal integration box.
    pub integration_half_width: f64,
    /// Tolerance and iteration bound for the pairwise root solve.
    pub solver: SolverConfig,
    /// Degraded-pair policy.
    pub on_non_convergence: NonConvergencePolicy,
}

impl Default for NatafConfig {
    fn default() -> Self {
        Self {
            quadrature_points: 64,
            integration_half_width: 8.0,
            solver: SolverConfig::default(),
            on_non_convergence: NonConvergencePolicy::default(),
        }
    }
}

/// Record of a pair whose equivalent correlation was replaced by the clamped
/// physical-space value.
#[derive(Debug, Clone, PartialEq)]
pub struct NatafWarning {
    /// Name of the first variable of the pair.
    pub first: String,
    /// Name of the second variable of the pair.
    pub second: String,
    /// Physical-space correlation requested for the pair.
    pub input_correlation: f64,
    /// Coefficient actually placed in the equivalent matrix.
    pub applied_correlation: f64,
}

/// Transform construction and evaluation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NatafError {
    /// The equivalent correlation matrix is invalid or not positive definite.
    #[error("equivalent correlation matrix is invalid: {0}")]
    InvalidCorrelation(CorrelationError),

    /// A pairwise solve failed under [`NonConvergencePolicy::Fatal`].
    #[error("equivalent correlation for ({first}, {second}) did not converge: {source}")]
    NonConvergentPair {
        /// Name of the first variable of the pair.
        first: String,
        /// Name of the second variable of the pair.
        second: String,
        /// Underlying solver failure.
        source: SolverError,
    },

    /// An input vector does not match the model dimension.
    #[error("expected a vector of length {expected}, got {actual}")]
    DimensionMismatch {
        /// Model dimension.
        expected: usize,
        /// Supplied vector length.
        actual: usize,
    },
}

/// The Nataf transform between physical and independent standard-normal
/// space.
///
/// # Example
///
/// ```
/// use uq_core::math::correlation::CorrelationMatrix;
/// use uq_models::correlation_model::{CorrelationModel, RandomVariable};
/// use uq_models::marginals::Marginal;
/// use uq_models::nataf::NatafTransform;
///
/// let variables = vec![
///     RandomVariable::new("x1", Marginal::normal(0.0, 1.0).unwrap()),
///     RandomVariable::new("x2", Marginal::uniform(0.0, 1.0).unwrap()),
/// ];
/// let correlation = CorrelationMatrix::new(vec![1.0, 0.5, 0.5, 1.0], 2).unwrap();
/// let model = CorrelationModel::new(variables, correlation).unwrap();
/// let transform = NatafTransform::new(model).unwrap();
///
/// let x = transform.to_physical(&[0.0, 0.0]).unwrap();
/// let u = transform.to_standard_normal(&x).unwrap();
/// assert!(u[0].abs() < 1e-8 && u[1].abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct NatafTransform {
    model: CorrelationModel,
    equivalent: CorrelationMatrix<f64>,
    factor: CholeskyFactor<f64>,
    warnings: Vec<NatafWarning>,
}

impl NatafTransform {
    /// Build the transform with [`NatafConfig::default`].
    pub fn new(model: CorrelationModel) -> Result<Self, NatafError> {
        Self::with_config(model, NatafConfig::default())
    }

    /// Build the transform with explicit configuration.
    ///
    /// # Errors
    ///
    /// [`NatafError::InvalidCorrelation`] when the equivalent matrix leaves
    /// the feasible region or is not positive definite;
    /// [`NatafError::NonConvergentPair`] when a pairwise solve fails under
    /// [`NonConvergencePolicy::Fatal`].
    pub fn with_config(model: CorrelationModel, config: NatafConfig) -> Result<Self, NatafError> {
        assert!(
            config.quadrature_points >= 2,
            "quadrature needs at least two points per axis"
        );
        assert!(
            config.integration_half_width > 0.0,
            "integration half-width must be positive"
        );

        let dim = model.len();
        let rule = GaussLegendre::new(config.quadrature_points);
        let (nodes, weights) =
            rule.scaled(-config.integration_half_width, config.integration_half_width);

        // Standardized quantile compositions evaluated on the grid, one row
        // per variable, shared across all pair solves.
        let grids: Vec<Vec<f64>> = (0..dim)
            .map(|i| {
                let moments = model.moments(i);
                let marginal = model.variable(i).marginal();
                nodes
                    .iter()
                    .map(|&z| {
                        (marginal.inverse_cdf(standard_normal_cdf(z)) - moments.mean)
                            / moments.std_dev
                    })
                    .collect()
            })
            .collect();

        let solver = BrentSolver::new(config.solver);
        let mut warnings = Vec::new();
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }

        for i in 0..dim {
            for j in (i + 1)..dim {
                let rho_x = model.correlation().get(i, j);
                let rho_z =
                    match equivalent_correlation(&model, i, j, rho_x, &nodes, &weights, &grids, &solver) {
                        Ok(value) => value,
                        Err(source) => match config.on_non_convergence {
                            NonConvergencePolicy::Fatal => {
                                return Err(NatafError::NonConvergentPair {
                                    first: model.variable(i).name().to_string(),
                                    second: model.variable(j).name().to_string(),
                                    source,
                                });
                            }
                            NonConvergencePolicy::ClampWithWarning => {
                                let applied = rho_x.clamp(-CORRELATION_BOUND, CORRELATION_BOUND);
                                warn!(
                                    first = model.variable(i).name(),
                                    second = model.variable(j).name(),
                                    input = rho_x,
                                    applied,
                                    "equivalent correlation solve failed; using clamped input"
                                );
                                warnings.push(NatafWarning {
                                    first: model.variable(i).name().to_string(),
                                    second: model.variable(j).name().to_string(),
                                    input_correlation: rho_x,
                                    applied_correlation: applied,
                                });
                                applied
                            }
                        },
                    };
                data[i * dim + j] = rho_z;
                data[j * dim + i] = rho_z;
            }
        }

        let equivalent =
            CorrelationMatrix::new(data, dim).map_err(NatafError::InvalidCorrelation)?;
        let factor = equivalent.cholesky().map_err(NatafError::InvalidCorrelation)?;

        Ok(Self {
            model,
            equivalent,
            factor,
            warnings,
        })
    }

    /// Model dimension.
    pub fn dim(&self) -> usize {
        self.model.len()
    }

    /// The underlying joint model.
    pub fn model(&self) -> &CorrelationModel {
        &self.model
    }

    /// The standard-normal-space (equivalent) correlation matrix.
    pub fn equivalent_correlation(&self) -> &CorrelationMatrix<f64> {
        &self.equivalent
    }

    /// Pairs degraded during construction, in pair order.
    pub fn warnings(&self) -> &[NatafWarning] {
        &self.warnings
    }

    /// Map independent standard normals to physical space.
    pub fn to_physical(&self, u: &[f64]) -> Result<Vec<f64>, NatafError> {
        self.check_dim(u.len())?;
        Ok(self.physical_unchecked(u))
    }

    /// Map a physical realization to independent standard-normal space.
    pub fn to_standard_normal(&self, x: &[f64]) -> Result<Vec<f64>, NatafError> {
        self.check_dim(x.len())?;
        let z = self.correlated_normal_unchecked(x);
        Ok(self.factor.solve_lower(&z))
    }

    /// Jacobian `∂x/∂u` at the standard-normal-space point `u`.
    ///
    /// Row-major; equals `diag(φ(zᵢ)/fᵢ(xᵢ))·L`. Entries can overflow in the
    /// far tails where the marginal density vanishes.
    pub fn jacobian_u_to_x(&self, u: &[f64]) -> Result<Vec<Vec<f64>>, NatafError> {
        self.check_dim(u.len())?;
        let n = self.dim();
        let z = self.factor.transform(u);
        let mut rows = vec![vec![0.0; n]; n];
        for i in 0..n {
            let marginal = self.model.variable(i).marginal();
            let p = clamp_probability(standard_normal_cdf(z[i]));
            let x = marginal.inverse_cdf(p);
            let ratio = standard_normal_pdf(z[i]) / marginal.pdf(x);
            for k in 0..=i {
                rows[i][k] = ratio * self.factor.get(i, k);
            }
        }
        Ok(rows)
    }

    /// Jacobian `∂u/∂x` at the physical-space point `x`.
    ///
    /// Row-major; equals `L⁻¹·diag(fᵢ(xᵢ)/φ(zᵢ))` and inverts
    /// [`NatafTransform::jacobian_u_to_x`] at corresponding points.
    pub fn jacobian_x_to_u(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, NatafError> {
        self.check_dim(x.len())?;
        let n = self.dim();
        let mut rows = vec![vec![0.0; n]; n];
        for col in 0..n {
            let marginal = self.model.variable(col).marginal();
            let p = clamp_probability(marginal.cdf(x[col]));
            let z = standard_normal_quantile(p);
            let scale = marginal.pdf(x[col]) / standard_normal_pdf(z);

            let mut unit = vec![0.0; n];
            unit[col] = 1.0;
            let column = self.factor.solve_lower(&unit);
            for (row, value) in column.iter().enumerate() {
                rows[row][col] = scale * value;
            }
        }
        Ok(rows)
    }

    /// Joint probability density at the physical-space point `x`.
    pub fn joint_pdf(&self, x: &[f64]) -> Result<f64, NatafError> {
        self.check_dim(x.len())?;
        let n = self.dim();

        let mut z = Vec::with_capacity(n);
        let mut marginal_ratio = 1.0;
        for i in 0..n {
            let marginal = self.model.variable(i).marginal();
            let p = clamp_probability(marginal.cdf(x[i]));
            let zi = standard_normal_quantile(p);
            marginal_ratio *= marginal.pdf(x[i]) / standard_normal_pdf(zi);
            z.push(zi);
        }

        let decorrelated = self.factor.solve_lower(&z);
        let quadratic: f64 = decorrelated.iter().map(|v| v * v).sum();
        let mut det_sqrt = 1.0;
        for i in 0..n {
            det_sqrt *= self.factor.get(i, i);
        }
        let normal_density = (-0.5 * quadratic).exp()
            / ((2.0 * std::f64::consts::PI).powf(0.5 * n as f64) * det_sqrt);

        Ok(normal_density * marginal_ratio)
    }

    /// Draw one physical-space realization, consuming exactly `dim`
    /// standard-normal variates from `rng`.
    ///
    /// The fixed consumption makes substream schemes possible: a generator
    /// seeded per sample index reproduces that sample regardless of which
    /// worker draws it.
    pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let u: Vec<f64> = (0..self.dim()).map(|_| rng.sample(StandardNormal)).collect();
        self.physical_unchecked(&u)
    }

    /// Draw `count` physical-space realizations from a single stream.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|_| self.sample_one(rng)).collect()
    }

    fn check_dim(&self, actual: usize) -> Result<(), NatafError> {
        let expected = self.dim();
        if actual == expected {
            Ok(())
        } else {
            Err(NatafError::DimensionMismatch { expected, actual })
        }
    }

    fn physical_unchecked(&self, u: &[f64]) -> Vec<f64> {
        let z = self.factor.transform(u);
        z.iter()
            .enumerate()
            .map(|(i, &zi)| {
                let p = clamp_probability(standard_normal_cdf(zi));
                self.model.variable(i).marginal().inverse_cdf(p)
            })
            .collect()
    }

    /// Marginal-wise map into correlated standard-normal space (before
    /// decorrelation).
    fn correlated_normal_unchecked(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, &xi)| {
                let p = clamp_probability(self.model.variable(i).marginal().cdf(xi));
                standard_normal_quantile(p)
            })
            .collect()
    }
}

/// Equivalent (standard-normal-space) correlation for one pair.
#[allow(clippy::too_many_arguments)]
fn equivalent_correlation(
    model: &CorrelationModel,
    i: usize,
    j: usize,
    rho_x: f64,
    nodes: &[f64],
    weights: &[f64],
    grids: &[Vec<f64>],
    solver: &BrentSolver,
) -> Result<f64, SolverError> {
    if rho_x == 0.0 {
        return Ok(0.0);
    }

    match (model.variable(i).marginal(), model.variable(j).marginal()) {
        (Marginal::Normal(_), Marginal::Normal(_)) => return Ok(rho_x),
        (Marginal::Normal(_), Marginal::Lognormal(_)) => {
            return Ok(rho_x * lognormal_distortion(model, j));
        }
        (Marginal::Lognormal(_), Marginal::Normal(_)) => {
            return Ok(rho_x * lognormal_distortion(model, i));
        }
        (Marginal::Lognormal(_), Marginal::Lognormal(_)) => {
            let cv_i = coefficient_of_variation(model, i);
            let cv_j = coefficient_of_variation(model, j);
            let argument = rho_x * cv_i * cv_j;
            if argument > -1.0 {
                let numerator = argument.ln_1p();
                let denominator =
                    ((cv_i * cv_i).ln_1p() * (cv_j * cv_j).ln_1p()).sqrt();
                return Ok(numerator / denominator);
            }
            // Closed form infeasible for this pair; let the numeric solve
            // report the failure.
        }
        _ => {}
    }

    numeric_equivalent(&grids[i], &grids[j], nodes, weights, rho_x, solver)
}

/// Quadrature-plus-Brent solve of the correlation-distortion equation.
fn numeric_equivalent(
    first_grid: &[f64],
    second_grid: &[f64],
    nodes: &[f64],
    weights: &[f64],
    rho_x: f64,
    solver: &BrentSolver,
) -> Result<f64, SolverError> {
    let distorted = |rho: f64| -> f64 {
        let mut acc = 0.0;
        for (a, &za) in nodes.iter().enumerate() {
            let mut inner = 0.0;
            for (b, &zb) in nodes.iter().enumerate() {
                inner += weights[b] * second_grid[b] * bivariate_normal_pdf(za, zb, rho);
            }
            acc += weights[a] * first_grid[a] * inner;
        }
        acc
    };

    solver.find_root(
        |rho| distorted(rho) - rho_x,
        -CORRELATION_BOUND,
        CORRELATION_BOUND,
    )
}

fn coefficient_of_variation(model: &CorrelationModel, index: usize) -> f64 {
    let moments = model.moments(index);
    moments.std_dev / moments.mean
}

/// Distortion factor `V/√ln(1+V²)` for a normal-lognormal pair.
fn lognormal_distortion(model: &CorrelationModel, index: usize) -> f64 {
    let cv = coefficient_of_variation(model, index);
    cv / (cv * cv).ln_1p().sqrt()
}

fn clamp_probability(p: f64) -> f64 {
    p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR)
}

/// Standard normal cumulative distribution.
fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * std::f64::consts::FRAC_1_SQRT_2)
}

/// Standard normal quantile.
fn standard_normal_quantile(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Standard normal density.
fn standard_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Bivariate standard-normal density with correlation `rho`.
fn bivariate_normal_pdf(z1: f64, z2: f64, rho: f64) -> f64 {
    let det = 1.0 - rho * rho;
    let exponent = -(z1 * z1 - 2.0 * rho * z1 * z2 + z2 * z2) / (2.0 * det);
    exponent.exp() / (2.0 * std::f64::consts::PI * det.sqrt())
}
