//! Mathematical building blocks for the estimation layers.
//!
//! ## Modules
//!
//! - [`correlation`]: Validated correlation matrices with Cholesky
//!   factorization, forward transform and forward substitution
//! - [`solver`]: Brent's method root finding with [`solver::SolverConfig`]
//! - [`quadrature`]: Gauss-Legendre nodes and weights for smooth integrands
//! - [`moments`]: Sample moment kernels (mean, standard deviation, skewness,
//!   kurtosis, Pearson correlation)
//!
//! All routines are allocation-light and deterministic; none of them spawn
//! threads or hold global state.

pub mod correlation;
pub mod moments;
pub mod quadrature;
pub mod solver;
