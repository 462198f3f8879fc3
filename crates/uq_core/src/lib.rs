//! # uq_core: Numerical Foundation for Uncertainty Quantification
//!
//! ## Layer 1 (Foundation) Role
//!
//! uq_core is the bottom layer of the 3-layer architecture, providing:
//! - Validated correlation matrices and Cholesky factorization (`math::correlation`)
//! - Brent's method root finding (`math::solver`)
//! - Gauss-Legendre quadrature rules (`math::quadrature`)
//! - Sample moment kernels: mean, deviation, skewness, kurtosis (`math::moments`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other uq_* crates, with minimal external
//! dependencies:
//! - num-traits: Traits for generic numerical computation
//! - thiserror: Structured error types
//!
//! ## Usage Examples
//!
//! ```rust
//! use uq_core::math::correlation::CorrelationMatrix;
//! use uq_core::math::solver::{BrentSolver, SolverConfig};
//!
//! // Factorize a 2x2 correlation matrix and correlate a standard-normal pair
//! let matrix = CorrelationMatrix::<f64>::new(vec![1.0, 0.5, 0.5, 1.0], 2).unwrap();
//! let factor = matrix.cholesky().unwrap();
//! let correlated = factor.transform(&[1.0, -1.0]);
//! assert!((correlated[0] - 1.0).abs() < 1e-12);
//!
//! // Solve x³ - 2x - 5 = 0
//! let solver = BrentSolver::new(SolverConfig::default());
//! let root = solver.find_root(|x| x * x * x - 2.0 * x - 5.0, 2.0, 3.0).unwrap();
//! assert!((root - 2.094_551_481_5).abs() < 1e-9);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod math;
