//! Brent's method root finding.
//!
//! Bracketing root finder combining bisection, the secant step and inverse
//! quadratic interpolation. Used by the transform layer to invert the
//! correlation-distortion integral, where the integrand is smooth but has no
//! closed-form derivative.

use thiserror::Error;

/// Root-finding failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Function values at the bracket endpoints have the same sign.
    #[error("no bracket: f({a}) and f({b}) have the same sign")]
    NoBracket {
        /// Left bracket endpoint.
        a: f64,
        /// Right bracket endpoint.
        b: f64,
    },

    /// Iteration limit reached before the bracket shrank below tolerance.
    #[error("failed to converge after {iterations} iterations")]
    MaxIterationsExceeded {
        /// Number of iterations attempted.
        iterations: usize,
    },
}

/// Convergence tolerance and iteration bound for iterative solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Absolute width tolerance on the root bracket.
    pub tolerance: f64,
    /// Hard iteration limit.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

impl SolverConfig {
    /// Create a configuration, panicking on non-positive inputs.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        assert!(tolerance > 0.0, "tolerance must be positive");
        assert!(max_iterations > 0, "max_iterations must be positive");
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Brent's method root finder.
///
/// Keeps a valid bracket at every step, so convergence is guaranteed for
/// continuous functions; interpolation steps only accelerate it.
///
/// # Example
///
/// ```
/// use uq_core::math::solver::{BrentSolver, SolverConfig};
///
/// let solver = BrentSolver::new(SolverConfig::default());
/// let root = solver.find_root(|x: f64| x.cos() - x, 0.0, 1.0).unwrap();
/// assert!((root - 0.739_085_133_2).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct BrentSolver {
    config: SolverConfig,
}

impl BrentSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Create a solver with the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: SolverConfig::default(),
        }
    }

    /// The solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find a root of `f` inside the bracket `[a, b]`.
    ///
    /// `f(a)` and `f(b)` must have opposite signs.
    ///
    /// # Errors
    ///
    /// [`SolverError::NoBracket`] when the endpoints do not straddle a sign
    /// change, [`SolverError::MaxIterationsExceeded`] when the iteration limit
    /// runs out first.
    pub fn find_root<F>(&self, f: F, a: f64, b: f64) -> Result<f64, SolverError>
    where
        F: Fn(f64) -> f64,
    {
        let (mut a, mut b) = (a, b);
        let mut fa = f(a);
        let mut fb = f(b);

        if fa * fb > 0.0 {
            return Err(SolverError::NoBracket { a, b });
        }

        let mut c = a;
        let mut fc = fa;
        let mut step = b - a;
        let mut step_before = step;

        for _ in 0..self.config.max_iterations {
            // Re-bracket so that b is the best estimate and c straddles it.
            if (fb > 0.0) == (fc > 0.0) {
                c = a;
                fc = fa;
                step = b - a;
                step_before = step;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.config.tolerance;
            let midpoint = 0.5 * (c - b);

            if midpoint.abs() <= tol || fb == 0.0 {
                return Ok(b);
            }

            if step_before.abs() >= tol && fa.abs() > fb.abs() {
                // Try interpolation: secant when only two points are distinct,
                // inverse quadratic when all three are.
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (2.0 * midpoint * s, 1.0 - s)
                } else {
                    let inv_c = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * midpoint * inv_c * (inv_c - r) - (b - a) * (r - 1.0)),
                        (inv_c - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();

                let accept_interp = 2.0 * p
                    < (3.0 * midpoint * q - (tol * q).abs()).min((step_before * q).abs());
                if accept_interp {
                    step_before = step;
                    step = p / q;
                } else {
                    step = midpoint;
                    step_before = step;
                }
            } else {
                step = midpoint;
                step_before = step;
            }

            a = b;
            fa = fb;
            b += if step.abs() > tol {
                step
            } else {
                tol.copysign(midpoint)
            };
            fb = f(b);
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }
}
