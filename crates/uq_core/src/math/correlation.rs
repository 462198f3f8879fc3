//! Correlation matrices and their Cholesky factorization.
//!
//! A [`CorrelationMatrix`] is validated on construction (square shape, unit
//! diagonal, symmetry, entries in `[-1, 1]`) so that downstream code can rely
//! on those invariants. Its lower-triangular [`CholeskyFactor`] maps
//! independent standard normals into correlated ones (`w = L·z`) and, via
//! forward substitution, back again (`z = L⁻¹·w`).

use num_traits::Float;
use thiserror::Error;

/// Validation and factorization errors for correlation matrices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// Element count does not match the declared square dimension.
    #[error("expected {dim}x{dim} = {expected} elements, got {actual}")]
    InvalidDimensions {
        /// Declared matrix dimension.
        dim: usize,
        /// Expected element count (`dim * dim`).
        expected: usize,
        /// Actual element count supplied.
        actual: usize,
    },

    /// A diagonal entry differs from one beyond tolerance.
    #[error("diagonal entry ({index},{index}) must equal 1, got {value}")]
    InvalidDiagonal {
        /// Diagonal position.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// The matrix is not symmetric.
    #[error("entries ({row},{col}) and ({col},{row}) differ")]
    NotSymmetric {
        /// Row of the offending pair.
        row: usize,
        /// Column of the offending pair.
        col: usize,
    },

    /// An off-diagonal entry lies outside `[-1, 1]`.
    #[error("entry ({row},{col}) = {value} lies outside [-1, 1]")]
    OutOfRange {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
        /// Offending value.
        value: f64,
    },

    /// Cholesky factorization hit a non-positive pivot.
    #[error("matrix is not positive definite (pivot {pivot} at index {index})")]
    NotPositiveDefinite {
        /// Pivot index where factorization failed.
        index: usize,
        /// Pivot value encountered.
        pivot: f64,
    },
}

/// Symmetric correlation matrix in row-major storage.
///
/// Construction via [`CorrelationMatrix::new`] enforces the structural
/// invariants; positive definiteness is only established by
/// [`CorrelationMatrix::cholesky`], which is where rank deficiency surfaces.
///
/// # Example
///
/// ```
/// use uq_core::math::correlation::CorrelationMatrix;
///
/// let matrix = CorrelationMatrix::<f64>::new(vec![1.0, 0.3, 0.3, 1.0], 2).unwrap();
/// assert_eq!(matrix.dim(), 2);
/// assert!((matrix.get(0, 1) - 0.3).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix<T: Float> {
    /// Row-major entries, `dim * dim` of them.
    data: Vec<T>,
    /// Matrix dimension.
    dim: usize,
}

/// Tolerance for the unit-diagonal and symmetry checks.
const VALIDATION_TOLERANCE: f64 = 1e-10;

impl<T: Float> CorrelationMatrix<T> {
    /// Build a validated correlation matrix from row-major data.
    ///
    /// # Errors
    ///
    /// Returns a [`CorrelationError`] when the element count does not match
    /// `dim * dim`, a diagonal entry is not 1, the matrix is asymmetric, or an
    /// off-diagonal entry falls outside `[-1, 1]`.
    pub fn new(data: Vec<T>, dim: usize) -> Result<Self, CorrelationError> {
        let expected = dim * dim;
        if dim == 0 || data.len() != expected {
            return Err(CorrelationError::InvalidDimensions {
                dim,
                expected,
                actual: data.len(),
            });
        }

        let tol = T::from(VALIDATION_TOLERANCE).unwrap();
        let one = T::one();

        for i in 0..dim {
            let diagonal = data[i * dim + i];
            if (diagonal - one).abs() > tol {
                return Err(CorrelationError::InvalidDiagonal {
                    index: i,
                    value: diagonal.to_f64().unwrap_or(f64::NAN),
                });
            }
            for j in (i + 1)..dim {
                let upper = data[i * dim + j];
                let lower = data[j * dim + i];
                if (upper - lower).abs() > tol {
                    return Err(CorrelationError::NotSymmetric { row: i, col: j });
                }
                if upper.abs() > one + tol {
                    return Err(CorrelationError::OutOfRange {
                        row: i,
                        col: j,
                        value: upper.to_f64().unwrap_or(f64::NAN),
                    });
                }
            }
        }

        Ok(Self { data, dim })
    }

    /// Identity matrix of the given dimension (mutually independent case).
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![T::zero(); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = T::one();
        }
        Self { data, dim }
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Entry at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.dim + col]
    }

    /// True when every off-diagonal entry is zero.
    pub fn is_identity(&self) -> bool {
        for i in 0..self.dim {
            for j in 0..self.dim {
                if i != j && self.data[i * self.dim + j] != T::zero() {
                    return false;
                }
            }
        }
        true
    }

    /// Lower-triangular Cholesky factor `L` with `L·Lᵀ = R`.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::NotPositiveDefinite`] when a pivot fails to
    /// stay positive, i.e. the matrix is singular or indefinite.
    pub fn cholesky(&self) -> Result<CholeskyFactor<T>, CorrelationError> {
        let n = self.dim;
        let mut lower = vec![T::zero(); n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.data[i * n + j];
                for k in 0..j {
                    sum = sum - lower[i * n + k] * lower[j * n + k];
                }
                if i == j {
                    if sum <= T::zero() {
                        return Err(CorrelationError::NotPositiveDefinite {
                            index: i,
                            pivot: sum.to_f64().unwrap_or(f64::NAN),
                        });
                    }
                    lower[i * n + j] = sum.sqrt();
                } else {
                    lower[i * n + j] = sum / lower[j * n + j];
                }
            }
        }

        Ok(CholeskyFactor {
            lower,
            dim: n,
        })
    }
}

/// Lower-triangular Cholesky factor of a correlation matrix.
///
/// # Example
///
/// ```
/// use uq_core::math::correlation::CorrelationMatrix;
///
/// let factor = CorrelationMatrix::<f64>::new(vec![1.0, 0.8, 0.8, 1.0], 2)
///     .unwrap()
///     .cholesky()
///     .unwrap();
///
/// // Round trip: solve_lower undoes transform.
/// let z = [0.7, -1.3];
/// let w = factor.transform(&z);
/// let back = factor.solve_lower(&w);
/// assert!((back[0] - z[0]).abs() < 1e-12);
/// assert!((back[1] - z[1]).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct CholeskyFactor<T: Float> {
    /// Row-major lower-triangular entries (upper part zero).
    lower: Vec<T>,
    /// Matrix dimension.
    dim: usize,
}

impl<T: Float> CholeskyFactor<T> {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Entry at `(row, col)`; zero above the diagonal.
    pub fn get(&self, row: usize, col: usize) -> T {
        if col > row {
            T::zero()
        } else {
            self.lower[row * self.dim + col]
        }
    }

    /// Apply `L` to a vector of independent standard normals: `w = L·z`.
    pub fn transform(&self, z: &[T]) -> Vec<T> {
        assert_eq!(z.len(), self.dim, "vector length must match dimension");
        let n = self.dim;
        let mut w = vec![T::zero(); n];
        for i in 0..n {
            let mut acc = T::zero();
            for k in 0..=i {
                acc = acc + self.lower[i * n + k] * z[k];
            }
            w[i] = acc;
        }
        w
    }

    /// Solve `L·z = w` by forward substitution: `z = L⁻¹·w`.
    ///
    /// Inverse of [`CholeskyFactor::transform`]; decorrelates a vector drawn
    /// under this factor's correlation structure.
    pub fn solve_lower(&self, w: &[T]) -> Vec<T> {
        assert_eq!(w.len(), self.dim, "vector length must match dimension");
        let n = self.dim;
        let mut z = vec![T::zero(); n];
        for i in 0..n {
            let mut acc = w[i];
            for k in 0..i {
                acc = acc - self.lower[i * n + k] * z[k];
            }
            z[i] = acc / self.lower[i * n + i];
        }
        z
    }
}
