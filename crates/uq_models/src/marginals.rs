//! Marginal distribution catalogue.
//!
//! [`Marginal`] wraps the continuous families supported by the sampler behind
//! one cdf / inverse-cdf / pdf surface. Parameter validation happens in the
//! constructors, so evaluation never fails; quantile evaluation clamps the
//! probability into `(0, 1)` to keep tail inversions finite.
//!
//! Families and parameterizations:
//!
//! | family | parameters |
//! |---|---|
//! | `normal` | mean, standard deviation |
//! | `lognormal` | log-space location, log-space scale |
//! | `uniform` | lower, upper |
//! | `exponential` | rate |
//! | `gamma` | shape, rate |
//! | `beta` | alpha, beta, lower, upper (shifted/scaled support) |
//! | `weibull` | shape, scale |
//! | `gumbel` | location, scale (largest-extreme-value form) |
//! | `chi_squared` | degrees of freedom |

use statrs::distribution::{
    Beta, ChiSquared, Continuous, ContinuousCDF, Exp, Gamma, LogNormal, Normal, Uniform, Weibull,
};
use statrs::statistics::Distribution;
use thiserror::Error;

/// Smallest probability used when inverting a cdf.
///
/// Keeps quantile evaluation finite when an upstream probability rounds to
/// exactly 0 or 1.
pub const PROBABILITY_FLOOR: f64 = 1e-15;

/// Euler-Mascheroni constant, used by the Gumbel moments.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Marginal distribution construction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarginalError {
    /// A parameter failed validation for the given family.
    #[error("invalid {family} parameter: {reason}")]
    InvalidParameter {
        /// Distribution family name.
        family: &'static str,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// The requested family is not in the catalogue.
    #[error("unsupported distribution family `{0}`")]
    Unsupported(String),
}

/// A one-dimensional continuous marginal distribution.
///
/// # Example
///
/// ```
/// use uq_models::marginals::Marginal;
///
/// let normal = Marginal::normal(10.0, 2.0).unwrap();
/// let p = normal.cdf(10.0);
/// assert!((p - 0.5).abs() < 1e-12);
/// assert!((normal.inverse_cdf(p) - 10.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub enum Marginal {
    /// Gaussian with the given mean and standard deviation.
    Normal(Normal),
    /// Lognormal parameterized in log space.
    Lognormal(LogNormal),
    /// Continuous uniform on `[lower, upper]`.
    Uniform(Uniform),
    /// Exponential with the given rate.
    Exponential(Exp),
    /// Gamma in shape/rate form.
    Gamma(Gamma),
    /// Beta on a shifted and scaled support `[lower, upper]`.
    Beta {
        /// Standard beta kernel on `[0, 1]`.
        dist: Beta,
        /// Lower support bound.
        lower: f64,
        /// Upper support bound.
        upper: f64,
    },
    /// Weibull in shape/scale form.
    Weibull(Weibull),
    /// Largest-extreme-value Gumbel.
    Gumbel {
        /// Location parameter.
        location: f64,
        /// Scale parameter, positive.
        scale: f64,
    },
    /// Chi-squared with the given degrees of freedom.
    ChiSquared(ChiSquared),
}

fn ensure_finite(family: &'static str, name: &str, value: f64) -> Result<(), MarginalError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MarginalError::InvalidParameter {
            family,
            reason: format!("{name} must be finite, got {value}"),
        })
    }
}

fn ensure_positive(family: &'static str, name: &str, value: f64) -> Result<(), MarginalError> {
    ensure_finite(family, name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(MarginalError::InvalidParameter {
            family,
            reason: format!("{name} must be positive, got {value}"),
        })
    }
}

fn ensure_ordered(
    family: &'static str,
    lower: f64,
    upper: f64,
) -> Result<(), MarginalError> {
    ensure_finite(family, "lower", lower)?;
    ensure_finite(family, "upper", upper)?;
    if lower < upper {
        Ok(())
    } else {
        Err(MarginalError::InvalidParameter {
            family,
            reason: format!("lower ({lower}) must be below upper ({upper})"),
        })
    }
}

fn construction_failed<E: std::fmt::Display>(
    family: &'static str,
) -> impl FnOnce(E) -> MarginalError {
    move |err| MarginalError::InvalidParameter {
        family,
        reason: err.to_string(),
    }
}

impl Marginal {
    /// Gaussian marginal.
    pub fn normal(mean: f64, std_dev: f64) -> Result<Self, MarginalError> {
        ensure_finite("normal", "mean", mean)?;
        ensure_positive("normal", "std_dev", std_dev)?;
        Normal::new(mean, std_dev)
            .map(Self::Normal)
            .map_err(construction_failed("normal"))
    }

    /// Lognormal marginal from log-space location and scale.
    pub fn lognormal(location: f64, scale: f64) -> Result<Self, MarginalError> {
        ensure_finite("lognormal", "location", location)?;
        ensure_positive("lognormal", "scale", scale)?;
        LogNormal::new(location, scale)
            .map(Self::Lognormal)
            .map_err(construction_failed("lognormal"))
    }

    /// Lognormal marginal matching the given physical-space mean and standard
    /// deviation.
    pub fn lognormal_from_moments(mean: f64, std_dev: f64) -> Result<Self, MarginalError> {
        ensure_positive("lognormal", "mean", mean)?;
        ensure_positive("lognormal", "std_dev", std_dev)?;
        let cv_squared = (std_dev / mean).powi(2);
        let scale_squared = cv_squared.ln_1p();
        let location = mean.ln() - 0.5 * scale_squared;
        Self::lognormal(location, scale_squared.sqrt())
    }

    /// Uniform marginal on `[lower, upper]`.
    pub fn uniform(lower: f64, upper: f64) -> Result<Self, MarginalError> {
        ensure_ordered("uniform", lower, upper)?;
        Uniform::new(lower, upper)
            .map(Self::Uniform)
            .map_err(construction_failed("uniform"))
    }

    /// Exponential marginal with the given rate.
    pub fn exponential(rate: f64) -> Result<Self, MarginalError> {
        ensure_positive("exponential", "rate", rate)?;
        Exp::new(rate)
            .map(Self::Exponential)
            .map_err(construction_failed("exponential"))
    }

    /// Gamma marginal in shape/rate form.
    pub fn gamma(shape: f64, rate: f64) -> Result<Self, MarginalError> {
        ensure_positive("gamma", "shape", shape)?;
        ensure_positive("gamma", "rate", rate)?;
        Gamma::new(shape, rate)
            .map(Self::Gamma)
            .map_err(construction_failed("gamma"))
    }

    /// Beta marginal on a shifted and scaled support.
    pub fn beta(alpha: f64, beta: f64, lower: f64, upper: f64) -> Result<Self, MarginalError> {
        ensure_positive("beta", "alpha", alpha)?;
        ensure_positive("beta", "beta", beta)?;
        ensure_ordered("beta", lower, upper)?;
        Beta::new(alpha, beta)
            .map(|dist| Self::Beta { dist, lower, upper })
            .map_err(construction_failed("beta"))
    }

    /// Weibull marginal in shape/scale form.
    pub fn weibull(shape: f64, scale: f64) -> Result<Self, MarginalError> {
        ensure_positive("weibull", "shape", shape)?;
        ensure_positive("weibull", "scale", scale)?;
        Weibull::new(shape, scale)
            .map(Self::Weibull)
            .map_err(construction_failed("weibull"))
    }

    /// Largest-extreme-value Gumbel marginal.
    pub fn gumbel(location: f64, scale: f64) -> Result<Self, MarginalError> {
        ensure_finite("gumbel", "location", location)?;
        ensure_positive("gumbel", "scale", scale)?;
        Ok(Self::Gumbel { location, scale })
    }

    /// Chi-squared marginal.
    pub fn chi_squared(freedom: f64) -> Result<Self, MarginalError> {
        ensure_positive("chi_squared", "freedom", freedom)?;
        ChiSquared::new(freedom)
            .map(Self::ChiSquared)
            .map_err(construction_failed("chi_squared"))
    }

    /// Catalogue lookup by family name with positional parameters.
    ///
    /// This is the entry point external job loaders use; an unknown family
    /// yields [`MarginalError::Unsupported`].
    pub fn from_name(family: &str, params: &[f64]) -> Result<Self, MarginalError> {
        match family {
            "normal" => {
                params_exact("normal", params, 2)?;
                Self::normal(params[0], params[1])
            }
            "lognormal" => {
                params_exact("lognormal", params, 2)?;
                Self::lognormal(params[0], params[1])
            }
            "uniform" => {
                params_exact("uniform", params, 2)?;
                Self::uniform(params[0], params[1])
            }
            "exponential" => {
                params_exact("exponential", params, 1)?;
                Self::exponential(params[0])
            }
            "gamma" => {
                params_exact("gamma", params, 2)?;
                Self::gamma(params[0], params[1])
            }
            "beta" => {
                params_exact("beta", params, 4)?;
                Self::beta(params[0], params[1], params[2], params[3])
            }
            "weibull" => {
                params_exact("weibull", params, 2)?;
                Self::weibull(params[0], params[1])
            }
            "gumbel" => {
                params_exact("gumbel", params, 2)?;
                Self::gumbel(params[0], params[1])
            }
            "chi_squared" => {
                params_exact("chi_squared", params, 1)?;
                Self::chi_squared(params[0])
            }
            other => Err(MarginalError::Unsupported(other.to_string())),
        }
    }

    /// Family name as accepted by [`Marginal::from_name`].
    pub fn family(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::Lognormal(_) => "lognormal",
            Self::Uniform(_) => "uniform",
            Self::Exponential(_) => "exponential",
            Self::Gamma(_) => "gamma",
            Self::Beta { .. } => "beta",
            Self::Weibull(_) => "weibull",
            Self::Gumbel { .. } => "gumbel",
            Self::ChiSquared(_) => "chi_squared",
        }
    }

    /// Cumulative distribution function.
    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.cdf(x),
            Self::Lognormal(d) => d.cdf(x),
            Self::Uniform(d) => d.cdf(x),
            Self::Exponential(d) => d.cdf(x),
            Self::Gamma(d) => d.cdf(x),
            Self::Beta { dist, lower, upper } => {
                let t = ((x - lower) / (upper - lower)).clamp(0.0, 1.0);
                dist.cdf(t)
            }
            Self::Weibull(d) => d.cdf(x),
            Self::Gumbel { location, scale } => {
                let t = (x - location) / scale;
                (-(-t).exp()).exp()
            }
            Self::ChiSquared(d) => d.cdf(x),
        }
    }

    /// Quantile function.
    ///
    /// The probability is clamped into
    /// `[PROBABILITY_FLOOR, 1 - PROBABILITY_FLOOR]` so that deep-tail
    /// inversions stay finite.
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        let p = p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
        match self {
            Self::Normal(d) => d.inverse_cdf(p),
            Self::Lognormal(d) => d.inverse_cdf(p),
            Self::Uniform(d) => d.inverse_cdf(p),
            Self::Exponential(d) => d.inverse_cdf(p),
            Self::Gamma(d) => d.inverse_cdf(p),
            Self::Beta { dist, lower, upper } => lower + (upper - lower) * dist.inverse_cdf(p),
            Self::Weibull(d) => d.inverse_cdf(p),
            Self::Gumbel { location, scale } => location - scale * (-p.ln()).ln(),
            Self::ChiSquared(d) => d.inverse_cdf(p),
        }
    }

    /// Probability density function.
    pub fn pdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.pdf(x),
            Self::Lognormal(d) => d.pdf(x),
            Self::Uniform(d) => d.pdf(x),
            Self::Exponential(d) => d.pdf(x),
            Self::Gamma(d) => d.pdf(x),
            Self::Beta { dist, lower, upper } => {
                if x < *lower || x > *upper {
                    0.0
                } else {
                    dist.pdf((x - lower) / (upper - lower)) / (upper - lower)
                }
            }
            Self::Weibull(d) => d.pdf(x),
            Self::Gumbel { location, scale } => {
                let t = (x - location) / scale;
                (-(t + (-t).exp())).exp() / scale
            }
            Self::ChiSquared(d) => d.pdf(x),
        }
    }

    /// Distribution mean, when defined.
    pub fn mean(&self) -> Option<f64> {
        match self {
            Self::Normal(d) => d.mean(),
            Self::Lognormal(d) => d.mean(),
            Self::Uniform(d) => d.mean(),
            Self::Exponential(d) => d.mean(),
            Self::Gamma(d) => d.mean(),
            Self::Beta { dist, lower, upper } => {
                dist.mean().map(|m| lower + (upper - lower) * m)
            }
            Self::Weibull(d) => d.mean(),
            Self::Gumbel { location, scale } => Some(location + scale * EULER_GAMMA),
            Self::ChiSquared(d) => d.mean(),
        }
    }

    /// Distribution standard deviation, when defined.
    pub fn std_dev(&self) -> Option<f64> {
        match self {
            Self::Normal(d) => d.std_dev(),
            Self::Lognormal(d) => d.std_dev(),
            Self::Uniform(d) => d.std_dev(),
            Self::Exponential(d) => d.std_dev(),
            Self::Gamma(d) => d.std_dev(),
            Self::Beta { dist, lower, upper } => {
                dist.std_dev().map(|s| (upper - lower) * s)
            }
            Self::Weibull(d) => d.std_dev(),
            Self::Gumbel { scale, .. } => {
                Some(scale * std::f64::consts::PI / 6.0_f64.sqrt())
            }
            Self::ChiSquared(d) => d.std_dev(),
        }
    }
}

fn params_exact(
    family: &'static str,
    params: &[f64],
    expected: usize,
) -> Result<(), MarginalError> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(MarginalError::InvalidParameter {
            family,
            reason: format!("expected {expected} parameters, got {}", params.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_quantile_round_trip() {
        let normal = Marginal::normal(144.0, 20.0).unwrap();
        for &p in &[0.01, 0.1, 0.5, 0.9, 0.99] {
            let x = normal.inverse_cdf(p);
            assert_relative_eq!(normal.cdf(x), p, epsilon = 1e-10);
        }
        assert_relative_eq!(normal.mean().unwrap(), 144.0);
        assert_relative_eq!(normal.std_dev().unwrap(), 20.0);
    }

    #[test]
    fn test_lognormal_from_moments_recovers_moments() {
        let lognormal = Marginal::lognormal_from_moments(20.0, 5.0).unwrap();
        assert_relative_eq!(lognormal.mean().unwrap(), 20.0, epsilon = 1e-10);
        assert_relative_eq!(lognormal.std_dev().unwrap(), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_uniform_midpoint_and_edges() {
        let uniform = Marginal::uniform(2.0, 6.0).unwrap();
        assert_relative_eq!(uniform.inverse_cdf(0.5), 4.0, epsilon = 1e-12);
        assert_relative_eq!(uniform.cdf(1.0), 0.0);
        assert_relative_eq!(uniform.cdf(7.0), 1.0);
        // The probability clamp keeps the extreme quantiles on the support.
        assert!(uniform.inverse_cdf(0.0) >= 2.0 - 1e-9);
        assert!(uniform.inverse_cdf(1.0) <= 6.0 + 1e-9);
    }

    #[test]
    fn test_exponential_characteristic_point() {
        let exponential = Marginal::exponential(2.0).unwrap();
        assert_relative_eq!(
            exponential.cdf(0.5),
            1.0 - (-1.0_f64).exp(),
            epsilon = 1e-12
        );
        assert_relative_eq!(exponential.mean().unwrap(), 0.5);
    }

    #[test]
    fn test_shifted_beta_support_and_mean() {
        let beta = Marginal::beta(2.0, 2.0, 10.0, 20.0).unwrap();
        assert_relative_eq!(beta.mean().unwrap(), 15.0, epsilon = 1e-12);
        assert_relative_eq!(beta.cdf(10.0), 0.0);
        assert_relative_eq!(beta.cdf(20.0), 1.0);
        assert_relative_eq!(beta.cdf(15.0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(beta.pdf(9.0), 0.0);
        // Symmetric kernel peaks at the middle of the support.
        assert!(beta.pdf(15.0) > beta.pdf(12.0));
    }

    #[test]
    fn test_gumbel_closed_forms() {
        let gumbel = Marginal::gumbel(5.0, 2.0).unwrap();
        assert_relative_eq!(gumbel.cdf(5.0), (-1.0_f64).exp(), epsilon = 1e-12);
        for &p in &[0.05, 0.3, 0.5, 0.95] {
            assert_relative_eq!(gumbel.cdf(gumbel.inverse_cdf(p)), p, epsilon = 1e-12);
        }
        assert_relative_eq!(gumbel.mean().unwrap(), 5.0 + 2.0 * EULER_GAMMA, epsilon = 1e-12);
        assert_relative_eq!(
            gumbel.std_dev().unwrap(),
            2.0 * std::f64::consts::PI / 6.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_weibull_characteristic_point() {
        let weibull = Marginal::weibull(1.8, 3.0).unwrap();
        // F(scale) = 1 - e^{-1} for every shape.
        assert_relative_eq!(weibull.cdf(3.0), 1.0 - (-1.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_gamma_and_chi_squared_moments() {
        let gamma = Marginal::gamma(3.0, 2.0).unwrap();
        assert_relative_eq!(gamma.mean().unwrap(), 1.5, epsilon = 1e-12);

        let chi_squared = Marginal::chi_squared(4.0).unwrap();
        assert_relative_eq!(chi_squared.mean().unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(chi_squared.std_dev().unwrap(), 8.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_from_name_dispatch() {
        let normal = Marginal::from_name("normal", &[1.0, 2.0]).unwrap();
        assert_eq!(normal.family(), "normal");

        let beta = Marginal::from_name("beta", &[2.0, 3.0, 0.0, 1.0]).unwrap();
        assert_eq!(beta.family(), "beta");

        let err = Marginal::from_name("triangular", &[0.0, 1.0, 2.0]).unwrap_err();
        assert_eq!(err, MarginalError::Unsupported("triangular".to_string()));

        let err = Marginal::from_name("normal", &[1.0]).unwrap_err();
        assert!(matches!(err, MarginalError::InvalidParameter { family: "normal", .. }));
    }

    #[test]
    fn test_parameter_validation() {
        assert!(Marginal::normal(0.0, 0.0).is_err());
        assert!(Marginal::normal(f64::NAN, 1.0).is_err());
        assert!(Marginal::uniform(3.0, 3.0).is_err());
        assert!(Marginal::beta(-1.0, 2.0, 0.0, 1.0).is_err());
        assert!(Marginal::exponential(-2.0).is_err());
        assert!(Marginal::gumbel(0.0, 0.0).is_err());
        assert!(Marginal::lognormal_from_moments(-5.0, 1.0).is_err());
    }
}
