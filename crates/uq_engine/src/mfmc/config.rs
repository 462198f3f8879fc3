//! Estimation run configuration.
//!
//! [`MfmcConfig`] carries everything a run needs besides the input model and
//! the fidelity levels: the evaluation budget, the pilot size, the seed and
//! the rank layout for partitioned execution. Configurations deserialize from
//! job files; [`MfmcConfig::validate`] re-checks deserialized instances, so
//! the builder and the JSON path enforce the same rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum evaluation budget, in highest-fidelity-equivalent evaluations.
pub const MAX_BUDGET: f64 = 100_000_000.0;

/// Minimum pilot size; variances and correlations need at least two points.
pub const MIN_PILOT_SIZE: usize = 2;

/// Pilot size used when a job file or builder does not give one.
pub const DEFAULT_PILOT_SIZE: usize = 32;

/// Configuration error raised at build or validation time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter value is outside its valid range.
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// Description of the violation.
        reason: String,
    },
    /// The rank does not address a process in the configured layout.
    #[error("rank {rank} is outside 0..{n_procs}")]
    RankOutOfRange {
        /// Configured rank.
        rank: usize,
        /// Configured process count.
        n_procs: usize,
    },
    /// A required field was not set.
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    /// Two quantities of interest share a name.
    #[error("duplicate quantity of interest `{0}`")]
    DuplicateQuantity(String),
}

/// Immutable estimation run configuration.
///
/// Use [`MfmcConfig::builder`] to construct instances in code, or deserialize
/// from a job file. The budget is expressed in highest-fidelity-equivalent
/// evaluations: a budget of 100 buys what 100 evaluations of the most
/// expensive model would cost, however the allocator chooses to spend it.
///
/// # Examples
///
/// ```rust
/// use uq_engine::mfmc::MfmcConfig;
///
/// let config = MfmcConfig::builder()
///     .budget(200.0)
///     .pilot_size(16)
///     .seed(42)
///     .qoi("peak_stress")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.pilot_size(), 16);
/// assert_eq!(config.n_procs(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfmcConfig {
    /// Evaluation budget in highest-fidelity-equivalent evaluations.
    budget: f64,
    /// Shared samples evaluated at every level before allocation.
    #[serde(default = "default_pilot_size")]
    pilot_size: usize,
    /// Run seed; every random draw derives from it.
    seed: u64,
    /// Rank of this process in the partitioned layout.
    #[serde(default)]
    rank: usize,
    /// Total number of partitioned processes.
    #[serde(default = "default_n_procs")]
    n_procs: usize,
    /// Names of the model outputs, in model output order.
    qoi_names: Vec<String>,
}

fn default_pilot_size() -> usize {
    DEFAULT_PILOT_SIZE
}

fn default_n_procs() -> usize {
    1
}

impl MfmcConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> MfmcConfigBuilder {
        MfmcConfigBuilder::default()
    }

    /// Returns the budget in highest-fidelity-equivalent evaluations.
    #[inline]
    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Returns the pilot size.
    #[inline]
    pub fn pilot_size(&self) -> usize {
        self.pilot_size
    }

    /// Returns the run seed.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the rank of this process.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the configured process count.
    #[inline]
    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    /// Returns the quantity-of-interest names in model output order.
    #[inline]
    pub fn qoi_names(&self) -> &[String] {
        &self.qoi_names
    }

    /// Returns the number of quantities of interest.
    #[inline]
    pub fn n_qoi(&self) -> usize {
        self.qoi_names.len()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the budget is non-positive, non-finite or above [`MAX_BUDGET`]
    /// - the pilot size is below [`MIN_PILOT_SIZE`]
    /// - the rank layout is empty or the rank falls outside it
    /// - no quantity of interest is named, or a name repeats
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "budget",
                reason: format!("must be positive and finite, got {}", self.budget),
            });
        }
        if self.budget > MAX_BUDGET {
            return Err(ConfigError::Invalid {
                name: "budget",
                reason: format!("must not exceed {MAX_BUDGET}, got {}", self.budget),
            });
        }
        if self.pilot_size < MIN_PILOT_SIZE {
            return Err(ConfigError::Invalid {
                name: "pilot_size",
                reason: format!("must be at least {MIN_PILOT_SIZE}, got {}", self.pilot_size),
            });
        }
        if self.n_procs == 0 {
            return Err(ConfigError::Invalid {
                name: "n_procs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rank >= self.n_procs {
            return Err(ConfigError::RankOutOfRange {
                rank: self.rank,
                n_procs: self.n_procs,
            });
        }
        if self.qoi_names.is_empty() {
            return Err(ConfigError::Invalid {
                name: "qoi_names",
                reason: "at least one quantity of interest is required".to_string(),
            });
        }
        for (index, name) in self.qoi_names.iter().enumerate() {
            if self.qoi_names[..index].contains(name) {
                return Err(ConfigError::DuplicateQuantity(name.clone()));
            }
        }
        Ok(())
    }
}

/// Builder for [`MfmcConfig`].
///
/// `budget`, `seed` and at least one quantity of interest are required;
/// everything else has a sensible single-process default.
#[derive(Debug, Clone, Default)]
pub struct MfmcConfigBuilder {
    budget: Option<f64>,
    pilot_size: Option<usize>,
    seed: Option<u64>,
    rank: usize,
    n_procs: Option<usize>,
    qoi_names: Vec<String>,
}

impl MfmcConfigBuilder {
    /// Sets the budget in highest-fidelity-equivalent evaluations.
    #[inline]
    pub fn budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Sets the pilot size (default [`DEFAULT_PILOT_SIZE`]).
    #[inline]
    pub fn pilot_size(mut self, pilot_size: usize) -> Self {
        self.pilot_size = Some(pilot_size);
        self
    }

    /// Sets the run seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the rank of this process (default 0).
    #[inline]
    pub fn rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Sets the process count (default 1).
    #[inline]
    pub fn n_procs(mut self, n_procs: usize) -> Self {
        self.n_procs = Some(n_procs);
        self
    }

    /// Appends one quantity-of-interest name.
    #[inline]
    pub fn qoi(mut self, name: impl Into<String>) -> Self {
        self.qoi_names.push(name.into());
        self
    }

    /// Appends several quantity-of-interest names.
    pub fn qoi_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qoi_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required field is missing or
    /// [`MfmcConfig::validate`] rejects the values.
    pub fn build(self) -> Result<MfmcConfig, ConfigError> {
        let budget = self.budget.ok_or(ConfigError::Missing("budget"))?;
        let seed = self.seed.ok_or(ConfigError::Missing("seed"))?;
        let config = MfmcConfig {
            budget,
            pilot_size: self.pilot_size.unwrap_or(DEFAULT_PILOT_SIZE),
            seed,
            rank: self.rank,
            n_procs: self.n_procs.unwrap_or(1),
            qoi_names: self.qoi_names,
        };
        config.validate()?;
        Ok(config)
    }
}
