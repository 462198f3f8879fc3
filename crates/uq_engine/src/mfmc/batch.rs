//! Shared sample batch pieces.
//!
//! Every fidelity level evaluates the same input realizations, identified by
//! a global sample index. A realization has continuous columns drawn through
//! the isoprobabilistic transform plus optional categorical columns; the
//! categorical strings ride along in the sample table for downstream
//! consumers while the numerical models receive only the continuous part.

use rand::Rng;
use serde::Serialize;

use super::config::ConfigError;

/// A string-valued input sampled alongside the continuous variables.
///
/// # Examples
///
/// ```rust
/// use uq_engine::mfmc::CategoricalVariable;
///
/// let material = CategoricalVariable::uniform(
///     "material",
///     vec!["steel".to_string(), "aluminium".to_string()],
/// )
/// .unwrap();
/// assert_eq!(material.categories().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalVariable {
    name: String,
    categories: Vec<String>,
    /// Normalized to sum to one at construction.
    weights: Vec<f64>,
}

impl CategoricalVariable {
    /// Creates a variable drawing each category with equal probability.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `categories` is empty.
    pub fn uniform(name: impl Into<String>, categories: Vec<String>) -> Result<Self, ConfigError> {
        let weights = vec![1.0; categories.len()];
        Self::weighted(name, categories, weights)
    }

    /// Creates a variable drawing categories proportionally to `weights`.
    ///
    /// Weights need not sum to one; they are normalized here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `categories` is empty, the lengths differ,
    /// or any weight is non-finite or non-positive.
    pub fn weighted(
        name: impl Into<String>,
        categories: Vec<String>,
        weights: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if categories.is_empty() {
            return Err(ConfigError::Invalid {
                name: "categorical",
                reason: "at least one category is required".to_string(),
            });
        }
        if weights.len() != categories.len() {
            return Err(ConfigError::Invalid {
                name: "categorical",
                reason: format!(
                    "{} weights for {} categories",
                    weights.len(),
                    categories.len()
                ),
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(ConfigError::Invalid {
                name: "categorical",
                reason: "weights must be finite and positive".to_string(),
            });
        }
        let total: f64 = weights.iter().sum();
        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self {
            name: name.into(),
            categories,
            weights,
        })
    }

    /// Returns the variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the categories in declaration order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Draws one category, consuming exactly one uniform variate from `rng`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        let last = self.categories.len() - 1;
        for (category, weight) in self.categories[..last].iter().zip(&self.weights) {
            acc += weight;
            if u < acc {
                return category;
            }
        }
        // Rounding in the cumulative sum lands here at worst.
        &self.categories[last]
    }
}

/// One row of the combined sample table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    /// Global sample index.
    pub index: usize,
    /// Physical-space continuous inputs, in variable order.
    pub inputs: Vec<f64>,
    /// Categorical realizations, in declaration order.
    pub categories: Vec<String>,
    /// Outputs per level, `None` where the level did not evaluate this index.
    pub outputs: Vec<Option<Vec<f64>>>,
    /// True when an evaluation failure excluded this index from estimation.
    pub excluded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_uniform_draws_cover_all_categories() {
        let variable =
            CategoricalVariable::uniform("material", names(&["steel", "timber", "concrete"]))
                .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let drawn = variable.draw(&mut rng);
            let slot = variable
                .categories()
                .iter()
                .position(|c| c == drawn)
                .unwrap();
            counts[slot] += 1;
        }
        for count in counts {
            // Each category should land near 1000 of 3000 draws.
            assert!((700..1300).contains(&count), "count {count}");
        }
    }

    #[test]
    fn test_weighted_draws_follow_weights() {
        let variable = CategoricalVariable::weighted(
            "grade",
            names(&["common", "rare"]),
            vec![9.0, 1.0],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let common = (0..10_000)
            .filter(|_| variable.draw(&mut rng) == "common")
            .count();
        assert!((8600..9400).contains(&common), "common {common}");
    }

    #[test]
    fn test_draw_is_deterministic_per_stream() {
        let variable = CategoricalVariable::uniform("m", names(&["a", "b", "c"])).unwrap();
        let first: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(5);
            (0..64).map(|_| variable.draw(&mut rng).to_string()).collect()
        };
        let second: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(5);
            (0..64).map(|_| variable.draw(&mut rng).to_string()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_validation_rejects_bad_inputs() {
        assert!(CategoricalVariable::uniform("empty", Vec::new()).is_err());
        assert!(
            CategoricalVariable::weighted("short", names(&["a", "b"]), vec![1.0]).is_err()
        );
        assert!(
            CategoricalVariable::weighted("neg", names(&["a", "b"]), vec![1.0, -1.0]).is_err()
        );
        assert!(
            CategoricalVariable::weighted("nan", names(&["a", "b"]), vec![1.0, f64::NAN]).is_err()
        );
    }

    #[test]
    fn test_single_category_always_drawn() {
        let variable = CategoricalVariable::uniform("only", names(&["solo"])).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..16 {
            assert_eq!(variable.draw(&mut rng), "solo");
        }
    }
}
