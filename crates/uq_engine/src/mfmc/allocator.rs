//! Budget allocation across fidelity levels.
//!
//! Given pilot estimates of each level's output variance and its correlation
//! with the highest-fidelity outputs, the allocator spends the evaluation
//! budget where it buys the most variance reduction: the analytic optimum
//! assigns each cheaper level a count ratio
//! `r_k = sqrt(w_0 (rho_k^2 - rho_{k+1}^2) / (w_k (1 - rho_1^2)))`
//! relative to the highest-fidelity count, with the correlation past the last
//! level taken as zero. Levels whose squared correlation fails to decrease
//! below their more expensive neighbour's are screened out first; with no
//! usable cheap level left the plan degenerates to single-level Monte Carlo.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::runlog::{RunEvent, RunLog};

/// Correlation magnitude cap applied before allocation.
///
/// Pilot correlations of perfectly dependent outputs can round to exactly one,
/// which would send the optimal count ratios to infinity.
pub(crate) const MAX_ABS_CORRELATION: f64 = 1.0 - 1e-9;

/// Pilot-phase summary of one fidelity level for the driving quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelPilot {
    /// Model identifier.
    pub name: String,
    /// Relative cost of one evaluation.
    pub cost: f64,
    /// Pilot mean.
    pub mean: f64,
    /// Pilot variance, Bessel-corrected. NaN when the pilot collapsed.
    pub variance: f64,
    /// Pearson correlation with the highest-fidelity outputs; 1 for the
    /// highest-fidelity level itself, NaN when undefined.
    pub correlation: f64,
}

/// Evaluation counts and control coefficients for one retained level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAllocation {
    /// Index of the level in the engine's model list.
    pub level: usize,
    /// Model identifier.
    pub name: String,
    /// Relative cost of one evaluation.
    pub cost: f64,
    /// Number of samples to evaluate at this level.
    pub count: usize,
    /// Control-variate coefficient; 1 for the highest-fidelity level,
    /// `rho_k sigma_0 / sigma_k` otherwise.
    pub control_coefficient: f64,
    /// Pilot correlation used for this level, capped in magnitude.
    pub correlation: f64,
}

/// The evaluation schedule produced by [`MfmcAllocator::allocate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Retained levels, highest fidelity first, counts non-decreasing.
    pub levels: Vec<LevelAllocation>,
    /// Budget in highest-fidelity-equivalent evaluations.
    pub budget: f64,
    /// Predicted ratio of the estimator variance to that of single-level
    /// Monte Carlo spending the same budget. Near 1 for a degenerate plan.
    pub variance_reduction: f64,
    /// True when every low-fidelity level was screened out.
    pub is_single_level: bool,
    /// Quantity of interest whose pilot statistics drove the allocation.
    pub driver: String,
}

impl AllocationPlan {
    /// Largest per-level count; the number of input samples a run draws.
    pub fn batch_size(&self) -> usize {
        self.levels.last().map_or(0, |level| level.count)
    }

    /// Samples evaluated at the highest-fidelity level.
    pub fn high_fidelity_count(&self) -> usize {
        self.levels.first().map_or(0, |level| level.count)
    }

    /// Total planned spend, in the same relative units as the level costs.
    pub fn total_cost(&self) -> f64 {
        self.levels
            .iter()
            .map(|level| level.cost * level.count as f64)
            .sum()
    }

    /// Factor mapping the high-fidelity output variance to the variance of
    /// the combined mean estimator.
    ///
    /// For a single level this is `1/n_0`, the plain Monte Carlo scale; each
    /// retained cheaper level subtracts `(1/n_{k-1} - 1/n_k) rho_k^2`.
    pub fn variance_scale(&self) -> f64 {
        let Some(first) = self.levels.first() else {
            return f64::NAN;
        };
        let mut scale = 1.0 / first.count as f64;
        for pair in self.levels.windows(2) {
            let prev = pair[0].count as f64;
            let curr = pair[1].count as f64;
            scale -= (1.0 / prev - 1.0 / curr) * pair[1].correlation * pair[1].correlation;
        }
        scale
    }
}

/// One retained level with capped correlation, in screening order.
struct Kept {
    index: usize,
    name: String,
    cost: f64,
    sigma: f64,
    rho: f64,
    rho_sq: f64,
}

/// Computes evaluation schedules from pilot statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MfmcAllocator {
    budget: f64,
    pilot_size: usize,
}

impl MfmcAllocator {
    /// Creates an allocator for a budget (in highest-fidelity-equivalent
    /// evaluations) and the pilot size already spent per level.
    pub fn new(budget: f64, pilot_size: usize) -> Self {
        debug_assert!(budget > 0.0);
        debug_assert!(pilot_size >= 2);
        Self { budget, pilot_size }
    }

    /// Screens the levels and spends the budget.
    ///
    /// `pilot` lists the levels in engine order, highest fidelity first.
    /// Screening decisions and degenerate fallbacks are recorded in `log`;
    /// the returned plan is always usable.
    ///
    /// # Panics
    ///
    /// Panics when `pilot` is empty; the engine never is.
    pub fn allocate(&self, pilot: &[LevelPilot], driver: &str, log: &mut RunLog) -> AllocationPlan {
        assert!(!pilot.is_empty(), "allocation requires at least one level");
        let kept = self.screen(pilot, log);
        if kept.len() == 1 {
            if pilot.len() > 1 {
                log.record(RunEvent::AllocationDegenerate {
                    reason: "no usable low-fidelity level after screening".to_string(),
                });
            }
            return self.single_level_plan(&pilot[0], driver);
        }
        self.control_variate_plan(&kept, driver)
    }

    /// Keeps the highest-fidelity level plus every cheaper level with a
    /// usable variance and a strictly decreasing squared correlation.
    fn screen(&self, pilot: &[LevelPilot], log: &mut RunLog) -> Vec<Kept> {
        let mut kept = vec![Kept {
            index: 0,
            name: pilot[0].name.clone(),
            cost: pilot[0].cost,
            sigma: pilot[0].variance.max(0.0).sqrt(),
            rho: 1.0,
            rho_sq: 1.0,
        }];
        let mut last_rho_sq = 1.0;

        for (index, level) in pilot.iter().enumerate().skip(1) {
            let rho = level
                .correlation
                .clamp(-MAX_ABS_CORRELATION, MAX_ABS_CORRELATION);
            let rho_sq = rho * rho;
            let reason = if !level.variance.is_finite() || level.variance <= 0.0 {
                Some(format!("pilot variance {} is unusable", level.variance))
            } else if !level.correlation.is_finite() {
                Some("pilot correlation is undefined".to_string())
            } else if rho_sq == 0.0 {
                Some("no correlation with the highest-fidelity level".to_string())
            } else if rho_sq >= last_rho_sq {
                Some(format!(
                    "squared correlation {rho_sq:.6} does not decrease below {last_rho_sq:.6}"
                ))
            } else {
                None
            };

            match reason {
                Some(reason) => log.record(RunEvent::DroppedLevel {
                    level: level.name.clone(),
                    reason,
                }),
                None => {
                    kept.push(Kept {
                        index,
                        name: level.name.clone(),
                        cost: level.cost,
                        sigma: level.variance.sqrt(),
                        rho,
                        rho_sq,
                    });
                    last_rho_sq = rho_sq;
                }
            }
        }
        kept
    }

    fn control_variate_plan(&self, kept: &[Kept], driver: &str) -> AllocationPlan {
        let w0 = kept[0].cost;
        let sigma0 = kept[0].sigma;
        let rho1_sq = kept[1].rho_sq;

        // Count ratios relative to the highest-fidelity count; the correlation
        // past the last level is zero.
        let mut ratios = vec![1.0];
        for k in 1..kept.len() {
            let next_rho_sq = kept.get(k + 1).map_or(0.0, |level| level.rho_sq);
            let ratio =
                (w0 * (kept[k].rho_sq - next_rho_sq) / (kept[k].cost * (1.0 - rho1_sq))).sqrt();
            ratios.push(ratio);
        }

        let total_cost = self.budget * w0;
        let spend_per_hf: f64 = kept
            .iter()
            .zip(&ratios)
            .map(|(level, ratio)| level.cost * ratio)
            .sum();
        let n0 = ((total_cost / spend_per_hf).floor() as usize).max(self.pilot_size);

        let mut counts = vec![n0];
        for k in 1..kept.len() {
            let target = (n0 as f64 * ratios[k]).ceil();
            // One level must never be scheduled past what the whole budget
            // could buy there; capped correlations would otherwise explode
            // the tail counts when the pilot floor lifts n_0.
            let cap = (total_cost / kept[k].cost).ceil();
            let count = target.min(cap) as usize;
            counts.push(count.max(counts[k - 1]));
        }

        let levels: Vec<LevelAllocation> = kept
            .iter()
            .zip(&counts)
            .enumerate()
            .map(|(k, (level, &count))| LevelAllocation {
                level: level.index,
                name: level.name.clone(),
                cost: level.cost,
                count,
                control_coefficient: if k == 0 {
                    1.0
                } else {
                    level.rho * sigma0 / level.sigma
                },
                correlation: level.rho,
            })
            .collect();

        let mut plan = AllocationPlan {
            levels,
            budget: self.budget,
            variance_reduction: 1.0,
            is_single_level: false,
            driver: driver.to_string(),
        };
        plan.variance_reduction = self.budget * plan.variance_scale();
        debug!(
            levels = plan.levels.len(),
            batch = plan.batch_size(),
            variance_reduction = plan.variance_reduction,
            "control-variate schedule"
        );
        plan
    }

    fn single_level_plan(&self, level: &LevelPilot, driver: &str) -> AllocationPlan {
        let count = (self.budget.floor() as usize).max(self.pilot_size);
        let mut plan = AllocationPlan {
            levels: vec![LevelAllocation {
                level: 0,
                name: level.name.clone(),
                cost: level.cost,
                count,
                control_coefficient: 1.0,
                correlation: 1.0,
            }],
            budget: self.budget,
            variance_reduction: 1.0,
            is_single_level: true,
            driver: driver.to_string(),
        };
        plan.variance_reduction = self.budget * plan.variance_scale();
        plan
    }
}
