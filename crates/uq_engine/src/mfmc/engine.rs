//! Run orchestration: pilot, schedule, evaluate, reduce.
//!
//! [`MfmcEngine`] owns the input transform, the fidelity levels and the run
//! configuration. A run proceeds in phases:
//!
//! 1. **Pilot**: every level evaluates the same small set of shared samples.
//!    Each rank computes the full pilot, so the schedule derived from it is
//!    identical everywhere without communication.
//! 2. **Schedule**: [`MfmcAllocator`] screens the levels on the pilot
//!    statistics of the first quantity of interest and spends the budget.
//! 3. **Main**: indices past the pilot are partitioned round-robin across
//!    ranks and evaluated from a rayon pool; a failure excludes its sample
//!    index from every level.
//! 4. **Reduce**: partial runs merge into one output set; moments combine
//!    via the control-variate estimator and land in [`RunResults`] next to
//!    the sample table and the degradation log.
//!
//! Because every sample index owns its random substream, the reduced results
//! are bit-identical for any process count.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, info_span};

use uq_core::math::moments;
use uq_models::nataf::NatafTransform;

use super::allocator::{AllocationPlan, LevelPilot, MfmcAllocator};
use super::batch::{CategoricalVariable, SampleRecord};
use super::config::MfmcConfig;
use super::runlog::{RunEvent, RunLog};
use crate::error::EngineError;
use crate::fidelity::{FidelityModel, ModelEvalError};
use crate::rng::SampleRng;

/// Serializes possibly-undefined moments as JSON null instead of erroring.
fn nullable<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Final statistics for one quantity of interest.
///
/// Undefined moments are NaN in memory and `null` in serialized form; the
/// run log says why each one is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentStatistics {
    /// Quantity of interest name.
    pub name: String,
    /// Combined control-variate mean estimate.
    #[serde(serialize_with = "nullable")]
    pub mean: f64,
    /// Predicted standard error of the mean estimate.
    #[serde(serialize_with = "nullable")]
    pub mean_std_error: f64,
    /// Sample standard deviation of the highest-fidelity outputs.
    #[serde(serialize_with = "nullable")]
    pub std_dev: f64,
    /// Sample skewness of the highest-fidelity outputs.
    #[serde(serialize_with = "nullable")]
    pub skewness: f64,
    /// Raw sample kurtosis of the highest-fidelity outputs; normal data
    /// tends to 3.
    #[serde(serialize_with = "nullable")]
    pub kurtosis: f64,
    /// Highest-fidelity samples that survived exclusion.
    pub effective_samples: usize,
    /// True when every produced value of this quantity is an integer within
    /// tolerance. Reporting hint for table writers.
    pub integer_valued: bool,
}

/// One rank's share of a run, produced by [`MfmcEngine::run_local`].
///
/// Partials are plain data: serialize them across whatever transport links
/// the ranks, then feed the full set to [`MfmcEngine::reduce`] anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRun {
    rank: usize,
    n_procs: usize,
    plan: AllocationPlan,
    /// Per engine level: evaluated `(sample index, outputs)` pairs.
    level_outputs: Vec<Vec<(usize, Vec<f64>)>>,
    /// Sample indices excluded by evaluation failures seen on this rank.
    excluded: Vec<usize>,
    /// Events observed on this rank, already mirrored to `tracing`.
    events: Vec<RunEvent>,
}

impl PartialRun {
    /// Rank that produced this partial.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The evaluation schedule this rank worked from.
    pub fn plan(&self) -> &AllocationPlan {
        &self.plan
    }
}

/// Output of a completed estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    /// Per-quantity statistics, in configured order.
    pub statistics: Vec<MomentStatistics>,
    /// Combined sample table, one row per drawn index.
    pub table: Vec<SampleRecord>,
    /// The schedule that produced the estimates.
    pub plan: AllocationPlan,
    /// Ordered degradation log.
    pub log: RunLog,
}

impl RunResults {
    /// Looks up the statistics for a named quantity.
    pub fn statistic(&self, name: &str) -> Option<&MomentStatistics> {
        self.statistics.iter().find(|s| s.name == name)
    }
}

/// Multi-fidelity Monte Carlo estimation engine.
///
/// Construct with [`MfmcEngine::new`], then either [`run`](Self::run) for a
/// single process or [`run_local`](Self::run_local) on every rank followed by
/// one [`reduce`](Self::reduce).
pub struct MfmcEngine {
    transform: NatafTransform,
    models: Vec<Box<dyn FidelityModel>>,
    categoricals: Vec<CategoricalVariable>,
    config: MfmcConfig,
    rng: SampleRng,
}

impl std::fmt::Debug for MfmcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfmcEngine")
            .field("transform", &self.transform)
            .field(
                "models",
                &self.models.iter().map(|model| model.name()).collect::<Vec<_>>(),
            )
            .field("categoricals", &self.categoricals)
            .field("config", &self.config)
            .field("rng", &self.rng)
            .finish()
    }
}

impl MfmcEngine {
    /// Builds an engine over a transform and fidelity levels.
    ///
    /// `models` lists the levels highest fidelity first; costs must be
    /// positive, finite and non-increasing, and names unique.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the configuration fails validation, no
    /// level is given, or a level breaks the cost ordering or naming rules.
    pub fn new(
        transform: NatafTransform,
        models: Vec<Box<dyn FidelityModel>>,
        config: MfmcConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if models.is_empty() {
            return Err(EngineError::NoFidelityLevels);
        }
        for (index, model) in models.iter().enumerate() {
            let cost = model.cost();
            if !cost.is_finite() || cost <= 0.0 {
                return Err(EngineError::InvalidLevel {
                    name: model.name().to_string(),
                    reason: format!("cost must be positive and finite, got {cost}"),
                });
            }
            if index > 0 && cost > models[index - 1].cost() {
                return Err(EngineError::InvalidLevel {
                    name: model.name().to_string(),
                    reason: "levels must be ordered by non-increasing cost".to_string(),
                });
            }
            if models[..index].iter().any(|prior| prior.name() == model.name()) {
                return Err(EngineError::InvalidLevel {
                    name: model.name().to_string(),
                    reason: "level names must be unique".to_string(),
                });
            }
        }
        let rng = SampleRng::new(config.seed());
        Ok(Self {
            transform,
            models,
            categoricals: Vec::new(),
            config,
            rng,
        })
    }

    /// Adds a categorical input column.
    ///
    /// Categorical draws consume the per-sample stream after the continuous
    /// variables, in the order the columns were added.
    pub fn with_categorical(mut self, variable: CategoricalVariable) -> Self {
        self.categoricals.push(variable);
        self
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &MfmcConfig {
        &self.config
    }

    /// Returns the input transform.
    pub fn transform(&self) -> &NatafTransform {
        &self.transform
    }

    /// Returns the number of fidelity levels.
    pub fn n_levels(&self) -> usize {
        self.models.len()
    }

    /// Runs a complete single-process estimation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DistributedRun`] when the configuration names
    /// more than one process; drive those with [`run_local`](Self::run_local)
    /// and [`reduce`](Self::reduce).
    pub fn run(&self) -> Result<RunResults, EngineError> {
        if self.config.n_procs() != 1 {
            return Err(EngineError::DistributedRun {
                n_procs: self.config.n_procs(),
            });
        }
        let partial = self.run_local();
        self.reduce(vec![partial])
    }

    /// Evaluates this rank's share of the run.
    ///
    /// Every rank computes the full pilot (it is small by construction), so
    /// the schedule is identical everywhere; main-phase indices are then
    /// partitioned round-robin by `index % n_procs`.
    pub fn run_local(&self) -> PartialRun {
        let span = info_span!(
            "mfmc_run_local",
            rank = self.config.rank(),
            n_procs = self.config.n_procs()
        );
        let _guard = span.enter();

        let n_levels = self.models.len();
        let pilot_size = self.config.pilot_size();
        let mut log = RunLog::new();
        let mut excluded: BTreeSet<usize> = BTreeSet::new();
        let mut level_outputs: Vec<Vec<(usize, Vec<f64>)>> = vec![Vec::new(); n_levels];

        info!(pilot = pilot_size, levels = n_levels, "pilot phase");
        let pilot_indices: Vec<usize> = (0..pilot_size).collect();
        for level in 0..n_levels {
            self.evaluate_into(
                level,
                &pilot_indices,
                &mut level_outputs,
                &mut excluded,
                &mut log,
            );
        }

        let pilot_stats = self.pilot_statistics(&level_outputs, &excluded);
        let driver = &self.config.qoi_names()[0];
        let allocator = MfmcAllocator::new(self.config.budget(), pilot_size);
        let plan = allocator.allocate(&pilot_stats, driver, &mut log);
        info!(
            batch = plan.batch_size(),
            high_fidelity = plan.high_fidelity_count(),
            single_level = plan.is_single_level,
            "schedule fixed"
        );

        for allocation in &plan.levels {
            let indices: Vec<usize> = (pilot_size..allocation.count)
                .filter(|index| index % self.config.n_procs() == self.config.rank())
                .collect();
            debug!(level = %allocation.name, assigned = indices.len(), "main phase");
            self.evaluate_into(
                allocation.level,
                &indices,
                &mut level_outputs,
                &mut excluded,
                &mut log,
            );
        }

        PartialRun {
            rank: self.config.rank(),
            n_procs: self.config.n_procs(),
            plan,
            level_outputs,
            excluded: excluded.into_iter().collect(),
            events: log.into_events(),
        }
    }

    /// Merges the partial runs of all ranks into final results.
    ///
    /// Pure with respect to evaluations: no model is called again except to
    /// regenerate the deterministic input columns of the sample table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InconsistentPartials`] unless exactly one
    /// partial per rank is present and all partials agree on the schedule.
    pub fn reduce(&self, partials: Vec<PartialRun>) -> Result<RunResults, EngineError> {
        let span = info_span!("mfmc_reduce", n_procs = self.config.n_procs());
        let _guard = span.enter();

        let n_procs = self.config.n_procs();
        let n_levels = self.models.len();
        if partials.len() != n_procs {
            return Err(EngineError::InconsistentPartials(format!(
                "expected {n_procs} partial runs, got {}",
                partials.len()
            )));
        }
        let mut by_rank: Vec<Option<&PartialRun>> = vec![None; n_procs];
        for partial in &partials {
            if partial.n_procs != n_procs || partial.rank >= n_procs {
                return Err(EngineError::InconsistentPartials(format!(
                    "partial from rank {} of {} does not fit a {n_procs}-process run",
                    partial.rank, partial.n_procs
                )));
            }
            if partial.level_outputs.len() != n_levels {
                return Err(EngineError::InconsistentPartials(format!(
                    "partial from rank {} covers {} levels, expected {n_levels}",
                    partial.rank,
                    partial.level_outputs.len()
                )));
            }
            if by_rank[partial.rank].replace(partial).is_some() {
                return Err(EngineError::InconsistentPartials(format!(
                    "rank {} appears more than once",
                    partial.rank
                )));
            }
        }
        let plan = partials[0].plan.clone();
        if partials.iter().any(|partial| partial.plan != plan) {
            return Err(EngineError::InconsistentPartials(
                "allocation plans differ across ranks".to_string(),
            ));
        }

        let mut log = RunLog::new();
        for warning in self.transform.warnings() {
            log.push_reported(RunEvent::NonConvergentPair {
                first: warning.first.clone(),
                second: warning.second.clone(),
                input_correlation: warning.input_correlation,
                applied_correlation: warning.applied_correlation,
            });
        }
        // Pilot-phase and scheduling events repeat identically on every
        // rank; keep the first copy of each.
        let mut merged_events: Vec<RunEvent> = Vec::new();
        for partial in by_rank.iter().flatten() {
            for event in &partial.events {
                if !merged_events.contains(event) {
                    merged_events.push(event.clone());
                }
            }
        }
        for event in merged_events {
            log.push_reported(event);
        }

        let mut counts = vec![self.config.pilot_size(); n_levels];
        for allocation in &plan.levels {
            counts[allocation.level] = allocation.count;
        }
        let mut excluded: BTreeSet<usize> = BTreeSet::new();
        for partial in &partials {
            excluded.extend(partial.excluded.iter().copied());
        }
        let mut merged: Vec<Vec<Option<Vec<f64>>>> =
            counts.iter().map(|&count| vec![None; count]).collect();
        for partial in by_rank.iter().flatten() {
            for (level, outputs) in partial.level_outputs.iter().enumerate() {
                for (index, values) in outputs {
                    if let Some(slot) = merged[level].get_mut(*index) {
                        *slot = Some(values.clone());
                    }
                }
            }
        }

        let mut statistics = Vec::with_capacity(self.config.n_qoi());
        for (qoi, name) in self.config.qoi_names().iter().enumerate() {
            statistics.push(self.qoi_statistics(qoi, name, &plan, &merged, &excluded, &mut log));
        }

        let table: Vec<SampleRecord> = (0..plan.batch_size())
            .into_par_iter()
            .map(|index| {
                let (inputs, categories) = self.draw_sample(index);
                let outputs = merged
                    .iter()
                    .map(|column| column.get(index).cloned().flatten())
                    .collect();
                SampleRecord {
                    index,
                    inputs,
                    categories,
                    outputs,
                    excluded: excluded.contains(&index),
                }
            })
            .collect();

        info!(samples = table.len(), events = log.len(), "run reduced");
        Ok(RunResults {
            statistics,
            table,
            plan,
            log,
        })
    }

    /// Continuous inputs for one sample index.
    fn draw_inputs(&self, index: usize) -> Vec<f64> {
        let mut stream = self.rng.stream(index as u64);
        self.transform.sample_one(&mut stream)
    }

    /// Continuous and categorical inputs for one sample index.
    fn draw_sample(&self, index: usize) -> (Vec<f64>, Vec<String>) {
        let mut stream = self.rng.stream(index as u64);
        let inputs = self.transform.sample_one(&mut stream);
        let categories = self
            .categoricals
            .iter()
            .map(|variable| variable.draw(&mut stream).to_string())
            .collect();
        (inputs, categories)
    }

    /// Evaluates `indices` at `level` from the rayon pool, storing outputs
    /// and recording failures.
    fn evaluate_into(
        &self,
        level: usize,
        indices: &[usize],
        level_outputs: &mut [Vec<(usize, Vec<f64>)>],
        excluded: &mut BTreeSet<usize>,
        log: &mut RunLog,
    ) {
        let model = self.models[level].as_ref();
        let n_qoi = self.config.n_qoi();
        let evaluated: Vec<(usize, Result<Vec<f64>, ModelEvalError>)> = indices
            .par_iter()
            .map(|&index| {
                let inputs = self.draw_inputs(index);
                let outcome = model
                    .evaluate(&inputs)
                    .and_then(|outputs| check_outputs(outputs, n_qoi));
                (index, outcome)
            })
            .collect();

        for (index, outcome) in evaluated {
            match outcome {
                Ok(outputs) => level_outputs[level].push((index, outputs)),
                Err(error) => {
                    excluded.insert(index);
                    log.record(RunEvent::SampleEvaluationFailure {
                        level: model.name().to_string(),
                        sample_index: index,
                        reason: error.to_string(),
                    });
                }
            }
        }
    }

    /// Summarizes the pilot outputs of the driving quantity per level.
    ///
    /// Columns are aligned: an index excluded anywhere is excluded from every
    /// column, so variances and correlations see the same samples.
    fn pilot_statistics(
        &self,
        level_outputs: &[Vec<(usize, Vec<f64>)>],
        excluded: &BTreeSet<usize>,
    ) -> Vec<LevelPilot> {
        let pilot_size = self.config.pilot_size();
        let columns: Vec<Vec<f64>> = level_outputs
            .iter()
            .map(|outputs| {
                outputs
                    .iter()
                    .filter(|(index, _)| *index < pilot_size && !excluded.contains(index))
                    .map(|(_, values)| values[0])
                    .collect()
            })
            .collect();

        let reference = &columns[0];
        self.models
            .iter()
            .enumerate()
            .map(|(level, model)| {
                let column = &columns[level];
                let mean = moments::mean(column).unwrap_or(f64::NAN);
                let variance = moments::variance(column, mean).unwrap_or(f64::NAN);
                let correlation = if level == 0 {
                    1.0
                } else {
                    moments::correlation(reference, column).unwrap_or(f64::NAN)
                };
                LevelPilot {
                    name: model.name().to_string(),
                    cost: model.cost(),
                    mean,
                    variance,
                    correlation,
                }
            })
            .collect()
    }

    /// Combines the merged outputs of one quantity into moment statistics.
    fn qoi_statistics(
        &self,
        qoi: usize,
        name: &str,
        plan: &AllocationPlan,
        merged: &[Vec<Option<Vec<f64>>>],
        excluded: &BTreeSet<usize>,
        log: &mut RunLog,
    ) -> MomentStatistics {
        let valid_column = |level: usize, upto: usize| -> Vec<f64> {
            let limit = upto.min(merged[level].len());
            merged[level][..limit]
                .iter()
                .enumerate()
                .filter(|(index, _)| !excluded.contains(index))
                .filter_map(|(_, entry)| entry.as_ref().map(|values| values[qoi]))
                .collect()
        };

        let hf_values = valid_column(0, plan.high_fidelity_count());
        let effective = hf_values.len();

        // Control-variate combination: the high-fidelity mean plus one
        // correction per cheaper level over its extra index range.
        let mut mean = moments::mean(&hf_values).unwrap_or(f64::NAN);
        for pair in plan.levels.windows(2) {
            let narrow = valid_column(pair[1].level, pair[0].count);
            let wide = valid_column(pair[1].level, pair[1].count);
            let narrow_mean = moments::mean(&narrow).unwrap_or(f64::NAN);
            let wide_mean = moments::mean(&wide).unwrap_or(f64::NAN);
            mean += pair[1].control_coefficient * (wide_mean - narrow_mean);
        }
        if effective == 0 {
            log.record(RunEvent::InsufficientSamples {
                quantity: name.to_string(),
                statistic: "mean".to_string(),
                effective,
                required: 1,
            });
        }

        let hf_mean = moments::mean(&hf_values).unwrap_or(f64::NAN);
        let hf_variance = moments::variance(&hf_values, hf_mean).unwrap_or(f64::NAN);
        let (std_dev, mean_std_error) = if effective < 2 {
            log.record(RunEvent::InsufficientSamples {
                quantity: name.to_string(),
                statistic: "std_dev".to_string(),
                effective,
                required: 2,
            });
            (f64::NAN, f64::NAN)
        } else {
            (
                hf_variance.sqrt(),
                (hf_variance * plan.variance_scale()).sqrt(),
            )
        };

        let (skewness, kurtosis) = if effective < 4 {
            for statistic in ["skewness", "kurtosis"] {
                log.record(RunEvent::InsufficientSamples {
                    quantity: name.to_string(),
                    statistic: statistic.to_string(),
                    effective,
                    required: 4,
                });
            }
            (f64::NAN, f64::NAN)
        } else {
            (
                moments::skewness(&hf_values, hf_mean, std_dev).unwrap_or(f64::NAN),
                moments::kurtosis(&hf_values, hf_mean, std_dev).unwrap_or(f64::NAN),
            )
        };

        let mut produced: Vec<f64> = Vec::new();
        for column in merged {
            for values in column.iter().flatten() {
                produced.push(values[qoi]);
            }
        }
        let integer_valued = moments::is_effectively_integer(&produced);

        MomentStatistics {
            name: name.to_string(),
            mean,
            mean_std_error,
            std_dev,
            skewness,
            kurtosis,
            effective_samples: effective,
            integer_valued,
        }
    }
}

/// Validates an output vector's shape and finiteness.
fn check_outputs(outputs: Vec<f64>, expected: usize) -> Result<Vec<f64>, ModelEvalError> {
    if outputs.len() != expected {
        return Err(ModelEvalError::OutputMismatch {
            expected,
            actual: outputs.len(),
        });
    }
    if let Some(index) = outputs.iter().position(|value| !value.is_finite()) {
        return Err(ModelEvalError::NonFinite { index });
    }
    Ok(outputs)
}
