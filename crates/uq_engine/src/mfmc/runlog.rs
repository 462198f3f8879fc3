//! Degradation log for estimation runs.
//!
//! Recoverable problems do not abort a run: a correlation pair that failed to
//! converge, a dropped fidelity level, a sample that refused to evaluate or a
//! statistic left without enough samples all degrade the answer instead of
//! replacing it with an error. Every such decision is recorded as a
//! [`RunEvent`] in the ordered [`RunLog`] returned with the results, and
//! mirrored to `tracing` at warn level the moment it happens.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One recoverable degradation observed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// An equivalent-correlation solve failed and the clamped physical-space
    /// correlation was applied instead.
    NonConvergentPair {
        /// Name of the first variable of the pair.
        first: String,
        /// Name of the second variable of the pair.
        second: String,
        /// Correlation requested in the input model.
        input_correlation: f64,
        /// Correlation actually applied in standard-normal space.
        applied_correlation: f64,
    },
    /// A fidelity level was removed before allocation.
    DroppedLevel {
        /// Name of the dropped level.
        level: String,
        /// Why the level was unusable.
        reason: String,
    },
    /// Allocation fell back to single-level Monte Carlo.
    AllocationDegenerate {
        /// Why no multi-fidelity schedule could be formed.
        reason: String,
    },
    /// One sample failed to evaluate at one level and was excluded from every
    /// level.
    SampleEvaluationFailure {
        /// Name of the level that failed.
        level: String,
        /// Global index of the failed sample.
        sample_index: usize,
        /// The evaluation error.
        reason: String,
    },
    /// A statistic had fewer effective samples than it needs and was reported
    /// as NaN.
    InsufficientSamples {
        /// Quantity of interest concerned.
        quantity: String,
        /// Statistic left undefined.
        statistic: String,
        /// Effective samples available.
        effective: usize,
        /// Minimum the statistic needs.
        required: usize,
    },
}

/// Ordered, serializable record of the degradations of one run.
///
/// [`RunLog::record`] emits a `tracing` warning as it stores an event, so
/// operators see degradations live while batch consumers read them from the
/// results. Events merged from partial runs are not re-emitted; they were
/// already reported on the rank that observed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunLog {
    events: Vec<RunEvent>,
}

impl RunLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `event` and mirrors it to `tracing` at warn level.
    pub fn record(&mut self, event: RunEvent) {
        match &event {
            RunEvent::NonConvergentPair {
                first,
                second,
                input_correlation,
                applied_correlation,
            } => warn!(
                first = %first,
                second = %second,
                input = *input_correlation,
                applied = *applied_correlation,
                "equivalent correlation solve did not converge"
            ),
            RunEvent::DroppedLevel { level, reason } => warn!(
                level = %level,
                reason = %reason,
                "fidelity level dropped from allocation"
            ),
            RunEvent::AllocationDegenerate { reason } => warn!(
                reason = %reason,
                "allocation degenerated to single-level Monte Carlo"
            ),
            RunEvent::SampleEvaluationFailure {
                level,
                sample_index,
                reason,
            } => warn!(
                level = %level,
                sample_index = *sample_index,
                reason = %reason,
                "sample evaluation failed; index excluded from every level"
            ),
            RunEvent::InsufficientSamples {
                quantity,
                statistic,
                effective,
                required,
            } => warn!(
                quantity = %quantity,
                statistic = %statistic,
                effective = *effective,
                required = *required,
                "not enough effective samples; statistic reported as NaN"
            ),
        }
        self.events.push(event);
    }

    /// Stores an already-reported event without re-emitting it.
    pub(crate) fn push_reported(&mut self, event: RunEvent) {
        self.events.push(event);
    }

    /// Returns the recorded events in order.
    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing degraded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Consumes the log, returning its events.
    pub fn into_events(self) -> Vec<RunEvent> {
        self.events
    }
}
