//! Multi-fidelity Monte Carlo estimation.
//!
//! The estimator follows the control-variate construction of Peherstorfer,
//! Willcox and Gunzburger: a small shared pilot measures per-level variances
//! and correlations against the highest-fidelity model, the allocator turns
//! those into per-level sample counts under a cost budget, and the final
//! moments combine the highest-fidelity mean with one correction term per
//! cheaper level.
//!
//! ```text
//!   MfmcConfig ──► MfmcEngine::run_local ──► PartialRun ─┐
//!                    │                                   ├─► reduce ──► RunResults
//!                    ├─ pilot (all levels, all ranks)    │
//!                    ├─ MfmcAllocator::allocate          │
//!                    └─ main phase (rank's share)     ───┘
//! ```
//!
//! Degradations (dropped levels, failed samples, undefined moments) never
//! abort a run; they are recorded in [`RunLog`] and mirrored to `tracing`.

pub mod allocator;
pub mod batch;
pub mod config;
pub mod engine;
pub mod runlog;

pub use allocator::{AllocationPlan, LevelAllocation, LevelPilot, MfmcAllocator};
pub use batch::{CategoricalVariable, SampleRecord};
pub use config::{ConfigError, MfmcConfig, MfmcConfigBuilder};
pub use engine::{MfmcEngine, MomentStatistics, PartialRun, RunResults};
pub use runlog::{RunEvent, RunLog};
