//! # uq_engine: Multi-Fidelity Estimation
//!
//! ## Layer 3 (Engine) Role
//!
//! uq_engine turns the probabilistic input models from `uq_models` into moment
//! estimates of model outputs:
//! - Per-sample random streams for order-independent reproducibility
//!   (`rng::SampleRng`)
//! - The fidelity-level abstraction over numerical models
//!   (`fidelity::FidelityModel`)
//! - Multi-fidelity Monte Carlo: pilot screening, budget allocation and
//!   control-variate moment estimation (`mfmc`)
//!
//! ## Pipeline
//!
//! ```text
//! MfmcEngine
//! ├── NatafTransform     (input sampling, from uq_models)
//! ├── FidelityModel[]    (highest fidelity first, decreasing cost)
//! ├── MfmcConfig         (budget, pilot size, seed, rank layout)
//! └── Orchestration
//!     ├── pilot phase    (all levels, shared samples)
//!     ├── MfmcAllocator  (screen levels, spend the budget)
//!     ├── main phase     (rank-partitioned evaluations)
//!     └── reduce         (merge partials, combine moments)
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use uq_core::math::correlation::CorrelationMatrix;
//! use uq_engine::fidelity::{ClosureModel, FidelityModel};
//! use uq_engine::mfmc::{MfmcConfig, MfmcEngine};
//! use uq_models::correlation_model::{CorrelationModel, RandomVariable};
//! use uq_models::marginals::Marginal;
//! use uq_models::nataf::NatafTransform;
//!
//! let variables = vec![
//!     RandomVariable::new("load", Marginal::normal(0.0, 1.0).unwrap()),
//!     RandomVariable::new("strength", Marginal::normal(0.0, 1.0).unwrap()),
//! ];
//! let model = CorrelationModel::new(variables, CorrelationMatrix::identity(2)).unwrap();
//! let transform = NatafTransform::new(model).unwrap();
//!
//! let fine = ClosureModel::new("fine", 1.0, |x: &[f64]| Ok(vec![x[0] + x[1]]));
//! let coarse = ClosureModel::new("coarse", 0.05, |x: &[f64]| {
//!     Ok(vec![1.05 * (x[0] + x[1]) + 0.1 * (3.0 * x[0]).sin()])
//! });
//! let models: Vec<Box<dyn FidelityModel>> = vec![Box::new(fine), Box::new(coarse)];
//!
//! let config = MfmcConfig::builder()
//!     .budget(64.0)
//!     .pilot_size(16)
//!     .seed(7)
//!     .qoi("response")
//!     .build()
//!     .unwrap();
//!
//! let engine = MfmcEngine::new(transform, models, config).unwrap();
//! let results = engine.run().unwrap();
//! assert!(results.statistics[0].mean.is_finite());
//! ```
//!
//! ## Reproducibility Contract
//!
//! A run is a pure function of the configuration seed: sample `i` always sees
//! the random stream derived from `(seed, i)`, so splitting the work across
//! ranks or rayon threads never changes the estimate. `run_local` on every
//! rank followed by one `reduce` reproduces a single-process `run` bit for
//! bit.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod error;
pub mod fidelity;
pub mod mfmc;
pub mod rng;

pub use error::EngineError;
