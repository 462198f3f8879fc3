//! # uq_models: Random-Variable Modelling
//!
//! ## Layer 2 (Modelling) Role
//!
//! uq_models sits between the numerical foundation (`uq_core`) and the
//! estimation engine, providing:
//! - The marginal distribution catalogue (`marginals::Marginal`)
//! - Named random variables and the validated joint model
//!   (`correlation_model::CorrelationModel`)
//! - The Nataf isoprobabilistic transform between physical space and
//!   independent standard-normal space (`nataf::NatafTransform`)
//!
//! ## Usage Example
//!
//! ```rust
//! use uq_core::math::correlation::CorrelationMatrix;
//! use uq_models::correlation_model::{CorrelationModel, RandomVariable};
//! use uq_models::marginals::Marginal;
//! use uq_models::nataf::NatafTransform;
//!
//! let variables = vec![
//!     RandomVariable::new("demand", Marginal::normal(10.0, 2.0).unwrap()),
//!     RandomVariable::new("capacity", Marginal::lognormal_from_moments(20.0, 5.0).unwrap()),
//! ];
//! let correlation = CorrelationMatrix::new(vec![1.0, 0.4, 0.4, 1.0], 2).unwrap();
//! let model = CorrelationModel::new(variables, correlation).unwrap();
//!
//! let transform = NatafTransform::new(model).unwrap();
//! let physical = transform.to_physical(&[0.0, 0.0]).unwrap();
//! let back = transform.to_standard_normal(&physical).unwrap();
//! assert!(back[0].abs() < 1e-8 && back[1].abs() < 1e-8);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod correlation_model;
pub mod marginals;
pub mod nataf;
