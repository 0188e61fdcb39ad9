//! Stochastic simulation library
//!
//! This crate provides a Monte Carlo engine for probabilistic models.
//! It supports:
//! - Eight input distribution families resolved to inverse CDFs
//!   (normal, lognormal, uniform, triangular, beta, gamma, weibull, empirical)
//! - Maximum-likelihood fitting with automatic family selection
//! - Independent or Latin-hypercube (stratified) sample designs
//! - Cholesky-based correlation between inputs
//! - Parallel chunked model evaluation with deterministic assembly
//! - Stopping rules checked between waves of iterations
//! - Summary statistics over the output distribution
//!
//! # Example
//!
//! ```ignore
//! use mcsim_core::{InputSet, MonteCarloEngine, ResultArray, SamplingMethod, SimulationConfig};
//! use mcsim_core::model::DistributionSpec;
//! use mcsim_core::simulation::model_fn;
//!
//! let mut inputs = InputSet::new();
//! inputs.add_spec("revenue", &DistributionSpec::scalar("normal", &[100.0, 15.0]))?;
//! inputs.add_spec("cost", &DistributionSpec::scalar("triangular", &[40.0, 55.0, 90.0]))?;
//!
//! let profit = model_fn(|inputs| {
//!     let revenue = inputs.require("revenue")?;
//!     let cost = inputs.require("cost")?;
//!     Ok(ResultArray::from_scalars(
//!         revenue.iter().zip(cost).map(|(r, c)| r - c).collect(),
//!     ))
//! });
//!
//! let mut engine = MonteCarloEngine::new(SimulationConfig::new(10_000).with_seed(7))?;
//! let results = engine.run_simulation(&profit, &inputs, None, SamplingMethod::Stratified)?;
//! let summary = results.summarize()?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod correlation;
pub mod error;
pub mod fitting;
pub mod sampling;
pub mod simulation;
pub mod summary;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{SimulationConfig, StoppingRule, Workers};
pub use correlation::CorrelationMatrix;
pub use error::{BoxError, Result, SimError};
pub use fitting::{FitTarget, FittedDistribution, fit};
pub use model::{ChunkInputs, Distribution, DistributionSpec, Family, InputSet, ResultArray};
pub use sampling::SamplingMethod;
pub use simulation::{Model, MonteCarloEngine, model_fn};
pub use summary::{Summary, summarize};
