//! Simulation configuration
//!
//! `SimulationConfig` carries everything an engine needs besides the model
//! and its inputs: iteration count, seed, worker count and an optional
//! stopping rule. Everything except the stopping rule (a closure) is serde
//! friendly so it can come from a scenario file.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::model::ResultArray;

fn default_iterations() -> usize {
    10_000
}

/// Size of the worker pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkersRepr", into = "WorkersRepr")]
pub enum Workers {
    /// Available parallelism minus one, at least one
    #[default]
    Auto,
    Count(usize),
}

impl Workers {
    /// Resolve to a concrete, positive worker count
    pub fn resolve(self) -> Result<usize> {
        match self {
            Workers::Auto => Ok(std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
                .saturating_sub(1)
                .max(1)),
            Workers::Count(0) => Err(SimError::InvalidConfig(
                "worker count must be at least 1".into(),
            )),
            Workers::Count(n) => Ok(n),
        }
    }
}

/// Scenario form of [`Workers`]: `auto` or a plain integer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WorkersRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<WorkersRepr> for Workers {
    type Error = String;

    fn try_from(repr: WorkersRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            WorkersRepr::Count(n) => Ok(Workers::Count(n)),
            WorkersRepr::Keyword(k) if k.eq_ignore_ascii_case("auto") => Ok(Workers::Auto),
            WorkersRepr::Keyword(k) => Err(format!("expected \"auto\" or a number, got {k:?}")),
        }
    }
}

impl From<Workers> for WorkersRepr {
    fn from(workers: Workers) -> Self {
        match workers {
            Workers::Auto => WorkersRepr::Keyword("auto".into()),
            Workers::Count(n) => WorkersRepr::Count(n),
        }
    }
}

type StopPredicate = dyn Fn(&ResultArray) -> bool + Send + Sync;

/// Predicate over the accumulated result, checked between waves of
/// `check_every` iterations. Without an interval the predicate is checked
/// once after the full run.
#[derive(Clone)]
pub struct StoppingRule {
    predicate: Arc<StopPredicate>,
    check_every: Option<NonZeroUsize>,
}

impl StoppingRule {
    /// Check once, over the complete result
    pub fn post_hoc<F>(predicate: F) -> Self
    where
        F: Fn(&ResultArray) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            check_every: None,
        }
    }

    /// Check after every `check_every` iterations and stop at the first
    /// wave for which the predicate holds
    pub fn every<F>(check_every: usize, predicate: F) -> Result<Self>
    where
        F: Fn(&ResultArray) -> bool + Send + Sync + 'static,
    {
        let check_every = NonZeroUsize::new(check_every).ok_or_else(|| {
            SimError::InvalidConfig("stopping rule interval must be positive".into())
        })?;
        Ok(Self {
            predicate: Arc::new(predicate),
            check_every: Some(check_every),
        })
    }

    /// Stop once the mean of the last `window` rows of the first output
    /// column is within `tolerance` of the overall mean. Never fires before
    /// more than `window` rows have accumulated.
    pub fn mean_converged(window: usize, tolerance: f64, check_every: usize) -> Result<Self> {
        if window == 0 || tolerance.is_nan() || tolerance < 0.0 {
            return Err(SimError::InvalidConfig(
                "convergence window must be positive and tolerance non-negative".into(),
            ));
        }
        Self::every(check_every, move |results| {
            let column = results.column(0);
            if column.len() <= window {
                return false;
            }
            let mean = column.iter().sum::<f64>() / column.len() as f64;
            let tail = &column[column.len() - window..];
            let tail_mean = tail.iter().sum::<f64>() / window as f64;
            (tail_mean - mean).abs() < tolerance
        })
    }

    #[must_use]
    pub fn check_every(&self) -> Option<usize> {
        self.check_every.map(NonZeroUsize::get)
    }

    #[must_use]
    pub fn should_stop(&self, results: &ResultArray) -> bool {
        (self.predicate)(results)
    }
}

impl fmt::Debug for StoppingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoppingRule")
            .field("check_every", &self.check_every)
            .finish_non_exhaustive()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Fixed seed for reproducible runs; drawn from the OS when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub workers: Workers,
    #[serde(skip)]
    pub stopping_rule: Option<StoppingRule>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: None,
            workers: Workers::Auto,
            stopping_rule: None,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: Workers) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_stopping_rule(mut self, rule: StoppingRule) -> Self {
        self.stopping_rule = Some(rule);
        self
    }

    /// Check invariants and resolve the worker count
    pub fn validate(&self) -> Result<usize> {
        if self.iterations == 0 {
            return Err(SimError::InvalidConfig(
                "iteration count must be positive".into(),
            ));
        }
        self.workers.resolve()
    }
}
