//! YAML scenario files
//!
//! A scenario declares the simulation settings, the ordered input variables,
//! an optional correlation matrix and stop rule, and one of the built-in
//! models:
//!
//! ```yaml
//! iterations: 20000
//! seed: 42
//! workers: auto
//! sampling: stratified
//! variables:
//!   - name: revenue
//!     distribution: normal
//!     params: [100.0, 15.0]
//!   - name: cost
//!     fit:
//!       data: [52.1, 61.0, 48.3, 57.9]
//!       family: auto
//! correlation:
//!   - [1.0, 0.4]
//!   - [0.4, 1.0]
//! stop:
//!   window: 1000
//!   tolerance: 0.01
//! model:
//!   kind: linear
//!   weights: { revenue: 1.0, cost: -1.0 }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{WrapErr, bail, eyre};
use mcsim_core::config::{SimulationConfig, StoppingRule, Workers};
use mcsim_core::correlation::CorrelationMatrix;
use mcsim_core::model::{ChunkInputs, DistributionSpec, InputSet, Param, ResultArray};
use mcsim_core::sampling::SamplingMethod;
use mcsim_core::simulation::{Model, MonteCarloEngine};
use mcsim_core::{BoxError, FitTarget, fit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::report::{FittedVariable, OutputReport, Report};

fn default_iterations() -> usize {
    10_000
}

/// Scenario file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub workers: Workers,
    #[serde(default)]
    pub sampling: SamplingMethod,
    pub variables: Vec<VariableSpec>,
    /// Rows and columns follow the order of `variables`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSpec>,
    #[serde(default)]
    pub model: ModelSpec,
}

/// One input variable: either an explicit distribution or a fit to raw data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSpec {
    pub data: Vec<f64>,
    /// Family name or `auto` (the default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// Mean-convergence stop rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSpec {
    pub window: usize,
    pub tolerance: f64,
    /// Defaults to `window`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_every: Option<usize>,
}

/// Built-in models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Row-wise sum of every input
    #[default]
    Sum,
    /// Row-wise product of every input
    Product,
    /// `intercept + Σ weight·input` over the named inputs
    Linear {
        weights: BTreeMap<String, f64>,
        #[serde(default)]
        intercept: f64,
    },
    /// Every input as its own output column
    Identity,
}

impl ModelSpec {
    /// Output column names for the given input names
    #[must_use]
    pub fn output_names(&self, inputs: &[String]) -> Vec<String> {
        match self {
            ModelSpec::Sum => vec!["sum".into()],
            ModelSpec::Product => vec!["product".into()],
            ModelSpec::Linear { .. } => vec!["linear".into()],
            ModelSpec::Identity => inputs.to_vec(),
        }
    }
}

fn fold_rows(inputs: &ChunkInputs<'_>, init: f64, op: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![init; inputs.len()];
    for column in inputs.columns() {
        for (acc, &x) in out.iter_mut().zip(column.iter()) {
            *acc = op(*acc, x);
        }
    }
    out
}

impl Model for ModelSpec {
    fn evaluate(&self, inputs: &ChunkInputs<'_>) -> Result<ResultArray, BoxError> {
        match self {
            ModelSpec::Sum => Ok(ResultArray::from_scalars(fold_rows(inputs, 0.0, |a, x| {
                a + x
            }))),
            ModelSpec::Product => Ok(ResultArray::from_scalars(fold_rows(inputs, 1.0, |a, x| {
                a * x
            }))),
            ModelSpec::Linear { weights, intercept } => {
                let mut out = vec![*intercept; inputs.len()];
                for (name, weight) in weights {
                    let column = inputs.require(name)?;
                    for (acc, x) in out.iter_mut().zip(column) {
                        *acc += weight * x;
                    }
                }
                Ok(ResultArray::from_scalars(out))
            }
            ModelSpec::Identity => ResultArray::from_columns(inputs.columns()),
        }
    }
}

/// CLI values that take precedence over the scenario file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub workers: Option<Workers>,
    pub sampling: Option<SamplingMethod>,
}

/// A scenario with every variable resolved, ready to run
pub struct PreparedScenario {
    pub config: SimulationConfig,
    pub sampling: SamplingMethod,
    pub inputs: InputSet,
    pub correlation: Option<CorrelationMatrix>,
    pub model: ModelSpec,
    pub output_names: Vec<String>,
    pub fitted: Vec<FittedVariable>,
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> color_eyre::Result<Self> {
        serde_saphyr::from_str(yaml).map_err(|e| eyre!("invalid scenario: {e}"))
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_yaml(&content).wrap_err_with(|| format!("in {}", path.display()))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(iterations) = overrides.iterations {
            self.iterations = iterations;
        }
        if let Some(seed) = overrides.seed {
            self.seed = Some(seed);
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(sampling) = overrides.sampling {
            self.sampling = sampling;
        }
    }

    /// Resolve or fit every variable and assemble the engine configuration
    pub fn prepare(&self) -> color_eyre::Result<PreparedScenario> {
        let mut inputs = InputSet::new();
        let mut fitted = Vec::new();

        for variable in &self.variables {
            let spec = match (&variable.distribution, &variable.fit) {
                (Some(family), None) => DistributionSpec::new(family.clone(), variable.params.clone()),
                (None, Some(fit_spec)) => {
                    let target: FitTarget = match &fit_spec.family {
                        Some(family) => family.parse()?,
                        None => FitTarget::Auto,
                    };
                    let result = fit(&fit_spec.data, target)
                        .wrap_err_with(|| format!("fitting variable {:?}", variable.name))?;
                    info!(
                        variable = %variable.name,
                        family = %result.family,
                        params = ?result.params,
                        "fitted distribution"
                    );
                    let spec = result.spec();
                    fitted.push(FittedVariable {
                        name: variable.name.clone(),
                        fit: result,
                    });
                    spec
                }
                (Some(_), Some(_)) => bail!(
                    "variable {:?} declares both a distribution and a fit",
                    variable.name
                ),
                (None, None) => bail!(
                    "variable {:?} needs a distribution or a fit",
                    variable.name
                ),
            };
            inputs
                .add_spec(variable.name.clone(), &spec)
                .wrap_err_with(|| format!("variable {:?}", variable.name))?;
        }

        let names: Vec<String> = inputs.names().map(str::to_string).collect();
        if let ModelSpec::Linear { weights, .. } = &self.model
            && let Some(unknown) = weights.keys().find(|w| inputs.position(w).is_none())
        {
            bail!("linear model weight refers to unknown variable {unknown:?}");
        }

        let mut config = SimulationConfig::new(self.iterations).with_workers(self.workers);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(stop) = &self.stop {
            let rule = StoppingRule::mean_converged(
                stop.window,
                stop.tolerance,
                stop.check_every.unwrap_or(stop.window),
            )?;
            config = config.with_stopping_rule(rule);
        }

        Ok(PreparedScenario {
            config,
            sampling: self.sampling,
            inputs,
            correlation: self.correlation.clone(),
            output_names: self.model.output_names(&names),
            model: self.model.clone(),
            fitted,
        })
    }

    /// Prepare, simulate and summarize
    pub fn run(&self) -> color_eyre::Result<Report> {
        self.prepare()?.run()
    }
}

impl PreparedScenario {
    pub fn run(self) -> color_eyre::Result<Report> {
        debug!(
            variables = self.inputs.len(),
            iterations = self.config.iterations,
            sampling = ?self.sampling,
            "starting simulation"
        );
        let mut engine = MonteCarloEngine::new(self.config)?;
        debug!(workers = engine.workers(), "engine ready");
        let results = engine
            .run_simulation(
                &self.model,
                &self.inputs,
                self.correlation.as_ref(),
                self.sampling,
            )
            .wrap_err("simulation failed")?;

        let summaries = results.summarize()?;
        let outputs = self
            .output_names
            .into_iter()
            .zip(summaries)
            .map(|(name, summary)| OutputReport { name, summary })
            .collect();

        info!(iterations = results.len(), "simulation finished");
        Ok(Report {
            iterations: results.len(),
            workers: engine.workers(),
            outputs,
            fitted: self.fitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mcsim_core::Family;

    use super::*;

    const SCENARIO: &str = r"
iterations: 4000
seed: 7
workers: 2
sampling: stratified
variables:
  - name: a
    distribution: normal
    params: [1.0, 1.0]
  - name: b
    distribution: Normal
    params: [1.0, 1.5]
";

    #[test]
    fn test_parse_defaults() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.iterations, 4000);
        assert_eq!(scenario.seed, Some(7));
        assert_eq!(scenario.workers, Workers::Count(2));
        assert_eq!(scenario.sampling, SamplingMethod::Stratified);
        assert_eq!(scenario.model, ModelSpec::Sum);
        assert_eq!(scenario.variables.len(), 2);
        assert!(scenario.correlation.is_none());
    }

    #[test]
    fn test_run_sum_model() {
        let report = Scenario::from_yaml(SCENARIO).unwrap().run().unwrap();
        assert_eq!(report.iterations, 4000);
        assert_eq!(report.workers, 2);
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].name, "sum");
        assert!((report.outputs[0].summary.mean - 2.0).abs() < 0.1);
        assert!(report.fitted.is_empty());
    }

    #[test]
    fn test_run_is_reproducible() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let first = scenario.run().unwrap();
        let second = scenario.run().unwrap();
        assert_eq!(first.outputs[0].summary, second.outputs[0].summary);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut scenario = Scenario::from_yaml(SCENARIO).unwrap();
        scenario.apply(&Overrides {
            iterations: Some(500),
            workers: Some(Workers::Auto),
            sampling: Some(SamplingMethod::Random),
            ..Default::default()
        });
        assert_eq!(scenario.iterations, 500);
        assert_eq!(scenario.seed, Some(7));
        assert_eq!(scenario.workers, Workers::Auto);
        assert_eq!(scenario.run().unwrap().iterations, 500);
    }

    #[test]
    fn test_identity_model_with_correlation() {
        let yaml = r"
iterations: 2000
seed: 1
variables:
  - name: x
    distribution: uniform
    params: [0.0, 1.0]
  - name: y
    distribution: custom
    params: [[0.0, 10.0], [0.0, 1.0]]
correlation:
  - [1.0, 0.5]
  - [0.5, 1.0]
model:
  kind: identity
";
        let report = Scenario::from_yaml(yaml).unwrap().run().unwrap();
        let names: Vec<&str> = report.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
    }

    #[test]
    fn test_linear_model_and_fit() {
        let yaml = r"
iterations: 1000
seed: 3
variables:
  - name: price
    distribution: triangular
    params: [8.0, 10.0, 12.0]
  - name: volume
    fit:
      data: [95.0, 101.0, 99.5, 104.0, 98.0, 102.5, 100.0, 97.0]
      family: normal
model:
  kind: linear
  weights:
    price: 2.0
  intercept: 5.0
";
        let report = Scenario::from_yaml(yaml).unwrap().run().unwrap();
        assert_eq!(report.outputs[0].name, "linear");
        assert!((report.outputs[0].summary.mean - 25.0).abs() < 0.2);
        assert_eq!(report.fitted.len(), 1);
        assert_eq!(report.fitted[0].name, "volume");
        assert_eq!(report.fitted[0].fit.family, Family::Normal);
        assert!((report.fitted[0].fit.params[0] - 99.625).abs() < 1e-9);
    }

    #[test]
    fn test_convergence_stop() {
        let yaml = r"
iterations: 50000
seed: 5
variables:
  - name: x
    distribution: normal
    params: [10.0, 0.1]
stop:
  window: 1000
  tolerance: 0.01
";
        let report = Scenario::from_yaml(yaml).unwrap().run().unwrap();
        assert!(report.iterations < 50_000);
        assert_eq!(report.iterations % 1000, 0);
    }

    #[test]
    fn test_invalid_variables_rejected() {
        let both = r"
variables:
  - name: x
    distribution: normal
    params: [0.0, 1.0]
    fit:
      data: [1.0, 2.0]
";
        assert!(Scenario::from_yaml(both).unwrap().prepare().is_err());

        let neither = r"
variables:
  - name: x
";
        assert!(Scenario::from_yaml(neither).unwrap().prepare().is_err());

        let unknown_weight = r"
variables:
  - name: x
    distribution: uniform
    params: [0.0, 1.0]
model:
  kind: linear
  weights:
    z: 1.0
";
        assert!(Scenario::from_yaml(unknown_weight).unwrap().prepare().is_err());

        let bad_params = r"
variables:
  - name: x
    distribution: gamma
    params: [-1.0, 1.0]
";
        assert!(Scenario::from_yaml(bad_params).unwrap().prepare().is_err());
    }

    #[test]
    fn test_mismatched_correlation_fails_run() {
        let yaml = r"
iterations: 100
variables:
  - name: x
    distribution: uniform
    params: [0.0, 1.0]
correlation:
  - [1.0, 0.2]
  - [0.2, 1.0]
";
        assert!(Scenario::from_yaml(yaml).unwrap().run().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();

        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.variables[1].name, "b");

        let missing = Scenario::load(Path::new("/nonexistent/scenario.yaml"));
        assert!(missing.is_err());
    }
}
