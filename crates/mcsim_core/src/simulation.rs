use std::ops::Range;

use rand::SeedableRng;
use rand::rngs::StdRng;
#[cfg(feature = "parallel")]
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info};

use crate::config::{SimulationConfig, StoppingRule};
use crate::correlation::CorrelationMatrix;
use crate::error::{BoxError, Result, SimError};
use crate::model::{ChunkInputs, ColumnIndex, InputSet, ResultArray};
use crate::sampling::SamplingMethod;

/// A deterministic transformation evaluated over one chunk of samples.
///
/// The returned array must hold exactly one row per iteration in the chunk.
pub trait Model: Sync {
    fn evaluate(&self, inputs: &ChunkInputs<'_>) -> std::result::Result<ResultArray, BoxError>;
}

/// Closure-backed [`Model`], see [`model_fn`]
pub struct FnModel<F>(F);

/// Wrap a closure as a [`Model`]
pub fn model_fn<F>(f: F) -> FnModel<F>
where
    F: for<'a, 'b> Fn(&'a ChunkInputs<'b>) -> std::result::Result<ResultArray, BoxError> + Sync,
{
    FnModel(f)
}

impl<F> Model for FnModel<F>
where
    F: for<'a, 'b> Fn(&'a ChunkInputs<'b>) -> std::result::Result<ResultArray, BoxError> + Sync,
{
    fn evaluate(&self, inputs: &ChunkInputs<'_>) -> std::result::Result<ResultArray, BoxError> {
        (self.0)(inputs)
    }
}

/// Split `rows` into at most `workers` contiguous chunks of equal size,
/// folding the remainder into the last chunk.
#[must_use]
pub fn plan_chunks(rows: Range<usize>, workers: usize) -> Vec<Range<usize>> {
    let len = rows.len();
    if len == 0 {
        return Vec::new();
    }

    let count = workers.clamp(1, len);
    let size = len / count;
    (0..count)
        .map(|i| {
            let start = rows.start + i * size;
            let end = if i + 1 == count {
                rows.end
            } else {
                start + size
            };
            start..end
        })
        .collect()
}

/// Monte Carlo engine.
///
/// Owns its random generator, seeded once at construction; repeated runs on
/// the same engine continue the same stream. Runs take `&mut self`, so the
/// generator is never shared between threads.
pub struct MonteCarloEngine {
    config: SimulationConfig,
    workers: usize,
    rng: StdRng,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl MonteCarloEngine {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let workers = config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mcsim-worker-{i}"))
            .build()
            .map_err(|e| SimError::WorkerPool(e.to_string()))?;

        debug!(
            iterations = config.iterations,
            workers,
            seeded = config.seed.is_some(),
            "engine created"
        );

        Ok(Self {
            config,
            workers,
            rng,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Resolved worker count
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Sample the inputs, evaluate `model` over them and return one output
    /// row per iteration.
    ///
    /// Validation (inputs, correlation matrix) happens before any sampling.
    /// A failing chunk aborts the whole run. With a stopping rule the
    /// iterations are evaluated in waves and the run may return fewer rows
    /// than configured, always a whole number of waves.
    pub fn run_simulation<M: Model + ?Sized>(
        &mut self,
        model: &M,
        inputs: &InputSet,
        correlation: Option<&CorrelationMatrix>,
        sampling: SamplingMethod,
    ) -> Result<ResultArray> {
        if inputs.is_empty() {
            return Err(SimError::NoInputVariables);
        }
        let factor = match correlation {
            Some(matrix) if matrix.size() != inputs.len() => {
                return Err(SimError::InvalidCorrelationMatrix(format!(
                    "matrix is {0}x{0} but there are {1} input variables",
                    matrix.size(),
                    inputs.len()
                )));
            }
            Some(matrix) => Some(matrix.cholesky()?),
            None => None,
        };

        let rows = self.config.iterations;
        let design = sampling.sample(rows, inputs.len(), &mut self.rng);
        let design = match &factor {
            Some(factor) => factor.apply(&design)?,
            None => design,
        };

        let columns: Vec<Vec<f64>> = inputs
            .transforms()
            .enumerate()
            .map(|(j, transform)| transform.transform_column(&design.column(j)))
            .collect();
        drop(design);

        let names: Vec<&str> = inputs.names().collect();
        let index: ColumnIndex<'_> = names.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let evaluator = ChunkEvaluator {
            model,
            names: &names,
            columns: &columns,
            index: &index,
        };

        let rule = self.config.stopping_rule.as_ref();
        let wave = rule
            .and_then(StoppingRule::check_every)
            .unwrap_or(rows)
            .min(rows);
        debug!(
            rows,
            variables = inputs.len(),
            ?sampling,
            correlated = factor.is_some(),
            wave,
            "running simulation"
        );

        let mut results: Option<ResultArray> = None;
        let mut chunk_base = 0;
        let mut start = 0;
        while start < rows {
            let end = (start + wave).min(rows);
            let chunks = plan_chunks(start..end, self.workers);
            let outputs = self.evaluate_chunks(&evaluator, chunk_base, &chunks)?;

            for (i, output) in outputs.into_iter().enumerate() {
                match results.as_mut() {
                    None => results = Some(output),
                    Some(acc) if acc.width() != output.width() => {
                        return Err(SimError::model(
                            chunk_base + i,
                            format!(
                                "model returned {} outputs per row, earlier chunks returned {}",
                                output.width(),
                                acc.width()
                            ),
                        ));
                    }
                    Some(acc) => acc.append(output),
                }
            }
            chunk_base += chunks.len();
            start = end;

            if let Some(rule) = rule
                && let Some(acc) = &results
                && rule.should_stop(acc)
            {
                if end < rows {
                    debug!(completed = end, rows, "stopping rule satisfied");
                }
                break;
            }
        }

        let results = results.unwrap_or_else(|| ResultArray::empty(1));
        info!(
            rows = results.len(),
            outputs = results.width(),
            chunks = chunk_base,
            "simulation complete"
        );
        Ok(results)
    }

    /// Evaluate `chunks` on the worker pool. Collecting an indexed iterator
    /// keeps submission order regardless of which chunk finishes first.
    #[cfg(feature = "parallel")]
    fn evaluate_chunks<M: Model + ?Sized>(
        &self,
        evaluator: &ChunkEvaluator<'_, M>,
        chunk_base: usize,
        chunks: &[Range<usize>],
    ) -> Result<Vec<ResultArray>> {
        self.pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(i, range)| evaluator.evaluate(chunk_base + i, range.clone()))
                .collect()
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_chunks<M: Model + ?Sized>(
        &self,
        evaluator: &ChunkEvaluator<'_, M>,
        chunk_base: usize,
        chunks: &[Range<usize>],
    ) -> Result<Vec<ResultArray>> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, range)| evaluator.evaluate(chunk_base + i, range.clone()))
            .collect()
    }
}

/// Everything a worker needs to evaluate one chunk
struct ChunkEvaluator<'a, M: ?Sized> {
    model: &'a M,
    names: &'a [&'a str],
    columns: &'a [Vec<f64>],
    index: &'a ColumnIndex<'a>,
}

impl<M: Model + ?Sized> ChunkEvaluator<'_, M> {
    fn evaluate(&self, chunk: usize, range: Range<usize>) -> Result<ResultArray> {
        let slices = self
            .columns
            .iter()
            .map(|column| &column[range.clone()])
            .collect();
        let inputs = ChunkInputs::new(
            chunk,
            range.start,
            range.len(),
            self.names,
            slices,
            self.index,
        );

        let output = self
            .model
            .evaluate(&inputs)
            .map_err(|e| SimError::model(chunk, e))?;
        if output.len() != range.len() {
            return Err(SimError::model(
                chunk,
                format!(
                    "model returned {} rows for a chunk of {} iterations",
                    output.len(),
                    range.len()
                ),
            ));
        }
        Ok(output)
    }
}
