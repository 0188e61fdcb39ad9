//! Unit-hypercube sample designs.
//!
//! A design has one row per iteration and one column per input variable,
//! with values in `[0, 1]` (before any correlation is applied).

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::Open01;
use serde::{Deserialize, Serialize};

/// How the unit-hypercube design is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// Independent uniform draws
    #[default]
    Random,
    /// Latin hypercube: one sample per equal-probability stratum per dimension
    Stratified,
}

impl SamplingMethod {
    pub fn sample<R: Rng + ?Sized>(self, n: usize, d: usize, rng: &mut R) -> SampleMatrix {
        match self {
            SamplingMethod::Random => independent(n, d, rng),
            SamplingMethod::Stratified => stratified(n, d, rng),
        }
    }
}

/// Row-major `rows × cols` matrix of samples
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl SampleMatrix {
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Copy out one column
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        self.data
            .chunks_exact(self.cols.max(1))
            .map(|row| row[col])
            .collect()
    }
}

/// Independent uniform draws on the open unit interval.
pub fn independent<R: Rng + ?Sized>(n: usize, d: usize, rng: &mut R) -> SampleMatrix {
    let data = (0..n * d).map(|_| rng.sample(Open01)).collect();
    SampleMatrix {
        rows: n,
        cols: d,
        data,
    }
}

/// Latin hypercube design.
///
/// For each dimension the n stratum indices are shuffled and sample `i`
/// lands in stratum `perm[i]`, jittered around the stratum center by at most
/// half a stratum width. Dimensions are permuted independently, so marginal
/// coverage is guaranteed but joint coverage is not.
pub fn stratified<R: Rng + ?Sized>(n: usize, d: usize, rng: &mut R) -> SampleMatrix {
    let mut samples = SampleMatrix::zeros(n, d);
    if n == 0 {
        return samples;
    }

    let width = 1.0 / n as f64;
    let mut perm: Vec<usize> = (0..n).collect();
    for col in 0..d {
        perm.shuffle(rng);
        for (row, &stratum) in perm.iter().enumerate() {
            let center = (stratum as f64 + 0.5) * width;
            let jitter = (rng.sample::<f64, _>(Open01) - 0.5) * width;
            samples.set(row, col, (center + jitter).clamp(0.0, 1.0));
        }
    }
    samples
}

/// The stratum (of `n` equal-width strata) that `u` falls in.
#[must_use]
pub fn stratum_of(u: f64, n: usize) -> usize {
    ((u * n as f64) as usize).min(n.saturating_sub(1))
}

pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> SampleMatrix {
    debug_assert_eq!(data.len(), rows * cols);
    SampleMatrix { rows, cols, data }
}
