use serde::Serialize;

use crate::error::{BoxError, Result};
use crate::summary::{Summary, summarize};

/// Simulation output: one row per iteration, `width` values per row.
///
/// Stored row-major so chunk outputs can be concatenated directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultArray {
    width: usize,
    values: Vec<f64>,
}

impl ResultArray {
    /// A single-output result (one scalar per iteration)
    #[must_use]
    pub fn from_scalars(values: Vec<f64>) -> Self {
        Self { width: 1, values }
    }

    /// Build from row-major values. Fails if `values` is not a whole
    /// number of rows.
    pub fn from_row_major(width: usize, values: Vec<f64>) -> std::result::Result<Self, BoxError> {
        if width == 0 || values.len() % width != 0 {
            return Err(format!(
                "{} values cannot be split into rows of width {width}",
                values.len()
            )
            .into());
        }
        Ok(Self { width, values })
    }

    /// Stack equally long output columns side by side
    pub fn from_columns(columns: &[&[f64]]) -> std::result::Result<Self, BoxError> {
        let Some(rows) = columns.first().map(|c| c.len()) else {
            return Err("at least one output column is required".into());
        };
        if columns.iter().any(|c| c.len() != rows) {
            return Err("output columns differ in length".into());
        }

        let width = columns.len();
        let mut values = Vec::with_capacity(rows * width);
        for row in 0..rows {
            values.extend(columns.iter().map(|c| c[row]));
        }
        Ok(Self { width, values })
    }

    pub(crate) fn empty(width: usize) -> Self {
        Self {
            width,
            values: Vec::new(),
        }
    }

    /// Number of iterations (rows)
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.width
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of model outputs per iteration
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index * self.width..(index + 1) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.width)
    }

    /// Copy out one output column
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows().map(|row| row[index]).collect()
    }

    /// Raw row-major storage
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn append(&mut self, other: ResultArray) {
        debug_assert_eq!(self.width, other.width);
        self.values.extend(other.values);
    }

    /// Summary statistics for every output column
    pub fn summarize(&self) -> Result<Vec<Summary>> {
        (0..self.width)
            .map(|j| summarize(&self.column(j)))
            .collect()
    }
}
