//! Cholesky-based correlation injection.
//!
//! Multiplying an independent design by the transpose of the Cholesky factor
//! of a target correlation matrix induces that *linear* correlation between
//! columns. Applied to the uniform design this is an approximation: the
//! result is exact only when the columns are already close to jointly
//! uniform/Gaussian, and correlated columns may leave `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::sampling::{SampleMatrix, from_parts};

/// Allowed deviation for symmetry and for unit diagonal entries
const SYMMETRY_TOLERANCE: f64 = 1e-9;
/// Pivots within this distance of zero are treated as exact zeros
/// (positive semi-definite input).
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Square, symmetric target correlation matrix with a unit diagonal.
/// Covariance matrices are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CorrelationMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(invalid("matrix is empty"));
        }
        if let Some(row) = rows.iter().position(|r| r.len() != size) {
            return Err(invalid(format!(
                "row {row} has {} entries, expected {size}",
                rows[row].len()
            )));
        }

        let values: Vec<f64> = rows.into_iter().flatten().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("entries must be finite"));
        }

        let matrix = Self { size, values };
        for i in 0..size {
            let diagonal = matrix.get(i, i);
            if (diagonal - 1.0).abs() > SYMMETRY_TOLERANCE {
                return Err(invalid(format!(
                    "diagonal entry ({i}, {i}) is {diagonal}, expected 1"
                )));
            }
            for j in 0..i {
                if (matrix.get(i, j) - matrix.get(j, i)).abs() > SYMMETRY_TOLERANCE {
                    return Err(invalid(format!("not symmetric at ({i}, {j})")));
                }
            }
        }
        Ok(matrix)
    }

    /// Identity matrix (no correlation)
    #[must_use]
    pub fn identity(size: usize) -> Self {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
        }
        Self { size, values }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.size + col]
    }

    /// Lower-triangular factor `L` with `L·Lᵀ = self`.
    ///
    /// Zero pivots are accepted so positive semi-definite matrices decompose;
    /// a negative pivot means the matrix is not positive semi-definite.
    pub fn cholesky(&self) -> Result<CholeskyFactor> {
        let n = self.size;
        let mut l = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();

                if i == j {
                    let pivot = self.get(i, i) - sum;
                    if pivot < -PIVOT_TOLERANCE {
                        return Err(invalid(format!(
                            "not positive semi-definite (pivot {pivot:.3e} at row {i})"
                        )));
                    }
                    l[i * n + i] = pivot.max(0.0).sqrt();
                } else {
                    let diag = l[j * n + j];
                    let residual = self.get(i, j) - sum;
                    if diag > PIVOT_TOLERANCE {
                        l[i * n + j] = residual / diag;
                    } else if residual.abs() > PIVOT_TOLERANCE {
                        return Err(invalid(format!(
                            "not positive semi-definite (dependent column {j})"
                        )));
                    }
                }
            }
        }

        Ok(CholeskyFactor { size: n, lower: l })
    }
}

impl TryFrom<Vec<Vec<f64>>> for CorrelationMatrix {
    type Error = SimError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<CorrelationMatrix> for Vec<Vec<f64>> {
    fn from(matrix: CorrelationMatrix) -> Self {
        matrix
            .values
            .chunks_exact(matrix.size)
            .map(<[f64]>::to_vec)
            .collect()
    }
}

/// Lower-triangular Cholesky factor
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    size: usize,
    lower: Vec<f64>,
}

impl CholeskyFactor {
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.lower[row * self.size + col]
    }

    /// `samples · Lᵀ`
    pub fn apply(&self, samples: &SampleMatrix) -> Result<SampleMatrix> {
        if samples.cols() != self.size {
            return Err(invalid(format!(
                "matrix is {0}x{0} but samples have {1} columns",
                self.size,
                samples.cols()
            )));
        }

        let n = self.size;
        let mut data = Vec::with_capacity(samples.rows() * n);
        for r in 0..samples.rows() {
            let row = samples.row(r);
            // (row · Lᵀ)_j = Σ_k row_k · L_jk, with L_jk = 0 for k > j
            data.extend((0..n).map(|j| (0..=j).map(|k| row[k] * self.get(j, k)).sum::<f64>()));
        }
        Ok(from_parts(samples.rows(), n, data))
    }
}

/// Impose `target` on an independent design.
pub fn apply(samples: &SampleMatrix, target: &CorrelationMatrix) -> Result<SampleMatrix> {
    target.cholesky()?.apply(samples)
}

fn invalid(reason: impl Into<String>) -> SimError {
    SimError::InvalidCorrelationMatrix(reason.into())
}
