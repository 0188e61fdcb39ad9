use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{BoxError, Result, SimError};

use super::distribution::{Distribution, DistributionSpec};

/// Maps unit-interval samples onto a variable's value space.
pub trait SampleTransform: Send + Sync {
    fn transform(&self, u: f64) -> f64;

    fn transform_column(&self, column: &[f64]) -> Vec<f64> {
        column.iter().map(|&u| self.transform(u)).collect()
    }
}

impl SampleTransform for Distribution {
    fn transform(&self, u: f64) -> f64 {
        self.quantile(u)
    }

    fn transform_column(&self, column: &[f64]) -> Vec<f64> {
        self.quantiles(column)
    }
}

/// Adapter for arbitrary transform closures
pub struct FnTransform<F>(pub F);

impl<F> SampleTransform for FnTransform<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn transform(&self, u: f64) -> f64 {
        (self.0)(u)
    }
}

struct InputVariable {
    name: String,
    transform: Box<dyn SampleTransform>,
}

/// Ordered set of named input variables.
///
/// Insertion order fixes the column of each variable in the sample design
/// and its row/column in a correlation matrix.
#[derive(Default)]
pub struct InputSet {
    variables: Vec<InputVariable>,
}

impl InputSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with any sample transform
    pub fn add(
        &mut self,
        name: impl Into<String>,
        transform: impl SampleTransform + 'static,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(SimError::DuplicateVariable(name));
        }
        self.variables.push(InputVariable {
            name,
            transform: Box::new(transform),
        });
        Ok(self)
    }

    /// Resolve `spec` and add it as a variable
    pub fn add_spec(&mut self, name: impl Into<String>, spec: &DistributionSpec) -> Result<&mut Self> {
        let distribution = spec.resolve()?;
        self.add(name, distribution)
    }

    /// Add a variable backed by a plain closure over `u`
    pub fn add_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.add(name, FnTransform(f))
    }

    /// Builder-style [`Self::add`]
    pub fn with(
        mut self,
        name: impl Into<String>,
        transform: impl SampleTransform + 'static,
    ) -> Result<Self> {
        self.add(name, transform)?;
        Ok(self)
    }

    /// Builder-style [`Self::add_fn`]
    pub fn with_fn<F>(mut self, name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.add_fn(name, f)?;
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub(crate) fn transforms(&self) -> impl Iterator<Item = &dyn SampleTransform> {
        self.variables.iter().map(|v| v.transform.as_ref())
    }
}

impl fmt::Debug for InputSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSet")
            .field("variables", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Name → column lookup shared by every chunk of one run
pub(crate) type ColumnIndex<'a> = FxHashMap<&'a str, usize>;

/// The slice of every input variable that belongs to one chunk.
#[derive(Debug, Clone)]
pub struct ChunkInputs<'a> {
    chunk: usize,
    offset: usize,
    len: usize,
    names: &'a [&'a str],
    columns: Vec<&'a [f64]>,
    index: &'a ColumnIndex<'a>,
}

impl<'a> ChunkInputs<'a> {
    pub(crate) fn new(
        chunk: usize,
        offset: usize,
        len: usize,
        names: &'a [&'a str],
        columns: Vec<&'a [f64]>,
        index: &'a ColumnIndex<'a>,
    ) -> Self {
        Self {
            chunk,
            offset,
            len,
            names,
            columns,
            index,
        }
    }

    /// Index of this chunk in submission order
    #[must_use]
    pub fn chunk_index(&self) -> usize {
        self.chunk
    }

    /// Iteration number of this chunk's first row
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of iterations in this chunk
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a [f64]> {
        self.index.get(name).map(|&i| self.columns[i])
    }

    /// Like [`Self::get`], with an error suitable for returning from a model
    pub fn require(&self, name: &str) -> std::result::Result<&'a [f64], BoxError> {
        self.get(name)
            .ok_or_else(|| format!("unknown input variable {name:?}").into())
    }

    /// Columns in input order, paired with their variable names
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [f64])> + '_ {
        self.names.iter().copied().zip(self.columns.iter().copied())
    }

    #[must_use]
    pub fn columns(&self) -> &[&'a [f64]] {
        &self.columns
    }
}
