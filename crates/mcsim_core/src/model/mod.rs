mod distribution;
mod inputs;
mod results;

pub use distribution::{
    BetaParams, Distribution, DistributionSpec, EmpiricalParams, Family, GammaParams,
    LogNormalParams, NormalParams, Param, TriangularParams, UniformParams, WeibullParams, resolve,
    standard_normal_quantile,
};
pub use inputs::{ChunkInputs, FnTransform, InputSet, SampleTransform};
pub use results::ResultArray;

pub(crate) use inputs::ColumnIndex;
