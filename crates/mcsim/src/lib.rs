//! Command-line front end for mcsim
//!
//! Loads a YAML scenario, resolves or fits its input distributions, runs the
//! Monte Carlo engine and reports per-output summary statistics.

pub mod logging;
pub mod report;
pub mod scenario;

pub use logging::init_logging;
pub use report::{OutputFormat, Report};
pub use scenario::{ModelSpec, Overrides, Scenario};
