//! Tests for the mcsim_core simulation engine
//!
//! Tests are organized by topic:
//! - `distributions` - Distribution resolution and inverse CDFs
//! - `fitting` - Maximum-likelihood fitting and automatic selection
//! - `sampling` - Independent and stratified designs
//! - `correlation` - Cholesky factorization and correlation injection
//! - `engine` - End-to-end runs: statistics, ordering, errors, stopping rules

mod distributions;
