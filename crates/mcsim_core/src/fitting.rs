//! Maximum-likelihood distribution fitting.
//!
//! Supports the families with closed-form or one-dimensional MLE:
//! normal, lognormal, gamma and weibull. Automatic selection fits every
//! candidate and keeps the one with the smallest negative log-likelihood.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Gamma, LogNormal, Normal, Weibull};
use statrs::function::gamma::digamma;
use tracing::debug;

use crate::error::{Result, SimError};
use crate::model::{Distribution, DistributionSpec, Family};

/// Families tried by [`FitTarget::Auto`], in order
pub const AUTO_CANDIDATES: [Family; 4] = [
    Family::Normal,
    Family::LogNormal,
    Family::Gamma,
    Family::Weibull,
];

const MAX_BRACKET_STEPS: usize = 200;
const MAX_BISECTIONS: usize = 200;

/// What to fit: a specific family, or the best of [`AUTO_CANDIDATES`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FitTarget {
    #[default]
    Auto,
    Family(Family),
}

impl FromStr for FitTarget {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(FitTarget::Auto)
        } else {
            s.parse().map(FitTarget::Family)
        }
    }
}

impl fmt::Display for FitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitTarget::Auto => f.write_str("auto"),
            FitTarget::Family(family) => write!(f, "{family}"),
        }
    }
}

/// Result of a fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDistribution {
    pub family: Family,
    /// Parameters in the order [`crate::model::resolve`] expects
    pub params: Vec<f64>,
    pub negative_log_likelihood: f64,
}

impl FittedDistribution {
    #[must_use]
    pub fn spec(&self) -> DistributionSpec {
        DistributionSpec::scalar(self.family.name(), &self.params)
    }

    pub fn distribution(&self) -> Result<Distribution> {
        self.spec().resolve()
    }
}

/// Fit `data` to `target` by maximum likelihood.
pub fn fit(data: &[f64], target: FitTarget) -> Result<FittedDistribution> {
    match target {
        FitTarget::Family(family) if AUTO_CANDIDATES.contains(&family) => {
            fit_family(data, family).map_err(|reason| {
                SimError::NoFittableDistribution(format!("{family}: {reason}"))
            })
        }
        FitTarget::Family(family) => Err(SimError::UnsupportedDistribution(format!(
            "no estimator for {family}"
        ))),
        FitTarget::Auto => {
            let mut best: Option<FittedDistribution> = None;
            let mut failures = Vec::new();
            for family in AUTO_CANDIDATES {
                match fit_family(data, family) {
                    Ok(fitted) => {
                        debug!(
                            %family,
                            nll = fitted.negative_log_likelihood,
                            "fitted candidate"
                        );
                        if best.as_ref().is_none_or(|b| {
                            fitted.negative_log_likelihood < b.negative_log_likelihood
                        }) {
                            best = Some(fitted);
                        }
                    }
                    Err(reason) => {
                        debug!(%family, %reason, "skipping candidate");
                        failures.push(format!("{family}: {reason}"));
                    }
                }
            }
            best.ok_or_else(|| SimError::NoFittableDistribution(failures.join("; ")))
        }
    }
}

type FitResult<T> = std::result::Result<T, String>;

fn fit_family(data: &[f64], family: Family) -> FitResult<FittedDistribution> {
    if data.len() < 2 {
        return Err("at least two observations are required".into());
    }
    if data.iter().any(|x| !x.is_finite()) {
        return Err("data contains non-finite values".into());
    }
    if data.iter().all(|&x| x == data[0]) {
        return Err("data has zero variance".into());
    }

    let (params, nll) = match family {
        Family::Normal => fit_normal(data)?,
        Family::LogNormal => fit_lognormal(data)?,
        Family::Gamma => fit_gamma(data)?,
        Family::Weibull => fit_weibull(data)?,
        other => return Err(format!("no estimator for {other}")),
    };

    if !nll.is_finite() {
        return Err("log-likelihood is not finite".into());
    }
    Ok(FittedDistribution {
        family,
        params,
        negative_log_likelihood: nll,
    })
}

fn require_positive_data(data: &[f64]) -> FitResult<()> {
    if data.iter().all(|&x| x > 0.0) {
        Ok(())
    } else {
        Err("data must be strictly positive".into())
    }
}

/// Mean and population standard deviation
fn moments(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn negative_log_likelihood<D: Continuous<f64, f64>>(dist: &D, data: &[f64]) -> f64 {
    -data.iter().map(|&x| dist.ln_pdf(x)).sum::<f64>()
}

fn fit_normal(data: &[f64]) -> FitResult<(Vec<f64>, f64)> {
    let (mean, std_dev) = moments(data);
    if std_dev <= 0.0 {
        return Err("data has zero variance".into());
    }
    let dist = Normal::new(mean, std_dev).map_err(|e| e.to_string())?;
    Ok((vec![mean, std_dev], negative_log_likelihood(&dist, data)))
}

fn fit_lognormal(data: &[f64]) -> FitResult<(Vec<f64>, f64)> {
    require_positive_data(data)?;
    let logs: Vec<f64> = data.iter().map(|x| x.ln()).collect();
    let (mu, sigma) = moments(&logs);
    if sigma <= 0.0 {
        return Err("log-data has zero variance".into());
    }
    let dist = LogNormal::new(mu, sigma).map_err(|e| e.to_string())?;
    Ok((vec![mu, sigma], negative_log_likelihood(&dist, data)))
}

/// Shape solves `ln a - ψ(a) = ln(mean x) - mean(ln x)`; scale = mean / shape.
fn fit_gamma(data: &[f64]) -> FitResult<(Vec<f64>, f64)> {
    require_positive_data(data)?;
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let mean_log = data.iter().map(|x| x.ln()).sum::<f64>() / n;
    let s = mean.ln() - mean_log;
    if s <= 0.0 || !s.is_finite() {
        return Err("data has zero variance".into());
    }

    // Minka's closed-form starting point
    let guess = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
    let shape = find_root(|a| a.ln() - digamma(a) - s, guess)?;
    let scale = mean / shape;

    let dist = Gamma::new(shape, 1.0 / scale).map_err(|e| e.to_string())?;
    Ok((vec![shape, scale], negative_log_likelihood(&dist, data)))
}

/// Shape solves the profile likelihood equation
/// `Σ xᵏ ln x / Σ xᵏ - 1/k - mean(ln x) = 0`; scale = (mean xᵏ)^(1/k).
fn fit_weibull(data: &[f64]) -> FitResult<(Vec<f64>, f64)> {
    require_positive_data(data)?;
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // The shape equation is scale invariant; normalizing keeps xᵏ bounded.
    let scaled: Vec<f64> = data.iter().map(|x| x / max).collect();
    let logs: Vec<f64> = scaled.iter().map(|x| x.ln()).collect();
    let n = data.len() as f64;
    let mean_log = logs.iter().sum::<f64>() / n;
    if logs.iter().all(|&l| (l - mean_log).abs() < f64::EPSILON) {
        return Err("data has zero variance".into());
    }

    let equation = |k: f64| {
        let (num, den) = scaled
            .iter()
            .zip(&logs)
            .fold((0.0, 0.0), |(num, den), (x, l)| {
                let xk = x.powf(k);
                (num + xk * l, den + xk)
            });
        num / den - 1.0 / k - mean_log
    };
    let shape = find_root(equation, 1.0)?;
    let scaled_scale = (scaled.iter().map(|x| x.powf(shape)).sum::<f64>() / n).powf(1.0 / shape);
    let scale = max * scaled_scale;

    let dist = Weibull::new(shape, scale).map_err(|e| e.to_string())?;
    Ok((vec![shape, scale], negative_log_likelihood(&dist, data)))
}

/// Root of a monotone function on `(0, ∞)`, bracketed outward from `guess`
/// and refined by bisection.
fn find_root<F: Fn(f64) -> f64>(f: F, guess: f64) -> FitResult<f64> {
    if !(guess.is_finite() && guess > 0.0) {
        return Err("invalid starting point for shape estimate".into());
    }

    let (mut lo, mut hi) = (guess, guess);
    let mut f_lo = f(lo);
    let mut f_hi = f_lo;
    let mut steps = 0;
    while f_lo.signum() == f_hi.signum() {
        if steps == MAX_BRACKET_STEPS || !f_lo.is_finite() || !f_hi.is_finite() {
            return Err("shape estimate did not converge".into());
        }
        lo /= 2.0;
        hi *= 2.0;
        f_lo = f(lo);
        f_hi = f(hi);
        steps += 1;
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) <= 1e-12 * mid {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_root_sqrt_two() {
        let root = find_root(|x| x * x - 2.0, 10.0).unwrap();
        assert!((root - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_fit_target_parse() {
        assert_eq!("AUTO".parse::<FitTarget>().unwrap(), FitTarget::Auto);
        assert_eq!(
            "gamma".parse::<FitTarget>().unwrap(),
            FitTarget::Family(Family::Gamma)
        );
        assert!("cauchy".parse::<FitTarget>().is_err());
    }
}
