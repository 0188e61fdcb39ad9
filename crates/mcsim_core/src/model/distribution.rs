use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF, Gamma};
use statrs::function::erf::erfc_inv;
use statrs::function::gamma::ln_gamma;

use crate::error::{Result, SimError};

/// Lower/upper probability bound used for families with unbounded support,
/// so the inverse CDF never returns an infinite value.
const PROB_FLOOR: f64 = 1e-12;

const GAMMA_MAX_BISECTIONS: usize = 200;
const GAMMA_RELATIVE_TOLERANCE: f64 = 1e-14;

/// Supported distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Normal,
    LogNormal,
    Uniform,
    Triangular,
    Beta,
    Gamma,
    Weibull,
    /// Piecewise-linear empirical CDF given by (probability, value) anchors
    Custom,
}

impl Family {
    pub const ALL: [Family; 8] = [
        Family::Normal,
        Family::LogNormal,
        Family::Uniform,
        Family::Triangular,
        Family::Beta,
        Family::Gamma,
        Family::Weibull,
        Family::Custom,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::LogNormal => "lognormal",
            Family::Uniform => "uniform",
            Family::Triangular => "triangular",
            Family::Beta => "beta",
            Family::Gamma => "gamma",
            Family::Weibull => "weibull",
            Family::Custom => "custom",
        }
    }

    /// Number of scalar parameters the family expects.
    /// `Custom` takes two series instead and reports 0.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Family::Normal | Family::LogNormal | Family::Uniform => 2,
            Family::Gamma | Family::Weibull => 2,
            Family::Triangular => 3,
            Family::Beta => 4,
            Family::Custom => 0,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Family::Normal),
            "lognormal" => Ok(Family::LogNormal),
            "uniform" => Ok(Family::Uniform),
            "triangular" => Ok(Family::Triangular),
            "beta" => Ok(Family::Beta),
            "gamma" => Ok(Family::Gamma),
            "weibull" => Ok(Family::Weibull),
            "custom" | "empirical" | "custom-empirical" => Ok(Family::Custom),
            _ => Err(SimError::UnsupportedDistribution(s.to_string())),
        }
    }
}

/// A single entry of a distribution parameter list.
///
/// Most families take scalars; the custom family takes two series
/// (`[values, probs]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Scalar(f64),
    Series(Vec<f64>),
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Scalar(value)
    }
}

impl From<Vec<f64>> for Param {
    fn from(values: Vec<f64>) -> Self {
        Param::Series(values)
    }
}

/// Unresolved distribution description: family name plus ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub family: String,
    #[serde(default)]
    pub params: Vec<Param>,
}

impl DistributionSpec {
    pub fn new(family: impl Into<String>, params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            family: family.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Shorthand for families that take only scalar parameters.
    pub fn scalar(family: impl Into<String>, params: &[f64]) -> Self {
        Self::new(family, params.iter().copied().map(Param::Scalar))
    }

    pub fn resolve(&self) -> Result<Distribution> {
        resolve(&self.family, &self.params)
    }
}

/// Resolve a family name and its parameters into a validated [`Distribution`].
pub fn resolve(family: &str, params: &[Param]) -> Result<Distribution> {
    let family: Family = family.parse()?;
    if family == Family::Custom {
        return match params {
            [Param::Series(values), Param::Series(probs)] => {
                EmpiricalParams::new(values.clone(), probs.clone()).map(Distribution::Custom)
            }
            _ => Err(SimError::invalid_params(
                family,
                "expected two series: [values, probs]",
            )),
        };
    }

    let scalars = scalar_params(family, params)?;
    match (family, scalars.as_slice()) {
        (Family::Normal, &[mean, std_dev]) => {
            NormalParams::new(mean, std_dev).map(Distribution::Normal)
        }
        (Family::LogNormal, &[mu, sigma]) => {
            LogNormalParams::new(mu, sigma).map(Distribution::LogNormal)
        }
        (Family::Uniform, &[low, high]) => UniformParams::new(low, high).map(Distribution::Uniform),
        (Family::Triangular, &[low, mode, high]) => {
            TriangularParams::new(low, mode, high).map(Distribution::Triangular)
        }
        (Family::Beta, &[alpha, beta, low, high]) => {
            BetaParams::new(alpha, beta, low, high).map(Distribution::Beta)
        }
        (Family::Gamma, &[shape, scale]) => GammaParams::new(shape, scale).map(Distribution::Gamma),
        (Family::Weibull, &[shape, scale]) => {
            WeibullParams::new(shape, scale).map(Distribution::Weibull)
        }
        _ => Err(SimError::invalid_params(family, "unexpected parameter list")),
    }
}

fn scalar_params(family: Family, params: &[Param]) -> Result<Vec<f64>> {
    if params.len() != family.arity() {
        return Err(SimError::invalid_params(
            family,
            format!("expected {} parameters, got {}", family.arity(), params.len()),
        ));
    }
    params
        .iter()
        .map(|p| match p {
            Param::Scalar(v) if v.is_finite() => Ok(*v),
            Param::Scalar(v) => Err(SimError::invalid_params(
                family,
                format!("parameter {v} is not finite"),
            )),
            Param::Series(_) => Err(SimError::invalid_params(
                family,
                "expected scalar parameters",
            )),
        })
        .collect()
}

fn require_finite(family: Family, values: &[f64]) -> Result<()> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(SimError::invalid_params(
            family,
            format!("parameter {v} is not finite"),
        )),
        None => Ok(()),
    }
}

fn require_positive(family: Family, name: &str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_params(
            family,
            format!("{name} must be positive (got {value})"),
        ))
    }
}

fn require_ordered(family: Family, low: f64, high: f64) -> Result<()> {
    if low < high {
        Ok(())
    } else {
        Err(SimError::invalid_params(
            family,
            format!("low ({low}) must be below high ({high})"),
        ))
    }
}

/// Inverse CDF of the standard normal distribution.
#[must_use]
#[inline]
pub fn standard_normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

#[inline]
fn open_unit(u: f64) -> f64 {
    u.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalParams {
    mean: f64,
    std_dev: f64,
}

impl NormalParams {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        require_finite(Family::Normal, &[mean, std_dev])?;
        require_positive(Family::Normal, "std_dev", std_dev)?;
        Ok(Self { mean, std_dev })
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }
}

/// Parameters of the underlying normal (`ln X ~ N(mu, sigma)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNormalParams {
    mu: f64,
    sigma: f64,
}

impl LogNormalParams {
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        require_finite(Family::LogNormal, &[mu, sigma])?;
        require_positive(Family::LogNormal, "sigma", sigma)?;
        Ok(Self { mu, sigma })
    }

    #[must_use]
    pub fn mu(&self) -> f64 {
        self.mu
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformParams {
    low: f64,
    high: f64,
}

impl UniformParams {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        require_finite(Family::Uniform, &[low, high])?;
        require_ordered(Family::Uniform, low, high)?;
        Ok(Self { low, high })
    }

    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularParams {
    low: f64,
    mode: f64,
    high: f64,
}

impl TriangularParams {
    pub fn new(low: f64, mode: f64, high: f64) -> Result<Self> {
        require_finite(Family::Triangular, &[low, mode, high])?;
        require_ordered(Family::Triangular, low, high)?;
        if !(low..=high).contains(&mode) {
            return Err(SimError::invalid_params(
                Family::Triangular,
                format!("mode ({mode}) must lie within [{low}, {high}]"),
            ));
        }
        Ok(Self { low, mode, high })
    }

    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[must_use]
    pub fn mode(&self) -> f64 {
        self.mode
    }

    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }
}

/// Beta(alpha, beta) rescaled onto `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaParams {
    standard: Beta,
    alpha: f64,
    beta: f64,
    low: f64,
    high: f64,
}

impl BetaParams {
    pub fn new(alpha: f64, beta: f64, low: f64, high: f64) -> Result<Self> {
        require_finite(Family::Beta, &[alpha, beta, low, high])?;
        require_positive(Family::Beta, "alpha", alpha)?;
        require_positive(Family::Beta, "beta", beta)?;
        require_ordered(Family::Beta, low, high)?;
        let standard = Beta::new(alpha, beta)
            .map_err(|e| SimError::invalid_params(Family::Beta, e.to_string()))?;
        Ok(Self {
            standard,
            alpha,
            beta,
            low,
            high,
        })
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaParams {
    standard: Gamma,
    shape: f64,
    scale: f64,
}

impl GammaParams {
    pub fn new(shape: f64, scale: f64) -> Result<Self> {
        require_finite(Family::Gamma, &[shape, scale])?;
        require_positive(Family::Gamma, "shape", shape)?;
        require_positive(Family::Gamma, "scale", scale)?;
        // statrs parameterizes by rate
        let standard = Gamma::new(shape, 1.0 / scale)
            .map_err(|e| SimError::invalid_params(Family::Gamma, e.to_string()))?;
        Ok(Self {
            standard,
            shape,
            scale,
        })
    }

    #[must_use]
    pub fn shape(&self) -> f64 {
        self.shape
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Inverse CDF for `p` in (0, 1).
    ///
    /// Brackets geometrically outward from a closed-form guess and bisects
    /// on the CDF. The lower half matches against `cdf` and the upper half
    /// against `sf`, so both tails keep their relative precision.
    fn quantile(&self, p: f64) -> f64 {
        let lower_tail = p <= 0.5;
        let target = if lower_tail { p } else { 1.0 - p };
        // Increasing in x on both branches
        let excess = |x: f64| {
            if lower_tail {
                self.standard.cdf(x) - target
            } else {
                target - self.standard.sf(x)
            }
        };

        let guess = self.initial_guess(p);
        if guess.is_nan() || guess <= 0.0 {
            return 0.0;
        }

        let mut lo = guess;
        while excess(lo) > 0.0 {
            lo /= 2.0;
            if lo == 0.0 {
                return 0.0;
            }
        }
        let mut hi = guess;
        while excess(hi) < 0.0 {
            hi *= 2.0;
            if !hi.is_finite() {
                return f64::MAX;
            }
        }

        for _ in 0..GAMMA_MAX_BISECTIONS {
            let mid = (lo * hi).sqrt();
            if mid <= lo || mid >= hi || hi - lo <= GAMMA_RELATIVE_TOLERANCE * hi {
                break;
            }
            if excess(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// Wilson-Hilferty approximation, or the small-x series `P(a, x) ≈ x^a / Γ(a + 1)`
    /// where the former goes non-positive.
    fn initial_guess(&self, p: f64) -> f64 {
        let c = 1.0 / (9.0 * self.shape);
        let t = 1.0 - c + standard_normal_quantile(p) * c.sqrt();
        if t > 0.0 {
            self.scale * self.shape * t.powi(3)
        } else {
            self.scale * ((p.ln() + ln_gamma(self.shape + 1.0)) / self.shape).exp()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeibullParams {
    shape: f64,
    scale: f64,
}

impl WeibullParams {
    pub fn new(shape: f64, scale: f64) -> Result<Self> {
        require_finite(Family::Weibull, &[shape, scale])?;
        require_positive(Family::Weibull, "shape", shape)?;
        require_positive(Family::Weibull, "scale", scale)?;
        Ok(Self { shape, scale })
    }

    #[must_use]
    pub fn shape(&self) -> f64 {
        self.shape
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Empirical CDF anchors. `probs` strictly increasing in `[0, 1]`,
/// `values` non-decreasing, same length, at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalParams {
    values: Vec<f64>,
    probs: Vec<f64>,
}

impl EmpiricalParams {
    pub fn new(values: Vec<f64>, probs: Vec<f64>) -> Result<Self> {
        let family = Family::Custom;
        if values.len() != probs.len() {
            return Err(SimError::invalid_params(
                family,
                format!(
                    "{} values but {} probabilities",
                    values.len(),
                    probs.len()
                ),
            ));
        }
        if values.len() < 2 {
            return Err(SimError::invalid_params(
                family,
                "at least two anchors are required",
            ));
        }
        require_finite(family, &values)?;
        require_finite(family, &probs)?;
        if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(SimError::invalid_params(
                family,
                "probabilities must lie within [0, 1]",
            ));
        }
        if probs.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::invalid_params(
                family,
                "probabilities must be sorted and unique",
            ));
        }
        if values.windows(2).any(|w| w[0] > w[1]) {
            return Err(SimError::invalid_params(
                family,
                "values must be non-decreasing",
            ));
        }
        Ok(Self { values, probs })
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    fn interpolate(&self, u: f64) -> f64 {
        let last = self.probs.len() - 1;
        if u <= self.probs[0] {
            return self.values[0];
        }
        if u >= self.probs[last] {
            return self.values[last];
        }
        // probs[i - 1] <= u < probs[i]
        let i = self.probs.partition_point(|&p| p <= u);
        let (p0, p1) = (self.probs[i - 1], self.probs[i]);
        let (v0, v1) = (self.values[i - 1], self.values[i]);
        v0 + (v1 - v0) * (u - p0) / (p1 - p0)
    }
}

/// A resolved distribution whose parameters have already been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Normal(NormalParams),
    LogNormal(LogNormalParams),
    Uniform(UniformParams),
    Triangular(TriangularParams),
    Beta(BetaParams),
    Gamma(GammaParams),
    Weibull(WeibullParams),
    Custom(EmpiricalParams),
}

impl Distribution {
    #[must_use]
    pub fn family(&self) -> Family {
        match self {
            Distribution::Normal(_) => Family::Normal,
            Distribution::LogNormal(_) => Family::LogNormal,
            Distribution::Uniform(_) => Family::Uniform,
            Distribution::Triangular(_) => Family::Triangular,
            Distribution::Beta(_) => Family::Beta,
            Distribution::Gamma(_) => Family::Gamma,
            Distribution::Weibull(_) => Family::Weibull,
            Distribution::Custom(_) => Family::Custom,
        }
    }

    /// Inverse cumulative distribution function.
    ///
    /// `u` is clamped into the unit interval first (into the open interval
    /// for families with unbounded support). The uniform family is a plain
    /// affine map and is applied to `u` as given.
    #[must_use]
    pub fn quantile(&self, u: f64) -> f64 {
        match self {
            Distribution::Normal(p) => p.mean + p.std_dev * standard_normal_quantile(open_unit(u)),
            Distribution::LogNormal(p) => {
                (p.mu + p.sigma * standard_normal_quantile(open_unit(u))).exp()
            }
            Distribution::Uniform(p) => p.low + (p.high - p.low) * u,
            Distribution::Triangular(p) => {
                let u = u.clamp(0.0, 1.0);
                let width = p.high - p.low;
                let split = (p.mode - p.low) / width;
                if u < split {
                    p.low + (u * width * (p.mode - p.low)).sqrt()
                } else {
                    p.high - ((1.0 - u) * width * (p.high - p.mode)).sqrt()
                }
            }
            Distribution::Beta(p) => {
                let raw = p.standard.inverse_cdf(u.clamp(0.0, 1.0));
                p.low + (p.high - p.low) * raw
            }
            Distribution::Gamma(p) => p.quantile(open_unit(u)),
            Distribution::Weibull(p) => p.scale * (-(1.0 - open_unit(u)).ln()).powf(1.0 / p.shape),
            Distribution::Custom(p) => p.interpolate(u.clamp(0.0, 1.0)),
        }
    }

    /// Map a column of unit-interval samples through [`Self::quantile`].
    #[must_use]
    pub fn quantiles(&self, column: &[f64]) -> Vec<f64> {
        column.iter().map(|&u| self.quantile(u)).collect()
    }

    /// The ordered parameter list this distribution was resolved from.
    #[must_use]
    pub fn to_spec(&self) -> DistributionSpec {
        let family = self.family().name();
        match self {
            Distribution::Normal(p) => DistributionSpec::scalar(family, &[p.mean, p.std_dev]),
            Distribution::LogNormal(p) => DistributionSpec::scalar(family, &[p.mu, p.sigma]),
            Distribution::Uniform(p) => DistributionSpec::scalar(family, &[p.low, p.high]),
            Distribution::Triangular(p) => {
                DistributionSpec::scalar(family, &[p.low, p.mode, p.high])
            }
            Distribution::Beta(p) => {
                DistributionSpec::scalar(family, &[p.alpha, p.beta, p.low, p.high])
            }
            Distribution::Gamma(p) => DistributionSpec::scalar(family, &[p.shape, p.scale]),
            Distribution::Weibull(p) => DistributionSpec::scalar(family, &[p.shape, p.scale]),
            Distribution::Custom(p) => DistributionSpec::new(
                family,
                [
                    Param::Series(p.values.clone()),
                    Param::Series(p.probs.clone()),
                ],
            ),
        }
    }
}
