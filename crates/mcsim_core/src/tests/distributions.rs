//! Tests for distribution resolution and quantile transforms
//!
//! These tests verify that:
//! - Every family's quantile at 0.5 is its median
//! - The gamma quantile inverts its CDF in both tails, including shapes below 1
//! - A dense uniform grid mapped through the quantile reproduces the
//!   family's closed-form mean and standard deviation
//! - Malformed parameters and unknown families are rejected
//! - The empirical family interpolates without extrapolating

use statrs::distribution::{ContinuousCDF, Gamma};
use statrs::function::gamma::gamma;

use crate::error::SimError;
use crate::model::{Distribution, DistributionSpec, Family, Param, resolve};

fn scalar(family: &str, params: &[f64]) -> Distribution {
    DistributionSpec::scalar(family, params).resolve().unwrap()
}

/// Mean and population std of the quantile evaluated on a midpoint grid
fn grid_moments(dist: &Distribution, n: usize) -> (f64, f64) {
    let values: Vec<f64> = (0..n)
        .map(|i| dist.quantile((i as f64 + 0.5) / n as f64))
        .collect();
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}

fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() < tol,
        "{what}: expected {expected}, got {actual}"
    );
}

#[test]
fn test_median_at_half() {
    let cases: [(&str, &[f64], f64); 7] = [
        ("normal", &[3.0, 2.0], 3.0),
        ("lognormal", &[1.0, 0.5], 1f64.exp()),
        ("uniform", &[2.0, 6.0], 4.0),
        ("triangular", &[0.0, 5.0, 10.0], 5.0),
        ("triangular", &[0.0, 2.0, 10.0], 10.0 - 40f64.sqrt()),
        ("beta", &[2.0, 2.0, 0.0, 10.0], 5.0),
        ("weibull", &[1.5, 2.0], 2.0 * 2f64.ln().powf(1.0 / 1.5)),
    ];

    for (family, params, median) in cases {
        let dist = scalar(family, params);
        assert_close(dist.quantile(0.5), median, 1e-4, family);
    }
}

#[test]
fn test_gamma_median_matches_cdf() {
    let dist = scalar("gamma", &[2.0, 3.0]);
    let median = dist.quantile(0.5);
    let cdf = Gamma::new(2.0, 1.0 / 3.0).unwrap().cdf(median);
    assert_close(cdf, 0.5, 1e-9, "gamma cdf at median");
}

#[test]
fn test_gamma_quantile_inverts_cdf() {
    for shape in [0.1, 0.3, 0.5, 0.7, 0.99, 2.0, 40.0] {
        let dist = scalar("gamma", &[shape, 1.0]);
        let reference = Gamma::new(shape, 1.0).unwrap();
        for p in [1e-12, 1e-6, 1e-3, 0.1, 0.5, 0.9, 0.999, 1.0 - 1e-12] {
            let q = dist.quantile(p);
            assert!(q.is_finite() && q >= 0.0, "shape {shape}, p {p}: got {q}");
            // compare the tail the probability lives in, relatively
            let (actual, expected) = if p <= 0.5 {
                (reference.cdf(q), p)
            } else {
                (reference.sf(q), 1.0 - p)
            };
            assert!(
                ((actual - expected) / expected).abs() < 1e-6,
                "shape {shape}, p {p}: quantile {q} has tail mass {actual}"
            );
        }
    }
}

#[test]
fn test_gamma_tail_respects_scale() {
    let dist = scalar("gamma", &[2.0, 3.0]);
    let q = dist.quantile(1e-12);
    let cdf = Gamma::new(2.0, 1.0 / 3.0).unwrap().cdf(q);
    assert!(((cdf - 1e-12) / 1e-12).abs() < 1e-6, "cdf at lower tail {cdf}");
}

#[test]
fn test_custom_median_and_interpolation() {
    let dist = resolve(
        "custom",
        &[
            Param::Series(vec![0.0, 10.0, 20.0]),
            Param::Series(vec![0.0, 0.5, 1.0]),
        ],
    )
    .unwrap();

    assert_eq!(dist.quantile(0.5), 10.0);
    assert_close(dist.quantile(0.25), 5.0, 1e-12, "interpolated");
    assert_close(dist.quantile(0.75), 15.0, 1e-12, "interpolated");
}

#[test]
fn test_custom_does_not_extrapolate() {
    let dist = resolve(
        "empirical",
        &[
            Param::Series(vec![5.0, 7.0]),
            Param::Series(vec![0.2, 0.8]),
        ],
    )
    .unwrap();

    assert_eq!(dist.quantile(0.0), 5.0);
    assert_eq!(dist.quantile(0.1), 5.0);
    assert_eq!(dist.quantile(0.9), 7.0);
    assert_eq!(dist.quantile(1.0), 7.0);
}

#[test]
fn test_grid_moments_match_closed_form() {
    let n = 20_000;

    let (mean, std) = grid_moments(&scalar("normal", &[5.0, 2.0]), n);
    assert_close(mean, 5.0, 1e-6, "normal mean");
    assert_close(std, 2.0, 0.02, "normal std");

    let (mean, std) = grid_moments(&scalar("lognormal", &[0.0, 0.5]), n);
    let expected_mean = 0.125f64.exp();
    let expected_std = ((0.25f64.exp() - 1.0) * 0.25f64.exp()).sqrt();
    assert_close(mean, expected_mean, 0.01, "lognormal mean");
    assert_close(std, expected_std, 0.01, "lognormal std");

    let (mean, std) = grid_moments(&scalar("uniform", &[2.0, 6.0]), n);
    assert_close(mean, 4.0, 1e-9, "uniform mean");
    assert_close(std, 4.0 / 12f64.sqrt(), 1e-4, "uniform std");

    let (mean, std) = grid_moments(&scalar("triangular", &[0.0, 2.0, 10.0]), n);
    assert_close(mean, 4.0, 0.01, "triangular mean");
    assert_close(std, (84.0f64 / 18.0).sqrt(), 0.01, "triangular std");

    let (mean, std) = grid_moments(&scalar("beta", &[2.0, 5.0, 0.0, 1.0]), n);
    assert_close(mean, 2.0 / 7.0, 0.005, "beta mean");
    assert_close(std, (10.0f64 / (49.0 * 8.0)).sqrt(), 0.005, "beta std");

    let (mean, std) = grid_moments(&scalar("gamma", &[2.0, 3.0]), n);
    assert_close(mean, 6.0, 0.05, "gamma mean");
    assert_close(std, 2f64.sqrt() * 3.0, 0.05, "gamma std");

    let (mean, std) = grid_moments(&scalar("weibull", &[1.5, 2.0]), n);
    let g1 = gamma(1.0 + 1.0 / 1.5);
    let g2 = gamma(1.0 + 2.0 / 1.5);
    assert_close(mean, 2.0 * g1, 0.01, "weibull mean");
    assert_close(std, 2.0 * (g2 - g1 * g1).sqrt(), 0.02, "weibull std");
}

#[test]
fn test_quantile_is_monotone() {
    for dist in [
        scalar("normal", &[0.0, 1.0]),
        scalar("gamma", &[0.7, 1.0]),
        scalar("gamma", &[0.1, 1.0]),
        scalar("beta", &[0.5, 0.5, -1.0, 1.0]),
        scalar("triangular", &[0.0, 0.0, 1.0]),
    ] {
        let values: Vec<f64> = (0..=100).map(|i| dist.quantile(i as f64 / 100.0)).collect();
        assert!(
            values.windows(2).all(|w| w[0] <= w[1]),
            "{:?} quantile is not monotone",
            dist.family()
        );
    }
}

#[test]
fn test_unbounded_families_stay_finite_at_edges() {
    for dist in [
        scalar("normal", &[0.0, 1.0]),
        scalar("lognormal", &[0.0, 1.0]),
        scalar("gamma", &[2.0, 1.0]),
        scalar("gamma", &[0.5, 1.0]),
        scalar("gamma", &[0.1, 1.0]),
        scalar("weibull", &[2.0, 1.0]),
    ] {
        for u in [-0.3, 0.0, 1.0, 1.4] {
            assert!(dist.quantile(u).is_finite(), "{:?} at {u}", dist.family());
        }
    }
}

#[test]
fn test_every_family_parses_from_its_name() {
    for family in Family::ALL {
        assert_eq!(family.name().parse::<Family>().unwrap(), family);
        assert_eq!(family.to_string().to_uppercase().parse::<Family>().unwrap(), family);
    }
}

#[test]
fn test_family_names_case_insensitive() {
    let dist = scalar("Normal", &[1.0, 1.0]);
    assert_eq!(dist.family(), Family::Normal);
    assert_eq!("LOGNORMAL".parse::<Family>().unwrap(), Family::LogNormal);
    assert_eq!("custom-empirical".parse::<Family>().unwrap(), Family::Custom);
}

#[test]
fn test_unknown_family_is_unsupported() {
    let err = DistributionSpec::scalar("cauchy", &[0.0, 1.0])
        .resolve()
        .unwrap_err();
    assert!(matches!(err, SimError::UnsupportedDistribution(name) if name == "cauchy"));
}

#[test]
fn test_invalid_parameters_rejected() {
    let bad: [(&str, &[f64]); 10] = [
        ("normal", &[0.0]),
        ("normal", &[0.0, -1.0]),
        ("lognormal", &[0.0, 0.0]),
        ("uniform", &[3.0, 1.0]),
        ("triangular", &[0.0, 11.0, 10.0]),
        ("triangular", &[5.0, 5.0, 5.0]),
        ("beta", &[0.0, 1.0, 0.0, 1.0]),
        ("beta", &[1.0, 1.0, 0.0]),
        ("gamma", &[-2.0, 1.0]),
        ("weibull", &[1.0, f64::NAN]),
    ];

    for (family, params) in bad {
        let result = DistributionSpec::scalar(family, params).resolve();
        assert!(
            matches!(result, Err(SimError::InvalidDistributionParams { .. })),
            "{family} {params:?} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn test_invalid_custom_anchors_rejected() {
    let cases = [
        (vec![1.0, 2.0, 3.0], vec![0.0, 0.7, 0.5]),
        (vec![1.0, 2.0], vec![0.5, 0.5]),
        (vec![1.0, 2.0, 3.0], vec![0.0, 1.0]),
        (vec![1.0], vec![0.5]),
        (vec![3.0, 1.0], vec![0.0, 1.0]),
        (vec![1.0, 2.0], vec![0.0, 1.5]),
    ];

    for (values, probs) in cases {
        let result = resolve(
            "custom",
            &[Param::Series(values.clone()), Param::Series(probs.clone())],
        );
        assert!(
            matches!(result, Err(SimError::InvalidDistributionParams { .. })),
            "{values:?} / {probs:?} should be rejected"
        );
    }

    let scalars = resolve("custom", &[Param::Scalar(1.0), Param::Scalar(2.0)]);
    assert!(matches!(
        scalars,
        Err(SimError::InvalidDistributionParams { .. })
    ));
}

#[test]
fn test_series_rejected_for_scalar_family() {
    let result = resolve("normal", &[Param::Series(vec![1.0]), Param::Scalar(1.0)]);
    assert!(matches!(
        result,
        Err(SimError::InvalidDistributionParams {
            family: Family::Normal,
            ..
        })
    ));
}

#[test]
fn test_to_spec_reproduces_parameters() {
    let specs = [
        DistributionSpec::scalar("beta", &[2.0, 3.0, -1.0, 4.0]),
        DistributionSpec::scalar("triangular", &[1.0, 2.0, 3.0]),
        DistributionSpec::new(
            "custom",
            [
                Param::Series(vec![1.0, 2.0]),
                Param::Series(vec![0.0, 1.0]),
            ],
        ),
    ];

    for spec in specs {
        assert_eq!(spec.resolve().unwrap().to_spec(), spec);
    }
}
