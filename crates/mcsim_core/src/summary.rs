//! Descriptive statistics over simulation output.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Summary of one output column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

/// Reduce raw samples to descriptive statistics.
pub fn summarize(data: &[f64]) -> Result<Summary> {
    if data.is_empty() {
        return Err(SimError::EmptyResultSet);
    }

    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(Summary {
        count: data.len(),
        mean,
        std: variance.sqrt(),
        p5: percentile_of_sorted(&sorted, 5.0),
        p50: percentile_of_sorted(&sorted, 50.0),
        p95: percentile_of_sorted(&sorted, 95.0),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

/// Percentile `p` (0..=100) using linear interpolation between order statistics.
pub fn percentile(data: &[f64], p: f64) -> Result<f64> {
    if data.is_empty() {
        return Err(SimError::EmptyResultSet);
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(percentile_of_sorted(&sorted, p))
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Equal-width histogram counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Population variance of the bin counts
    #[must_use]
    pub fn count_variance(&self) -> f64 {
        let n = self.counts.len() as f64;
        let mean = self.counts.iter().sum::<usize>() as f64 / n;
        self.counts
            .iter()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / n
    }
}

/// Bin `data` into `bins` equal-width bins over `range`, or over the data's
/// own min/max when no range is given. Values outside the range are ignored;
/// the last bin includes its right edge.
pub fn histogram(data: &[f64], bins: usize, range: Option<(f64, f64)>) -> Result<Histogram> {
    if data.is_empty() {
        return Err(SimError::EmptyResultSet);
    }
    if bins == 0 {
        return Err(SimError::InvalidConfig("histogram needs at least one bin".into()));
    }

    let (lo, hi) = range.unwrap_or_else(|| {
        data.iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            })
    });
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for &x in data {
        if !(lo..=hi).contains(&x) {
            continue;
        }
        let bin = (((x - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    Ok(Histogram { edges, counts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_known_values() {
        let data: Vec<f64> = (1..=101).map(f64::from).collect();
        let summary = summarize(&data).unwrap();

        assert_eq!(summary.count, 101);
        assert!((summary.mean - 51.0).abs() < 1e-12);
        assert!((summary.p5 - 6.0).abs() < 1e-12);
        assert!((summary.p50 - 51.0).abs() < 1e-12);
        assert!((summary.p95 - 96.0).abs() < 1e-12);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 101.0);
    }

    #[test]
    fn test_std_is_population() {
        let summary = summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((summary.std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_value() {
        let summary = summarize(&[3.5]).unwrap();
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.p5, 3.5);
        assert_eq!(summary.p95, 3.5);
    }

    #[test]
    fn test_empty_fails() {
        assert!(matches!(summarize(&[]), Err(SimError::EmptyResultSet)));
        assert!(matches!(percentile(&[], 50.0), Err(SimError::EmptyResultSet)));
    }

    #[test]
    fn test_percentile_interpolates() {
        let p = percentile(&[10.0, 0.0], 25.0).unwrap();
        assert!((p - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_counts() {
        let data = [0.0, 0.1, 0.5, 0.55, 0.99, 1.0];
        let hist = histogram(&data, 2, Some((0.0, 1.0))).unwrap();
        assert_eq!(hist.counts, vec![2, 4]);
        assert_eq!(hist.edges, vec![0.0, 0.5, 1.0]);
    }
}
