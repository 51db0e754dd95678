//! Summary statistics over sorted latency samples

use crate::latency::{Latency, OperationKind};
use serde::Serialize;
use thiserror::Error;

/// Percentiles included in every summary
pub const PERCENTILES: [f64; 4] = [0.25, 0.50, 0.75, 0.95];

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("no samples for {}", .0.label())]
    NoSamples(OperationKind),

    #[error("samples for {} are not sorted", .0.label())]
    Unsorted(OperationKind),
}

/// Summary of one operation kind's latency samples (microseconds)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: Latency,
    pub max: Latency,
    pub mean: Latency,
    pub std_dev: Latency,
    pub p25: Latency,
    pub p50: Latency,
    pub p75: Latency,
    pub p95: Latency,
}

/// Summarize a sorted, non-empty sample sequence
pub fn summarize(kind: OperationKind, sorted: &[Latency]) -> Result<Summary, StatsError> {
    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(StatsError::NoSamples(kind)),
    };
    if !sorted.windows(2).all(|w| w[0] <= w[1]) {
        return Err(StatsError::Unsorted(kind));
    }

    let (mean, std_dev) = mean_std_dev(sorted);
    let [p25, p50, p75, p95] = PERCENTILES.map(|q| quantile(q, sorted));

    Ok(Summary {
        count: sorted.len(),
        min,
        max,
        mean,
        std_dev,
        p25,
        p50,
        p75,
        p95,
    })
}

/// Arithmetic mean and sample standard deviation.
///
/// A single sample has a deviation of zero.
pub fn mean_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (sum_sq / (n - 1.0)).sqrt())
}

/// Linearly interpolated empirical quantile of sorted values.
///
/// `q` is clamped to `[0, 1]` and indexes position `q * (n - 1)`.
pub fn quantile(q: f64, sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile(0.5, &values), 25.0);
        assert_eq!(quantile(0.0, &values), 10.0);
        assert_eq!(quantile(1.0, &values), 40.0);
        assert!((quantile(0.25, &values) - 17.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(0.95, &[42.0]), 42.0);
        assert!(quantile(0.5, &[]).is_nan());
    }

    #[test]
    fn test_mean_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, dev) = mean_std_dev(&values);
        assert_eq!(mean, 5.0);
        // sample variance is 32 / 7
        assert!((dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);

        assert_eq!(mean_std_dev(&[3.0]), (3.0, 0.0));
    }

    #[test]
    fn test_summarize() {
        let s = summarize(OperationKind::StopPod, &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 40.0);
        assert_eq!(s.mean, 25.0);
        assert_eq!(s.p50, 25.0);
        assert!((s.p95 - 38.5).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_empty_is_an_error() {
        assert_eq!(
            summarize(OperationKind::CreatePod, &[]),
            Err(StatsError::NoSamples(OperationKind::CreatePod))
        );
        assert_eq!(
            StatsError::NoSamples(OperationKind::CreatePod).to_string(),
            "no samples for RunPodSandbox"
        );
    }

    #[test]
    fn test_summarize_rejects_unsorted() {
        assert_eq!(
            summarize(OperationKind::CreatePod, &[3.0, 1.0]),
            Err(StatsError::Unsorted(OperationKind::CreatePod))
        );
    }
}
