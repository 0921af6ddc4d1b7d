use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the sample standard deviation (n - 1) given a pre-computed mean.
/// Returns NaN for fewer than two values.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}

/// Gini coefficient of per-station visit counts: the mean absolute difference
/// over all ordered pairs divided by twice the mean.
///
/// 0 means every station is used equally; all visits at one of `n` stations
/// gives `1 - 1/n`.
///
/// # Errors
///
/// `Value` for an empty slice or any negative count.
pub fn gini(counts: &[f64]) -> Result<f64> {
    if counts.is_empty() {
        return Err(PipelineError::Value(
            "gini requires at least one count".to_string(),
        ));
    }
    if counts.iter().any(|c| *c < 0.0 || c.is_nan()) {
        return Err(PipelineError::Value(
            "input values must be non-negative".to_string(),
        ));
    }

    let total: f64 = counts.iter().sum();
    if total == 0.0 {
        return Ok(0.0);
    }

    let mut shares: Vec<f64> = counts.iter().map(|c| c / total).collect();
    shares.sort_by(f64::total_cmp);

    // sum over i<j of |x_i - x_j| for ascending x is sum_k x_k * (2k - n + 1)
    let n = shares.len() as f64;
    let pair_sum: f64 = shares
        .iter()
        .enumerate()
        .map(|(k, x)| x * (2.0 * k as f64 - n + 1.0))
        .sum();
    let mean_abs_diff = 2.0 * pair_sum / (n * n);

    Ok(0.5 * mean_abs_diff / mean(&shares))
}

/// Percentage of the total held by the `n` largest counts.
pub fn top_share(counts: &[u64], n: usize) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let top: u64 = sorted.iter().take(n).sum();
    top as f64 / total as f64 * 100.0
}

/// Fails with a validation error naming `report` if `table` lacks any column.
pub fn validate_columns<S: AsRef<str>>(table: &Table, report: &str, required: &[S]) -> Result<()> {
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::validation(report, missing))
    }
}
