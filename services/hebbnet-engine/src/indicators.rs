//! Small numeric helpers shared by regime detection and the specialist
//! feature extractors.

/// Guard against division by (near) zero
pub const EPSILON: f64 = 1e-8;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// `(a - b) / b`, or 0 when `b` is (near) zero
pub fn pct_change(current: f64, previous: f64) -> f64 {
    ratio(current - previous, previous)
}

/// `num / den`, or 0 when `den` is (near) zero
pub fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() < EPSILON {
        0.0
    } else {
        num / den
    }
}

/// Simple returns between consecutive values
pub fn simple_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| pct_change(w[1], w[0]))
        .collect()
}

/// Slope of the least-squares line through `(i, values[i])`
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (mut cov, mut var) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        cov += dx * (y - y_mean);
        var += dx * dx;
    }
    cov / var
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Exponential moving average seeded with the first value
pub fn ema_last(values: &[f64], period: usize) -> f64 {
    let Some(first) = values.first() else {
        return 0.0;
    };
    let alpha = 2.0 / (period as f64 + 1.0);
    values
        .iter()
        .skip(1)
        .fold(*first, |ema, v| alpha * v + (1.0 - alpha) * ema)
}

/// Last `n` items (or all of them when shorter)
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_dev_is_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_slope() {
        let line: Vec<f64> = (0..10).map(|i| 3.0 + 0.5 * i as f64).collect();
        assert!((linear_slope(&line) - 0.5).abs() < 1e-12);
        assert_eq!(linear_slope(&[1.0]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&values, 80.0) - 4.2).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(pct_change(5.0, 0.0), 0.0);
        assert_eq!(simple_returns(&[0.0, 1.0, 2.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn test_ema_of_constant_series() {
        assert!((ema_last(&[3.0; 30], 12) - 3.0).abs() < 1e-12);
        assert_eq!(tail(&[1.0, 2.0, 3.0], 5), &[1.0, 2.0, 3.0]);
    }
}
