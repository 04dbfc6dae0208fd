//! Per-specialist feature extraction from OHLCV windows
//!
//! Each extractor returns a fixed-width vector; a window too short for the
//! extractor yields all zeros. Divisions go through the epsilon-guarded
//! helpers so flat or zero series never produce NaN.

use super::Candle;
use crate::indicators::{
    ema_last, linear_slope, mean, pct_change, percentile, ratio, simple_returns, std_dev, tail,
    EPSILON,
};

pub(crate) const PRICE_FEATURES: usize = 15;
pub(crate) const VOLUME_FEATURES: usize = 10;
pub(crate) const MOMENTUM_FEATURES: usize = 11;

pub(crate) const PRICE_MIN_CANDLES: usize = 20;
pub(crate) const VOLUME_MIN_CANDLES: usize = 5;
pub(crate) const MOMENTUM_MIN_CANDLES: usize = 10;

/// Body under this fraction of the open counts as a doji
const DOJI_BODY: f64 = 0.002;

/// Volume over this multiple of the 20-bar average counts as a spike
const VOLUME_SPIKE: f64 = 2.0;

fn closes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.close).collect()
}

/// `values[len - back]`, the price `back - 1` bars before the last one
fn back(values: &[f64], back: usize) -> f64 {
    values[values.len() - back]
}

/// Change of the last value over `bars` bars, or 0 without enough history
fn change_over(values: &[f64], bars: usize) -> f64 {
    if values.len() > bars {
        pct_change(back(values, 1), back(values, bars + 1))
    } else {
        0.0
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

/// Momentum, volatility, support/resistance, range, candle shape and moving
/// average features
pub(crate) fn price_pattern(window: &[Candle]) -> Vec<f64> {
    if window.len() < PRICE_MIN_CANDLES {
        return vec![0.0; PRICE_FEATURES];
    }
    let closes = closes(window);
    let close = back(&closes, 1);
    let mut features = Vec::with_capacity(PRICE_FEATURES);

    features.push(change_over(&closes, 1));
    features.push(change_over(&closes, 5));
    features.push(change_over(&closes, 20));

    let returns = simple_returns(&closes);
    let vol = |n: usize| if returns.len() >= n { std_dev(tail(&returns, n)) } else { 0.0 };
    features.push(vol(5));
    features.push(vol(20));

    let (low, high) = min_max(tail(&closes, 10));
    features.push(ratio(close - low, low));
    features.push(ratio(high - close, close));
    features.push(ratio(high - low, low));
    features.push((close - low) / (high - low + EPSILON));

    let last = &window[window.len() - 1];
    let body = ratio((last.close - last.open).abs(), last.open);
    features.push(if body < DOJI_BODY { 1.0 } else { 0.0 });
    features.push(ratio(last.high - last.open.max(last.close), last.close));
    features.push(ratio(last.open.min(last.close) - last.low, last.close));

    let ma5 = mean(tail(&closes, 5));
    let ma20 = mean(tail(&closes, 20));
    features.push(pct_change(close, ma5));
    features.push(pct_change(close, ma20));
    features.push(pct_change(ma5, ma20));

    features
}

/// Relative volume, volume momentum, price/volume interplay, volume
/// distribution and spike features
pub(crate) fn volume_flow(window: &[Candle]) -> Vec<f64> {
    if window.len() < VOLUME_MIN_CANDLES {
        return vec![0.0; VOLUME_FEATURES];
    }
    let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
    let closes = closes(window);
    let volume = back(&volumes, 1);
    let mut features = Vec::with_capacity(VOLUME_FEATURES);

    let avg_5 = mean(tail(&volumes, 5));
    let avg_20 = if volumes.len() >= 20 {
        mean(tail(&volumes, 20))
    } else {
        avg_5
    };
    let ratio_5 = volume / (avg_5 + EPSILON);
    let ratio_20 = volume / (avg_20 + EPSILON);
    features.push(ratio_5);
    features.push(ratio_20);

    let previous = back(&volumes, 2);
    let volume_change = (volume - previous) / (previous + EPSILON);
    features.push(volume_change);
    features.push(linear_slope(tail(&volumes, 5)));

    let price_change = change_over(&closes, 1);
    features.push(price_change * volume_change);

    if volumes.len() >= 20 {
        let recent = tail(&volumes, 20);
        let (low, high) = min_max(recent);
        features.push(percentile(recent, 80.0) / (avg_20 + EPSILON));
        features.push((volume - low) / (high - low + EPSILON));
    } else {
        features.extend([1.0, 0.5]);
    }

    let spike = ratio_20 > VOLUME_SPIKE;
    features.push(if spike { 1.0 } else { 0.0 });
    features.push(if spike && price_change > 0.0 { 1.0 } else { 0.0 });
    features.push(if spike && price_change < 0.0 { 1.0 } else { 0.0 });

    features
}

/// Momentum, rate of change, trend slope, acceleration, RSI, MACD and
/// volatility-adjusted momentum features
pub(crate) fn momentum(window: &[Candle]) -> Vec<f64> {
    if window.len() < MOMENTUM_MIN_CANDLES {
        return vec![0.0; MOMENTUM_FEATURES];
    }
    let prices = closes(window);
    let mut features = Vec::with_capacity(MOMENTUM_FEATURES);

    let m1 = change_over(&prices, 1);
    let m5 = change_over(&prices, 5);
    let m10 = change_over(&prices, 10);
    features.extend([m1, m5, m10]);
    features.extend([m5 * 5.0, m10 * 2.0]);

    for n in [5, 10] {
        let recent = tail(&prices, n);
        features.push(ratio(linear_slope(recent), mean(recent)));
    }

    features.push((m1 - m5) * 10.0);

    if prices.len() >= 15 {
        let diffs: Vec<f64> = tail(&prices, 15).windows(2).map(|w| w[1] - w[0]).collect();
        let gain = mean(&diffs.iter().map(|d| d.max(0.0)).collect::<Vec<_>>());
        let loss = mean(&diffs.iter().map(|d| (-d).max(0.0)).collect::<Vec<_>>());
        let rsi = if loss > 0.0 {
            100.0 - 100.0 / (1.0 + gain / loss)
        } else {
            100.0
        };
        features.push((rsi - 50.0) / 50.0);
    } else {
        features.push(0.0);
    }

    if prices.len() >= 26 {
        let macd = ema_last(&prices, 12) - ema_last(&prices, 26);
        features.push(ratio(macd, back(&prices, 1)));
    } else {
        features.push(0.0);
    }

    let volatility = std_dev(&simple_returns(tail(&prices, 10)));
    features.push(m10 / (volatility + EPSILON));

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: impl IntoIterator<Item = f64>) -> Vec<Candle> {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: i as i64 * 60,
                open: close * 0.999,
                high: close * 1.002,
                low: close * 0.997,
                close,
                volume: 1_000.0 + (i % 4) as f64 * 100.0,
            })
            .collect()
    }

    #[test]
    fn test_short_windows_are_zero() {
        let short = candles((0..4).map(|i| 100.0 + i as f64));
        assert_eq!(price_pattern(&short), vec![0.0; PRICE_FEATURES]);
        assert_eq!(volume_flow(&short), vec![0.0; VOLUME_FEATURES]);
        assert_eq!(momentum(&short), vec![0.0; MOMENTUM_FEATURES]);
    }

    #[test]
    fn test_widths_are_fixed() {
        for len in [5, 10, 19, 20, 21, 30] {
            let window = candles((0..len).map(|i| 100.0 + (i as f64 * 0.7).sin()));
            assert_eq!(price_pattern(&window).len(), PRICE_FEATURES);
            assert_eq!(volume_flow(&window).len(), VOLUME_FEATURES);
            assert_eq!(momentum(&window).len(), MOMENTUM_FEATURES);
        }
    }

    #[test]
    fn test_flat_zero_series_stays_finite() {
        let mut window = candles(std::iter::repeat(0.0).take(30));
        window.iter_mut().for_each(|c| c.volume = 0.0);
        for features in [price_pattern(&window), volume_flow(&window), momentum(&window)] {
            assert!(features.iter().all(|f| f.is_finite()));
        }
    }

    #[test]
    fn test_rising_prices_read_bullish() {
        let window = candles((0..30).map(|i| 100.0 * 1.01f64.powi(i)));
        let price = price_pattern(&window);
        assert!((price[0] - 0.01).abs() < 1e-9);
        assert!(price[12] > 0.0);

        let momentum = momentum(&window);
        // every diff is a gain, so RSI saturates
        assert!((momentum[8] - 1.0).abs() < 1e-12);
        assert!(momentum[9] > 0.0);
    }

    #[test]
    fn test_volume_spike_flags() {
        let mut window = candles((0..25).map(|i| 100.0 + i as f64 * 0.1));
        window.last_mut().unwrap().volume = 10_000.0;
        let features = volume_flow(&window);
        assert_eq!(features[7], 1.0);
        assert_eq!(features[8], 1.0);
        assert_eq!(features[9], 0.0);
    }
}
