//! Market regime detection

use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::indicators::{linear_slope, mean, ratio, simple_returns, std_dev, tail};

/// Coarse market state driving learning-rate and position scaling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    #[default]
    Normal,
    Volatile,
    Trending,
}

impl MarketRegime {
    /// Classify the last `config.window` prices.
    ///
    /// Volatility (population stddev of simple returns) wins over trend
    /// (least-squares slope divided by the mean price). Fewer prices than the
    /// window is always `Normal`.
    pub fn detect(prices: &[f64], config: &RegimeConfig) -> Self {
        if prices.len() < config.window {
            return MarketRegime::Normal;
        }

        let returns = simple_returns(prices);
        let volatility = std_dev(tail(&returns, config.window));

        let recent = tail(prices, config.window);
        let trend = ratio(linear_slope(recent), mean(recent)).abs();

        if volatility > config.volatility_threshold {
            MarketRegime::Volatile
        } else if trend > config.trend_threshold {
            MarketRegime::Trending
        } else {
            MarketRegime::Normal
        }
    }

    pub fn learning_scale(self, config: &RegimeConfig) -> f64 {
        match self {
            MarketRegime::Normal => 1.0,
            MarketRegime::Volatile => config.volatile_learning_scale,
            MarketRegime::Trending => config.trending_learning_scale,
        }
    }

    pub fn size_scale(self, config: &RegimeConfig) -> f64 {
        match self {
            MarketRegime::Normal => 1.0,
            MarketRegime::Volatile => config.volatile_size_scale,
            MarketRegime::Trending => config.trending_size_scale,
        }
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarketRegime::Normal => "normal",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Trending => "trending",
        };
        f.write_str(name)
    }
}
