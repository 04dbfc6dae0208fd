//! Specialist sub-networks
//!
//! Three single-winner learners, each seeing the market through its own
//! feature extractor (price pattern, volume flow, momentum) and reporting in
//! its own vocabulary. [`SpecialistCoordinator`] trains them side by side and
//! folds their outputs into one consensus.

mod coordinator;
mod features;

use serde::{Deserialize, Serialize};

pub use coordinator::{
    ConsensusReport, Specialist, SpecialistCoordinator, SpecialistReading, SpecialistReport,
};

use crate::config::{SpecialistNetConfig, SpecialistsConfig};
use crate::dataset::{BUY, SELL};
use crate::trading::SignalStrength;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Unix seconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle window ending at the bar being labelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWindow {
    pub candles: Vec<Candle>,
    pub label: i8,
}

/// Which slice of the market a specialist looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistKind {
    PricePattern,
    VolumeFlow,
    Momentum,
}

impl SpecialistKind {
    pub const ALL: [SpecialistKind; 3] = [
        SpecialistKind::PricePattern,
        SpecialistKind::VolumeFlow,
        SpecialistKind::Momentum,
    ];

    pub fn feature_count(self) -> usize {
        match self {
            SpecialistKind::PricePattern => features::PRICE_FEATURES,
            SpecialistKind::VolumeFlow => features::VOLUME_FEATURES,
            SpecialistKind::Momentum => features::MOMENTUM_FEATURES,
        }
    }

    /// Shortest window that yields non-zero features
    pub fn min_candles(self) -> usize {
        match self {
            SpecialistKind::PricePattern => features::PRICE_MIN_CANDLES,
            SpecialistKind::VolumeFlow => features::VOLUME_MIN_CANDLES,
            SpecialistKind::Momentum => features::MOMENTUM_MIN_CANDLES,
        }
    }

    /// Fixed-width feature vector for `window`
    pub fn extract(self, window: &[Candle]) -> Vec<f64> {
        match self {
            SpecialistKind::PricePattern => features::price_pattern(window),
            SpecialistKind::VolumeFlow => features::volume_flow(window),
            SpecialistKind::Momentum => features::momentum(window),
        }
    }

    pub(crate) fn net_config(self, config: &SpecialistsConfig) -> &SpecialistNetConfig {
        match self {
            SpecialistKind::PricePattern => &config.price,
            SpecialistKind::VolumeFlow => &config.volume,
            SpecialistKind::Momentum => &config.momentum,
        }
    }

    /// Read a prediction in this specialist's vocabulary
    pub fn interpret(
        self,
        prediction: i8,
        confidence: f64,
        config: &SpecialistsConfig,
    ) -> Interpretation {
        let strength = if confidence > config.strong_confidence {
            SignalStrength::Strong
        } else if confidence > config.medium_confidence {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        };
        let directional = prediction == BUY || prediction == SELL;

        let reading = match self {
            SpecialistKind::PricePattern => {
                let pattern = match prediction {
                    BUY if confidence > config.breakout_confidence => PricePattern::BullishBreakout,
                    SELL if confidence > config.breakout_confidence => {
                        PricePattern::BearishBreakdown
                    }
                    BUY | SELL => PricePattern::Undetermined,
                    _ => PricePattern::RangeBound,
                };
                Reading::Price {
                    pattern,
                    breakout_probability: if directional { confidence } else { 0.0 },
                }
            }
            SpecialistKind::VolumeFlow => Reading::Volume {
                flow: match prediction {
                    BUY => VolumeFlow::Accumulation,
                    SELL => VolumeFlow::Distribution,
                    _ => VolumeFlow::Neutral,
                },
                institutional: confidence > config.institutional_confidence,
            },
            SpecialistKind::Momentum => Reading::Momentum {
                bias: match prediction {
                    BUY => MomentumBias::Bullish,
                    SELL => MomentumBias::Bearish,
                    _ => MomentumBias::Sideways,
                },
                trend_change_probability: if directional { confidence } else { 0.0 },
            },
        };

        Interpretation {
            reading,
            strength,
            confidence,
        }
    }
}

impl std::fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpecialistKind::PricePattern => "price_pattern",
            SpecialistKind::VolumeFlow => "volume_flow",
            SpecialistKind::Momentum => "momentum",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricePattern {
    BullishBreakout,
    RangeBound,
    BearishBreakdown,
    /// Directional call without the confidence to name a breakout
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeFlow {
    Accumulation,
    Distribution,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumBias {
    Bullish,
    Bearish,
    Sideways,
}

/// Specialist-specific reading of a prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    Price {
        pattern: PricePattern,
        breakout_probability: f64,
    },
    Volume {
        flow: VolumeFlow,
        /// Confidence high enough to suggest large players
        institutional: bool,
    },
    Momentum {
        bias: MomentumBias,
        trend_change_probability: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub reading: Reading,
    pub strength: SignalStrength,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_reading() {
        let config = SpecialistsConfig::default();
        let strong = SpecialistKind::PricePattern.interpret(BUY, 0.85, &config);
        assert_eq!(strong.strength, SignalStrength::Strong);
        assert_eq!(
            strong.reading,
            Reading::Price {
                pattern: PricePattern::BullishBreakout,
                breakout_probability: 0.85
            }
        );

        let unsure = SpecialistKind::PricePattern.interpret(SELL, 0.65, &config);
        assert_eq!(unsure.strength, SignalStrength::Medium);
        assert!(matches!(
            unsure.reading,
            Reading::Price { pattern: PricePattern::Undetermined, .. }
        ));

        let flat = SpecialistKind::PricePattern.interpret(0, 0.9, &config);
        assert_eq!(
            flat.reading,
            Reading::Price {
                pattern: PricePattern::RangeBound,
                breakout_probability: 0.0
            }
        );
    }

    #[test]
    fn test_volume_and_momentum_readings() {
        let config = SpecialistsConfig::default();
        let volume = SpecialistKind::VolumeFlow.interpret(SELL, 0.8, &config);
        assert_eq!(volume.strength, SignalStrength::Medium);
        assert_eq!(
            volume.reading,
            Reading::Volume {
                flow: VolumeFlow::Distribution,
                institutional: true
            }
        );

        let momentum = SpecialistKind::Momentum.interpret(0, 0.5, &config);
        assert_eq!(momentum.strength, SignalStrength::Weak);
        assert_eq!(
            momentum.reading,
            Reading::Momentum {
                bias: MomentumBias::Sideways,
                trend_change_probability: 0.0
            }
        );
    }

    #[test]
    fn test_feature_counts() {
        let counts: Vec<usize> = SpecialistKind::ALL.iter().map(|k| k.feature_count()).collect();
        assert_eq!(counts, vec![15, 10, 11]);
        assert_eq!(SpecialistKind::Momentum.to_string(), "momentum");
    }
}
