//! Trading signals - output of the trading learner

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::MarketRegime;
use crate::dataset::{BUY, HOLD, SELL};

/// Trading signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Enter or add to a long position
    Buy,
    /// Exit, or enter a short position
    Sell,
    /// No action
    Hold,
}

impl SignalType {
    /// Action for a class label; anything but -1/1 holds
    pub fn from_label(label: i8) -> Self {
        match label {
            BUY => SignalType::Buy,
            SELL => SignalType::Sell,
            _ => SignalType::Hold,
        }
    }

    pub fn label(self) -> i8 {
        match self {
            SignalType::Buy => BUY,
            SignalType::Sell => SELL,
            SignalType::Hold => HOLD,
        }
    }
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

/// Class probabilities in SELL / HOLD / BUY order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub sell: f64,
    pub hold: f64,
    pub buy: f64,
}

impl ClassProbabilities {
    pub fn uniform() -> Self {
        let third = 1.0 / 3.0;
        Self {
            sell: third,
            hold: third,
            buy: third,
        }
    }

    /// From a three-bucket probability vector; anything else is uniform
    pub fn from_slice(probs: &[f64]) -> Self {
        match probs {
            [sell, hold, buy] => Self {
                sell: *sell,
                hold: *hold,
                buy: *buy,
            },
            _ => Self::uniform(),
        }
    }

    pub fn max(&self) -> f64 {
        self.sell.max(self.hold).max(self.buy)
    }
}

impl Default for ClassProbabilities {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Trading signal with risk parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: SignalType,
    pub strength: SignalStrength,
    /// Max class probability behind the decision (0.0 - 1.0)
    pub confidence: f64,
    /// Price when the signal was generated
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub regime: MarketRegime,
    pub reason: String,
    /// Signed fraction of capital; positive is long
    pub position_size: f64,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub probabilities: ClassProbabilities,
    /// Model-specific details
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Signal {
    fn new(
        action: SignalType,
        strength: SignalStrength,
        confidence: f64,
        price: Decimal,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            strength,
            confidence,
            price,
            timestamp,
            regime: MarketRegime::Normal,
            reason: reason.into(),
            position_size: 0.0,
            stop_loss: None,
            take_profit: None,
            probabilities: ClassProbabilities::uniform(),
            metadata: serde_json::json!({}),
        }
    }

    /// Create a new buy signal
    pub fn buy(
        price: Decimal,
        confidence: f64,
        strength: SignalStrength,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(SignalType::Buy, strength, confidence, price, reason, timestamp)
    }

    /// Create a new sell signal
    pub fn sell(
        price: Decimal,
        confidence: f64,
        strength: SignalStrength,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(SignalType::Sell, strength, confidence, price, reason, timestamp)
    }

    /// Create a hold signal (no action)
    pub fn hold(price: Decimal, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(SignalType::Hold, SignalStrength::Weak, 0.0, price, reason, timestamp)
    }

    /// Check if signal is actionable (above minimum confidence)
    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.confidence >= min_confidence && self.action != SignalType::Hold
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Add stop loss level
    pub fn with_stop_loss(mut self, stop_loss: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    /// Add take profit level
    pub fn with_take_profit(mut self, take_profit: Decimal) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    /// Set signed position size
    pub fn with_position_size(mut self, size: f64) -> Self {
        self.position_size = size;
        self
    }

    pub fn with_regime(mut self, regime: MarketRegime) -> Self {
        self.regime = regime;
        self
    }

    pub fn with_probabilities(mut self, probabilities: ClassProbabilities) -> Self {
        self.probabilities = probabilities;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(obj) = self.metadata.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let now = Utc::now();
        let signal = Signal::buy(Decimal::new(100, 0), 0.9, SignalStrength::Strong, "test", now)
            .with_stop_loss(Decimal::new(98, 0))
            .with_position_size(0.5)
            .with_metadata("winner", serde_json::json!(3));

        assert_eq!(signal.action, SignalType::Buy);
        assert!(signal.is_actionable(0.6));
        assert!(!signal.is_actionable(0.95));
        assert_eq!(signal.stop_loss, Some(Decimal::new(98, 0)));
        assert_eq!(signal.metadata["winner"], 3);

        let hold = Signal::hold(Decimal::ONE, "cooldown", now);
        assert!(!hold.is_actionable(0.0));
        assert_eq!(hold.strength, SignalStrength::Weak);
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(SignalType::from_label(1), SignalType::Buy);
        assert_eq!(SignalType::from_label(-1), SignalType::Sell);
        assert_eq!(SignalType::from_label(0), SignalType::Hold);
        assert_eq!(SignalType::Sell.label(), -1);
    }

    #[test]
    fn test_signal_json_shape() {
        let price = Decimal::new(5025, 2);
        let signal = Signal::sell(price, 0.7, SignalStrength::Medium, "x", Utc::now());
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["action"], "sell");
        assert_eq!(json["strength"], "medium");
        assert_eq!(json["price"], "50.25");
        assert_eq!(json["regime"], "normal");
    }

    #[test]
    fn test_probabilities_from_slice() {
        let p = ClassProbabilities::from_slice(&[0.2, 0.3, 0.5]);
        assert_eq!(p.buy, 0.5);
        assert_eq!(p.max(), 0.5);
        assert_eq!(ClassProbabilities::from_slice(&[1.0]), ClassProbabilities::uniform());
    }
}
