//! Trading-specialised learner

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassProbabilities, MarketRegime, Signal, SignalStrength, SignalType};
use crate::config::{LearnerConfig, TradingConfig};
use crate::dataset::{BUY, N_CLASSES, SELL};
use crate::error::{EngineError, Result};
use crate::indicators::{mean, ratio, std_dev};
use crate::network::Learner;
use crate::state::{check_version, TradingLearnerState, STATE_VERSION};

/// Realized-outcome bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub correct: u64,
    pub total: u64,
    /// Sum of directional trade returns
    pub profitability: f64,
    /// Recent directional trade returns, bounded like the signal history
    pub returns: VecDeque<f64>,
}

/// Snapshot of trading performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub total: u64,
    pub correct: u64,
    pub profitability: f64,
    pub sharpe_ratio: f64,
    pub signal_count: usize,
    pub regime: MarketRegime,
}

/// A [`Learner`] with regime awareness, signal generation and risk sizing
#[derive(Debug, Clone)]
pub struct TradingLearner {
    learner: Learner,
    config: TradingConfig,
    regime: MarketRegime,
    signal_history: VecDeque<Signal>,
    last_signal_at: Option<DateTime<Utc>>,
    position_size: f64,
    performance: PerformanceCounters,
}

impl TradingLearner {
    pub fn new(
        input_size: usize,
        learner: LearnerConfig,
        config: TradingConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        Self::from_learner(Learner::new(input_size, learner, seed)?, config)
    }

    pub fn from_learner(learner: Learner, config: TradingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            learner,
            config,
            regime: MarketRegime::Normal,
            signal_history: VecDeque::new(),
            last_signal_at: None,
            position_size: 0.0,
            performance: PerformanceCounters::default(),
        })
    }

    /// Re-classify the market from recent prices and remember the result
    pub fn detect_regime(&mut self, recent_prices: &[f64]) -> MarketRegime {
        let regime = MarketRegime::detect(recent_prices, &self.config.regime);
        if regime != self.regime {
            debug!(from = %self.regime, to = %regime, "Market regime changed");
        }
        self.regime = regime;
        regime
    }

    /// Base learning rate scaled for the current regime
    pub fn adaptive_learning_rate(&self) -> f64 {
        self.learner.config().eta_base * self.regime.learning_scale(&self.config.regime)
    }

    /// One train step at the regime-adjusted learning rate; the base rate is
    /// restored afterwards even when the step fails.
    pub fn train_step_adaptive(&mut self, features: &[f64]) -> Result<usize> {
        let eta = self.adaptive_learning_rate();
        let base = self.learner.replace_eta_base(eta);
        let result = self.learner.train_step(features);
        self.learner.replace_eta_base(base);
        result
    }

    /// `(prediction, confidence, probabilities)` where confidence is the
    /// largest class probability
    pub fn predict_with_confidence(
        &self,
        features: &[f64],
    ) -> Result<(i8, f64, ClassProbabilities)> {
        let prediction = self.learner.predict(features)?;
        let probabilities =
            ClassProbabilities::from_slice(&self.learner.predict_proba(features, N_CLASSES)?);
        Ok((prediction, probabilities.max(), probabilities))
    }

    /// Turn features into a risk-managed signal.
    ///
    /// Inside the cooldown window a HOLD with reason "cooldown" is returned
    /// for any features and nothing is recorded. Otherwise the signal is
    /// appended to the bounded history and restarts the cooldown.
    ///
    /// The feature length is checked first, so a wrong-sized vector is an
    /// error even during cooldown.
    pub fn generate_signal(
        &mut self,
        features: &[f64],
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Signal> {
        self.learner.check_shape(features)?;

        if let Some(last) = self.last_signal_at {
            let elapsed = now - last;
            if elapsed < Duration::seconds(i64::from(self.config.cooldown_secs)) {
                debug!(
                    elapsed_ms = elapsed.num_milliseconds(),
                    cooldown_secs = self.config.cooldown_secs,
                    "Signal suppressed by cooldown"
                );
                return Ok(Signal::hold(price, "cooldown", now).with_regime(self.regime));
            }
        }

        let (prediction, confidence, probabilities) = self.predict_with_confidence(features)?;
        let winner = self.learner.winner(features)?;
        let signal = self
            .decide(prediction, confidence, price, now)
            .with_probabilities(probabilities)
            .with_metadata("prediction", serde_json::json!(prediction))
            .with_metadata("winner", serde_json::json!(winner));

        debug!(
            action = ?signal.action,
            strength = ?signal.strength,
            confidence,
            regime = %self.regime,
            "Generated signal"
        );

        self.signal_history.push_back(signal.clone());
        while self.signal_history.len() > self.config.signal_history_limit {
            self.signal_history.pop_front();
        }
        self.last_signal_at = Some(now);
        Ok(signal)
    }

    /// Apply thresholds, risk rules and sizing to a class prediction.
    ///
    /// Does not touch the cooldown or the history.
    pub fn decide(
        &self,
        prediction: i8,
        confidence: f64,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Signal {
        let c = &self.config;

        let (action, strength) = match prediction {
            BUY if confidence >= c.strong_buy_threshold => {
                (SignalType::Buy, SignalStrength::Strong)
            }
            BUY if confidence >= c.buy_threshold => (SignalType::Buy, SignalStrength::Medium),
            SELL if confidence >= c.strong_sell_threshold => {
                (SignalType::Sell, SignalStrength::Strong)
            }
            SELL if confidence >= c.sell_threshold => (SignalType::Sell, SignalStrength::Medium),
            _ => {
                return Signal::hold(price, "no directional signal", now)
                    .with_confidence(confidence)
                    .with_regime(self.regime);
            }
        };

        if confidence < c.min_confidence {
            return Signal::hold(price, "confidence below minimum", now)
                .with_confidence(confidence)
                .with_regime(self.regime);
        }

        let at_limit = self.position_size.abs() >= c.max_position_size;
        let same_side = match action {
            SignalType::Buy => self.position_size > 0.0,
            SignalType::Sell => self.position_size < 0.0,
            SignalType::Hold => false,
        };
        if at_limit && same_side {
            return Signal::hold(price, "position limit reached", now)
                .with_confidence(confidence)
                .with_regime(self.regime);
        }

        let size = (confidence * c.max_position_size)
            .min(c.max_position_fraction * c.max_position_size)
            * self.regime.size_scale(&c.regime);

        let one = Decimal::ONE;
        let signal = match action {
            SignalType::Buy => Signal::buy(price, confidence, strength, "model predicts buy", now)
                .with_position_size(size)
                .with_stop_loss(price * (one - c.stop_loss_pct))
                .with_take_profit(price * (one + c.take_profit_pct)),
            _ => Signal::sell(price, confidence, strength, "model predicts sell", now)
                .with_position_size(-size)
                .with_stop_loss(price * (one + c.stop_loss_pct))
                .with_take_profit(price * (one - c.take_profit_pct)),
        };
        signal.with_regime(self.regime)
    }

    /// Record the realized return of an executed signal
    pub fn update_performance(&mut self, action: SignalType, realized_return: f64) {
        let p = &mut self.performance;
        p.total += 1;

        let correct = match action {
            SignalType::Buy => realized_return > 0.0,
            SignalType::Sell => realized_return < 0.0,
            SignalType::Hold => realized_return.abs() < self.config.hold_tolerance,
        };
        if correct {
            p.correct += 1;
        }

        let trade_return = match action {
            SignalType::Buy => realized_return,
            SignalType::Sell => -realized_return,
            SignalType::Hold => return,
        };
        p.profitability += trade_return;
        p.returns.push_back(trade_return);
        while p.returns.len() > self.config.signal_history_limit {
            p.returns.pop_front();
        }
    }

    pub fn performance(&self) -> PerformanceMetrics {
        let p = &self.performance;
        let accuracy = p.correct as f64 / p.total.max(1) as f64;

        let returns: Vec<f64> = p.returns.iter().copied().collect();
        let sharpe_ratio = if returns.len() < 2 {
            0.0
        } else {
            ratio(mean(&returns), std_dev(&returns))
        };

        PerformanceMetrics {
            accuracy,
            total: p.total,
            correct: p.correct,
            profitability: p.profitability,
            sharpe_ratio,
            signal_count: self.signal_history.len(),
            regime: self.regime,
        }
    }

    /// Current signed position as reported by the execution side
    pub fn set_position(&mut self, size: f64) {
        self.position_size = size;
    }

    pub fn position(&self) -> f64 {
        self.position_size
    }

    pub fn regime(&self) -> MarketRegime {
        self.regime
    }

    pub fn signal_history(&self) -> &VecDeque<Signal> {
        &self.signal_history
    }

    pub fn last_signal_at(&self) -> Option<DateTime<Utc>> {
        self.last_signal_at
    }

    pub fn trading_config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut Learner {
        &mut self.learner
    }

    pub fn to_state(&self) -> TradingLearnerState {
        TradingLearnerState {
            version: STATE_VERSION,
            learner: self.learner.to_state(),
            trading: self.config.clone(),
            regime: self.regime,
            signal_history: self.signal_history.iter().cloned().collect(),
            last_signal_at: self.last_signal_at,
            position_size: self.position_size,
            performance: self.performance.clone(),
        }
    }

    pub fn from_state(state: TradingLearnerState) -> Result<Self> {
        check_version(state.version)?;
        if state.signal_history.len() > state.trading.signal_history_limit {
            return Err(EngineError::State(format!(
                "{} signals exceed the history limit of {}",
                state.signal_history.len(),
                state.trading.signal_history_limit
            )));
        }
        let mut restored = Self::from_learner(Learner::from_state(state.learner)?, state.trading)?;
        restored.regime = state.regime;
        restored.signal_history = state.signal_history.into();
        restored.last_signal_at = state.last_signal_at;
        restored.position_size = state.position_size;
        restored.performance = state.performance;
        Ok(restored)
    }
}

/// Decimal price from a float quote, for callers holding `f64` prices
pub fn price_from_f64(price: f64) -> Result<Decimal> {
    Decimal::from_f64(price)
        .ok_or_else(|| EngineError::config(format!("price {price} is not representable")))
}
