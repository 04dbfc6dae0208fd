//! Engine configuration
//!
//! Single source of truth for network, ensemble, training, trading and
//! specialist behaviour. Every struct deserializes from a partial document,
//! falling back to its defaults, and validates eagerly: an invalid value is
//! rejected, never clamped.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Competitive layer hyperparameters
    pub learner: LearnerConfig,
    /// Ensemble size and seeding
    pub ensemble: EnsembleConfig,
    /// Epoch loop and reseeding cadence
    pub training: TrainingConfig,
    /// Signal thresholds and risk parameters
    pub trading: TradingConfig,
    /// Specialist networks
    pub specialists: SpecialistsConfig,
}

impl EngineConfig {
    /// Load configuration from an optional file plus `HEBBNET__*` environment
    /// variables (e.g. `HEBBNET__LEARNER__HIDDEN_SIZE=120`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("HEBBNET").separator("__"))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.learner.validate()?;
        self.ensemble.validate()?;
        self.training.validate()?;
        self.trading.validate()?;
        self.specialists.validate()
    }
}

/// Competitive layer hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Number of competing units
    pub hidden_size: usize,
    /// Base learning rate, in (0, 1)
    pub eta_base: f64,
    /// Win-rate EMA rate, in (0, 1)
    pub alpha: f64,
    /// Conscience strength
    pub beta: f64,
    /// Refractory penalty applied to the winner
    pub gamma: f64,
    /// Per-step refractory decay multiplier
    pub refractory_decay: f64,
    /// Number of units updated per step
    pub k: usize,
    /// Share of the update for each of the top-k ranks; length k, sums to 1
    pub responsibilities: Vec<f64>,
    /// Cap on the rarity boost applied to the learning rate
    pub max_eta_boost: f64,
    /// Win rate below which a unit counts as dead
    pub reseed_threshold: f64,
    /// Maximum units reseeded per call
    pub max_reseed: usize,
    /// Maximum candidates drawn from the sample pool per reseed
    pub reseed_candidates: usize,
    /// Descending vote weights for the top-ranked units in `predict_proba`
    pub vote_weights: Vec<f64>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            hidden_size: 200,
            eta_base: 0.025,
            alpha: 0.01,
            beta: 0.5,
            gamma: 0.05,
            refractory_decay: 0.98,
            k: 2,
            responsibilities: vec![0.7, 0.3],
            max_eta_boost: 5.0,
            reseed_threshold: 0.0005,
            max_reseed: 10,
            reseed_candidates: 500,
            vote_weights: vec![0.4, 0.25, 0.15, 0.1, 0.1],
        }
    }
}

impl LearnerConfig {
    /// Single-winner variant used by the specialist networks
    pub fn single_winner(hidden_size: usize, eta_base: f64) -> Self {
        Self {
            hidden_size,
            eta_base,
            k: 1,
            responsibilities: vec![1.0],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(EngineError::config("hidden_size must be positive"));
        }
        if !(self.eta_base > 0.0 && self.eta_base < 1.0) {
            return Err(EngineError::config(format!(
                "eta_base must be in (0, 1), got {}",
                self.eta_base
            )));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(EngineError::config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.beta >= 0.0 && self.beta.is_finite()) {
            return Err(EngineError::config("beta must be a non-negative number"));
        }
        if !(self.gamma >= 0.0 && self.gamma.is_finite()) {
            return Err(EngineError::config("gamma must be a non-negative number"));
        }
        if !(self.refractory_decay > 0.0 && self.refractory_decay <= 1.0) {
            return Err(EngineError::config("refractory_decay must be in (0, 1]"));
        }
        if self.k == 0 || self.k > self.hidden_size {
            return Err(EngineError::config(format!(
                "k must be in 1..={}, got {}",
                self.hidden_size, self.k
            )));
        }
        if self.responsibilities.len() != self.k {
            return Err(EngineError::config(format!(
                "responsibilities length {} must equal k = {}",
                self.responsibilities.len(),
                self.k
            )));
        }
        if self.responsibilities.iter().any(|r| !(*r >= 0.0)) {
            return Err(EngineError::config("responsibilities must be non-negative"));
        }
        let total: f64 = self.responsibilities.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(EngineError::config(format!(
                "responsibilities must sum to 1, got {total}"
            )));
        }
        if !(self.max_eta_boost > 0.0) {
            return Err(EngineError::config("max_eta_boost must be positive"));
        }
        if !(self.reseed_threshold >= 0.0 && self.reseed_threshold < 1.0) {
            return Err(EngineError::config("reseed_threshold must be in [0, 1)"));
        }
        if self.vote_weights.is_empty() || self.vote_weights.iter().any(|w| !(*w >= 0.0)) {
            return Err(EngineError::config(
                "vote_weights must be a non-empty list of non-negative weights",
            ));
        }
        if self.vote_weights.iter().sum::<f64>() <= 0.0 {
            return Err(EngineError::config("vote_weights must not all be zero"));
        }
        Ok(())
    }
}

/// Ensemble size and member seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Number of member networks
    pub size: usize,
    /// Reject even sizes so majority votes cannot tie
    pub require_odd: bool,
    /// Seed of the first member
    pub base_seed: u64,
    /// Seed increment between members
    pub seed_stride: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            size: 5,
            require_odd: true,
            base_seed: 42,
            seed_stride: 100,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<()> {
        self.validate_size(self.size)
    }

    pub fn validate_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(EngineError::config("ensemble size must be positive"));
        }
        if self.require_odd && size % 2 == 0 {
            return Err(EngineError::config(format!(
                "ensemble size must be odd, got {size}"
            )));
        }
        Ok(())
    }

    /// Deterministic seed for member `index`
    pub fn seed_for(&self, index: usize) -> u64 {
        self.base_seed
            .wrapping_add(self.seed_stride.wrapping_mul(index as u64))
    }
}

/// When dead units get reseeded during the epoch loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReseedSchedule {
    /// Every `every` steps inside an epoch, once the epoch index reaches `after_epoch`
    Steps { every: usize, after_epoch: usize },
    /// After each epoch whose index is a multiple of `every`
    Epochs { every: usize },
    /// Never reseed
    Never,
}

/// Epoch loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub reseed: ReseedSchedule,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 15,
            reseed: ReseedSchedule::Steps {
                every: 1000,
                after_epoch: 2,
            },
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(EngineError::config("epochs must be positive"));
        }
        match self.reseed {
            ReseedSchedule::Steps { every: 0, .. } | ReseedSchedule::Epochs { every: 0 } => Err(
                EngineError::config("reseed interval must be positive"),
            ),
            _ => Ok(()),
        }
    }
}

/// Signal thresholds and risk parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Confidence for a STRONG buy
    pub strong_buy_threshold: f64,
    /// Confidence for a MEDIUM buy
    pub buy_threshold: f64,
    /// Confidence for a STRONG sell
    pub strong_sell_threshold: f64,
    /// Confidence for a MEDIUM sell
    pub sell_threshold: f64,
    /// Below this, any directional signal is forced to HOLD
    pub min_confidence: f64,
    /// Maximum absolute position (1.0 = 100%)
    pub max_position_size: f64,
    /// Cap on a single signal's size, as a fraction of `max_position_size`
    pub max_position_fraction: f64,
    /// Stop loss distance from entry (0.02 = 2%)
    pub stop_loss_pct: Decimal,
    /// Take profit distance from entry
    pub take_profit_pct: Decimal,
    /// Minimum seconds between two signals
    pub cooldown_secs: u32,
    /// Signals kept in history
    pub signal_history_limit: usize,
    /// |return| under which a HOLD counts as correct
    pub hold_tolerance: f64,
    /// Regime detection and regime-dependent scaling
    pub regime: RegimeConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            strong_buy_threshold: 0.8,
            buy_threshold: 0.6,
            strong_sell_threshold: 0.8,
            sell_threshold: 0.6,
            min_confidence: 0.6,
            max_position_size: 1.0,
            max_position_fraction: 0.5,
            stop_loss_pct: Decimal::new(2, 2),
            take_profit_pct: Decimal::new(4, 2),
            cooldown_secs: 60,
            signal_history_limit: 1000,
            hold_tolerance: 0.005,
            regime: RegimeConfig::default(),
        }
    }
}

impl TradingConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("strong_buy_threshold", self.strong_buy_threshold),
            ("buy_threshold", self.buy_threshold),
            ("strong_sell_threshold", self.strong_sell_threshold),
            ("sell_threshold", self.sell_threshold),
            ("min_confidence", self.min_confidence),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::config(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.strong_buy_threshold < self.buy_threshold
            || self.strong_sell_threshold < self.sell_threshold
        {
            return Err(EngineError::config(
                "strong thresholds must not be below their base thresholds",
            ));
        }
        if !(self.max_position_size > 0.0) {
            return Err(EngineError::config("max_position_size must be positive"));
        }
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(EngineError::config("max_position_fraction must be in (0, 1]"));
        }
        for (name, pct) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if pct.is_sign_negative() || pct >= Decimal::ONE {
                return Err(EngineError::config(format!(
                    "{name} must be in [0, 1), got {pct}"
                )));
            }
        }
        if self.signal_history_limit == 0 {
            return Err(EngineError::config("signal_history_limit must be positive"));
        }
        if !(self.hold_tolerance >= 0.0) {
            return Err(EngineError::config("hold_tolerance must be non-negative"));
        }
        self.regime.validate()
    }
}

/// Market regime detection thresholds and regime-dependent scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Prices considered by the detector
    pub window: usize,
    /// Return stddev above which the market is volatile
    pub volatility_threshold: f64,
    /// Normalized slope above which the market is trending
    pub trend_threshold: f64,
    pub volatile_learning_scale: f64,
    pub trending_learning_scale: f64,
    pub volatile_size_scale: f64,
    pub trending_size_scale: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            window: 20,
            volatility_threshold: 0.02,
            trend_threshold: 0.001,
            volatile_learning_scale: 0.5,
            trending_learning_scale: 1.5,
            volatile_size_scale: 0.5,
            trending_size_scale: 1.2,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window < 3 {
            return Err(EngineError::config("regime window must be at least 3"));
        }
        let scales = [
            self.volatile_learning_scale,
            self.trending_learning_scale,
            self.volatile_size_scale,
            self.trending_size_scale,
        ];
        if scales.iter().any(|s| !(*s > 0.0)) {
            return Err(EngineError::config("regime scales must be positive"));
        }
        Ok(())
    }
}

/// Size and learning rate of one specialist network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistNetConfig {
    pub hidden_size: usize,
    pub eta_base: f64,
}

fn default_price_net() -> SpecialistNetConfig {
    SpecialistNetConfig {
        hidden_size: 80,
        eta_base: 0.03,
    }
}

fn default_volume_net() -> SpecialistNetConfig {
    SpecialistNetConfig {
        hidden_size: 60,
        eta_base: 0.035,
    }
}

fn default_momentum_net() -> SpecialistNetConfig {
    SpecialistNetConfig {
        hidden_size: 70,
        eta_base: 0.028,
    }
}

/// Specialist networks and consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialistsConfig {
    #[serde(default = "default_price_net")]
    pub price: SpecialistNetConfig,
    #[serde(default = "default_volume_net")]
    pub volume: SpecialistNetConfig,
    #[serde(default = "default_momentum_net")]
    pub momentum: SpecialistNetConfig,
    /// Base seed; specialists use `seed`, `seed + 1`, `seed + 2`
    pub seed: Option<u64>,
    pub epochs: usize,
    /// Reseed after every n-th epoch
    pub reseed_every_epochs: usize,
    /// Reading strength above this is MEDIUM
    pub medium_confidence: f64,
    /// Reading strength above this is STRONG
    pub strong_confidence: f64,
    /// Confidence a price reading needs to be called a breakout/breakdown
    pub breakout_confidence: f64,
    /// Confidence above which volume flow is flagged as institutional
    pub institutional_confidence: f64,
    /// |weighted average| below this maps to a neutral consensus
    pub dead_band: f64,
}

impl Default for SpecialistsConfig {
    fn default() -> Self {
        Self {
            price: default_price_net(),
            volume: default_volume_net(),
            momentum: default_momentum_net(),
            seed: None,
            epochs: 10,
            reseed_every_epochs: 3,
            medium_confidence: 0.6,
            strong_confidence: 0.8,
            breakout_confidence: 0.7,
            institutional_confidence: 0.75,
            dead_band: 0.3,
        }
    }
}

impl SpecialistsConfig {
    pub fn validate(&self) -> Result<()> {
        for net in [&self.price, &self.volume, &self.momentum] {
            LearnerConfig::single_winner(net.hidden_size, net.eta_base).validate()?;
        }
        if self.epochs == 0 || self.reseed_every_epochs == 0 {
            return Err(EngineError::config(
                "specialist epochs and reseed interval must be positive",
            ));
        }
        if self.medium_confidence > self.strong_confidence {
            return Err(EngineError::config(
                "medium_confidence must not exceed strong_confidence",
            ));
        }
        if !(0.0..1.0).contains(&self.dead_band) {
            return Err(EngineError::config("dead_band must be in [0, 1)"));
        }
        Ok(())
    }

    /// Training settings shared by the three specialists
    pub fn training(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            reseed: ReseedSchedule::Epochs {
                every: self.reseed_every_epochs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.learner.vote_weights, vec![0.4, 0.25, 0.15, 0.1, 0.1]);
        assert_eq!(config.trading.stop_loss_pct, Decimal::new(2, 2));
        assert_eq!(config.ensemble.seed_for(2), 242);
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        let mut config = LearnerConfig::default();
        config.hidden_size = 0;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut config = LearnerConfig::default();
        config.eta_base = 1.0;
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::default();
        config.responsibilities = vec![0.7, 0.2];
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::default();
        config.responsibilities = vec![1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ensemble_size_must_be_odd() {
        let config = EnsembleConfig {
            size: 4,
            ..EnsembleConfig::default()
        };
        assert!(config.validate().is_err());

        let relaxed = EnsembleConfig {
            size: 4,
            require_odd: false,
            ..EnsembleConfig::default()
        };
        assert!(relaxed.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let json = serde_json::json!({
            "learner": { "hidden_size": 12 },
            "trading": { "cooldown_secs": 5, "stop_loss_pct": "0.01" },
            "training": { "reseed": { "mode": "epochs", "every": 4 } }
        });
        let config: EngineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.learner.hidden_size, 12);
        assert_eq!(config.learner.k, 2);
        assert_eq!(config.trading.cooldown_secs, 5);
        assert_eq!(config.trading.stop_loss_pct, Decimal::new(1, 2));
        assert_eq!(config.training.reseed, ReseedSchedule::Epochs { every: 4 });
        assert_eq!(config.specialists.price.hidden_size, 80);
    }

    #[test]
    fn test_specialist_training_schedule() {
        let training = SpecialistsConfig::default().training();
        assert_eq!(training.epochs, 10);
        assert_eq!(training.reseed, ReseedSchedule::Epochs { every: 3 });
    }
}
