//! Ensemble of independently seeded learners

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{EngineConfig, EnsembleConfig, LearnerConfig, TradingConfig, TrainingConfig};
use crate::dataset::{Dataset, N_CLASSES};
use crate::error::{EngineError, Result};
use crate::indicators::{mean, std_dev};
use crate::network::{Learner, NetworkStats};
use crate::state::{check_version, EnsembleState, NetworkState, STATE_VERSION};
use crate::trading::{
    ClassProbabilities, MarketRegime, Signal, SignalStrength, SignalType, TradingLearner,
};
use crate::training::{fit, FitReport};
use crate::voting::{agreement, normalize_weights, weighted_vote, VotingStrategy};

/// What an ensemble needs from its members
pub trait Member: Sized + Send {
    /// Everything besides the input size and seed needed to build a member
    type Settings: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned;

    fn settings(config: &EngineConfig) -> Self::Settings;

    fn spawn(input_size: usize, settings: &Self::Settings, seed: u64) -> Result<Self>;

    fn learner(&self) -> &Learner;

    fn learner_mut(&mut self) -> &mut Learner;

    fn to_network_state(&self) -> NetworkState;

    fn from_network_state(state: NetworkState) -> Result<Self>;
}

impl Member for Learner {
    type Settings = LearnerConfig;

    fn settings(config: &EngineConfig) -> LearnerConfig {
        config.learner.clone()
    }

    fn spawn(input_size: usize, settings: &LearnerConfig, seed: u64) -> Result<Self> {
        Learner::new(input_size, settings.clone(), Some(seed))
    }

    fn learner(&self) -> &Learner {
        self
    }

    fn learner_mut(&mut self) -> &mut Learner {
        self
    }

    fn to_network_state(&self) -> NetworkState {
        NetworkState::Plain(self.to_state())
    }

    fn from_network_state(state: NetworkState) -> Result<Self> {
        match state {
            NetworkState::Plain(state) => Learner::from_state(state),
            other => Err(EngineError::State(format!(
                "expected a plain learner, found {}",
                other.kind()
            ))),
        }
    }
}

/// Member settings of a trading ensemble
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingSettings {
    pub learner: LearnerConfig,
    pub trading: TradingConfig,
}

impl Member for TradingLearner {
    type Settings = TradingSettings;

    fn settings(config: &EngineConfig) -> TradingSettings {
        TradingSettings {
            learner: config.learner.clone(),
            trading: config.trading.clone(),
        }
    }

    fn spawn(input_size: usize, settings: &TradingSettings, seed: u64) -> Result<Self> {
        TradingLearner::new(
            input_size,
            settings.learner.clone(),
            settings.trading.clone(),
            Some(seed),
        )
    }

    fn learner(&self) -> &Learner {
        TradingLearner::learner(self)
    }

    fn learner_mut(&mut self) -> &mut Learner {
        TradingLearner::learner_mut(self)
    }

    fn to_network_state(&self) -> NetworkState {
        NetworkState::Trading(self.to_state())
    }

    fn from_network_state(state: NetworkState) -> Result<Self> {
        match state {
            NetworkState::Trading(state) => TradingLearner::from_state(state),
            other => Err(EngineError::State(format!(
                "expected a trading learner, found {}",
                other.kind()
            ))),
        }
    }
}

/// Training outcome of one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberReport {
    pub index: usize,
    pub seed: u64,
    pub accuracy: f64,
    pub fit: FitReport,
    pub stats: NetworkStats,
}

/// Outcome of [`Ensemble::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub ensemble_size: usize,
    pub accuracies: Vec<f64>,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    pub elapsed_secs: f64,
    pub members: Vec<MemberReport>,
}

/// Consensus of a trading ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSignal {
    pub action: SignalType,
    pub strength: SignalStrength,
    /// Mean member confidence
    pub confidence: f64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Share of members agreeing with the most common action
    pub agreement: f64,
    pub member_signals: Vec<Signal>,
}

/// Independently seeded members combined by voting
#[derive(Debug, Clone)]
pub struct Ensemble<M: Member = Learner> {
    input_size: usize,
    settings: M::Settings,
    config: EnsembleConfig,
    training: TrainingConfig,
    members: Vec<M>,
    accuracies: Vec<f64>,
    trained: bool,
    summary: Option<TrainingSummary>,
}

pub type TradingEnsemble = Ensemble<TradingLearner>;

impl<M: Member> Ensemble<M> {
    /// Empty ensemble; members are created by [`Ensemble::initialize`] or on
    /// the first [`Ensemble::train`]
    pub fn new(
        input_size: usize,
        settings: M::Settings,
        config: EnsembleConfig,
        training: TrainingConfig,
    ) -> Result<Self> {
        if input_size == 0 {
            return Err(EngineError::config("input_size must be positive"));
        }
        config.validate()?;
        training.validate()?;
        Ok(Self {
            input_size,
            settings,
            config,
            training,
            members: Vec::new(),
            accuracies: Vec::new(),
            trained: false,
            summary: None,
        })
    }

    pub fn from_config(input_size: usize, config: &EngineConfig) -> Result<Self> {
        Self::new(
            input_size,
            M::settings(config),
            config.ensemble.clone(),
            config.training.clone(),
        )
    }

    /// (Re)create `size` fresh members with seeds `base_seed + i * stride`
    pub fn initialize(&mut self, size: usize) -> Result<()> {
        self.config.validate_size(size)?;
        self.members = (0..size)
            .map(|i| M::spawn(self.input_size, &self.settings, self.config.seed_for(i)))
            .collect::<Result<Vec<_>>>()?;
        self.accuracies.clear();
        self.trained = false;
        self.summary = None;
        info!("🧠 Initialized ensemble of {} networks", size);
        Ok(())
    }

    /// Train every member in parallel, label its units on `val` and record
    /// its validation accuracy. `epochs` overrides the configured count.
    pub fn train(
        &mut self,
        train: &Dataset,
        val: &Dataset,
        epochs: Option<usize>,
    ) -> Result<TrainingSummary> {
        if self.members.is_empty() {
            self.initialize(self.config.size)?;
        }
        for data in [train, val] {
            if let Some(width) = data.n_features() {
                if width != self.input_size {
                    return Err(EngineError::ShapeMismatch {
                        expected: self.input_size,
                        actual: width,
                    });
                }
            }
        }
        if val.is_empty() {
            warn!("Validation set is empty; members will stay unmapped and predict HOLD");
        }
        let training = TrainingConfig {
            epochs: epochs.unwrap_or(self.training.epochs),
            ..self.training.clone()
        };

        let started = Instant::now();
        let total = self.members.len();
        let reports = self
            .members
            .par_iter_mut()
            .enumerate()
            .map(|(index, member)| {
                train_member(index, total, member.learner_mut(), train, val, &training)
            })
            .collect::<Result<Vec<_>>>()?;

        let accuracies: Vec<f64> = reports.iter().map(|r| r.accuracy).collect();
        let summary = TrainingSummary {
            ensemble_size: total,
            mean_accuracy: mean(&accuracies),
            std_accuracy: std_dev(&accuracies),
            best_accuracy: accuracies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_accuracy: accuracies.iter().copied().fold(f64::INFINITY, f64::min),
            elapsed_secs: started.elapsed().as_secs_f64(),
            accuracies: accuracies.clone(),
            members: reports,
        };

        info!(
            "✨ Ensemble trained: mean {:.1}% ± {:.1}% (best {:.1}%, worst {:.1}%) in {:.1}s",
            summary.mean_accuracy * 100.0,
            summary.std_accuracy * 100.0,
            summary.best_accuracy * 100.0,
            summary.worst_accuracy * 100.0,
            summary.elapsed_secs
        );

        self.accuracies = accuracies;
        self.trained = true;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    fn ensure_trained(&self) -> Result<()> {
        if !self.trained {
            return Err(EngineError::NotTrained("ensemble"));
        }
        Ok(())
    }

    /// Per-member (prediction, confidence)
    fn member_votes(&self, features: &[f64]) -> Result<Vec<(i8, f64)>> {
        self.members
            .iter()
            .map(|m| {
                let learner = m.learner();
                let prediction = learner.predict(features)?;
                let confidence = learner
                    .predict_proba(features, N_CLASSES)?
                    .into_iter()
                    .fold(0.0, f64::max);
                Ok((prediction, confidence))
            })
            .collect()
    }

    fn member_weights(&self, strategy: VotingStrategy, confidences: &[f64]) -> Vec<f64> {
        match strategy {
            VotingStrategy::Majority => normalize_weights(&vec![1.0; self.members.len()]),
            VotingStrategy::Weighted => normalize_weights(&self.accuracies),
            VotingStrategy::Confidence => normalize_weights(confidences),
        }
    }

    /// Combined class label; ties resolve SELL, then HOLD, then BUY
    pub fn predict(&self, features: &[f64], strategy: VotingStrategy) -> Result<i8> {
        self.ensure_trained()?;
        let votes = self.member_votes(features)?;
        let confidences: Vec<f64> = votes.iter().map(|(_, c)| *c).collect();
        let weights = self.member_weights(strategy, &confidences);
        Ok(weighted_vote(
            votes.iter().zip(&weights).map(|((label, _), w)| (*label, *w)),
        ))
    }

    /// Weighted average of member class probabilities
    pub fn predict_proba(&self, features: &[f64], strategy: VotingStrategy) -> Result<Vec<f64>> {
        self.ensure_trained()?;
        let probs = self
            .members
            .iter()
            .map(|m| m.learner().predict_proba(features, N_CLASSES))
            .collect::<Result<Vec<_>>>()?;
        let confidences: Vec<f64> = probs
            .iter()
            .map(|p| p.iter().copied().fold(0.0, f64::max))
            .collect();
        let weights = self.member_weights(strategy, &confidences);

        let mut combined = vec![0.0; N_CLASSES];
        for (p, w) in probs.iter().zip(&weights) {
            for (c, v) in combined.iter_mut().zip(p) {
                *c += w * v;
            }
        }
        Ok(combined)
    }

    /// Accuracy-weighted consensus as a trading signal.
    ///
    /// The action is the weighted vote. Confidence is the largest combined
    /// class probability; it grades BUY and SELL against the strong and
    /// medium thresholds of `thresholds`, anything lower is WEAK. No sizing
    /// or risk levels are attached.
    pub fn trading_signal(
        &self,
        features: &[f64],
        price: Decimal,
        now: DateTime<Utc>,
        thresholds: &TradingConfig,
    ) -> Result<Signal> {
        let prediction = self.predict(features, VotingStrategy::Weighted)?;
        let probabilities = ClassProbabilities::from_slice(
            &self.predict_proba(features, VotingStrategy::Weighted)?,
        );
        let confidence = probabilities.max();
        let grade = |strong: f64, medium: f64| {
            if confidence >= strong {
                SignalStrength::Strong
            } else if confidence >= medium {
                SignalStrength::Medium
            } else {
                SignalStrength::Weak
            }
        };

        let signal = match SignalType::from_label(prediction) {
            SignalType::Buy => Signal::buy(
                price,
                confidence,
                grade(thresholds.strong_buy_threshold, thresholds.buy_threshold),
                "ensemble predicts buy",
                now,
            ),
            SignalType::Sell => Signal::sell(
                price,
                confidence,
                grade(thresholds.strong_sell_threshold, thresholds.sell_threshold),
                "ensemble predicts sell",
                now,
            ),
            SignalType::Hold => {
                Signal::hold(price, "ensemble predicts hold", now).with_confidence(confidence)
            }
        };

        let labels: Vec<i8> = self
            .member_votes(features)?
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        Ok(signal
            .with_probabilities(probabilities)
            .with_metadata("agreement", serde_json::json!(agreement(&labels)))
            .with_metadata("members", serde_json::json!(self.members.len())))
    }

    pub fn members(&self) -> &[M] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [M] {
        &mut self.members
    }

    pub fn accuracies(&self) -> &[f64] {
        &self.accuracies
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn to_state(&self) -> EnsembleState<M::Settings> {
        EnsembleState {
            version: STATE_VERSION,
            config: self.config.clone(),
            training: self.training.clone(),
            settings: self.settings.clone(),
            input_size: self.input_size,
            members: self.members.iter().map(M::to_network_state).collect(),
            accuracies: self.accuracies.clone(),
            trained: self.trained,
        }
    }

    pub fn from_state(state: EnsembleState<M::Settings>) -> Result<Self> {
        check_version(state.version)?;
        let mut ensemble =
            Self::new(state.input_size, state.settings, state.config, state.training)?;

        let members = state
            .members
            .into_iter()
            .map(M::from_network_state)
            .collect::<Result<Vec<_>>>()?;
        if let Some(m) = members.iter().find(|m| m.learner().input_size() != state.input_size) {
            return Err(EngineError::State(format!(
                "member expects {} features, ensemble has {}",
                m.learner().input_size(),
                state.input_size
            )));
        }
        if state.trained {
            ensemble
                .config
                .validate_size(members.len())
                .map_err(|e| EngineError::State(format!("trained ensemble: {e}")))?;
            if state.accuracies.len() != members.len() {
                return Err(EngineError::State(format!(
                    "{} accuracies for {} members",
                    state.accuracies.len(),
                    members.len()
                )));
            }
        }

        info!("Restored ensemble of {} networks", members.len());
        ensemble.members = members;
        ensemble.accuracies = state.accuracies;
        ensemble.trained = state.trained;
        Ok(ensemble)
    }
}

fn train_member(
    index: usize,
    total: usize,
    learner: &mut Learner,
    train: &Dataset,
    val: &Dataset,
    training: &TrainingConfig,
) -> Result<MemberReport> {
    info!("📦 Training network {}/{}", index + 1, total);
    let fit = fit(learner, train, training)?;
    learner.learn_mapping_from(val)?;
    let accuracy = learner.accuracy(val)?;
    info!(
        "✅ Network {} accuracy: {:.1}% ({} units reseeded)",
        index + 1,
        accuracy * 100.0,
        fit.reseeded
    );
    Ok(MemberReport {
        index,
        seed: learner.seed(),
        accuracy,
        fit,
        stats: learner.stats(),
    })
}

impl Ensemble<TradingLearner> {
    /// Update every member's regime from recent prices
    pub fn detect_regime(&mut self, recent_prices: &[f64]) -> MarketRegime {
        let regime = MarketRegime::detect(recent_prices, &self.settings.trading.regime);
        for member in &mut self.members {
            member.detect_regime(recent_prices);
        }
        regime
    }

    /// Report the current signed position to every member
    pub fn set_position(&mut self, size: f64) {
        self.members.iter_mut().for_each(|m| m.set_position(size));
    }

    /// Let every member generate its own signal, then combine them by a
    /// confidence-weighted vote
    pub fn generate_ensemble_signal(
        &mut self,
        features: &[f64],
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<EnsembleSignal> {
        self.ensure_trained()?;
        let member_signals = self
            .members
            .iter_mut()
            .map(|m| m.generate_signal(features, price, now))
            .collect::<Result<Vec<_>>>()?;

        let confidences: Vec<f64> = member_signals.iter().map(|s| s.confidence).collect();
        let action = if confidences.iter().sum::<f64>() > 0.0 {
            SignalType::from_label(weighted_vote(
                member_signals.iter().map(|s| (s.action.label(), s.confidence)),
            ))
        } else {
            SignalType::Hold
        };
        let confidence = mean(&confidences);
        let strength = if confidence > 0.7 {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        };
        let labels: Vec<i8> = member_signals.iter().map(|s| s.action.label()).collect();

        Ok(EnsembleSignal {
            action,
            strength,
            confidence,
            price,
            timestamp: now,
            agreement: agreement(&labels),
            member_signals,
        })
    }
}
