//! Specialist learners and their coordinator

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Candle, Interpretation, LabeledWindow, SpecialistKind};
use crate::config::{LearnerConfig, SpecialistsConfig};
use crate::dataset::{Dataset, BUY, HOLD, N_CLASSES, SELL};
use crate::error::{EngineError, Result};
use crate::network::{Learner, NetworkStats};
use crate::state::{check_version, CoordinatorState, SpecialistState, STATE_VERSION};
use crate::trading::ClassProbabilities;
use crate::training::{fit, FitReport};
use crate::voting::agreement;

/// A single-winner learner bound to one feature domain
#[derive(Debug, Clone)]
pub struct Specialist {
    kind: SpecialistKind,
    learner: Learner,
}

/// One specialist's view of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistReading {
    pub kind: SpecialistKind,
    pub signal: i8,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
    pub interpretation: Interpretation,
    pub feature_count: usize,
}

/// Training outcome of one specialist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistReport {
    pub kind: SpecialistKind,
    pub accuracy: f64,
    pub hidden_size: usize,
    pub fit: FitReport,
    pub stats: NetworkStats,
}

/// Combined view of all specialists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    /// -1, 0 or 1
    pub signal: i8,
    /// Share of specialists agreeing with the most common call
    pub agreement: f64,
    pub avg_confidence: f64,
    pub readings: Vec<SpecialistReading>,
}

impl Specialist {
    pub fn new(
        kind: SpecialistKind,
        config: &SpecialistsConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        let net = kind.net_config(config);
        let learner = Learner::new(
            kind.feature_count(),
            LearnerConfig::single_winner(net.hidden_size, net.eta_base),
            seed,
        )?;
        Ok(Self { kind, learner })
    }

    pub fn kind(&self) -> SpecialistKind {
        self.kind
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    /// Labelled feature vectors for this specialist
    pub fn dataset(&self, windows: &[LabeledWindow]) -> Result<Dataset> {
        let features = windows.iter().map(|w| self.kind.extract(&w.candles)).collect();
        let labels = windows.iter().map(|w| w.label).collect();
        Dataset::new(features, labels)
    }

    /// Extract, predict and interpret
    pub fn reading(
        &self,
        window: &[Candle],
        config: &SpecialistsConfig,
    ) -> Result<SpecialistReading> {
        let features = self.kind.extract(window);
        let signal = self.learner.predict(&features)?;
        let probabilities =
            ClassProbabilities::from_slice(&self.learner.predict_proba(&features, N_CLASSES)?);
        let confidence = probabilities.max();
        Ok(SpecialistReading {
            kind: self.kind,
            signal,
            confidence,
            probabilities,
            interpretation: self.kind.interpret(signal, confidence, config),
            feature_count: features.len(),
        })
    }

    fn train(
        &mut self,
        train: &[LabeledWindow],
        val: &[LabeledWindow],
        config: &SpecialistsConfig,
    ) -> Result<SpecialistReport> {
        let train = self.dataset(train)?;
        let val = self.dataset(val)?;

        let fit = fit(&mut self.learner, &train, &config.training())?;
        self.learner.learn_mapping_from(&val)?;
        let accuracy = self.learner.accuracy(&val)?;

        info!(
            "✓ {} specialist trained: accuracy {:.1}%, {} units reseeded",
            self.kind,
            accuracy * 100.0,
            fit.reseeded
        );

        Ok(SpecialistReport {
            kind: self.kind,
            accuracy,
            hidden_size: self.learner.hidden_size(),
            fit,
            stats: self.learner.stats(),
        })
    }
}

/// Owns the price, volume and momentum specialists
#[derive(Debug, Clone)]
pub struct SpecialistCoordinator {
    config: SpecialistsConfig,
    specialists: Vec<Specialist>,
    accuracies: Vec<f64>,
    trained: bool,
}

impl SpecialistCoordinator {
    /// Seeds are `seed`, `seed + 1`, `seed + 2` when a base seed is configured
    pub fn new(config: SpecialistsConfig) -> Result<Self> {
        config.validate()?;
        let specialists = SpecialistKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| Specialist::new(*kind, &config, config.seed.map(|s| s + i as u64)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            specialists,
            accuracies: Vec::new(),
            trained: false,
        })
    }

    /// Train every specialist on its own view of the windows, in parallel
    pub fn train(
        &mut self,
        train: &[LabeledWindow],
        val: &[LabeledWindow],
    ) -> Result<Vec<SpecialistReport>> {
        if train.is_empty() {
            return Err(EngineError::Dataset("training set is empty".into()));
        }
        let config = &self.config;
        let reports = self
            .specialists
            .par_iter_mut()
            .map(|s| s.train(train, val, config))
            .collect::<Result<Vec<_>>>()?;

        self.accuracies = reports.iter().map(|r| r.accuracy).collect();
        self.trained = true;
        Ok(reports)
    }

    /// Confidence-weighted vote of the three specialists
    pub fn get_consensus(&self, window: &[Candle]) -> Result<ConsensusReport> {
        if !self.trained {
            return Err(EngineError::NotTrained("specialists"));
        }
        let readings = self
            .specialists
            .iter()
            .map(|s| s.reading(window, &self.config))
            .collect::<Result<Vec<_>>>()?;

        let (weighted, total) = readings.iter().fold((0.0, 0.0), |(w, t), r| {
            (w + f64::from(r.signal) * r.confidence, t + r.confidence)
        });
        let signal = if total > 0.0 {
            let average = weighted / total;
            if average > self.config.dead_band {
                BUY
            } else if average < -self.config.dead_band {
                SELL
            } else {
                HOLD
            }
        } else {
            HOLD
        };

        let signals: Vec<i8> = readings.iter().map(|r| r.signal).collect();
        let avg_confidence =
            readings.iter().map(|r| r.confidence).sum::<f64>() / readings.len() as f64;

        Ok(ConsensusReport {
            signal,
            agreement: agreement(&signals),
            avg_confidence,
            readings,
        })
    }

    pub fn specialists(&self) -> &[Specialist] {
        &self.specialists
    }

    pub fn specialist(&self, kind: SpecialistKind) -> Option<&Specialist> {
        self.specialists.iter().find(|s| s.kind == kind)
    }

    pub fn accuracies(&self) -> &[f64] {
        &self.accuracies
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn config(&self) -> &SpecialistsConfig {
        &self.config
    }

    pub fn to_state(&self) -> CoordinatorState {
        CoordinatorState {
            version: STATE_VERSION,
            config: self.config.clone(),
            specialists: self
                .specialists
                .iter()
                .map(|s| SpecialistState {
                    kind: s.kind,
                    learner: s.learner.to_state(),
                })
                .collect(),
            accuracies: self.accuracies.clone(),
            trained: self.trained,
        }
    }

    pub fn from_state(state: CoordinatorState) -> Result<Self> {
        check_version(state.version)?;
        state.config.validate()?;

        let kinds: Vec<SpecialistKind> = state.specialists.iter().map(|s| s.kind).collect();
        if kinds != SpecialistKind::ALL {
            return Err(EngineError::State(format!(
                "expected price, volume and momentum specialists, got {kinds:?}"
            )));
        }

        let specialists = state
            .specialists
            .into_iter()
            .map(|s| {
                let learner = Learner::from_state(s.learner)?;
                if learner.input_size() != s.kind.feature_count() {
                    return Err(EngineError::State(format!(
                        "{} specialist expects {} features, state has {}",
                        s.kind,
                        s.kind.feature_count(),
                        learner.input_size()
                    )));
                }
                Ok(Specialist {
                    kind: s.kind,
                    learner,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(trained = state.trained, "Restored specialist coordinator");
        Ok(Self {
            config: state.config,
            specialists,
            accuracies: state.accuracies,
            trained: state.trained,
        })
    }
}
