//! Versioned state records
//!
//! Plain serde structs holding everything needed to rebuild a model with
//! bit-identical predictions. Models convert to and from these with
//! `to_state` / `from_state`; [`crate::persistence`] writes them to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{
    EnsembleConfig, LearnerConfig, SpecialistsConfig, TradingConfig, TrainingConfig,
};
use crate::error::{EngineError, Result};
use crate::specialist::SpecialistKind;
use crate::trading::{MarketRegime, PerformanceCounters, Signal};

/// Layout version written into every record
pub const STATE_VERSION: u32 = 1;

pub(crate) fn check_version(found: u32) -> Result<()> {
    if found != STATE_VERSION {
        return Err(EngineError::StateVersion {
            found,
            expected: STATE_VERSION,
        });
    }
    Ok(())
}

/// Complete state of one [`crate::Learner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub version: u32,
    pub input_size: usize,
    pub config: LearnerConfig,
    pub seed: u64,
    /// Word position of the learner's RNG stream
    pub rng_word_pos: u128,
    pub weights: Vec<Vec<f64>>,
    pub win_rates: Vec<f64>,
    pub bias: Vec<f64>,
    pub refractory: Vec<f64>,
    pub class_map: Vec<Option<i8>>,
    pub training_steps: u64,
    pub last_winner: Option<usize>,
}

/// State of a [`crate::TradingLearner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingLearnerState {
    pub version: u32,
    pub learner: LearnerState,
    pub trading: TradingConfig,
    pub regime: MarketRegime,
    pub signal_history: Vec<Signal>,
    pub last_signal_at: Option<DateTime<Utc>>,
    pub position_size: f64,
    pub performance: PerformanceCounters,
}

/// Either kind of ensemble member, tagged explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum NetworkState {
    Plain(LearnerState),
    Trading(TradingLearnerState),
}

impl NetworkState {
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkState::Plain(_) => "plain",
            NetworkState::Trading(_) => "trading",
        }
    }
}

/// State of an [`crate::Ensemble`]; `S` is the member settings type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleState<S> {
    pub version: u32,
    pub config: EnsembleConfig,
    pub training: TrainingConfig,
    pub settings: S,
    pub input_size: usize,
    pub members: Vec<NetworkState>,
    pub accuracies: Vec<f64>,
    pub trained: bool,
}

/// One specialist inside a [`CoordinatorState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistState {
    pub kind: SpecialistKind,
    pub learner: LearnerState,
}

/// State of a [`crate::SpecialistCoordinator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub version: u32,
    pub config: SpecialistsConfig,
    pub specialists: Vec<SpecialistState>,
    pub accuracies: Vec<f64>,
    pub trained: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_check() {
        assert!(check_version(STATE_VERSION).is_ok());
        assert!(matches!(
            check_version(STATE_VERSION + 1),
            Err(EngineError::StateVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_member_state_keeps_wide_rng_position() {
        let mut learner = crate::network::Learner::new(3, LearnerConfig::default(), Some(1))
            .unwrap()
            .to_state();
        learner.rng_word_pos = u128::from(u64::MAX) + 40;
        let member = NetworkState::Plain(learner);

        let json = serde_json::to_string(&member).unwrap();
        assert!(json.starts_with(r#"{"kind":"plain","state":"#));
        let parsed: NetworkState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, member);
    }
}
