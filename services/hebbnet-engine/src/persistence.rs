//! Snapshot files
//!
//! Every model is written as pretty JSON wrapped in a small envelope that
//! records the format version, the model type and when it was saved.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ensemble::{Ensemble, Member};
use crate::error::{EngineError, Result};
use crate::network::Learner;
use crate::specialist::SpecialistCoordinator;
use crate::state::{
    check_version, CoordinatorState, EnsembleState, LearnerState, TradingLearnerState,
    STATE_VERSION,
};
use crate::trading::TradingLearner;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEnvelope<T> {
    pub format_version: u32,
    pub model_type: String,
    pub saved_at: DateTime<Utc>,
    pub payload: T,
}

/// Write `state` to `path`, creating parent directories as needed
pub fn save_snapshot<T: Serialize>(path: &Path, model_type: &str, state: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let envelope = SnapshotEnvelope {
        format_version: STATE_VERSION,
        model_type: model_type.to_string(),
        saved_at: Utc::now(),
        payload: state,
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    fs::write(path, json)?;
    debug!("Wrote {} snapshot to {}", model_type, path.display());
    Ok(())
}

/// Read an envelope from `path`, rejecting unknown format versions
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<SnapshotEnvelope<T>> {
    let json = fs::read_to_string(path)?;
    let envelope = parse_snapshot(&json)?;
    debug!(
        "Read {} snapshot saved at {} from {}",
        envelope.model_type,
        envelope.saved_at,
        path.display()
    );
    Ok(envelope)
}

fn parse_snapshot<T: DeserializeOwned>(json: &str) -> Result<SnapshotEnvelope<T>> {
    let envelope: SnapshotEnvelope<T> = serde_json::from_str(json)?;
    check_version(envelope.format_version)?;
    Ok(envelope)
}

/// Models that can be saved to and loaded from a snapshot file
pub trait Persist: Sized {
    const MODEL_TYPE: &'static str;
    type State: Serialize + DeserializeOwned;

    fn snapshot(&self) -> Self::State;

    fn restore(state: Self::State) -> Result<Self>;

    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        save_snapshot(path, Self::MODEL_TYPE, &self.snapshot())?;
        info!("💾 Saved {} to {}", Self::MODEL_TYPE, path.display());
        Ok(())
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let header: SnapshotEnvelope<IgnoredAny> = parse_snapshot(&json)?;
        if header.model_type != Self::MODEL_TYPE {
            return Err(EngineError::State(format!(
                "{} holds a {}, expected a {}",
                path.display(),
                header.model_type,
                Self::MODEL_TYPE
            )));
        }
        let envelope: SnapshotEnvelope<Self::State> = serde_json::from_str(&json)?;
        let model = Self::restore(envelope.payload)?;
        info!("📂 Loaded {} from {}", Self::MODEL_TYPE, path.display());
        Ok(model)
    }
}

impl Persist for Learner {
    const MODEL_TYPE: &'static str = "learner";
    type State = LearnerState;

    fn snapshot(&self) -> LearnerState {
        self.to_state()
    }

    fn restore(state: LearnerState) -> Result<Self> {
        Learner::from_state(state)
    }
}

impl Persist for TradingLearner {
    const MODEL_TYPE: &'static str = "trading_learner";
    type State = TradingLearnerState;

    fn snapshot(&self) -> TradingLearnerState {
        self.to_state()
    }

    fn restore(state: TradingLearnerState) -> Result<Self> {
        TradingLearner::from_state(state)
    }
}

/// Plain and trading ensembles share a model type; member kinds are checked
/// on restore
impl<M: Member> Persist for Ensemble<M> {
    const MODEL_TYPE: &'static str = "ensemble";
    type State = EnsembleState<M::Settings>;

    fn snapshot(&self) -> Self::State {
        self.to_state()
    }

    fn restore(state: Self::State) -> Result<Self> {
        Ensemble::from_state(state)
    }
}

impl Persist for SpecialistCoordinator {
    const MODEL_TYPE: &'static str = "specialist_coordinator";
    type State = CoordinatorState;

    fn snapshot(&self) -> CoordinatorState {
        self.to_state()
    }

    fn restore(state: CoordinatorState) -> Result<Self> {
        SpecialistCoordinator::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearnerConfig;

    #[test]
    fn test_envelope_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("learner.json");
        let learner = Learner::new(4, LearnerConfig::default(), Some(3)).unwrap();
        learner.save(&path).unwrap();

        let envelope: SnapshotEnvelope<LearnerState> = load_snapshot(&path).unwrap();
        assert_eq!(envelope.model_type, "learner");
        assert_eq!(envelope.format_version, STATE_VERSION);
        assert_eq!(envelope.payload, learner.to_state());
    }

    #[test]
    fn test_model_type_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.json");
        Learner::new(4, LearnerConfig::default(), Some(3))
            .unwrap()
            .save(&path)
            .unwrap();
        assert!(matches!(
            TradingLearner::load(&path),
            Err(EngineError::State(_))
        ));
    }

    #[test]
    fn test_large_rng_position_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.json");
        let mut state = Learner::new(4, LearnerConfig::default(), Some(3))
            .unwrap()
            .to_state();
        state.rng_word_pos = (1u128 << 66) + 5;
        save_snapshot(&path, "learner", &state).unwrap();

        let restored = Learner::load(&path).unwrap();
        assert_eq!(restored.to_state(), state);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Learner::load(dir.path().join("absent.json")),
            Err(EngineError::Io(_))
        ));
    }
}
