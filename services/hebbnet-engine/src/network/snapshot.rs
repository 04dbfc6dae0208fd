//! Learner <-> state record conversion

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{l2_norm, Learner};
use crate::error::{EngineError, Result};
use crate::state::{check_version, LearnerState, STATE_VERSION};

impl Learner {
    pub fn to_state(&self) -> LearnerState {
        LearnerState {
            version: STATE_VERSION,
            input_size: self.input_size,
            config: self.config.clone(),
            seed: self.seed,
            rng_word_pos: self.rng.get_word_pos(),
            weights: self.weights.clone(),
            win_rates: self.win_rates.clone(),
            bias: self.bias.clone(),
            refractory: self.refractory.clone(),
            class_map: self.class_map.clone(),
            training_steps: self.training_steps,
            last_winner: self.last_winner,
        }
    }

    /// Rebuild a learner, rejecting records whose shapes disagree
    pub fn from_state(state: LearnerState) -> Result<Self> {
        check_version(state.version)?;
        state.config.validate()?;

        let hidden = state.config.hidden_size;
        if state.input_size == 0 {
            return Err(EngineError::State("input_size must be positive".into()));
        }
        let lengths = [
            ("weights", state.weights.len()),
            ("win_rates", state.win_rates.len()),
            ("bias", state.bias.len()),
            ("refractory", state.refractory.len()),
            ("class_map", state.class_map.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != hidden) {
            return Err(EngineError::State(format!(
                "{name} has {len} entries, expected {hidden}"
            )));
        }
        if let Some(column) = state
            .weights
            .iter()
            .find(|w| w.len() != state.input_size || (l2_norm(w) - 1.0).abs() > 1e-6)
        {
            return Err(EngineError::State(format!(
                "weight column of length {} is not a unit vector of length {}",
                column.len(),
                state.input_size
            )));
        }
        if state.last_winner.is_some_and(|w| w >= hidden) {
            return Err(EngineError::State("last_winner out of range".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(state.seed);
        rng.set_word_pos(state.rng_word_pos);

        Ok(Self {
            input_size: state.input_size,
            config: state.config,
            seed: state.seed,
            weights: state.weights,
            win_rates: state.win_rates,
            bias: state.bias,
            refractory: state.refractory,
            class_map: state.class_map,
            training_steps: state.training_steps,
            last_winner: state.last_winner,
            rng,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearnerConfig;

    fn trained() -> Learner {
        let config = LearnerConfig {
            hidden_size: 5,
            ..LearnerConfig::default()
        };
        let mut learner = Learner::new(3, config, Some(8)).unwrap();
        let data: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![(i % 4) as f64, 1.0 - (i % 3) as f64, 0.5])
            .collect();
        for x in &data {
            learner.train_step(x).unwrap();
        }
        let labels: Vec<i8> = (0..60).map(|i| (i % 3) as i8 - 1).collect();
        learner.learn_mapping(&data, &labels, 3).unwrap();
        learner
    }

    #[test]
    fn test_restore_is_exact() {
        let learner = trained();
        let restored = Learner::from_state(learner.to_state()).unwrap();
        assert_eq!(restored.to_state(), learner.to_state());

        let query = [0.7, -0.2, 0.1];
        assert_eq!(restored.predict(&query).unwrap(), learner.predict(&query).unwrap());
        assert_eq!(
            restored.predict_proba(&query, 3).unwrap(),
            learner.predict_proba(&query, 3).unwrap()
        );
    }

    #[test]
    fn test_restored_rng_continues() {
        let mut a = trained();
        let mut b = Learner::from_state(a.to_state()).unwrap();
        a.win_rates.fill(0.0);
        b.win_rates.fill(0.0);
        let pool: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, 1.0, -(i as f64)]).collect();
        a.reseed_dead_neurons(&pool, None).unwrap();
        b.reseed_dead_neurons(&pool, None).unwrap();
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_rng_position_past_u64_survives() {
        let mut learner = trained();
        let far = (1u128 << 66) + 12;
        learner.rng.set_word_pos(far);
        let state = learner.to_state();
        assert_eq!(state.rng_word_pos, far);

        let json = serde_json::to_string(&state).unwrap();
        let parsed: LearnerState = serde_json::from_str(&json).unwrap();
        let restored = Learner::from_state(parsed).unwrap();
        assert_eq!(restored.rng.get_word_pos(), far);
    }

    #[test]
    fn test_rejects_corrupt_state() {
        let mut state = trained().to_state();
        state.bias.pop();
        assert!(matches!(Learner::from_state(state), Err(EngineError::State(_))));

        let mut state = trained().to_state();
        state.weights[0][0] += 1.0;
        assert!(Learner::from_state(state).is_err());

        let mut state = trained().to_state();
        state.version = 99;
        assert!(matches!(
            Learner::from_state(state),
            Err(EngineError::StateVersion { .. })
        ));
    }
}
