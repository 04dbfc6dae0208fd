//! Epoch loop shared by ensemble members and specialists

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ReseedSchedule, TrainingConfig};
use crate::dataset::Dataset;
use crate::error::{EngineError, Result};
use crate::network::Learner;

/// What one call to [`fit`] did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub epochs: usize,
    pub steps: u64,
    pub reseeded: usize,
}

/// Shuffled-epoch competitive training with scheduled dead-unit reseeding.
///
/// The visiting order comes from a second stream of the learner's own seed,
/// so a seeded learner always trains identically.
pub fn fit(learner: &mut Learner, train: &Dataset, config: &TrainingConfig) -> Result<FitReport> {
    config.validate()?;
    if train.is_empty() {
        return Err(EngineError::Dataset("training set is empty".into()));
    }

    let mut order_rng = ChaCha8Rng::seed_from_u64(learner.seed());
    order_rng.set_stream(1);

    let pool = train.features();
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut report = FitReport::default();

    for epoch in 0..config.epochs {
        order.shuffle(&mut order_rng);

        for (step, &idx) in order.iter().enumerate() {
            learner.train_step(&pool[idx])?;
            report.steps += 1;

            if let ReseedSchedule::Steps { every, after_epoch } = config.reseed {
                if step > 0 && step % every == 0 && epoch >= after_epoch {
                    report.reseeded += learner.reseed_dead_neurons(pool, None)?;
                }
            }
        }

        if let ReseedSchedule::Epochs { every } = config.reseed {
            if epoch % every == 0 {
                report.reseeded += learner.reseed_dead_neurons(pool, None)?;
            }
        }

        report.epochs += 1;
        debug!(
            epoch = epoch + 1,
            epochs = config.epochs,
            reseeded = report.reseeded,
            "Epoch complete"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearnerConfig;

    fn data() -> Dataset {
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                vec![sign, 0.1 * (i % 5) as f64, sign * 0.5]
            })
            .collect();
        let labels = (0..40).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect();
        Dataset::new(features, labels).unwrap()
    }

    fn learner(seed: u64) -> Learner {
        let config = LearnerConfig {
            hidden_size: 6,
            ..LearnerConfig::default()
        };
        Learner::new(3, config, Some(seed)).unwrap()
    }

    #[test]
    fn test_fit_counts_steps() {
        let mut learner = learner(1);
        let config = TrainingConfig {
            epochs: 3,
            reseed: ReseedSchedule::Never,
        };
        let report = fit(&mut learner, &data(), &config).unwrap();
        assert_eq!(report.epochs, 3);
        assert_eq!(report.steps, 120);
        assert_eq!(report.reseeded, 0);
        assert_eq!(learner.training_steps(), 120);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let config = TrainingConfig {
            epochs: 4,
            reseed: ReseedSchedule::Epochs { every: 2 },
        };
        let mut a = learner(5);
        let mut b = learner(5);
        fit(&mut a, &data(), &config).unwrap();
        fit(&mut b, &data(), &config).unwrap();
        assert_eq!(a.to_state(), b.to_state());
    }

    #[test]
    fn test_fit_rejects_empty_set() {
        let mut learner = learner(1);
        let empty = Dataset::default();
        assert!(fit(&mut learner, &empty, &TrainingConfig::default()).is_err());
    }

    #[test]
    fn test_epoch_schedule_reseeds() {
        let config = LearnerConfig {
            hidden_size: 6,
            reseed_threshold: 0.99,
            ..LearnerConfig::default()
        };
        let mut learner = Learner::new(3, config, Some(2)).unwrap();
        let schedule = TrainingConfig {
            epochs: 1,
            reseed: ReseedSchedule::Epochs { every: 1 },
        };
        // 40 steps cannot lift any win rate near 0.99, so every unit is reseeded
        let report = fit(&mut learner, &data(), &schedule).unwrap();
        assert_eq!(report.reseeded, 6);
    }
}
