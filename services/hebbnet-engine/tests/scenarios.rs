//! End-to-end behaviour on synthetic data

use chrono::{Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;

use hebbnet_engine::{
    fit, Dataset, EngineError, Ensemble, EnsembleConfig, Learner, LearnerConfig, ReseedSchedule,
    SignalStrength, SignalType, TradingConfig, TradingLearner, TrainingConfig, VotingStrategy,
    BUY, HOLD, SELL,
};

/// `n` points per center with isotropic Gaussian noise; labels follow the
/// center order. `flip` is the chance a label is replaced by a random one.
fn clusters(
    rng: &mut ChaCha8Rng,
    centers: &[(Vec<f64>, i8)],
    n: usize,
    sigma: f64,
    flip: f64,
) -> Dataset {
    let noise = Normal::new(0.0, sigma).unwrap();
    let labels_pool: Vec<i8> = centers.iter().map(|(_, l)| *l).collect();
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n * centers.len() {
        let (center, label) = &centers[i % centers.len()];
        features.push(center.iter().map(|c| c + noise.sample(rng)).collect::<Vec<f64>>());
        let label = if rng.gen_bool(flip) {
            labels_pool[rng.gen_range(0..labels_pool.len())]
        } else {
            *label
        };
        labels.push(label);
    }
    Dataset::new(features, labels).unwrap()
}

fn axis(dim: usize, hot: &[usize]) -> Vec<f64> {
    (0..dim).map(|d| if hot.contains(&d) { 1.0 } else { 0.0 }).collect()
}

fn two_clusters() -> Vec<(Vec<f64>, i8)> {
    vec![(axis(8, &[0, 1, 2]), SELL), (axis(8, &[4, 5, 6]), BUY)]
}

fn three_overlapping() -> Vec<(Vec<f64>, i8)> {
    vec![
        (axis(6, &[0, 1]), SELL),
        (axis(6, &[1, 2, 3]), HOLD),
        (axis(6, &[3, 4, 5]), BUY),
    ]
}

fn small_config(hidden_size: usize) -> LearnerConfig {
    LearnerConfig {
        hidden_size,
        ..LearnerConfig::default()
    }
}

fn training(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        epochs,
        reseed: ReseedSchedule::Steps {
            every: 200,
            after_epoch: 1,
        },
    }
}

#[test]
fn test_two_clusters_are_separated() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let train = clusters(&mut rng, &two_clusters(), 150, 0.1, 0.0);
    let val = clusters(&mut rng, &two_clusters(), 100, 0.1, 0.0);
    let test = clusters(&mut rng, &two_clusters(), 100, 0.1, 0.0);

    let mut learner = Learner::new(8, small_config(10), Some(42)).unwrap();
    let report = fit(&mut learner, &train, &training(5)).unwrap();
    assert_eq!(report.steps, 5 * 300);

    learner.learn_mapping_from(&val).unwrap();
    let accuracy = learner.accuracy(&test).unwrap();
    assert!(accuracy >= 0.9, "accuracy {accuracy}");
}

#[test]
fn test_learner_invariants_hold_after_training() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let train = clusters(&mut rng, &three_overlapping(), 200, 0.3, 0.0);
    let mut learner = Learner::new(6, small_config(12), Some(5)).unwrap();
    let no_reseed = TrainingConfig {
        epochs: 4,
        reseed: ReseedSchedule::Never,
    };
    fit(&mut learner, &train, &no_reseed).unwrap();

    for column in learner.weights() {
        let norm: f64 = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }
    let total: f64 = learner.win_rates().iter().sum();
    assert!((total - 1.0).abs() < 1e-9, "win rates sum to {total}");
    assert!(learner.win_rates().iter().all(|p| *p >= 0.0));
    assert!(learner.refractory().iter().all(|r| *r >= 0.0));
    assert!(learner.bias().iter().all(|b| b.is_finite()));
    assert_eq!(learner.training_steps(), 4 * 600);
}

#[test]
fn test_ensemble_beats_worst_member_under_label_noise() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let train = clusters(&mut rng, &three_overlapping(), 200, 0.3, 0.4);
    let val = clusters(&mut rng, &three_overlapping(), 100, 0.3, 0.4);
    let test = clusters(&mut rng, &three_overlapping(), 100, 0.3, 0.0);

    let mut ensemble: Ensemble = Ensemble::new(
        6,
        small_config(20),
        EnsembleConfig::default(),
        training(6),
    )
    .unwrap();
    let summary = ensemble.train(&train, &val, None).unwrap();
    assert_eq!(summary.ensemble_size, 5);

    let worst = ensemble
        .members()
        .iter()
        .map(|m| m.accuracy(&test).unwrap())
        .fold(f64::INFINITY, f64::min);
    let hits = test
        .iter()
        .filter(|(x, y)| ensemble.predict(x, VotingStrategy::Weighted).unwrap() == *y)
        .count();
    let accuracy = hits as f64 / test.len() as f64;
    assert!(accuracy > worst, "ensemble {accuracy} <= worst member {worst}");
}

#[test]
fn test_same_seeds_give_identical_models() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let train = clusters(&mut rng, &three_overlapping(), 80, 0.3, 0.0);

    let build = || {
        let config = EnsembleConfig {
            size: 3,
            ..EnsembleConfig::default()
        };
        let mut ensemble: Ensemble =
            Ensemble::new(6, small_config(10), config, training(3)).unwrap();
        ensemble.train(&train, &train, None).unwrap();
        ensemble
    };
    let a = build();
    let b = build();
    assert_eq!(a.accuracies(), b.accuracies());
    for (x, _) in train.iter().take(20) {
        assert_eq!(
            a.predict_proba(x, VotingStrategy::Confidence).unwrap(),
            b.predict_proba(x, VotingStrategy::Confidence).unwrap()
        );
    }
}

#[test]
fn test_prediction_is_pure() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let train = clusters(&mut rng, &two_clusters(), 60, 0.1, 0.0);
    let mut learner = Learner::new(8, small_config(6), Some(9)).unwrap();
    fit(&mut learner, &train, &training(2)).unwrap();
    learner.learn_mapping_from(&train).unwrap();

    let before = learner.to_state();
    let query = train.features()[3].clone();
    let first = learner.predict_proba(&query, 3).unwrap();
    let second = learner.predict_proba(&query, 3).unwrap();
    assert_eq!(first, second);
    assert_eq!(learner.predict(&query).unwrap(), learner.predict(&query).unwrap());
    assert_eq!(learner.to_state(), before);

    assert!((first.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(first.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_untrained_models_refuse_to_predict() {
    let ensemble: Ensemble =
        Ensemble::new(4, small_config(5), EnsembleConfig::default(), training(1)).unwrap();
    assert!(matches!(
        ensemble.predict(&[0.0; 4], VotingStrategy::Weighted),
        Err(EngineError::NotTrained(_))
    ));

    // an unmapped learner still answers, with HOLD and a uniform distribution
    let learner = Learner::new(4, small_config(5), Some(1)).unwrap();
    assert_eq!(learner.predict(&[1.0, 0.0, 0.0, 0.0]).unwrap(), HOLD);
    let proba = learner.predict_proba(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
    assert!(proba.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-12));
    assert!(matches!(
        learner.predict(&[1.0, 0.0]),
        Err(EngineError::ShapeMismatch { expected: 4, actual: 2 })
    ));
}

#[test]
fn test_strong_buy_carries_risk_levels() {
    let trader =
        TradingLearner::new(4, small_config(5), TradingConfig::default(), Some(1)).unwrap();
    let now = Utc::now();
    let price = Decimal::ONE_HUNDRED;
    let signal = trader.decide(BUY, 0.85, price, now);

    assert_eq!(signal.action, SignalType::Buy);
    assert_eq!(signal.strength, SignalStrength::Strong);
    let stop = signal.stop_loss.unwrap();
    let target = signal.take_profit.unwrap();
    assert!(stop < price && price < target);
    assert_eq!(stop, Decimal::new(98, 0));
    assert_eq!(target, Decimal::new(104, 0));
    assert!((signal.position_size - 0.5).abs() < 1e-12);
}

#[test]
fn test_signals_respect_cooldown() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let train = clusters(&mut rng, &two_clusters(), 60, 0.1, 0.0);
    let mut trader =
        TradingLearner::new(8, small_config(6), TradingConfig::default(), Some(2)).unwrap();
    for (x, _) in train.iter() {
        trader.train_step_adaptive(x).unwrap();
    }
    trader.learner_mut().learn_mapping_from(&train).unwrap();

    let query = train.features()[0].clone();
    let start = Utc::now();
    let first = trader.generate_signal(&query, Decimal::ONE_HUNDRED, start).unwrap();
    assert_ne!(first.reason, "cooldown");

    // other features and prices get the same answer while cooling down
    let other = train.features()[1].clone();
    let zeros = vec![0.0; 8];
    for (features, price, after) in [
        (&other, Decimal::new(25_075, 2), 10),
        (&zeros, Decimal::new(9_950, 2), 30),
        (&query, Decimal::ONE_HUNDRED, 59),
    ] {
        let blocked = trader
            .generate_signal(features, price, start + Duration::seconds(after))
            .unwrap();
        assert_eq!(blocked.action, SignalType::Hold);
        assert_eq!(blocked.reason, "cooldown");
        assert_eq!(blocked.confidence, 0.0);
        assert_eq!(blocked.price, price);
    }
    assert_eq!(trader.signal_history().len(), 1);

    let later = trader
        .generate_signal(&query, Decimal::ONE_HUNDRED, start + Duration::seconds(61))
        .unwrap();
    assert_ne!(later.reason, "cooldown");
    assert_eq!(trader.signal_history().len(), 2);
}
