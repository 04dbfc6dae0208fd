//! The competitive unit layer

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::{dot, normalize, renormalize, top_n};
use crate::config::LearnerConfig;
use crate::dataset::{class_index, HOLD};
use crate::error::{EngineError, Result};

/// Added to a win rate before it divides the rarity boost
const WIN_RATE_EPSILON: f64 = 1e-3;

/// Win rate under which a unit is reported as dead
const DEAD_RATE: f64 = 0.001;

/// Win rate above which a unit is reported as active
const ACTIVE_RATE: f64 = 0.01;

/// Competitive learning layer
///
/// Every weight column is kept on the unit sphere, so a dot product with a
/// normalized input is its cosine similarity.
#[derive(Debug, Clone)]
pub struct Learner {
    pub(super) input_size: usize,
    pub(super) config: LearnerConfig,
    pub(super) seed: u64,
    /// One unit vector of length `input_size` per neuron
    pub(super) weights: Vec<Vec<f64>>,
    /// EMA of how often each neuron wins; sums to 1
    pub(super) win_rates: Vec<f64>,
    /// Conscience bias
    pub(super) bias: Vec<f64>,
    /// Post-win handicap, in [0, gamma]
    pub(super) refractory: Vec<f64>,
    /// Neuron to label, filled by `learn_mapping`
    pub(super) class_map: Vec<Option<i8>>,
    pub(super) training_steps: u64,
    pub(super) last_winner: Option<usize>,
    pub(super) rng: ChaCha8Rng,
}

/// Training and competition statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub training_steps: u64,
    pub dead_neurons: usize,
    pub active_neurons: usize,
    pub bias_range: (f64, f64),
    pub last_winner: Option<usize>,
    pub mapped_neurons: usize,
}

impl Learner {
    /// Create a learner with random unit-length weights.
    ///
    /// Without a seed one is drawn from the thread RNG and kept, so the
    /// learner can still be snapshotted and rebuilt.
    pub fn new(input_size: usize, config: LearnerConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        if input_size == 0 {
            return Err(EngineError::config("input_size must be positive"));
        }

        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let hidden = config.hidden_size;

        let weights = (0..hidden)
            .map(|_| {
                let mut column: Vec<f64> = (0..input_size)
                    .map(|_| rng.sample::<f64, _>(StandardNormal))
                    .collect();
                renormalize(&mut column);
                column
            })
            .collect();

        Ok(Self {
            input_size,
            seed,
            weights,
            win_rates: vec![1.0 / hidden as f64; hidden],
            bias: vec![0.0; hidden],
            refractory: vec![0.0; hidden],
            class_map: vec![None; hidden],
            training_steps: 0,
            last_winner: None,
            rng,
            config,
        })
    }

    pub(crate) fn check_shape(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.input_size {
            return Err(EngineError::ShapeMismatch {
                expected: self.input_size,
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn scores(&self, x_hat: &[f64], training: bool) -> Vec<f64> {
        let mut scores: Vec<f64> = self.weights.iter().map(|w| dot(w, x_hat)).collect();
        if training {
            for ((s, b), r) in scores.iter_mut().zip(&self.bias).zip(&self.refractory) {
                *s += b - r;
            }
        }
        scores
    }

    /// Cosine similarity of the input to every neuron; in training mode the
    /// conscience bias is added and the refractory penalty subtracted.
    pub fn compete(&self, features: &[f64], training: bool) -> Result<Vec<f64>> {
        self.check_shape(features)?;
        Ok(self.scores(&normalize(features), training))
    }

    /// Inference-mode best matching neuron
    pub fn winner(&self, features: &[f64]) -> Result<usize> {
        let scores = self.compete(features, false)?;
        Ok(top_n(&scores, 1)[0])
    }

    /// One competitive update; returns the winning neuron
    pub fn train_step(&mut self, features: &[f64]) -> Result<usize> {
        self.check_shape(features)?;
        let x_hat = normalize(features);
        let scores = self.scores(&x_hat, true);
        let top = top_n(&scores, self.config.k);
        let winner = top[0];

        let target = 1.0 / self.hidden_size() as f64;
        let LearnerConfig {
            alpha,
            beta,
            gamma,
            refractory_decay,
            eta_base,
            max_eta_boost,
            ..
        } = self.config;

        // EMA toward one-hot(winner) keeps the sum at 1
        for (n, p) in self.win_rates.iter_mut().enumerate() {
            *p *= 1.0 - alpha;
            if n == winner {
                *p += alpha;
            }
        }

        for (b, p) in self.bias.iter_mut().zip(&self.win_rates) {
            *b += beta * (target - p);
        }

        self.refractory.iter_mut().for_each(|r| *r *= refractory_decay);
        self.refractory[winner] = gamma;

        for (rank, &n) in top.iter().enumerate() {
            let boost = (target / (self.win_rates[n] + WIN_RATE_EPSILON)).min(max_eta_boost);
            let eta = eta_base * boost * self.config.responsibilities[rank];
            let column = &mut self.weights[n];
            for (w, x) in column.iter_mut().zip(&x_hat) {
                *w = (1.0 - eta) * *w + eta * x;
            }
            renormalize(column);
        }

        self.training_steps += 1;
        self.last_winner = Some(winner);
        Ok(winner)
    }

    /// Label of the inference-mode winner, or HOLD when it is unmapped
    pub fn predict(&self, features: &[f64]) -> Result<i8> {
        let winner = self.winner(features)?;
        Ok(self.class_map[winner].unwrap_or(HOLD))
    }

    /// Weighted vote of the top-ranked neurons over `n_classes` buckets.
    ///
    /// Uniform when none of the voting neurons carries a label.
    pub fn predict_proba(&self, features: &[f64], n_classes: usize) -> Result<Vec<f64>> {
        if n_classes == 0 {
            return Err(EngineError::config("n_classes must be positive"));
        }
        let scores = self.compete(features, false)?;
        let weights = &self.config.vote_weights;
        let top = top_n(&scores, weights.len());

        let mut votes = vec![0.0; n_classes];
        for (rank, &n) in top.iter().enumerate() {
            if let Some(label) = self.class_map[n] {
                votes[class_index(label, n_classes)] += weights[rank];
            }
        }

        let total: f64 = votes.iter().sum();
        if total > 0.0 {
            votes.iter_mut().for_each(|v| *v /= total);
        } else {
            votes.fill(1.0 / n_classes as f64);
        }
        Ok(votes)
    }

    pub fn stats(&self) -> NetworkStats {
        let bias_range = self
            .bias
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
                (lo.min(*b), hi.max(*b))
            });
        NetworkStats {
            training_steps: self.training_steps,
            dead_neurons: self.win_rates.iter().filter(|p| **p < DEAD_RATE).count(),
            active_neurons: self.win_rates.iter().filter(|p| **p > ACTIVE_RATE).count(),
            bias_range,
            last_winner: self.last_winner,
            mapped_neurons: self.class_map.iter().filter(|c| c.is_some()).count(),
        }
    }

    /// Swap the base learning rate, returning the previous one
    pub(crate) fn replace_eta_base(&mut self, eta_base: f64) -> f64 {
        std::mem::replace(&mut self.config.eta_base, eta_base)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.weights.len()
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn win_rates(&self) -> &[f64] {
        &self.win_rates
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    pub fn refractory(&self) -> &[f64] {
        &self.refractory
    }

    pub fn class_map(&self) -> &[Option<i8>] {
        &self.class_map
    }

    pub fn training_steps(&self) -> u64 {
        self.training_steps
    }

    pub fn last_winner(&self) -> Option<usize> {
        self.last_winner
    }
}
