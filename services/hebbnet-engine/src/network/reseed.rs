//! Dead-unit resurrection

use rand::seq::index::sample;
use tracing::debug;

use super::{dot, l2_norm, normalize, renormalize, Learner, NORM_EPSILON};
use crate::error::Result;

impl Learner {
    /// Indices of units whose win rate fell under `threshold`
    pub fn dead_neurons(&self, threshold: f64) -> Vec<usize> {
        self.win_rates
            .iter()
            .enumerate()
            .filter(|(_, p)| **p < threshold)
            .map(|(n, _)| n)
            .collect()
    }

    /// Move dead units onto the least-covered samples of `pool`.
    ///
    /// Candidates are ranked once by their best similarity to the current
    /// columns; the i-th dead unit takes the i-th most novel candidate and has
    /// its win rate, bias and refractory state reset. Zero vectors are never
    /// used as candidates. Uses the configured threshold when `threshold` is
    /// `None`. Returns the number of units reseeded.
    pub fn reseed_dead_neurons(
        &mut self,
        pool: &[Vec<f64>],
        threshold: Option<f64>,
    ) -> Result<usize> {
        let threshold = threshold.unwrap_or(self.config.reseed_threshold);
        let dead = self.dead_neurons(threshold);
        if dead.is_empty() {
            return Ok(0);
        }
        for row in pool {
            self.check_shape(row)?;
        }

        let usable: Vec<&Vec<f64>> = pool
            .iter()
            .filter(|row| l2_norm(row) > NORM_EPSILON)
            .collect();
        if usable.is_empty() {
            return Ok(0);
        }

        let n_candidates = self.config.reseed_candidates.min(usable.len());
        let picked = sample(&mut self.rng, usable.len(), n_candidates);
        let mut ranked: Vec<(f64, Vec<f64>)> = picked
            .into_iter()
            .map(|i| {
                let candidate = normalize(usable[i]);
                let coverage = self
                    .weights
                    .iter()
                    .map(|w| dot(w, &candidate))
                    .fold(f64::NEG_INFINITY, f64::max);
                (coverage, candidate)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        let target = 1.0 / self.hidden_size() as f64;
        let mut reseeded = 0;
        for (&n, (_, mut candidate)) in dead.iter().take(self.config.max_reseed).zip(ranked) {
            renormalize(&mut candidate);
            self.weights[n] = candidate;
            self.win_rates[n] = target;
            self.bias[n] = 0.0;
            self.refractory[n] = 0.0;
            reseeded += 1;
        }

        debug!(
            dead = dead.len(),
            reseeded,
            candidates = n_candidates,
            "Reseeded dead neurons"
        );
        Ok(reseeded)
    }
}
