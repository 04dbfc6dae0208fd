//! Vote aggregation shared by the ensemble and the specialist coordinator

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::{class_index, class_label, N_CLASSES};
use crate::error::EngineError;

/// How member predictions are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// One vote per member
    Majority,
    /// Votes weighted by validation accuracy
    #[default]
    Weighted,
    /// Votes weighted by each member's top class probability
    Confidence,
}

impl FromStr for VotingStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "majority" => Ok(VotingStrategy::Majority),
            "weighted" => Ok(VotingStrategy::Weighted),
            "confidence" => Ok(VotingStrategy::Confidence),
            other => Err(EngineError::config(format!("unknown voting strategy: {other}"))),
        }
    }
}

/// Label with the largest total weight; ties go to the earliest class in
/// SELL, HOLD, BUY order
pub fn weighted_vote(votes: impl IntoIterator<Item = (i8, f64)>) -> i8 {
    let mut totals = [0.0; N_CLASSES];
    for (label, weight) in votes {
        totals[class_index(label, N_CLASSES)] += weight;
    }
    let mut best = 0;
    for (idx, total) in totals.iter().enumerate().skip(1) {
        if *total > totals[best] {
            best = idx;
        }
    }
    class_label(best)
}

/// Share of votes held by the most common label
pub fn agreement(labels: &[i8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; N_CLASSES];
    for label in labels {
        counts[class_index(*label, N_CLASSES)] += 1;
    }
    let top = counts.iter().copied().max().unwrap_or(0);
    top as f64 / labels.len() as f64
}

/// Scale weights to sum to 1; all-zero (or empty-sum) weights become equal
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / weights.len().max(1) as f64; weights.len()]
    }
}
