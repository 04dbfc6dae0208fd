//! Labelled feature vectors for training and validation

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Sell / short label
pub const SELL: i8 = -1;
/// Neutral label, also the fallback for unmapped units
pub const HOLD: i8 = 0;
/// Buy / long label
pub const BUY: i8 = 1;

/// Canonical class order, used for tie-breaking and probability layout
pub const CLASS_ORDER: [i8; 3] = [SELL, HOLD, BUY];

/// Number of trading classes
pub const N_CLASSES: usize = 3;

/// Bucket index of a label, clamped into `0..n_classes`
pub fn class_index(label: i8, n_classes: usize) -> usize {
    let idx = (label as i64 + 1).max(0) as usize;
    idx.min(n_classes.saturating_sub(1))
}

/// Label of a bucket index
pub fn class_label(index: usize) -> i8 {
    index as i8 - 1
}

/// Feature vectors with one label each
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    features: Vec<Vec<f64>>,
    labels: Vec<i8>,
}

impl Dataset {
    /// Build a dataset, rejecting ragged rows, length mismatches and labels
    /// outside {-1, 0, 1}
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<i8>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(EngineError::Dataset(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some(first) = features.first() {
            let width = first.len();
            if let Some(bad) = features.iter().position(|row| row.len() != width) {
                return Err(EngineError::Dataset(format!(
                    "row {bad} has {} features, expected {width}",
                    features[bad].len()
                )));
            }
        }
        if let Some(bad) = labels.iter().find(|l| !CLASS_ORDER.contains(l)) {
            return Err(EngineError::Dataset(format!("label {bad} outside {{-1, 0, 1}}")));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Width of every row, if there is one
    pub fn n_features(&self) -> Option<usize> {
        self.features.first().map(Vec::len)
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[i8] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64], i8)> + '_ {
        self.features
            .iter()
            .map(Vec::as_slice)
            .zip(self.labels.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_round_trip() {
        for label in CLASS_ORDER {
            assert_eq!(class_label(class_index(label, N_CLASSES)), label);
        }
        assert_eq!(class_index(5, 3), 2);
        assert_eq!(class_index(-4, 3), 0);
    }

    #[test]
    fn test_rejects_inconsistent_input() {
        assert!(Dataset::new(vec![vec![1.0]], vec![]).is_err());
        assert!(Dataset::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0, 1]).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![2]).is_err());

        let ok = Dataset::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![-1, 1]).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.n_features(), Some(2));
        assert_eq!(ok.iter().nth(1), Some((&[0.0, 1.0][..], 1)));
    }
}
