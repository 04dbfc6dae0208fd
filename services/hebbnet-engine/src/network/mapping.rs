//! Post-hoc labelling of units from validation data

use super::Learner;
use crate::dataset::{class_index, class_label, Dataset, N_CLASSES};
use crate::error::{EngineError, Result};

impl Learner {
    /// Label every unit with the class it wins most often on `features`.
    ///
    /// Returns the `hidden_size x n_classes` vote matrix. Units that never win
    /// stay unmapped and vote ties go to the lowest class index. Any earlier
    /// mapping is discarded; weights are not touched.
    pub fn learn_mapping(
        &mut self,
        features: &[Vec<f64>],
        labels: &[i8],
        n_classes: usize,
    ) -> Result<Vec<Vec<u32>>> {
        if features.len() != labels.len() {
            return Err(EngineError::Dataset(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if n_classes == 0 {
            return Err(EngineError::config("n_classes must be positive"));
        }

        let mut votes = vec![vec![0u32; n_classes]; self.hidden_size()];
        for (x, &label) in features.iter().zip(labels) {
            let winner = self.winner(x)?;
            votes[winner][class_index(label, n_classes)] += 1;
        }

        self.class_map = votes
            .iter()
            .map(|row| {
                let (best, count) = row
                    .iter()
                    .enumerate()
                    .fold((0, 0), |acc, (c, &v)| if v > acc.1 { (c, v) } else { acc });
                (count > 0).then(|| class_label(best))
            })
            .collect();

        Ok(votes)
    }

    pub fn learn_mapping_from(&mut self, validation: &Dataset) -> Result<Vec<Vec<u32>>> {
        self.learn_mapping(validation.features(), validation.labels(), N_CLASSES)
    }

    /// Fraction of `data` whose label `predict` reproduces; 0 on an empty set
    pub fn accuracy(&self, data: &Dataset) -> Result<f64> {
        if data.is_empty() {
            return Ok(0.0);
        }
        let mut correct = 0usize;
        for (x, label) in data.iter() {
            if self.predict(x)? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / data.len() as f64)
    }

    /// Drop every unit label
    pub fn clear_mapping(&mut self) {
        self.class_map.fill(None);
    }
}
