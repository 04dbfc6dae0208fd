//! Competitive learning layer
//!
//! A [`Learner`] is a set of unit-length prototype vectors competing for
//! each input. Training is spherical k-means kept honest by a conscience
//! bias and a refractory penalty; labels are attached afterwards by
//! [`Learner::learn_mapping`].

mod learner;
mod mapping;
mod reseed;
mod snapshot;

pub use learner::{Learner, NetworkStats};

/// Epsilon added to input norms before dividing
pub(crate) const NORM_EPSILON: f64 = 1e-8;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn l2_norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Scale to unit length; a zero vector stays a zero vector
pub(crate) fn normalize(v: &[f64]) -> Vec<f64> {
    let norm = l2_norm(v) + NORM_EPSILON;
    v.iter().map(|x| x / norm).collect()
}

/// Rescale a weight column back onto the unit sphere
pub(crate) fn renormalize(v: &mut [f64]) {
    let norm = l2_norm(v);
    if norm > NORM_EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Indices of the `n` highest scores, best first; equal scores keep index order
pub(crate) fn top_n(scores: &[f64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(n);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_guards_zero_vector() {
        let zero = normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(zero, vec![0.0, 0.0, 0.0]);

        let unit = normalize(&[3.0, 4.0]);
        assert!((l2_norm(&unit) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_n_is_stable() {
        let scores = [0.5, 0.9, 0.5, 0.1];
        assert_eq!(top_n(&scores, 3), vec![1, 0, 2]);
        assert_eq!(top_n(&scores, 10).len(), 4);
    }
}
