pub mod onnx;
pub mod provisioner;
pub mod tensor;

#[cfg(test)]
pub mod fake;

use crate::normalizer::NormalizedImage;
use shared::ProbabilityBar;
use std::cmp::Ordering;

const DISTRIBUTION_TOLERANCE: f32 = 1e-4;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced {actual} scores for {expected} labels")]
    Shape { expected: usize, actual: usize },
}

/// One classification of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Picks the arg-max over `scores`, turning them into a distribution first if needed.
    pub fn from_scores(labels: &[String], scores: &[f32]) -> Result<Self, InferenceError> {
        if scores.len() != labels.len() || labels.is_empty() {
            return Err(InferenceError::Shape {
                expected: labels.len(),
                actual: scores.len(),
            });
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(InferenceError::Model("model produced non-finite scores".into()));
        }

        let probabilities = to_distribution(scores);
        // First maximum wins on ties.
        let index = probabilities
            .iter()
            .enumerate()
            .rev()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        Ok(Self {
            label: labels[index].clone(),
            index,
            probabilities,
        })
    }
}

pub trait Classifier: Send + Sync {
    fn labels(&self) -> &[String];

    fn predict(&self, image: &NormalizedImage) -> Result<Prediction, InferenceError>;
}

fn is_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Passes probabilities through and applies softmax to raw logits.
pub fn to_distribution(scores: &[f32]) -> Vec<f32> {
    if is_distribution(scores) {
        return scores.to_vec();
    }
    let max_val = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max_val).exp()).collect();
    let exp_sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / exp_sum).collect()
}

/// Label/probability pairs, highest first. The sort is stable, so ties keep label order.
pub fn sorted_probabilities(labels: &[String], probabilities: &[f32]) -> Vec<(String, f32)> {
    let mut pairs: Vec<(String, f32)> = labels
        .iter()
        .cloned()
        .zip(probabilities.iter().copied())
        .collect();
    sort_descending(&mut pairs);
    pairs
}

pub fn sort_descending(pairs: &mut [(String, f32)]) {
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

pub fn probability_bars(prediction: &Prediction, labels: &[String]) -> Vec<ProbabilityBar> {
    sorted_probabilities(labels, &prediction.probabilities)
        .into_iter()
        .map(|(label, probability)| ProbabilityBar {
            highlighted: label == prediction.label,
            percent: probability * 100.0,
            label,
            probability,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bars_for_three_labels() {
        let labels = labels(&["A", "B", "C"]);
        let prediction = Prediction::from_scores(&labels, &[0.7, 0.2, 0.1]).unwrap();
        assert_eq!(prediction.label, "A");
        assert_eq!(prediction.index, 0);

        let bars = probability_bars(&prediction, &labels);
        let shown: Vec<(&str, f32, bool)> = bars
            .iter()
            .map(|b| (b.label.as_str(), b.percent, b.highlighted))
            .collect();

        assert_eq!(shown.len(), 3);
        assert_eq!(shown[0].0, "A");
        assert!((shown[0].1 - 70.0).abs() < 1e-3);
        assert!(shown[0].2);
        assert_eq!(shown[1].0, "B");
        assert!((shown[1].1 - 20.0).abs() < 1e-3);
        assert!(!shown[1].2);
        assert_eq!(shown[2].0, "C");
        assert!((shown[2].1 - 10.0).abs() < 1e-3);
        assert!(!shown[2].2);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let labels = labels(&["w", "x", "y", "z"]);
        let once = sorted_probabilities(&labels, &[0.1, 0.4, 0.1, 0.4]);
        let mut twice = once.clone();
        sort_descending(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(once[0].0, "x");
        assert_eq!(once[1].0, "z");
    }

    #[test]
    fn test_logits_get_softmax() {
        let labels = labels(&["cat", "dog", "bird"]);
        let prediction = Prediction::from_scores(&labels, &[2.0, 5.0, -1.0]).unwrap();

        assert_eq!(prediction.label, "dog");
        assert_eq!(prediction.index, 1);
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(prediction.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_distribution_passes_through() {
        assert_eq!(to_distribution(&[0.25, 0.75]), vec![0.25, 0.75]);
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let labels = labels(&["a", "b"]);
        let err = Prediction::from_scores(&labels, &[0.2, 0.3, 0.5]).unwrap_err();
        assert!(matches!(err, InferenceError::Shape { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_nan_scores_rejected() {
        let labels = labels(&["a", "b"]);
        let err = Prediction::from_scores(&labels, &[f32::NAN, 0.3]).unwrap_err();
        assert!(matches!(err, InferenceError::Model(_)));
    }
}
