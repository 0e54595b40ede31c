use super::{Classifier, InferenceError, Prediction};
use crate::normalizer::NormalizedImage;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns scripted scores and counts how often it was asked.
pub struct FakeClassifier {
    labels: Vec<String>,
    scores: Mutex<Vec<f32>>,
    fail_with: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(labels: Vec<String>) -> Self {
        let n = labels.len().max(1);
        Self {
            scores: Mutex::new(vec![1.0 / n as f32; labels.len()]),
            labels,
            fail_with: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_scores(labels: &[&str], scores: &[f32]) -> Self {
        let fake = Self::new(labels.iter().map(|s| s.to_string()).collect());
        fake.set_scores(scores);
        fake
    }

    pub fn set_scores(&self, scores: &[f32]) {
        *self.scores.lock().unwrap() = scores.to_vec();
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FakeClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, _image: &NormalizedImage) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(InferenceError::Model(message));
        }
        let scores = self.scores.lock().unwrap().clone();
        Prediction::from_scores(&self.labels, &scores)
    }
}
