pub mod store;

use crate::classifier::Prediction;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use shared::{InputSource, NormalizeOptions};

/// Raw bytes of the latest capture or upload.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub digest: String,
    pub source: InputSource,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, source: InputSource) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self {
            digest: hex::encode(hasher.finalize()),
            bytes,
            source,
        }
    }
}

/// What a prediction was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionKey {
    pub digest: String,
    pub options: NormalizeOptions,
}

#[derive(Debug, Clone)]
pub struct CachedPrediction {
    pub key: PredictionKey,
    pub prediction: Prediction,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    input: Option<ImageInput>,
    options: NormalizeOptions,
    prediction: Option<CachedPrediction>,
    selected_content_label: Option<String>,
    last_seen: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            input: None,
            options: NormalizeOptions::default(),
            prediction: None,
            selected_content_label: None,
            last_seen: Utc::now(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> Option<&ImageInput> {
        self.input.as_ref()
    }

    pub fn options(&self) -> NormalizeOptions {
        self.options
    }

    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref().map(|cached| &cached.prediction)
    }

    pub fn selected_content_label(&self) -> Option<&str> {
        self.selected_content_label.as_deref()
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Key the current input would be predicted under, if there is an input.
    pub fn current_key(&self) -> Option<PredictionKey> {
        self.input.as_ref().map(|input| PredictionKey {
            digest: input.digest.clone(),
            options: self.options,
        })
    }

    /// The cached prediction when it still matches the current input and options.
    pub fn fresh_prediction(&self) -> Option<&Prediction> {
        let key = self.current_key()?;
        self.prediction
            .as_ref()
            .filter(|cached| cached.key == key)
            .map(|cached| &cached.prediction)
    }

    pub fn set_input(&mut self, input: ImageInput) {
        self.touch();
        self.input = Some(input);
    }

    pub fn set_options(&mut self, options: NormalizeOptions) {
        self.touch();
        self.options = options;
    }

    /// Stores a new prediction; the content panel goes back to following it.
    pub fn set_prediction(&mut self, prediction: Prediction, key: PredictionKey) {
        self.touch();
        self.selected_content_label = None;
        self.prediction = Some(CachedPrediction { key, prediction });
    }

    pub fn set_selected_content_label(&mut self, label: Option<String>) {
        self.touch();
        self.selected_content_label = label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    #[cfg(test)]
    pub fn set_last_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
    }
}
