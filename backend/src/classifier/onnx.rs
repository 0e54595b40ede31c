use super::tensor::image_to_array;
use super::{Classifier, InferenceError, Prediction};
use crate::config::ClassifierConfig;
use crate::normalizer::NormalizedImage;
use std::path::Path;
use tract_onnx::prelude::*;

type Plan = TypedRunnableModel<TypedModel>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to load model {path}: {message}")]
    Model { path: String, message: String },
    #[error("Model declares {outputs} outputs but {labels} labels were provided")]
    LabelMismatch { outputs: usize, labels: usize },
    #[error("Label list is empty")]
    NoLabels,
}

/// ONNX classifier executed on the CPU by tract.
pub struct OnnxClassifier {
    plan: Plan,
    labels: Vec<String>,
    config: ClassifierConfig,
}

impl OnnxClassifier {
    pub fn load(
        model_path: &Path,
        labels: Vec<String>,
        config: ClassifierConfig,
    ) -> Result<Self, LoadError> {
        if labels.is_empty() {
            return Err(LoadError::NoLabels);
        }

        let side = config.input_size as usize;
        let model_err = |e: TractError| LoadError::Model {
            path: model_path.display().to_string(),
            message: format!("{:#}", e),
        };

        log::info!(
            "Loading classifier from {} on CPU (input 1x3x{}x{})",
            model_path.display(),
            side,
            side
        );

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(model_err)?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(model_err)?
            .into_optimized()
            .map_err(model_err)?;

        if let Some(outputs) = static_output_width(&model) {
            if outputs != labels.len() {
                return Err(LoadError::LabelMismatch {
                    outputs,
                    labels: labels.len(),
                });
            }
        }

        let plan = model.into_runnable().map_err(model_err)?;
        Ok(Self {
            plan,
            labels,
            config,
        })
    }

    fn scores(&self, image: &NormalizedImage) -> Result<Vec<f32>, InferenceError> {
        let array = image_to_array(image, &self.config);
        let data = array
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocessing("input array is not contiguous".into()))?;
        let input = Tensor::from_shape(array.shape(), data)
            .map_err(|e| InferenceError::Preprocessing(format!("{:#}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Model(format!("{:#}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Model("model returned no outputs".into()))?
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Model(format!("{:#}", e)))?;

        Ok(output.iter().copied().collect())
    }
}

/// Last dimension of the first output when it is known without running the model.
fn static_output_width(model: &TypedModel) -> Option<usize> {
    let outlet = *model.outputs.first()?;
    let fact = model.outlet_fact(outlet).ok()?;
    let shape = fact.shape.as_concrete()?;
    shape.last().copied()
}

impl Classifier for OnnxClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, image: &NormalizedImage) -> Result<Prediction, InferenceError> {
        let scores = self.scores(image)?;
        Prediction::from_scores(&self.labels, &scores)
    }
}
