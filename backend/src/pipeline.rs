use crate::classifier::{Classifier, Prediction, probability_bars};
use crate::content::ContentTable;
use crate::normalizer::{self, NormalizedImage};
use crate::session::SessionState;
use shared::{FailedFrame, FailureStage, Frame, ReadyFrame};

pub const IDLE_PROMPT: &str =
    "Take a snapshot with the camera or upload an image to start the analysis.";

/// One render pass over a session.
///
/// With no input the classifier is never touched. Otherwise the stored bytes
/// are normalized on every pass, but inference only runs when the cached
/// prediction no longer matches the input and options. Failures stop the pass
/// and leave the previously stored prediction in place.
pub fn render_frame(
    state: &mut SessionState,
    classifier: &dyn Classifier,
    content: &ContentTable,
) -> Frame {
    let Some(input) = state.input() else {
        return Frame::Idle {
            prompt: IDLE_PROMPT.to_string(),
        };
    };

    let options = state.options();
    log::debug!("Rendering {} input {} with {:?}", input.source, short(&input.digest), options);
    let image = match normalizer::normalize(&input.bytes, &options) {
        Ok(image) => image,
        Err(e) => {
            log::error!("Decode failed for input {}: {}", short(&input.digest), e);
            return failed(FailureStage::Decode, e.to_string(), None);
        }
    };

    let preview = match image.to_data_url() {
        Ok(preview) => Some(preview),
        Err(e) => {
            log::warn!("Preview encoding failed for input {}: {}", short(&input.digest), e);
            None
        }
    };

    let cached = state.fresh_prediction().cloned();
    let prediction = match cached {
        Some(prediction) => {
            log::debug!("Reusing prediction {:?}", prediction.label);
            prediction
        }
        None => match predict(state, classifier, &image) {
            Ok(prediction) => prediction,
            Err(message) => return failed(FailureStage::Inference, message, preview),
        },
    };

    let labels = classifier.labels();
    let selected = state
        .selected_content_label()
        .unwrap_or(prediction.label.as_str())
        .to_string();

    Frame::Ready(ReadyFrame {
        preview,
        bars: probability_bars(&prediction, labels),
        content: content.panel(&selected, labels),
        predicted_label: prediction.label,
    })
}

fn predict(
    state: &mut SessionState,
    classifier: &dyn Classifier,
    image: &NormalizedImage,
) -> Result<Prediction, String> {
    let key = state
        .current_key()
        .ok_or_else(|| "no input to analyze".to_string())?;

    let prediction = classifier.predict(image).map_err(|e| {
        log::error!("Inference failed for input {}: {}", short(&key.digest), e);
        e.to_string()
    })?;

    log::info!(
        "Predicted {:?} ({:.2}%) for input {}",
        prediction.label,
        prediction.probabilities.get(prediction.index).copied().unwrap_or(0.0) * 100.0,
        short(&key.digest)
    );
    state.set_prediction(prediction.clone(), key);
    Ok(prediction)
}

fn failed(stage: FailureStage, message: String, preview: Option<String>) -> Frame {
    Frame::Failed(FailedFrame {
        stage,
        message,
        preview,
    })
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}
