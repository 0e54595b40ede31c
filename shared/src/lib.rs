use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

pub const MIN_TARGET_SIZE: u32 = 128;
pub const MAX_TARGET_SIZE: u32 = 1024;
pub const DEFAULT_TARGET_SIZE: u32 = 384;
pub const TARGET_SIZE_STEP: u32 = 32;

/// Where an input image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InputSource {
    Camera,
    #[default]
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    pub resize_enabled: bool,
    pub target_size: u32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            resize_enabled: false,
            target_size: DEFAULT_TARGET_SIZE,
        }
    }
}

impl NormalizeOptions {
    /// Returns `None` when `target_size` falls outside the supported range.
    pub fn new(resize_enabled: bool, target_size: u32) -> Option<Self> {
        (MIN_TARGET_SIZE..=MAX_TARGET_SIZE)
            .contains(&target_size)
            .then_some(Self {
                resize_enabled,
                target_size,
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassifierInfo {
    pub labels: Vec<String>,
    pub model_path: String,
    pub file_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProbabilityBar {
    pub label: String,
    pub probability: f32,
    pub percent: f32,
    pub highlighted: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VideoCard {
    pub url: String,
    pub video_id: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContentPanel {
    pub selected_label: String,
    pub label_options: Vec<String>,
    pub texts: Vec<String>,
    pub images: Vec<String>,
    pub videos: Vec<VideoCard>,
    pub is_empty: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReadyFrame {
    pub preview: Option<String>,
    pub predicted_label: String,
    pub bars: Vec<ProbabilityBar>,
    pub content: ContentPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureStage {
    Decode,
    Inference,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FailedFrame {
    pub stage: FailureStage,
    pub message: String,
    pub preview: Option<String>,
}

/// Result of one render pass over a session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Frame {
    Idle { prompt: String },
    Ready(ReadyFrame),
    Failed(FailedFrame),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionView {
    pub session_id: Uuid,
    pub options: NormalizeOptions,
    pub frame: Frame,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ContentLabelRequest {
    pub label: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
