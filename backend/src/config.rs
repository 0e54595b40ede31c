use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FILE_ID: &str = "1fGa10zgyOjfAvZ-va74HSUMYzts9346C";
pub const DEFAULT_MODEL_PATH: &str = "model.onnx";
pub const DEFAULT_DOWNLOAD_HOST: &str = "https://drive.google.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub file_id: String,
    pub model_path: PathBuf,
    pub labels_file_id: Option<String>,
    pub labels_path: PathBuf,
    pub download_host: String,
    pub classifier_config_path: PathBuf,
    pub content_path: PathBuf,
    pub frontend_dir: PathBuf,
    pub port: u16,
    pub session_ttl: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key-value source; unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_path = PathBuf::from(get("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.into()));
        let labels_path = get("LABELS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_labels_path(&model_path));

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?,
            None => 8081,
        };

        let ttl_minutes = match get("SESSION_TTL_MINUTES") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "SESSION_TTL_MINUTES",
                        value: raw,
                    });
                }
            },
            None => 60,
        };

        let frontend_dir = get("FRONTEND_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| match env::var("CARGO_MANIFEST_DIR") {
                Ok(manifest_dir) => PathBuf::from(format!("{}/../frontend/dist", manifest_dir)),
                Err(_) => PathBuf::from("/usr/src/app/frontend/dist"),
            });

        Ok(Self {
            file_id: get("GDRIVE_FILE_ID").unwrap_or_else(|| DEFAULT_FILE_ID.into()),
            model_path,
            labels_file_id: get("LABELS_FILE_ID"),
            labels_path,
            download_host: get("DOWNLOAD_HOST")
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_HOST.into())
                .trim_end_matches('/')
                .to_string(),
            classifier_config_path: resolve_config_path(
                get("CLASSIFIER_CONFIG").unwrap_or_else(|| "config/classifier.yaml".into()),
            ),
            content_path: resolve_config_path(
                get("CONTENT_PATH").unwrap_or_else(|| "config/label_content.yaml".into()),
            ),
            frontend_dir,
            port,
            session_ttl: Duration::from_secs(ttl_minutes * 60),
        })
    }
}

fn default_labels_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".labels");
    PathBuf::from(name)
}

/// Relative paths are tried against the working directory, then the workspace root.
fn resolve_config_path(raw: String) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() || path.exists() {
        return path;
    }
    match env::var("CARGO_MANIFEST_DIR") {
        Ok(manifest_dir) => {
            let candidate = Path::new(&manifest_dir).join("..").join(&path);
            if candidate.exists() { candidate } else { path }
        }
        Err(_) => path,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// How a non-square image reaches the model's square input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMethod {
    /// Stretch both axes to the input size.
    #[default]
    Squish,
    /// Take the centered square of the shorter side, then scale it.
    Crop,
}

/// Preprocessing the exported model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClassifierConfig {
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub resize_filter: ResizeFilter,
    pub resize_method: ResizeMethod,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            resize_filter: ResizeFilter::Triangle,
            resize_method: ResizeMethod::Squish,
        }
    }
}

impl ClassifierConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str, path)
    }

    fn from_yaml(config_str: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ClassifierConfig =
            serde_yaml::from_str(config_str).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.input_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "input_size",
                value: self.input_size.to_string(),
            });
        }
        if let Some(bad) = self.std.iter().find(|s| **s <= 0.0 || !s.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: "std",
                value: bad.to_string(),
            });
        }
        Ok(())
    }
}
