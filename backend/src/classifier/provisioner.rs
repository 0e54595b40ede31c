//! Fetches the classifier artifacts on first use and keeps the loaded model for
//! the lifetime of the process.
//!
//! Artifacts are addressed by an opaque file id on a host that follows the
//! `<host>/uc?id=<id>` download convention. A file that already exists locally
//! is never downloaded again.

use super::Classifier;
use super::onnx::{LoadError, OnnxClassifier};
use crate::config::{ClassifierConfig, Settings};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Download of {id} failed: {message}")]
    Download { id: String, message: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to load classifier: {0}")]
    Load(#[from] LoadError),
    #[error("Invalid label list {}: {message}", .path.display())]
    Labels { path: PathBuf, message: String },
    #[error("Classifier loader task failed: {0}")]
    Task(String),
}

/// Where one artifact comes from and where it lives locally.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Option<String>,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub labels: PathBuf,
}

pub type Loader =
    fn(&ArtifactPaths, &ClassifierConfig) -> Result<Arc<dyn Classifier>, ProvisionError>;

pub struct ModelProvisioner {
    client: reqwest::Client,
    host: String,
    model: Artifact,
    labels: Artifact,
    config: ClassifierConfig,
    loader: Loader,
    classifier: OnceCell<Arc<dyn Classifier>>,
}

impl ModelProvisioner {
    pub fn new(settings: &Settings, config: ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: settings.download_host.clone(),
            model: Artifact {
                id: Some(settings.file_id.clone()),
                path: settings.model_path.clone(),
            },
            labels: Artifact {
                id: settings.labels_file_id.clone(),
                path: settings.labels_path.clone(),
            },
            config,
            loader: load_onnx,
            classifier: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// The shared classifier, downloaded and loaded on the first call only.
    pub async fn classifier(&self) -> Result<Arc<dyn Classifier>, ProvisionError> {
        self.classifier
            .get_or_try_init(|| self.provision())
            .await
            .map(Arc::clone)
    }

    async fn provision(&self) -> Result<Arc<dyn Classifier>, ProvisionError> {
        self.ensure_artifact(&self.model).await?;
        self.ensure_artifact(&self.labels).await?;

        let paths = ArtifactPaths {
            model: self.model.path.clone(),
            labels: self.labels.path.clone(),
        };
        let config = self.config.clone();
        let loader = self.loader;

        let classifier = tokio::task::spawn_blocking(move || loader(&paths, &config))
            .await
            .map_err(|e| ProvisionError::Task(e.to_string()))??;

        log::info!("Classifier ready with labels: {}", classifier.labels().join(", "));
        Ok(classifier)
    }

    /// Downloads `artifact` unless its local path already exists.
    pub async fn ensure_artifact(&self, artifact: &Artifact) -> Result<(), ProvisionError> {
        if artifact.path.exists() {
            log::info!("Using cached artifact {}", artifact.path.display());
            return Ok(());
        }
        let Some(id) = artifact.id.as_deref() else {
            // Nothing to fetch; loading reports the missing file.
            return Ok(());
        };

        let url = download_url(&self.host, id);
        log::info!("Downloading {} to {}", url, artifact.path.display());

        let partial = partial_path(&artifact.path);
        if let Err(e) = self.download_to(id, &url, &partial).await {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(e);
        }
        tokio::fs::rename(&partial, &artifact.path)
            .await
            .map_err(|source| ProvisionError::Io {
                path: artifact.path.clone(),
                source,
            })?;

        match sha256_of(&artifact.path) {
            Ok(digest) => log::info!("Stored {} (sha256 {})", artifact.path.display(), digest),
            Err(e) => log::warn!("Could not hash {}: {}", artifact.path.display(), e),
        }
        Ok(())
    }

    async fn download_to(&self, id: &str, url: &str, dest: &Path) -> Result<(), ProvisionError> {
        let download_err = |message: String| ProvisionError::Download {
            id: id.to_string(),
            message,
        };

        let mut response = self.fetch(url).await.map_err(download_err)?;

        if is_html(&response) {
            // Large files answer with a confirmation page instead of the payload.
            let page = response.text().await.map_err(|e| download_err(e.to_string()))?;
            let confirm_url = confirmation_url(&page)
                .ok_or_else(|| download_err("host returned an HTML page without a download form".into()))?;
            log::info!("Following download confirmation for {}", id);
            response = self.fetch(confirm_url.as_str()).await.map_err(download_err)?;
            if is_html(&response) {
                return Err(download_err("confirmation did not yield the file".into()));
            }
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ProvisionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let io_err = |source: std::io::Error| ProvisionError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let total = response.content_length();
        let mut downloaded: u64 = 0;
        let mut next_report: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| download_err(e.to_string()))? {
            file.write_all(&chunk).await.map_err(io_err)?;
            downloaded += chunk.len() as u64;
            if downloaded >= next_report {
                match total {
                    Some(total) if total > 0 => {
                        log::info!("{}: {:.0}%", id, downloaded as f64 * 100.0 / total as f64)
                    }
                    _ => log::info!("{}: {} bytes", id, downloaded),
                }
                next_report = downloaded + 8 * 1024 * 1024;
            }
        }
        file.flush().await.map_err(io_err)?;

        if downloaded == 0 {
            return Err(download_err("host returned an empty body".into()));
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        Ok(response)
    }
}

pub fn download_url(host: &str, id: &str) -> String {
    format!("{}/uc?id={}", host.trim_end_matches('/'), urlencoding::encode(id))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Rebuilds the target of the download form found on a confirmation page.
pub fn confirmation_url(page: &str) -> Option<Url> {
    let form_start = page.find("id=\"download-form\"")?;
    let form_open = page[..form_start].rfind("<form")?;
    let form = &page[form_open..];
    let form = &form[..form.find("</form>").unwrap_or(form.len())];

    let action = attribute(form, "action")?.replace("&amp;", "&");
    let mut url = Url::parse(&action).ok()?;

    let mut rest = form;
    let mut params = Vec::new();
    while let Some(pos) = rest.find("<input") {
        rest = &rest[pos + "<input".len()..];
        let tag = &rest[..rest.find('>').unwrap_or(rest.len())];
        if let (Some(name), Some(value)) = (attribute(tag, "name"), attribute(tag, "value")) {
            params.push((name.to_string(), value.to_string()));
        }
    }
    if params.is_empty() {
        return None;
    }
    url.query_pairs_mut().extend_pairs(params);
    Some(url)
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let mut search = tag;
    loop {
        let pos = search.find(&needle)?;
        // Skip matches that are the tail of a longer attribute name.
        let preceded_by_space = search[..pos]
            .chars()
            .last()
            .is_none_or(|c| c.is_whitespace());
        let start = pos + needle.len();
        if preceded_by_space {
            let end = search[start..].find('"')?;
            return Some(&search[start..start + end]);
        }
        search = &search[start..];
    }
}

fn sha256_of(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Reads one label per line, ignoring blank lines.
pub fn read_labels(path: &Path) -> Result<Vec<String>, ProvisionError> {
    let text = std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        return Err(ProvisionError::Labels {
            path: path.to_path_buf(),
            message: "no labels found".into(),
        });
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
        return Err(ProvisionError::Labels {
            path: path.to_path_buf(),
            message: format!("duplicate label {:?}", dup),
        });
    }
    Ok(labels)
}

fn load_onnx(
    paths: &ArtifactPaths,
    config: &ClassifierConfig,
) -> Result<Arc<dyn Classifier>, ProvisionError> {
    let labels = read_labels(&paths.labels)?;
    let classifier = OnnxClassifier::load(&paths.model, labels, config.clone())?;
    Ok(Arc::new(classifier))
}
