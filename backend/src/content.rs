use serde::Deserialize;
use shared::{ContentPanel, VideoCard};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use url::Url;

pub const MAX_ITEMS_PER_KIND: usize = 3;
const VIDEO_ID_LEN: usize = 11;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
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
    #[error("Content entry with an empty label in {}", .path.display())]
    EmptyLabel { path: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct RawEntry {
    texts: Vec<String>,
    images: Vec<String>,
    videos: Vec<String>,
}

/// Reference material shown for one label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentEntry {
    pub texts: Vec<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl ContentEntry {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.images.is_empty() && self.videos.is_empty()
    }
}

/// Static label to content mapping.
#[derive(Debug, Clone, Default)]
pub struct ContentTable {
    entries: HashMap<String, ContentEntry>,
}

impl ContentTable {
    pub fn load(path: &Path, labels: &[String]) -> Result<Self, ContentError> {
        let text = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path, labels)
    }

    fn from_yaml(text: &str, path: &Path, labels: &[String]) -> Result<Self, ContentError> {
        let raw: Option<BTreeMap<String, RawEntry>> =
            serde_yaml::from_str(text).map_err(|source| ContentError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = HashMap::new();
        for (label, raw_entry) in raw.unwrap_or_default() {
            let label = label.trim().to_string();
            if label.is_empty() {
                return Err(ContentError::EmptyLabel {
                    path: path.to_path_buf(),
                });
            }
            if !labels.is_empty() && !labels.contains(&label) {
                log::warn!("Content for {:?} does not match any classifier label", label);
            }
            for url in raw_entry.images.iter().chain(raw_entry.videos.iter()) {
                if !url.trim().is_empty() && Url::parse(url.trim()).is_err() {
                    log::warn!("Content for {:?} has a malformed URL: {}", label, url);
                }
            }
            entries.insert(label, raw_entry.into());
        }

        log::info!("Loaded reference content for {} labels", entries.len());
        Ok(Self { entries })
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ContentEntry)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Content for `label`, at most three non-blank items per kind. Unknown labels give an empty entry.
    pub fn lookup(&self, label: &str) -> ContentEntry {
        match self.entries.get(label) {
            Some(entry) => ContentEntry {
                texts: clean(&entry.texts),
                images: clean(&entry.images),
                videos: clean(&entry.videos),
            },
            None => ContentEntry::default(),
        }
    }

    pub fn panel(&self, selected_label: &str, label_options: &[String]) -> ContentPanel {
        let entry = self.lookup(selected_label);
        ContentPanel {
            selected_label: selected_label.to_string(),
            label_options: label_options.to_vec(),
            is_empty: entry.is_empty(),
            videos: entry.videos.iter().map(|url| video_card(url)).collect(),
            texts: entry.texts,
            images: entry.images,
        }
    }
}

impl From<RawEntry> for ContentEntry {
    fn from(raw: RawEntry) -> Self {
        for (kind, items) in [("texts", &raw.texts), ("images", &raw.images), ("videos", &raw.videos)] {
            let usable = items.iter().filter(|s| !s.trim().is_empty()).count();
            if usable > MAX_ITEMS_PER_KIND {
                log::warn!("Only the first {} {} of {} are shown", MAX_ITEMS_PER_KIND, kind, usable);
            }
        }
        Self {
            texts: raw.texts,
            images: raw.images,
            videos: raw.videos,
        }
    }
}

fn clean(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|s| !s.trim().is_empty())
        .take(MAX_ITEMS_PER_KIND)
        .cloned()
        .collect()
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extracts the 11-character id from the common YouTube link shapes.
pub fn video_id(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" | "music.youtube.com" => {
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed" | "shorts" | "v" | "live") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

pub fn video_card(link: &str) -> VideoCard {
    let video_id = video_id(link);
    VideoCard {
        url: link.to_string(),
        thumbnail_url: video_id.as_deref().map(thumbnail_url),
        video_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> ContentTable {
        ContentTable::from_entries([(
            "cat".to_string(),
            ContentEntry {
                texts: strings(&["one", "  ", "", " two ", "three", "four"]),
                images: strings(&["https://example.com/a.jpg", "not a url"]),
                videos: strings(&["https://youtu.be/dQw4w9WgXcQ", "https://example.com/clip"]),
            },
        )])
    }

    #[test]
    fn test_absent_label_is_empty() {
        let entry = table().lookup("giraffe");
        assert_eq!(entry, ContentEntry::default());
        assert!(entry.is_empty());
    }

    #[test]
    fn test_filters_and_truncates() {
        let entry = table().lookup("cat");
        assert_eq!(entry.texts, strings(&["one", " two ", "three"]));
        assert_eq!(entry.images, strings(&["https://example.com/a.jpg", "not a url"]));
        assert_eq!(entry.videos.len(), 2);
    }

    #[test]
    fn test_items_are_passed_through_verbatim() {
        let padded = "  https://youtu.be/dQw4w9WgXcQ\n";
        let table = ContentTable::from_entries([(
            "dog".to_string(),
            ContentEntry {
                texts: strings(&["\tindented line", "   "]),
                images: strings(&[" https://example.com/dog.png "]),
                videos: strings(&[padded]),
            },
        )]);

        let entry = table.lookup("dog");
        assert_eq!(entry.texts, strings(&["\tindented line"]));
        assert_eq!(entry.images, strings(&[" https://example.com/dog.png "]));
        assert_eq!(entry.videos, strings(&[padded]));

        let panel = table.panel("dog", &strings(&["dog"]));
        assert_eq!(panel.videos[0].url, padded);
        assert_eq!(panel.videos[0].video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_video_id_short_link() {
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            thumbnail_url("dQw4w9WgXcQ"),
            "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[test]
    fn test_video_id_other_shapes() {
        for link in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ?feature=share",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
        ] {
            assert_eq!(video_id(link).as_deref(), Some("dQw4w9WgXcQ"), "{}", link);
        }
    }

    #[test]
    fn test_video_id_absent() {
        for link in [
            "https://example.com/clip",
            "https://youtu.be/short",
            "https://www.youtube.com/watch?v=toolongidentifier",
            "https://www.youtube.com/channel/UC1234567890",
            "not a url at all",
        ] {
            assert_eq!(video_id(link), None, "{}", link);
        }
    }

    #[test]
    fn test_panel_marks_thumbnails() {
        let labels = strings(&["cat", "dog"]);
        let panel = table().panel("cat", &labels);

        assert_eq!(panel.selected_label, "cat");
        assert_eq!(panel.label_options, labels);
        assert!(!panel.is_empty);
        assert_eq!(
            panel.videos[0].thumbnail_url.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(panel.videos[1].video_id, None);
        assert_eq!(panel.videos[1].thumbnail_url, None);
        assert_eq!(panel.videos[1].url, "https://example.com/clip");

        assert!(table().panel("dog", &labels).is_empty);
    }

    #[test]
    fn test_yaml_table() {
        let yaml = r#"
cat:
  texts: ["Cats purr.", ""]
  videos: ["https://youtu.be/dQw4w9WgXcQ"]
dog: {}
"#;
        let table = ContentTable::from_yaml(yaml, Path::new("c.yaml"), &strings(&["cat"])).unwrap();
        assert_eq!(table.lookup("cat").texts, strings(&["Cats purr."]));
        assert!(table.lookup("dog").is_empty());
    }

    #[test]
    fn test_yaml_rejects_unknown_kind() {
        let yaml = "cat:\n  audio: [\"meow.mp3\"]\n";
        let err = ContentTable::from_yaml(yaml, Path::new("c.yaml"), &[]).unwrap_err();
        assert!(matches!(err, ContentError::Parse { .. }));
    }

    #[test]
    fn test_yaml_rejects_blank_label() {
        let yaml = "\"  \":\n  texts: [\"x\"]\n";
        let err = ContentTable::from_yaml(yaml, Path::new("c.yaml"), &[]).unwrap_err();
        assert!(matches!(err, ContentError::EmptyLabel { .. }));
    }

    #[test]
    fn test_empty_yaml_document() {
        let table = ContentTable::from_yaml("", Path::new("c.yaml"), &[]).unwrap();
        assert!(table.lookup("anything").is_empty());
    }
}
