//! Detection descriptors and the path conventions tying detections to tests.
//!
//! A detection lives at `detections/<domain>/<name>.yml`; its test fixture at
//! `tests/<domain>/<name>.test.yml`. Only the fields consumed by selection are
//! modelled; everything else in the YAML is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use thiserror::Error;

/// Directory (relative to the repository root) holding detections
pub const DETECTIONS_DIR: &str = "detections";

/// Directory (relative to the repository root) holding test fixtures
pub const TESTS_DIR: &str = "tests";

/// Sentinel rendered when a detection carries no MITRE ATT&CK id
pub const MITRE_NONE: &str = "NONE";

const DETECTION_EXT: &str = ".yml";
const TEST_EXT: &str = ".test.yml";

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} is empty")]
    Empty { path: PathBuf },

    #[error("failed to find 'type' in the yaml for {path}")]
    MissingType { path: PathBuf },
}

/// Fields of a detection (or test) YAML consumed by the selection flow.
///
/// Only a readable document and `type` decide selection. The other fields
/// feed the summary table and accept any YAML value, rendered as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionDescriptor {
    /// Category tag, e.g. `TTP`, `Anomaly`, `Hunting`
    #[serde(rename = "type", default, deserialize_with = "optional_text")]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "text")]
    pub name: String,

    #[serde(default, deserialize_with = "text")]
    pub description: String,

    #[serde(default, deserialize_with = "text")]
    pub search: String,

    #[serde(default, deserialize_with = "tags_or_default")]
    pub tags: DetectionTags,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionTags {
    /// Bare scalar or list in the YAML; always a list here
    #[serde(default, deserialize_with = "text_list")]
    pub mitre_attack_id: Vec<String>,

    #[serde(default, deserialize_with = "text")]
    pub security_domain: String,
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items.iter().map(render).collect::<Vec<_>>().join(", "),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(render(&Value::deserialize(deserializer)?))
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(render(&value)),
    })
}

fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(render)
            .collect(),
        value => vec![render(&value)],
    })
}

/// A `tags` value that is not a mapping (e.g. `tags:` left empty) counts as no tags.
fn tags_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DetectionTags, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(DetectionTags::deserialize(value).unwrap_or_default())
}

impl DetectionDescriptor {
    /// Load the first YAML document of `path`.
    ///
    /// A missing `type` is not an error here; see [`DetectionDescriptor::require_type`].
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, DescriptorError> {
        let document = serde_yaml::Deserializer::from_str(content)
            .next()
            .ok_or_else(|| DescriptorError::Empty {
                path: path.to_path_buf(),
            })?;

        Self::deserialize(document).map_err(|source| DescriptorError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The `type` field, or `MissingType` when absent.
    pub fn require_type(&self, path: &Path) -> Result<&str, DescriptorError> {
        self.kind
            .as_deref()
            .ok_or_else(|| DescriptorError::MissingType {
                path: path.to_path_buf(),
            })
    }

    /// MITRE ids rendered for the summary table.
    pub fn mitre_attack_id(&self) -> String {
        if self.tags.mitre_attack_id.is_empty() {
            MITRE_NONE.to_string()
        } else {
            self.tags.mitre_attack_id.join(", ")
        }
    }
}

/// Whether the detection runs on the SSA engine (`ssa___*` naming).
pub fn is_ssa(detection: &str) -> bool {
    Path::new(detection)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("ssa"))
}

/// Test fixture path for a detection path.
///
/// Every `detections` substring becomes `tests` and the `.yml` extension
/// becomes `.test.yml`.
pub fn test_path_for(detection: &str) -> String {
    let stem = detection.strip_suffix(DETECTION_EXT).unwrap_or(detection);
    format!("{}{}", stem.replace(DETECTIONS_DIR, TESTS_DIR), TEST_EXT)
}

/// Detection path a changed test fixture refers to.
///
/// Uses the last two segments (`<domain>/<file>`), so nested or prefixed test
/// paths still resolve under the detections root.
pub fn detection_path_for_test(test: &str) -> String {
    let segments: Vec<&str> = test.split('/').filter(|s| !s.is_empty()).collect();
    let tail = segments[segments.len().saturating_sub(2)..]
        .join("/")
        .replacen(TESTS_DIR, DETECTIONS_DIR, 1);
    let stem = tail.strip_suffix(TEST_EXT).unwrap_or(&tail);
    format!("{}/{}{}", DETECTIONS_DIR, stem, DETECTION_EXT)
}

pub fn is_test_file(path: &str) -> bool {
    path.contains(TESTS_DIR) && path.ends_with(TEST_EXT)
}

pub fn is_detection_file(path: &str) -> bool {
    path.contains(DETECTIONS_DIR) && path.ends_with(DETECTION_EXT)
}
