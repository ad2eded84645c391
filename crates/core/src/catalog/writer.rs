//! Template stamping for generated detections, tests and lookup data

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;
use uuid::Uuid;

use super::CatalogError;
use super::reader::CatalogEntry;

pub const LOOKUP_FILE: &str = "lolbas_file_path.csv";
pub const DATASET_FILE: &str = "lolbas_dataset.log";
pub const LOOKUP_HEADER: [&str; 3] = ["lolbas_file_name", "lolbas_file_path", "description"];

/// Placeholder substituted in templates
const PLACEHOLDER: &str = "xxx";

/// File stem shared by a binary's generated detection and test.
pub fn artifact_stem(name: &str) -> String {
    format!("ssa___{}", name.to_lowercase().replace('.', "_"))
}

/// Detection name for a binary, e.g. `Certutil.exe` → "... Certutil exe LOLBAS ...".
pub fn detection_title(name: &str) -> String {
    let spaced = name.replace('.', " ");
    let mut chars = spaced.chars();
    let display = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    format!("Windows Rename System Utilities {} LOLBAS in Non Standard Path", display)
}

/// Distinct `<directory>\*` patterns of an entry's known paths, lower-cased.
pub fn parent_patterns(entry: &CatalogEntry) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut patterns = Vec::new();

    for path in entry.known_paths() {
        let mut segments: Vec<&str> = path.split('\\').collect();
        segments.pop();
        let pattern = format!("{}\\*", segments.join("\\")).to_lowercase();
        if seen.insert(pattern.clone()) {
            patterns.push(pattern);
        }
    }

    patterns
}

/// Writes generated artifacts into an existing output directory.
pub struct TemplateWriter {
    output_dir: PathBuf,
    detection_template: Value,
    test_template: Value,
    dataset_template: String,
}

impl TemplateWriter {
    /// Load all three templates up front; any malformed template is fatal.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        detection_template: &Path,
        test_template: &Path,
        dataset_template: &Path,
    ) -> Result<Self, CatalogError> {
        let output_dir = output_dir.into();
        if !output_dir.is_dir() {
            return Err(CatalogError::OutputDir { path: output_dir });
        }

        let detection = load_template(detection_template)?;
        let test = load_template(test_template)?;
        if test.get("tests").and_then(|t| t.get(0)).is_none_or(|t| !t.is_mapping()) {
            return Err(CatalogError::Template {
                path: test_template.to_path_buf(),
                message: "expected a non-empty 'tests' list".to_string(),
            });
        }

        let dataset = fs::read_to_string(dataset_template).map_err(|source| CatalogError::Io {
            path: dataset_template.to_path_buf(),
            source,
        })?;

        Ok(Self {
            output_dir,
            detection_template: detection,
            test_template: test,
            dataset_template: dataset,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<stem>.yml` with the synthesized search.
    pub fn write_detection(&self, entry: &CatalogEntry, search: &str) -> Result<PathBuf, CatalogError> {
        let mut detection = self.detection_template.clone();

        let description = detection
            .get("description")
            .and_then(Value::as_str)
            .map(|d| d.replace(PLACEHOLDER, &entry.name));

        set(&mut detection, "search", search);
        set(&mut detection, "name", &detection_title(&entry.name));
        set(&mut detection, "id", &Uuid::new_v4().to_string());
        set(&mut detection, "date", &Local::now().format("%Y-%m-%d").to_string());
        if let Some(description) = description {
            set(&mut detection, "description", &description);
        }

        let path = self.output_dir.join(format!("{}.yml", artifact_stem(&entry.name)));
        debug!("Writing detection {}", path.display());
        write_yaml(&path, &detection)?;
        Ok(path)
    }

    /// Write `<stem>.test.yml` pointing at the generated detection.
    pub fn write_test(&self, entry: &CatalogEntry) -> Result<PathBuf, CatalogError> {
        let mut test = self.test_template.clone();
        let stem = artifact_stem(&entry.name);
        let title = detection_title(&entry.name);
        let detection_file = format!("endpoint/{}.yml", stem);

        set(&mut test, "file", &detection_file);
        set(&mut test, "name", &format!("{} Unit Test", title));
        if let Some(case) = test.get_mut("tests").and_then(|t| t.get_mut(0)) {
            set(case, "name", &title);
            set(case, "file", &detection_file);
            set(case, "description", &format!(" Test {}", title));
        }

        let path = self.output_dir.join(format!("{}.test.yml", stem));
        debug!("Writing test {}", path.display());
        write_yaml(&path, &test)?;
        Ok(path)
    }

    /// Write the binary → parent directory lookup table.
    pub fn write_lookup(&self, entries: &[CatalogEntry]) -> Result<PathBuf, CatalogError> {
        let path = self.output_dir.join(LOOKUP_FILE);
        let csv_error = |source| CatalogError::Csv {
            path: path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        writer.write_record(LOOKUP_HEADER).map_err(csv_error)?;
        for entry in entries {
            let name = entry.name.to_lowercase();
            for pattern in parent_patterns(entry) {
                writer
                    .write_record([name.as_str(), pattern.as_str(), entry.description.as_str()])
                    .map_err(csv_error)?;
            }
        }
        writer.flush().map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Write one dataset block per binary, newline-joined.
    pub fn write_dataset(&self, entries: &[CatalogEntry]) -> Result<PathBuf, CatalogError> {
        let blocks: Vec<String> = entries
            .iter()
            .map(|entry| {
                let binary = entry.name.to_lowercase().replace(['(', ')'], "");
                self.dataset_template.replace(PLACEHOLDER, &binary)
            })
            .collect();

        let path = self.output_dir.join(DATASET_FILE);
        fs::write(&path, blocks.join("\n")).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn load_template(path: &Path) -> Result<Value, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = serde_yaml::Deserializer::from_str(&content)
        .next()
        .ok_or_else(|| CatalogError::Empty {
            path: path.to_path_buf(),
        })?;
    let value = Value::deserialize(document).map_err(|source| CatalogError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    if !value.is_mapping() {
        return Err(CatalogError::Template {
            path: path.to_path_buf(),
            message: "expected a mapping at the top level".to_string(),
        });
    }
    Ok(value)
}

/// Overwrite (or append) a string field, keeping the template's key order.
fn set(document: &mut Value, key: &str, value: &str) {
    if let Value::Mapping(mapping) = document {
        mapping.insert(Value::String(key.to_string()), Value::String(value.to_string()));
    }
}

fn write_yaml(path: &Path, document: &Value) -> Result<(), CatalogError> {
    let content = serde_yaml::to_string(document).map_err(|source| CatalogError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}
