//! Three-way partition of known files by their `type` tag

use std::path::Path;

use tracing::{info, warn};

use super::SelectionCriteria;
use crate::detection::{DescriptorError, DetectionDescriptor};

/// Result of [`classify_by_type`]. Every input path lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub to_test: Vec<String>,
    pub not_to_test: Vec<String>,
    pub errored: Vec<String>,
}

impl Classification {
    pub fn total(&self) -> usize {
        self.to_test.len() + self.not_to_test.len() + self.errored.len()
    }
}

/// Partition `paths` (relative to `root`) by whether their `type` is allowed.
///
/// Unreadable files, malformed YAML and a missing `type` all route to `errored`.
pub fn classify_by_type(root: &Path, paths: &[String], criteria: &SelectionCriteria) -> Classification {
    let mut classification = Classification::default();

    for path in paths {
        let full_path = root.join(path);
        let kind = DetectionDescriptor::load(&full_path)
            .and_then(|descriptor| descriptor.require_type(&full_path).map(str::to_string));

        match kind {
            Ok(kind) if criteria.allows(&kind) => classification.to_test.push(path.clone()),
            Ok(_) => classification.not_to_test.push(path.clone()),
            Err(e @ DescriptorError::MissingType { .. }) => {
                warn!("{}", e);
                classification.errored.push(path.clone());
            }
            Err(e) => {
                warn!("Error on trying to scan {}: {}", path, e);
                classification.errored.push(path.clone());
            }
        }
    }

    info!(
        "Detection information: total files {}, files to test {}, files not to test {}, error files {}",
        paths.len(),
        classification.to_test.len(),
        classification.not_to_test.len(),
        classification.errored.len()
    );

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_partition_is_consistent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("ttp.yml"), "type: TTP\n").unwrap();
        fs::write(root.join("baseline.yml"), "type: Baseline\n").unwrap();
        fs::write(root.join("untyped.yml"), "name: x\n").unwrap();
        fs::write(root.join("broken.yml"), "type: [\n").unwrap();

        let paths: Vec<String> = ["ttp.yml", "baseline.yml", "untyped.yml", "broken.yml", "missing.yml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let criteria = SelectionCriteria::new(["TTP", "Anomaly", "Hunting"], Vec::<String>::new());

        let classification = classify_by_type(root, &paths, &criteria);

        assert_eq!(classification.to_test, vec!["ttp.yml"]);
        assert_eq!(classification.not_to_test, vec!["baseline.yml"]);
        assert_eq!(
            classification.errored,
            vec!["untyped.yml", "broken.yml", "missing.yml"]
        );
        assert_eq!(classification.total(), paths.len());
    }

    #[test]
    fn test_empty_allowed_types_accepts_everything() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("baseline.yml"), "type: Baseline\n").unwrap();

        let classification = classify_by_type(
            temp_dir.path(),
            &["baseline.yml".to_string()],
            &SelectionCriteria::default(),
        );
        assert_eq!(classification.to_test, vec!["baseline.yml"]);
    }
}
