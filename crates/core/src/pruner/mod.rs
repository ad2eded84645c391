//! Test selection for a CI run.
//!
//! Candidates are detection paths relative to the repository root. Each mode
//! (changed files, an explicit list, whole folders) gathers candidates and
//! hands them to [`DetectionPruner::prune_detections`], which returns the
//! ordered list of test fixture paths the executor should run.

mod classify;
mod summary;

pub use classify::{Classification, classify_by_type};
pub use summary::{SUMMARY_HEADER, SummaryRow, write_summary};

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detection::{
    DETECTIONS_DIR, DetectionDescriptor, detection_path_for_test, is_detection_file, is_ssa,
    is_test_file, test_path_for,
};
use crate::repository::{CommandRunner, DiffRecord, RepositoryAccessor, RepositoryError};

/// Detection types exercised when the run configuration names none
pub const DEFAULT_DETECTION_TYPES: &[&str] = &["Anomaly", "Hunting", "TTP"];

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid detection folder pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to write summary {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Which detections a run accepts.
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Allowed `type` values; empty allows every type
    pub allowed_types: BTreeSet<String>,
    /// Test paths that passed in an earlier run and are skipped
    pub already_passed: HashSet<String>,
}

impl SelectionCriteria {
    pub fn new<T, P>(allowed_types: T, already_passed: P) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            allowed_types: allowed_types.into_iter().map(Into::into).collect(),
            already_passed: already_passed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, kind: &str) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(kind)
    }
}

#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Drop `ssa___*` detections
    pub exclude_ssa: bool,
    /// Write a CSV summary of kept detections here
    pub summary_path: Option<PathBuf>,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            exclude_ssa: true,
            summary_path: None,
        }
    }
}

/// Filters detection candidates within one repository checkout.
pub struct DetectionPruner {
    root: PathBuf,
}

impl DetectionPruner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reduce `candidates` to the ordered, de-duplicated list of test paths to run.
    pub fn prune_detections(
        &self,
        candidates: &[String],
        criteria: &SelectionCriteria,
        options: &PruneOptions,
    ) -> Result<Vec<String>, SelectionError> {
        let mut seen = HashSet::new();
        let mut pruned = Vec::new();
        let mut rows = Vec::new();

        for detection in candidates {
            if !seen.insert(detection.as_str()) {
                continue;
            }

            let ssa = is_ssa(detection);
            if ssa && options.exclude_ssa {
                debug!("Skipping SSA detection {}", detection);
                continue;
            }

            let descriptor = match DetectionDescriptor::load(&self.root.join(detection)) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Skipping detection {}: {}", detection, e);
                    continue;
                }
            };

            match descriptor.kind.as_deref() {
                Some(kind) if criteria.allows(kind) => {}
                Some(kind) => {
                    debug!("Skipping {} detection {}", kind, detection);
                    continue;
                }
                None => {
                    debug!("Skipping detection {} without a type", detection);
                    continue;
                }
            }

            let test = test_path_for(detection);
            if !self.root.join(&test).exists() {
                warn!("Detection {} references {}, but it does not exist", detection, test);
                continue;
            }
            if criteria.already_passed.contains(&test) {
                info!("Ignoring test {} since it already passed", test);
                continue;
            }

            if options.summary_path.is_some() {
                rows.push(SummaryRow::new(detection, &descriptor, ssa));
            }
            pruned.push(test);
        }

        if let Some(path) = &options.summary_path {
            info!("Writing summary of {} detections to {}", rows.len(), path.display());
            write_summary(path, &rows).map_err(|source| SelectionError::Summary {
                path: path.clone(),
                source,
            })?;
        }

        Ok(pruned)
    }

    /// Tests affected by the changes on `branch` relative to the base branch.
    ///
    /// Diffing the base branch against itself yields nothing without calling git.
    pub fn select_changed_files<R: CommandRunner>(
        &self,
        repo: &RepositoryAccessor<R>,
        branch: &str,
        criteria: &SelectionCriteria,
        options: &PruneOptions,
    ) -> Result<Vec<String>, SelectionError> {
        let base = repo.base_branch();
        if branch == base {
            info!(
                "Looking for changed detections by diffing {} against {}; none by construction",
                branch, base
            );
            return self.prune_detections(&[], criteria, options);
        }

        let records = repo.diff(base, branch)?;
        let candidates = changed_detection_candidates(&records);
        info!(
            "{} changed records between {} and {} yield {} detection candidates",
            records.len(),
            base,
            branch,
            candidates.len()
        );
        self.prune_detections(&candidates, criteria, options)
    }

    /// Tests for every detection directly under `detections/<folder>`,
    /// sorted within each folder.
    pub fn select_all_files(
        &self,
        folders: &[String],
        criteria: &SelectionCriteria,
        options: &PruneOptions,
    ) -> Result<Vec<String>, SelectionError> {
        let mut candidates = Vec::new();
        for folder in folders {
            let found = self.detections_in_folder(folder)?;
            debug!("Found {} detections in {}", found.len(), folder);
            candidates.extend(found);
        }
        self.prune_detections(&candidates, criteria, options)
    }

    /// Tests for an explicit list of detections.
    pub fn select_given_files(
        &self,
        detections: &[String],
        criteria: &SelectionCriteria,
        options: &PruneOptions,
    ) -> Result<Vec<String>, SelectionError> {
        self.prune_detections(detections, criteria, options)
    }

    pub fn classify_by_type(&self, paths: &[String], criteria: &SelectionCriteria) -> Classification {
        classify_by_type(&self.root, paths, criteria)
    }

    fn detections_in_folder(&self, folder: &str) -> Result<Vec<String>, SelectionError> {
        let dir = self.root.join(DETECTIONS_DIR).join(folder);
        let pattern = format!(
            "{}/*.yml",
            glob::Pattern::escape(&dir.to_string_lossy())
        );

        let entries = glob::glob(&pattern).map_err(|source| SelectionError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut found: Vec<String> = entries
            .flatten()
            .filter(|path| path.is_file())
            .filter_map(|path| self.relative(&path))
            .collect();
        found.sort();
        Ok(found)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}

/// Detection candidates implied by a diff.
///
/// Changed detections come first in diff order; a changed test adds its
/// detection when not already present.
pub fn changed_detection_candidates(records: &[DiffRecord]) -> Vec<String> {
    let mut detections: Vec<String> = Vec::new();
    let mut tests: Vec<&str> = Vec::new();

    for record in records {
        if is_test_file(&record.path) {
            tests.push(&record.path);
        }
        if is_detection_file(&record.path) {
            detections.push(record.path.clone());
        }
    }

    for test in tests {
        let detection = detection_path_for_test(test);
        if !detections.contains(&detection) {
            detections.push(detection);
        }
    }

    detections
}
