//! LOLBAS detection generation.
//!
//! A catalog checkout is read into [`CatalogEntry`] values, each entry with a
//! known install directory gets a "binary in non-standard path" search, and
//! the [`TemplateWriter`] stamps detection and test YAML plus two aggregate
//! files (a path lookup and a sample dataset).
//!
//! Generation is all-or-nothing: any malformed manifest or template aborts
//! the run. Outputs already written are left in place.

mod reader;
mod search;
mod writer;

pub use reader::{CATEGORIES, CatalogEntry, CatalogReader, FullPath, load_manifest};
pub use search::{PathStrategy, SearchSynthesizer, directory_pattern, path_condition};
pub use writer::{
    DATASET_FILE, LOOKUP_FILE, LOOKUP_HEADER, TemplateWriter, artifact_stem, detection_title,
    parent_patterns,
};

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} is empty")]
    Empty { path: PathBuf },

    #[error("invalid manifest pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid template {path}: {message}")]
    Template { path: PathBuf, message: String },

    #[error("{path} is not a directory")]
    OutputDir { path: PathBuf },

    #[error("failed to write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What a generation run produced
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub entries: usize,
    pub detections: Vec<PathBuf>,
    pub tests: Vec<PathBuf>,
    /// Binaries without a known directory, hence without a detection
    pub skipped: Vec<String>,
    pub lookup: PathBuf,
    pub dataset: PathBuf,
}

/// Generate every artifact for `entries`.
pub fn generate(
    entries: &[CatalogEntry],
    synthesizer: &SearchSynthesizer,
    writer: &TemplateWriter,
) -> Result<GenerationReport, CatalogError> {
    let mut report = GenerationReport {
        entries: entries.len(),
        ..Default::default()
    };

    let mut searchable = Vec::new();
    for entry in entries {
        match synthesizer.synthesize(entry) {
            Some(search) => searchable.push((entry, search)),
            None => {
                debug!("No known path for {}, skipping", entry.name);
                report.skipped.push(entry.name.clone());
            }
        }
    }

    info!(
        "Writing {} detections to {}",
        searchable.len(),
        writer.output_dir().display()
    );
    for (entry, search) in &searchable {
        report.detections.push(writer.write_detection(entry, search)?);
    }

    info!("Writing {} tests to {}", searchable.len(), writer.output_dir().display());
    for (entry, _) in &searchable {
        report.tests.push(writer.write_test(entry)?);
    }

    report.dataset = writer.write_dataset(entries)?;
    info!("Wrote attack data samples to {}", report.dataset.display());

    report.lookup = writer.write_lookup(entries)?;
    info!("Wrote path lookup to {}", report.lookup.display());

    Ok(report)
}
