use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use contentci_core::catalog::{self, CatalogReader, PathStrategy, SearchSynthesizer, TemplateWriter};
use tracing::info;

#[derive(Args)]
pub struct GenerateArgs {
    /// LOLBAS checkout containing yml/<category>/*.yml
    #[arg(short, long, default_value = "LOLBAS")]
    pub lolbas_path: PathBuf,

    /// Existing directory receiving the generated files
    #[arg(short, long, default_value = "output")]
    pub output_path: PathBuf,

    #[arg(long, default_value = "ba_detection_template.yml")]
    pub detection_template: PathBuf,

    #[arg(long, default_value = "ba_test_template.yml")]
    pub test_template: PathBuf,

    #[arg(long, default_value = "test_dataset_template.log")]
    pub dataset_template: PathBuf,

    /// Which known directories of a binary the search excludes
    #[arg(long, value_enum, default_value_t = Strategy::LastOnly)]
    pub path_strategy: Strategy,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Strategy {
    LastOnly,
    AllPaths,
}

impl From<Strategy> for PathStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::LastOnly => PathStrategy::LastOnly,
            Strategy::AllPaths => PathStrategy::AllPaths,
        }
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let writer = TemplateWriter::new(
        &args.output_path,
        &args.detection_template,
        &args.test_template,
        &args.dataset_template,
    )
    .context("Failed to prepare templates")?;

    let entries = CatalogReader::new(&args.lolbas_path)
        .read()
        .with_context(|| format!("Failed to read catalog {}", args.lolbas_path.display()))?;
    info!("Read {} catalog entries", entries.len());

    let synthesizer = SearchSynthesizer::new(args.path_strategy.into());
    let report = catalog::generate(&entries, &synthesizer, &writer)?;

    println!(
        "Generated {} detections and {} tests for {} binaries ({} without a known path)",
        report.detections.len(),
        report.tests.len(),
        report.entries,
        report.skipped.len()
    );
    println!("  Lookup: {}", report.lookup.display());
    println!("  Dataset: {}", report.dataset.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let manifest = root.join("LOLBAS/yml/OSBinaries/Certutil.yml");
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(
            &manifest,
            "Name: Certutil.exe\nDescription: Certificate tool\nFull_Path:\n  - Path: C:\\Windows\\System32\\certutil.exe\n",
        )
        .unwrap();
        fs::write(root.join("detection.yml"), "name: x\ndescription: xxx\nsearch: x\n").unwrap();
        fs::write(root.join("test.yml"), "name: x\ntests:\n- name: x\n").unwrap();
        fs::write(root.join("dataset.log"), "xxx").unwrap();
        fs::create_dir(root.join("out")).unwrap();

        run(GenerateArgs {
            lolbas_path: root.join("LOLBAS"),
            output_path: root.join("out"),
            detection_template: root.join("detection.yml"),
            test_template: root.join("test.yml"),
            dataset_template: root.join("dataset.log"),
            path_strategy: Strategy::AllPaths,
        })
        .unwrap();

        assert!(root.join("out/ssa___certutil_exe.yml").exists());
        assert!(root.join("out/ssa___certutil_exe.test.yml").exists());
        assert!(root.join("out/lolbas_file_path.csv").exists());
    }

    #[test]
    fn test_missing_output_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let result = run(GenerateArgs {
            lolbas_path: root.join("LOLBAS"),
            output_path: root.join("missing"),
            detection_template: root.join("detection.yml"),
            test_template: root.join("test.yml"),
            dataset_template: root.join("dataset.log"),
            path_strategy: Strategy::LastOnly,
        });
        assert!(result.is_err());
    }
}
