//! LOLBAS manifest loading

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::CatalogError;

/// Category directories under `<root>/yml`
pub const CATEGORIES: &[&str] = &["OSBinaries", "OSLibraries", "OSScripts", "OtherMSBinaries"];

/// Marks a concrete path on the system drive
static DRIVE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)c:").expect("valid regex"));

/// One binary manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Full_Path", default)]
    pub full_paths: Vec<FullPath>,

    /// Manifest the entry was read from
    #[serde(skip)]
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullPath {
    #[serde(rename = "Path", default)]
    pub path: Option<String>,
}

impl CatalogEntry {
    /// Declared paths on a drive; placeholders like `N/A` are dropped.
    pub fn known_paths(&self) -> Vec<&str> {
        self.full_paths
            .iter()
            .filter_map(|p| p.path.as_deref())
            .filter(|p| DRIVE_MARKER.is_match(p))
            .collect()
    }
}

/// Reads every manifest of a catalog checkout.
pub struct CatalogReader {
    root: PathBuf,
}

impl CatalogReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load all manifests; the first malformed one aborts the read.
    pub fn read(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut entries = Vec::new();

        for category in CATEGORIES {
            let files = self.manifests_in(category)?;
            debug!("Found {} manifests in {}", files.len(), category);

            for file in files {
                debug!("Processing manifest {}", file.display());
                entries.push(load_manifest(&file)?);
            }
        }

        Ok(entries)
    }

    fn manifests_in(&self, category: &str) -> Result<Vec<PathBuf>, CatalogError> {
        let dir = self.root.join("yml").join(category);
        let pattern = format!("{}/**/*.yml", glob::Pattern::escape(&dir.to_string_lossy()));

        let paths = glob::glob(&pattern).map_err(|source| CatalogError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
        files.sort();
        Ok(files)
    }
}

/// Load the first YAML document of a manifest and tag it with its path.
pub fn load_manifest(path: &Path) -> Result<CatalogEntry, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document = serde_yaml::Deserializer::from_str(&content)
        .next()
        .ok_or_else(|| CatalogError::Empty {
            path: path.to_path_buf(),
        })?;

    let mut entry = CatalogEntry::deserialize(document).map_err(|source| CatalogError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    entry.file_path = path.to_path_buf();
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CERTUTIL: &str = r#"Name: Certutil.exe
Description: Windows binary used for handling certificates
Full_Path:
  - Path: C:\Windows\System32\certutil.exe
  - Path: C:\Windows\SysWOW64\certutil.exe
  - Path: N/A
"#;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_known_paths_skip_placeholders() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "certutil.yml", CERTUTIL);

        let entry = load_manifest(&temp_dir.path().join("certutil.yml")).unwrap();
        assert_eq!(entry.name, "Certutil.exe");
        assert_eq!(
            entry.known_paths(),
            vec![
                r"C:\Windows\System32\certutil.exe",
                r"C:\Windows\SysWOW64\certutil.exe"
            ]
        );
        assert_eq!(entry.file_path, temp_dir.path().join("certutil.yml"));
    }

    #[test]
    fn test_read_walks_categories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "yml/OSBinaries/Certutil.yml", CERTUTIL);
        write(root, "yml/OSScripts/nested/Pubprn.yml", "Name: Pubprn.vbs\n");
        write(root, "yml/HonorableMentions/Other.yml", "Name: Other.exe\n");
        write(root, "yml/OSBinaries/README.md", "not a manifest");

        let entries = CatalogReader::new(root).read().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Certutil.exe", "Pubprn.vbs"]);
    }

    #[test]
    fn test_malformed_manifest_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "yml/OSBinaries/Good.yml", CERTUTIL);
        write(root, "yml/OSLibraries/Bad.yml", "Name: [broken\n");

        match CatalogReader::new(root).read() {
            Err(CatalogError::Yaml { path, .. }) => assert!(path.ends_with("Bad.yml")),
            other => panic!("unexpected result: {:?}", other.map(|e| e.len())),
        }
    }
}
