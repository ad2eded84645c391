//! SSA search synthesis for "binary executed outside its usual directory".

use serde::{Deserialize, Serialize};

use super::reader::CatalogEntry;

const SEARCH_PREAMBLE: &str = r#"| from read_ssa_enriched_events() | eval device=ucast(map_get(input_event, "dest_device_id"), "string", null), user=ucast(map_get(input_event, "dest_user_id"), "string", null), timestamp=parse_long(ucast(map_get(input_event, "_time"), "string", null)), process_name=lower(ucast(map_get(input_event, "process_name"), "string", null)), process_path=lower(ucast(map_get(input_event, "process_path"), "string", null)), event_id=ucast(map_get(input_event, "event_id"), "string", null)"#;

const SEARCH_EPILOGUE: &str = r#"| eval start_time=timestamp,end_time=timestamp, entities=mvappend(device, user), body=create_map(["event_id", event_id, "process_path", process_path, "process_name", process_name]) | into write_ssa_detected_events();"#;

const NAME_CONDITION: &str = "| where process_name IS NOT NULL AND ";
const PATH_CONDITION: &str = "| where process_path IS NOT NULL AND ";

/// How multiple known directories of one binary combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// Only the last declared directory is excluded (historical output)
    #[default]
    LastOnly,
    /// Every declared directory is excluded
    AllPaths,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchSynthesizer {
    strategy: PathStrategy,
}

impl SearchSynthesizer {
    pub fn new(strategy: PathStrategy) -> Self {
        Self { strategy }
    }

    /// Search for `entry`, or `None` when it declares no path on a drive.
    pub fn synthesize(&self, entry: &CatalogEntry) -> Option<String> {
        let known = entry.known_paths();
        let conditions: Vec<String> = match self.strategy {
            PathStrategy::LastOnly => known.last().map(|p| path_condition(p)).into_iter().collect(),
            PathStrategy::AllPaths => known.iter().map(|p| path_condition(p)).collect(),
        };
        if conditions.is_empty() {
            return None;
        }

        Some(format!(
            "{}{}process_name=\"{}\"{}{} {}",
            SEARCH_PREAMBLE,
            NAME_CONDITION,
            entry.name.to_lowercase(),
            PATH_CONDITION,
            conditions.join(" AND "),
            SEARCH_EPILOGUE
        ))
    }
}

/// Case-insensitive regex body for the directory holding `full_path`.
///
/// The drive (first two characters) and the binary name are dropped, the rest
/// is lower-cased with every backslash escaped.
pub fn directory_pattern(full_path: &str) -> String {
    let without_drive = full_path
        .char_indices()
        .nth(2)
        .map_or("", |(i, _)| &full_path[i..]);

    let mut segments: Vec<&str> = without_drive.split('\\').collect();
    segments.pop();

    segments.join("\\").to_lowercase().replace('\\', "\\\\")
}

/// Negative match on the directory of `full_path`.
pub fn path_condition(full_path: &str) -> String {
    format!(
        "match_regex(process_path, /(?i){}/)=false",
        directory_pattern(full_path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::reader::FullPath;
    use regex::Regex;

    fn entry(name: &str, paths: &[&str]) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            full_paths: paths
                .iter()
                .map(|p| FullPath {
                    path: Some(p.to_string()),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_certutil_search() {
        let search = SearchSynthesizer::default()
            .synthesize(&entry("Certutil.exe", &[r"C:\Windows\System32\certutil.exe"]))
            .unwrap();

        assert!(search.starts_with(SEARCH_PREAMBLE));
        assert!(search.ends_with(SEARCH_EPILOGUE));
        assert!(search.contains(r#"| where process_name IS NOT NULL AND process_name="certutil.exe"| where process_path"#));
        assert!(search.contains(r"match_regex(process_path, /(?i)\\windows\\system32/)=false | eval"));
    }

    #[test]
    fn test_directory_pattern_matches_directory() {
        let pattern = directory_pattern(r"C:\Windows\System32\certutil.exe");
        assert_eq!(pattern, r"\\windows\\system32");

        let re = Regex::new(&format!("(?i){}", pattern)).unwrap();
        assert!(re.is_match(r"c:\windows\system32\certutil.exe"));
        assert!(!re.is_match(r"c:\users\public\certutil.exe"));
    }

    #[test]
    fn test_no_known_path_yields_nothing() {
        let synthesizer = SearchSynthesizer::default();
        assert!(synthesizer.synthesize(&entry("Foo.exe", &["N/A"])).is_none());
        assert!(synthesizer.synthesize(&entry("Bar.exe", &[])).is_none());
    }

    #[test]
    fn test_last_only_strategy_keeps_last_path() {
        let certutil = entry(
            "Certutil.exe",
            &[r"C:\Windows\System32\certutil.exe", r"C:\Windows\SysWOW64\certutil.exe"],
        );
        let search = SearchSynthesizer::new(PathStrategy::LastOnly)
            .synthesize(&certutil)
            .unwrap();

        assert!(search.contains("syswow64"));
        assert!(!search.contains("system32"));
    }

    #[test]
    fn test_all_paths_strategy_excludes_every_directory() {
        let certutil = entry(
            "Certutil.exe",
            &[r"C:\Windows\System32\certutil.exe", r"C:\Windows\SysWOW64\certutil.exe"],
        );
        let search = SearchSynthesizer::new(PathStrategy::AllPaths)
            .synthesize(&certutil)
            .unwrap();

        assert!(search.contains(
            r"/(?i)\\windows\\system32/)=false AND match_regex(process_path, /(?i)\\windows\\syswow64/)=false "
        ));
    }
}
