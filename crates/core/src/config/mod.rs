mod schema;

pub use schema::{FOLDERS, MODES, ValidationIssue, validate};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::env::{SPLUNKBASE_PASSWORD, SPLUNKBASE_USERNAME};
use crate::pruner::{DEFAULT_DETECTION_TYPES, SelectionCriteria};
use crate::repository::{DEFAULT_BASE_BRANCH, DEFAULT_REPOSITORY_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{} failures detected during validation of the configuration", .0.len())]
    Invalid(Vec<ValidationIssue>),
}

/// How a CI run chooses its detections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Detections changed on the branch relative to the base branch
    #[default]
    Changes,
    /// The explicit `detections` list
    Selected,
    /// Every detection under the configured `types` folders
    New,
}

/// Top-level detection folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFolder {
    Endpoint,
    Cloud,
    Network,
}

impl ContentFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFolder::Endpoint => "endpoint",
            ContentFolder::Cloud => "cloud",
            ContentFolder::Network => "network",
        }
    }
}

impl fmt::Display for ContentFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplunkbaseApp {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub app_number: Option<u64>,
    #[serde(default)]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalApp {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub app_number: Option<u64>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
}

/// Settings for one CI run.
///
/// Container and app settings are validated here and passed through to the
/// test executor untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Branch under test
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_container_tag")]
    pub container_tag: String,

    #[serde(default)]
    pub interactive_failure: bool,

    #[serde(default)]
    pub local_apps: Vec<LocalApp>,

    #[serde(default)]
    pub mode: SelectionMode,

    #[serde(default = "default_num_containers")]
    pub num_containers: u64,

    #[serde(default)]
    pub persist_security_content: bool,

    /// Pull request whose head is fetched into `branch`
    #[serde(default)]
    pub pr_number: Option<u64>,

    #[serde(default = "default_true")]
    pub reuse_image: bool,

    #[serde(default)]
    pub show_password: bool,

    #[serde(default = "default_splunkbase_apps")]
    pub splunkbase_apps: Vec<SplunkbaseApp>,

    /// Accepts `${VAR}`; falls back to `SPLUNKBASE_USERNAME`
    #[serde(default)]
    pub splunkbase_username: Option<String>,

    /// Accepts `${VAR}`; falls back to `SPLUNKBASE_PASSWORD`
    #[serde(default)]
    pub splunkbase_password: Option<String>,

    #[serde(default = "default_apps_directory")]
    pub splunk_container_apps_directory: String,

    #[serde(default = "default_container_name")]
    pub local_base_container_name: String,

    #[serde(default)]
    pub mock: bool,

    /// Detection folders scanned in `new` mode
    #[serde(default = "default_types")]
    pub types: Vec<ContentFolder>,

    #[serde(default = "default_branch")]
    pub base_branch: String,

    #[serde(default = "default_repository_url")]
    pub repository_url: String,

    /// Checkout directory; `~` is expanded
    #[serde(default = "default_repository_path")]
    pub repository_path: String,

    /// Detection `type` values to run (empty = all)
    #[serde(default = "default_detection_types")]
    pub detection_types: Vec<String>,

    /// Detections to run in `selected` mode, relative to the repository root
    #[serde(default)]
    pub detections: Vec<String>,

    /// Test paths that passed in an earlier run
    #[serde(default)]
    pub previously_successful: Vec<String>,
}

fn default_branch() -> String {
    DEFAULT_BASE_BRANCH.to_string()
}
fn default_container_tag() -> String {
    "latest".to_string()
}
fn default_num_containers() -> u64 {
    1
}
fn default_true() -> bool {
    true
}
fn default_apps_directory() -> String {
    "/opt/splunk/etc/apps".to_string()
}
fn default_container_name() -> String {
    "splunk_test_%d".to_string()
}
fn default_types() -> Vec<ContentFolder> {
    vec![
        ContentFolder::Endpoint,
        ContentFolder::Cloud,
        ContentFolder::Network,
    ]
}
fn default_repository_url() -> String {
    DEFAULT_REPOSITORY_URL.to_string()
}
fn default_repository_path() -> String {
    "security_content".to_string()
}
fn default_detection_types() -> Vec<String> {
    DEFAULT_DETECTION_TYPES.iter().map(|s| s.to_string()).collect()
}
fn default_splunkbase_apps() -> Vec<SplunkbaseApp> {
    const STOCK_APPS: &[(&str, u64, &str)] = &[
        ("SPLUNK_ADD_ON_FOR_AMAZON_WEB_SERVICES", 1876, "5.2.0"),
        ("SPLUNK_ADD_ON_FOR_MICROSOFT_OFFICE_365", 4055, "2.2.0"),
        ("SPLUNK_ADD_ON_FOR_AMAZON_KINESIS_FIREHOSE", 3719, "1.3.2"),
        ("SPLUNK_ANALYTIC_STORY_EXECUTION_APP", 4971, "2.0.3"),
        ("PYTHON_FOR_SCIENTIC_COMPUTING_LINUX_64_BIT", 2882, "2.0.2"),
        ("SPLUNK_MACHINE_LEARNING_TOOLKIT", 2890, "5.2.2"),
        ("SPLUNK_APP_FOR_STREAM", 1809, "8.0.1"),
        ("SPLUNK_ADD_ON_FOR_STREAM_WIRE_DATA", 5234, "8.0.1"),
        ("SPLUNK_ADD_ON_FOR_STREAM_FORWARDERS", 5238, "8.0.1"),
        ("SPLUNK_ADD_ON_FOR_ZEEK_AKA_BRO", 1617, "4.0.0"),
        ("SPLUNK_ADD_ON_FOR_UNIX_AND_LINUX", 833, "8.3.1"),
        ("SPLUNK_COMMON_INFORMATION_MODEL", 1621, "4.20.2"),
    ];

    STOCK_APPS
        .iter()
        .map(|(name, number, version)| SplunkbaseApp {
            app_name: Some(name.to_string()),
            app_number: Some(*number),
            app_version: Some(version.to_string()),
        })
        .collect()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            container_tag: default_container_tag(),
            interactive_failure: false,
            local_apps: Vec::new(),
            mode: SelectionMode::default(),
            num_containers: default_num_containers(),
            persist_security_content: false,
            pr_number: None,
            reuse_image: default_true(),
            show_password: false,
            splunkbase_apps: default_splunkbase_apps(),
            splunkbase_username: None,
            splunkbase_password: None,
            splunk_container_apps_directory: default_apps_directory(),
            local_base_container_name: default_container_name(),
            mock: false,
            types: default_types(),
            base_branch: default_branch(),
            repository_url: default_repository_url(),
            repository_path: default_repository_path(),
            detection_types: default_detection_types(),
            detections: Vec::new(),
            previously_successful: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Load a JSON (json5) or YAML run configuration, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        let value: Value = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| parse_error(path, e))?
        } else {
            json5::from_str(&content).map_err(|e| parse_error(path, e))?
        };

        debug!("Loaded run configuration from {}", path.display());
        Self::from_value(value).map_err(|e| match e {
            ConfigError::Parse { message, .. } => parse_error(path, message),
            other => other,
        })
    }

    /// Validate a raw configuration and apply defaults.
    ///
    /// Every schema violation is collected into [`ConfigError::Invalid`].
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let issues = validate(&value);
        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        let mut config: RunConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                path: PathBuf::new(),
                message: e.to_string(),
            })?;
        config.expand_env_vars();
        Ok(config)
    }

    fn expand_env_vars(&mut self) {
        self.splunkbase_username = self
            .splunkbase_username
            .as_deref()
            .map(expand_env)
            .or_else(|| std::env::var(SPLUNKBASE_USERNAME).ok());
        self.splunkbase_password = self
            .splunkbase_password
            .as_deref()
            .map(expand_env)
            .or_else(|| std::env::var(SPLUNKBASE_PASSWORD).ok());
        self.repository_path = shellexpand::tilde(&self.repository_path).to_string();
    }

    pub fn repository_root(&self) -> PathBuf {
        PathBuf::from(&self.repository_path)
    }

    pub fn criteria(&self) -> SelectionCriteria {
        SelectionCriteria::new(
            self.detection_types.iter().cloned(),
            self.previously_successful.iter().cloned(),
        )
    }

    pub fn folders(&self) -> Vec<String> {
        self.types.iter().map(|t| t.as_str().to_string()).collect()
    }

    /// Copy safe to print: the password is masked unless `show_password` is set.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.show_password && config.splunkbase_password.is_some() {
            config.splunkbase_password = Some("********".to_string());
        }
        config
    }
}

fn parse_error(path: &Path, e: impl fmt::Display) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Commented run configuration written by `contentci init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"// contentci run configuration (JSON5: comments and trailing commas allowed)
{
  // Branch under test and the branch it is compared against
  branch: "develop",
  base_branch: "develop",

  // changes | selected | new
  mode: "changes",

  // Fetch refs/pull/<n>/head into `branch` before checkout
  pr_number: null,

  // Content repository checkout
  repository_url: "https://github.com/splunk/security_content",
  repository_path: "security_content",

  // Detection folders scanned in `new` mode: endpoint | cloud | network
  types: ["endpoint", "cloud", "network"],

  // Detection types to run; empty runs every type
  detection_types: ["Anomaly", "Hunting", "TTP"],

  // Detections to run in `selected` mode
  detections: [],

  // Test paths that already passed and can be skipped on re-run
  previously_successful: [],

  // Test executor settings
  container_tag: "latest",
  num_containers: 1,
  reuse_image: true,
  interactive_failure: false,
  persist_security_content: false,
  mock: false,
  local_apps: [],

  // Splunkbase credentials, e.g. "${SPLUNKBASE_PASSWORD}"
  splunkbase_username: null,
  splunkbase_password: null,
  show_password: false,
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = RunConfig::from_value(json!({})).unwrap();
        assert_eq!(config.branch, "develop");
        assert_eq!(config.mode, SelectionMode::Changes);
        assert_eq!(config.num_containers, 1);
        assert!(config.reuse_image);
        assert_eq!(config.splunkbase_apps.len(), 12);
        assert_eq!(config.folders(), vec!["endpoint", "cloud", "network"]);
        assert_eq!(config.detection_types, vec!["Anomaly", "Hunting", "TTP"]);
        assert_eq!(config.local_base_container_name, "splunk_test_%d");
    }

    #[test]
    fn test_invalid_collects_all_issues() {
        let err = RunConfig::from_value(json!({
            "mode": "all",
            "num_containers": 0,
            "types": ["mainframe"]
        }))
        .unwrap_err();

        match err {
            ConfigError::Invalid(issues) => assert_eq!(issues.len(), 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_json5_with_comments() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        fs::write(
            &path,
            r#"{
                // feature branch from a pull request
                "branch": "feature",
                "pr_number": 1234,
                "mode": "selected",
                "detections": ["detections/endpoint/a.yml"],
            }"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.branch, "feature");
        assert_eq!(config.pr_number, Some(1234));
        assert_eq!(config.mode, SelectionMode::Selected);
        assert_eq!(config.detections, vec!["detections/endpoint/a.yml"]);
    }

    #[test]
    fn test_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.yml");
        fs::write(&path, "mode: new\ntypes: [cloud]\nnum_containers: 4\n").unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.mode, SelectionMode::New);
        assert_eq!(config.types, vec![ContentFolder::Cloud]);
        assert_eq!(config.num_containers, 4);
    }

    #[test]
    fn test_default_template_is_valid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("contentci.json");
        fs::write(&path, DEFAULT_CONFIG_TEMPLATE).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.mode, SelectionMode::Changes);
        assert!(config.detections.is_empty());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        fs::write(&path, "{ branch: ").unwrap();

        assert!(matches!(
            RunConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_expand_env_literal() {
        assert_eq!(expand_env("plain"), "plain");
        assert_eq!(
            expand_env("${CONTENTCI_SURELY_UNSET_VARIABLE}"),
            "${CONTENTCI_SURELY_UNSET_VARIABLE}"
        );
    }

    #[test]
    fn test_redacted_masks_password() {
        let config = RunConfig {
            splunkbase_password: Some("hunter2".to_string()),
            ..RunConfig::default()
        };
        assert_eq!(
            config.redacted().splunkbase_password.as_deref(),
            Some("********")
        );

        let shown = RunConfig {
            show_password: true,
            ..config
        };
        assert_eq!(shown.redacted().splunkbase_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_criteria_from_config() {
        let config = RunConfig {
            previously_successful: vec!["tests/endpoint/a.test.yml".to_string()],
            ..RunConfig::default()
        };
        let criteria = config.criteria();
        assert!(criteria.allows("TTP"));
        assert!(!criteria.allows("Baseline"));
        assert!(criteria.already_passed.contains("tests/endpoint/a.test.yml"));
    }
}
