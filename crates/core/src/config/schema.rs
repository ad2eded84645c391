//! Structural validation of a raw run configuration.
//!
//! Every property is checked and all violations are reported together, so a
//! CI job fails once with the complete list instead of one error per attempt.

use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

/// One violation found while validating the run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON-pointer-like location, e.g. `splunkbase_apps[2].app_number`
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

pub const MODES: &[&str] = &["changes", "selected", "new"];
pub const FOLDERS: &[&str] = &["endpoint", "cloud", "network"];

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Bool,
    NullableString,
    Integer,
    NullableInteger,
    PositiveInteger,
    Enum(&'static [&'static str]),
    StringArray,
    EnumArray(&'static [&'static str]),
    Apps { local: bool },
}

const PROPERTIES: &[(&str, Kind)] = &[
    ("branch", Kind::String),
    ("container_tag", Kind::String),
    ("interactive_failure", Kind::Bool),
    ("local_apps", Kind::Apps { local: true }),
    ("mode", Kind::Enum(MODES)),
    ("num_containers", Kind::PositiveInteger),
    ("persist_security_content", Kind::Bool),
    ("pr_number", Kind::NullableInteger),
    ("reuse_image", Kind::Bool),
    ("show_password", Kind::Bool),
    ("splunkbase_apps", Kind::Apps { local: false }),
    ("splunkbase_username", Kind::NullableString),
    ("splunkbase_password", Kind::NullableString),
    ("splunk_container_apps_directory", Kind::String),
    ("local_base_container_name", Kind::String),
    ("mock", Kind::Bool),
    ("types", Kind::EnumArray(FOLDERS)),
    ("base_branch", Kind::String),
    ("repository_url", Kind::String),
    ("repository_path", Kind::String),
    ("detection_types", Kind::StringArray),
    ("detections", Kind::StringArray),
    ("previously_successful", Kind::StringArray),
];

/// Validate `value` against the run configuration schema.
pub fn validate(value: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(object) = value.as_object() else {
        issues.push(issue("$", "configuration must be an object"));
        return issues;
    };

    for key in object.keys() {
        if !PROPERTIES.iter().any(|(name, _)| name == key) {
            warn!("Ignoring unknown configuration key '{}'", key);
        }
    }

    for (name, kind) in PROPERTIES {
        if let Some(value) = object.get(*name) {
            check(name, *kind, value, &mut issues);
        }
    }

    issues
}

fn check(path: &str, kind: Kind, value: &Value, issues: &mut Vec<ValidationIssue>) {
    match kind {
        Kind::String => {
            if !value.is_string() {
                issues.push(issue(path, "must be a string"));
            }
        }
        Kind::Bool => {
            if !value.is_boolean() {
                issues.push(issue(path, "must be a boolean"));
            }
        }
        Kind::NullableString => {
            if !(value.is_null() || value.is_string()) {
                issues.push(issue(path, "must be a string or null"));
            }
        }
        Kind::Integer => {
            if !value.is_u64() {
                issues.push(issue(path, "must be a non-negative integer"));
            }
        }
        Kind::NullableInteger => {
            if !(value.is_null() || value.is_u64()) {
                issues.push(issue(path, "must be a non-negative integer or null"));
            }
        }
        Kind::PositiveInteger => match value.as_u64() {
            Some(n) if n >= 1 => {}
            Some(_) => issues.push(issue(path, "must be at least 1")),
            None => issues.push(issue(path, "must be an integer")),
        },
        Kind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => issues.push(issue(
                path,
                &format!("must be one of {}", allowed.join(", ")),
            )),
        },
        Kind::StringArray => each_item(path, value, issues, |item_path, item, issues| {
            if !item.is_string() {
                issues.push(issue(item_path, "must be a string"));
            }
        }),
        Kind::EnumArray(allowed) => each_item(path, value, issues, |item_path, item, issues| {
            check(item_path, Kind::Enum(allowed), item, issues)
        }),
        Kind::Apps { local } => each_item(path, value, issues, |item_path, item, issues| {
            match item.as_object() {
                Some(app) => check_app(item_path, app, local, issues),
                None => issues.push(issue(item_path, "must be an object")),
            }
        }),
    }
}

fn each_item<F>(path: &str, value: &Value, issues: &mut Vec<ValidationIssue>, mut f: F)
where
    F: FnMut(&str, &Value, &mut Vec<ValidationIssue>),
{
    let Some(items) = value.as_array() else {
        issues.push(issue(path, "must be an array"));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        f(&format!("{}[{}]", path, i), item, issues);
    }
}

fn check_app(path: &str, app: &Map<String, Value>, local: bool, issues: &mut Vec<ValidationIssue>) {
    let mut fields = vec![
        ("app_name", Kind::String),
        ("app_number", Kind::Integer),
        ("app_version", Kind::String),
    ];
    if local {
        fields.push(("local_path", Kind::String));
    }

    for (name, kind) in fields {
        if let Some(value) = app.get(name) {
            check(&format!("{}.{}", path, name), kind, value, issues);
        }
    }
}

fn issue(path: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
    }
}
