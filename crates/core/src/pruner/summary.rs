//! CSV audit summary of the detections kept by a prune

use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;

use crate::detection::DetectionDescriptor;

pub const SUMMARY_HEADER: [&str; 9] = [
    "name",
    "filename",
    "description",
    "search",
    "mitre_attack_id",
    "security_domain",
    "Runnable on SSA?",
    "Relevant",
    "Comments",
];

/// One kept detection; `Relevant` and `Comments` are left for reviewers.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub filename: String,
    pub description: String,
    pub search: String,
    pub mitre_attack_id: String,
    pub security_domain: String,
    #[serde(rename = "Runnable on SSA?")]
    pub runnable_on_ssa: String,
    #[serde(rename = "Relevant")]
    pub relevant: String,
    #[serde(rename = "Comments")]
    pub comments: String,
}

impl SummaryRow {
    pub fn new(filename: &str, descriptor: &DetectionDescriptor, ssa: bool) -> Self {
        Self {
            name: descriptor.name.clone(),
            filename: filename.to_string(),
            description: descriptor.description.clone(),
            search: descriptor.search.clone(),
            mitre_attack_id: descriptor.mitre_attack_id(),
            security_domain: descriptor.tags.security_domain.clone(),
            runnable_on_ssa: if ssa { "True" } else { "False" }.to_string(),
            relevant: String::new(),
            comments: String::new(),
        }
    }
}

/// Write `rows` as a fully quoted CSV. The header is written even with no rows.
pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), csv::Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .has_headers(false)
        .from_path(path)?;

    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
