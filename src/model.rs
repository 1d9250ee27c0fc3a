use serde::Serialize;

use crate::transform::article::LeafFailure;

#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub format: String,
    pub path: String,
    pub sha256: String,
}

/// Written next to every transformed document.
#[derive(Debug, Clone, Serialize)]
pub struct TransformRunReport {
    pub report_version: u32,
    pub celex: String,
    pub version: String,
    pub language: String,
    pub domain: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub sources: Vec<SourceEntry>,
    pub used_format: Option<String>,
    pub dialect: Option<String>,
    pub redirect_target: Option<String>,
    pub output_path: String,
    pub leaf_failures: Vec<LeafFailure>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub depth: usize,
    pub id: String,
    pub kind: String,
    pub heading: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub outcome: String,
    pub dialect: Option<String>,
    pub leaf_failures: Vec<LeafFailure>,
    pub outline: Vec<OutlineEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
