//! Where annotation markers come from

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::marker::AnnotationMarker;

/// Supplies the markers attached to a document
pub trait AnnotationSource {
    fn markers_for(&self, document_id: &str) -> Result<Vec<AnnotationMarker>>;
}

/// JSON export of annotations, one array of records across all documents
#[derive(Debug, Clone)]
pub struct JsonAnnotationFile {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationRecord {
    document_id: String,
    #[serde(flatten)]
    marker: AnnotationMarker,
}

impl JsonAnnotationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnnotationSource for JsonAnnotationFile {
    fn markers_for(&self, document_id: &str) -> Result<Vec<AnnotationMarker>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read annotations from {}", self.path.display()))?;
        let records: Vec<AnnotationRecord> =
            serde_json::from_str(&content).context("Failed to parse annotations JSON")?;

        Ok(records
            .into_iter()
            .filter(|r| r.document_id == document_id)
            .map(|r| r.marker)
            .collect())
    }
}
