//! Extractor output loader
//!
//! The extraction step writes one JSON file per document:
//!
//! ```json
//! {"source_document": "report.pdf", "elements": [...], "error": null}
//! ```
//!
//! A file that cannot be read or parsed, or that reports an extraction
//! error, fails only that document.

use crate::errors::IngestionError;
use ipdf_common::errors::AppError;
use ipdf_common::models::ContentElement;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed extractor output for one document
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedDocument {
    #[serde(default)]
    pub source_document: String,
    #[serde(default)]
    pub elements: Vec<ContentElement>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Expand the given paths into the list of JSON files to ingest.
///
/// Directories are scanned one level deep; files are returned sorted.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, IngestionError> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            if found.is_empty() {
                return Err(IngestionError::NoInput(path.display().to_string()));
            }
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }
    }

    debug!(file_count = files.len(), "Discovered extractor output");
    Ok(files)
}

/// Document name used when the file does not carry one
pub fn fallback_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and validate one extractor output file
pub fn load_document(path: &Path) -> Result<ExtractedDocument, AppError> {
    let upstream = |message: String| AppError::ExtractionUpstream {
        document: fallback_name(path),
        message,
    };

    let raw = std::fs::read_to_string(path)
        .map_err(|e| upstream(format!("cannot read {}: {}", path.display(), e)))?;
    let mut doc: ExtractedDocument = serde_json::from_str(&raw)
        .map_err(|e| upstream(format!("malformed extractor output: {}", e)))?;

    if doc.source_document.trim().is_empty() {
        doc.source_document = fallback_name(path);
    }

    if let Some(message) = doc.error.take() {
        return Err(AppError::ExtractionUpstream {
            document: doc.source_document,
            message,
        });
    }

    for element in &mut doc.elements {
        if element.source_document.is_empty() {
            element.source_document = doc.source_document.clone();
        }
        element.validate().map_err(|e| AppError::ExtractionUpstream {
            document: doc.source_document.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(doc)
}
