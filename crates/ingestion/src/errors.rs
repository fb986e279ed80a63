//! Ingestion service error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No extractor output (*.json) found under {0}")]
    NoInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
