//! Error types for iPDF services
//!
//! Provides a single error taxonomy for the indexing and retrieval pipeline:
//! - Distinct error types for each pipeline stage
//! - Stable error codes for callers and reports
//! - Retry classification used by the embedding backoff policy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Upstream extraction (2xxx)
    ExtractionUpstream,

    // Embedding errors (3xxx)
    EmbeddingError,
    EmbeddingUnavailable,
    EmbeddingDimension,

    // Vector store errors (4xxx)
    CollectionMismatch,
    VectorStoreError,
    IndexWriteError,

    // Query errors (5xxx)
    QueryError,

    // External service errors (8xxx)
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::ExtractionUpstream => 2001,

            ErrorCode::EmbeddingError => 3001,
            ErrorCode::EmbeddingUnavailable => 3002,
            ErrorCode::EmbeddingDimension => 3003,

            ErrorCode::CollectionMismatch => 4001,
            ErrorCode::VectorStoreError => 4002,
            ErrorCode::IndexWriteError => 4003,

            ErrorCode::QueryError => 5001,

            ErrorCode::UpstreamError => 8001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Extraction collaborator reported an unreadable document
    #[error("Extraction failed for {document}: {message}")]
    ExtractionUpstream { document: String, message: String },

    // Embedding errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    // Vector store errors
    #[error("Collection {collection} has dimension {actual}, expected {expected}")]
    CollectionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("Vector store error: {message}")]
    VectorStore { message: String },

    #[error("Failed to write points to {collection}: {message}")]
    IndexWrite { collection: String, message: String },

    // Retrieval errors
    #[error("Query failed: {source}")]
    Query {
        #[source]
        source: Box<AppError>,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for a validation error on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Wrap an embedding or store failure raised while serving a query
    pub fn query(source: AppError) -> Self {
        AppError::Query {
            source: Box::new(source),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::ExtractionUpstream { .. } => ErrorCode::ExtractionUpstream,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingUnavailable { .. } => ErrorCode::EmbeddingUnavailable,
            AppError::EmbeddingDimension { .. } => ErrorCode::EmbeddingDimension,
            AppError::CollectionMismatch { .. } => ErrorCode::CollectionMismatch,
            AppError::VectorStore { .. } => ErrorCode::VectorStoreError,
            AppError::IndexWrite { .. } => ErrorCode::IndexWriteError,
            AppError::Query { .. } => ErrorCode::QueryError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether the failure is transient and the call may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::EmbeddingUnavailable { .. } => true,
            AppError::HttpClient(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
