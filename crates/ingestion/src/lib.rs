//! iPDF ingestion library
//!
//! Chunker, extractor output loader and the ingestion processor used by the
//! `ingestion` binary.

pub mod chunker;
pub mod errors;
pub mod loader;
pub mod processor;

pub use chunker::Chunker;
pub use errors::IngestionError;
pub use processor::{DocumentReport, IngestionProcessor, IngestionReport};
