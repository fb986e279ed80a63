//! iPDF search library
//!
//! Query engine used by the `search` binary and by the generation step.

pub mod retrieval;

pub use retrieval::{QueryEngine, SearchRequest, SearchResponse};
