//! Content chunking module
//!
//! Turns extracted content elements into chunks for embedding:
//! - text is split with a sliding character window
//! - tables and images become one chunk with a synthesized description,
//!   their original content is carried as the raw payload

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ipdf_common::config::ChunkingSettings;
use ipdf_common::errors::{AppError, Result};
use ipdf_common::models::{Chunk, ContentElement, ContentType};
use std::collections::HashMap;
use tracing::debug;

/// Sliding-window chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Window size in characters
    chunk_size: usize,
    /// Characters shared by consecutive windows
    chunk_overlap: usize,
    /// Windows whose stripped length does not exceed this are dropped
    min_chunk_chars: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_chars: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Configuration {
                message: "chunk_size must be positive".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Configuration {
                message: format!(
                    "chunk_overlap ({}) must be smaller than chunk_size ({})",
                    chunk_overlap, chunk_size
                ),
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            min_chunk_chars,
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(
            settings.chunk_size,
            settings.chunk_overlap,
            settings.min_chunk_chars,
        )
    }

    /// Chunk all elements of one document, numbering chunks in order
    pub fn chunk(&self, elements: &[ContentElement]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut ordinals: HashMap<(u32, ContentType), usize> = HashMap::new();

        for element in elements {
            match element.content_type {
                ContentType::Text => {
                    for text in self.split_text(&element.content) {
                        chunks.push(Chunk {
                            text,
                            page_number: element.page_number,
                            source_document: element.source_document.clone(),
                            content_type: ContentType::Text,
                            raw_payload: None,
                            chunk_index: chunks.len(),
                        });
                    }
                }
                ContentType::Table | ContentType::Image => {
                    let ordinal = ordinals
                        .entry((element.page_number, element.content_type))
                        .or_insert(0);
                    *ordinal += 1;
                    chunks.push(Chunk {
                        text: describe(element, *ordinal),
                        page_number: element.page_number,
                        source_document: element.source_document.clone(),
                        content_type: element.content_type,
                        raw_payload: raw_payload(element),
                        chunk_index: chunks.len(),
                    });
                }
            }
        }

        debug!(
            elements = elements.len(),
            chunk_count = chunks.len(),
            chunk_size = self.chunk_size,
            "Content chunked"
        );
        chunks
    }

    /// Window start offsets (in chars) for a text of `len` characters.
    ///
    /// The last window always ends at the end of the text.
    fn window_starts(&self, len: usize) -> Vec<usize> {
        if len <= self.chunk_size {
            return vec![0];
        }
        let step = self.chunk_size - self.chunk_overlap;
        let last = len - self.chunk_size;

        let mut starts: Vec<usize> = (0..last).step_by(step).collect();
        starts.push(last);
        starts
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        self.window_starts(chars.len())
            .into_iter()
            .filter_map(|start| {
                let end = (start + self.chunk_size).min(chars.len());
                let window: String = chars[start..end].iter().collect();
                let stripped = window.trim();
                (stripped.chars().count() > self.min_chunk_chars).then(|| stripped.to_string())
            })
            .collect()
    }
}

/// Search-friendly stand-in for content that is not embedded verbatim.
///
/// `ordinal` numbers elements of the same kind on one page from 1, so that
/// two tables on a page never share a description.
fn describe(element: &ContentElement, ordinal: usize) -> String {
    let kind = match element.content_type {
        ContentType::Table => "Table",
        ContentType::Image => "Image",
        ContentType::Text => "Text",
    };
    format!(
        "{} {} content from {}, page {}",
        kind, ordinal, element.source_document, element.page_number
    )
}

fn raw_payload(element: &ContentElement) -> Option<String> {
    if element.content_type == ContentType::Image {
        if let Some(bytes) = &element.auxiliary_payload {
            return Some(STANDARD.encode(bytes));
        }
    }
    (!element.content.is_empty()).then(|| element.content.clone())
}
