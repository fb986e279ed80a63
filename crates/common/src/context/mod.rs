//! Context Assembler - formats ranked results for the generation step
//!
//! Each result becomes a citation-annotated block:
//!
//! ```text
//! [Source 1] From report.pdf, Page 3 (text, score 0.812):
//! Revenue grew by 12% ...
//! ```
//!
//! Blocks are joined by a delimiter in relevance order.

use crate::config::ContextConfig;
use crate::models::SearchResult;

/// Context assembler configuration
#[derive(Debug, Clone)]
pub struct ContextAssemblerConfig {
    /// Separator between blocks
    pub delimiter: String,

    /// Returned when there are no results
    pub empty_message: String,

    /// Character budget for the whole context (None = unbounded)
    pub max_chars: Option<usize>,
}

impl Default for ContextAssemblerConfig {
    fn default() -> Self {
        ContextConfig::default().into()
    }
}

impl From<ContextConfig> for ContextAssemblerConfig {
    fn from(config: ContextConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            empty_message: config.empty_message,
            max_chars: config.max_chars,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: ContextAssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextAssemblerConfig) -> Self {
        Self { config }
    }

    /// Build the context string. Never empty.
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return self.config.empty_message.clone();
        }

        let delimiter_len = self.config.delimiter.chars().count();
        let mut context = String::new();
        let mut used = 0usize;

        for (i, result) in results.iter().enumerate() {
            let block = format_block(i + 1, result);
            let block_len = block.chars().count();
            let extra = if i == 0 { 0 } else { delimiter_len };

            if let Some(budget) = self.config.max_chars {
                if i == 0 && block_len > budget {
                    context.extend(block.chars().take(budget));
                    break;
                }
                if used + extra + block_len > budget {
                    break;
                }
            }

            if i > 0 {
                context.push_str(&self.config.delimiter);
            }
            context.push_str(&block);
            used += extra + block_len;
        }

        context
    }
}

fn format_block(index: usize, result: &SearchResult) -> String {
    let payload = &result.payload;
    format!(
        "[Source {}] From {}, Page {} ({}, score {:.3}):\n{}",
        index,
        payload.source_document,
        payload.page_number,
        payload.content_type,
        result.score,
        payload.display_content()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, PointPayload};

    fn result(doc: &str, page: u32, score: f32, content: &str) -> SearchResult {
        SearchResult {
            id: String::new(),
            score,
            payload: PointPayload {
                source_document: doc.to_string(),
                page_number: page,
                content_type: ContentType::Text,
                content: content.to_string(),
                raw_payload: None,
                chunk_index: 0,
                indexed_at: None,
            },
        }
    }

    #[test]
    fn test_empty_results_give_sentinel() {
        let assembler = ContextAssembler::default();
        assert_eq!(assembler.build_context(&[]), "No relevant context found.");
    }

    #[test]
    fn test_blocks_in_order() {
        let assembler = ContextAssembler::default();
        let context = assembler.build_context(&[
            result("a.pdf", 1, 0.91234, "first"),
            result("b.pdf", 7, 0.5, "second"),
        ]);
        assert_eq!(
            context,
            "[Source 1] From a.pdf, Page 1 (text, score 0.912):\nfirst\n---\n\
             [Source 2] From b.pdf, Page 7 (text, score 0.500):\nsecond"
        );
    }

    #[test]
    fn test_table_shows_raw_content() {
        let mut table = result("a.pdf", 2, 0.8, "Table 1 content from a.pdf, page 2");
        table.payload.content_type = ContentType::Table;
        table.payload.raw_payload = Some("| q1 | q2 |".into());

        let context = ContextAssembler::default().build_context(&[table]);
        assert!(context.ends_with("| q1 | q2 |"));
        assert!(context.contains("(table, score 0.800)"));
    }

    #[test]
    fn test_budget_keeps_whole_blocks() {
        let first = result("a.pdf", 1, 0.9, "alpha");
        let block_len = format_block(1, &first).chars().count();
        let assembler = ContextAssembler::new(ContextAssemblerConfig {
            max_chars: Some(block_len + 3),
            ..Default::default()
        });

        let context = assembler.build_context(&[first, result("b.pdf", 1, 0.8, "beta")]);
        assert_eq!(context.chars().count(), block_len);
        assert!(!context.contains("beta"));
    }

    #[test]
    fn test_budget_truncates_first_block() {
        let assembler = ContextAssembler::new(ContextAssemblerConfig {
            max_chars: Some(10),
            ..Default::default()
        });
        let context = assembler.build_context(&[result("a.pdf", 1, 0.9, "long content")]);
        assert_eq!(context, "[Source 1]");
    }
}
