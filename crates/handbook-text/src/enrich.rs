use handbook_core::data_processor::RawChunk;
use handbook_core::types::{ChunkMetadata, DocumentChunk};

use crate::categorize::Categorizer;
use crate::normalize::clean_text;
use crate::patterns::{
    is_match, RE_CHAPTER, RE_CHAPTER_SHORT, RE_CODE_WORD, RE_EXAMPLE_TAG, RE_PROMPT_CALL, RE_PROMPT_LINE,
    RE_SECTION,
};

/// A chunk with derived metadata and the cleaned text used for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedChunk {
    pub chunk: DocumentChunk,
    pub content_clean: String,
}

#[derive(Debug, Clone, Default)]
pub struct Enricher {
    categorizer: Categorizer,
}

impl Enricher {
    pub fn new(categorizer: Categorizer) -> Self { Self { categorizer } }

    pub fn enrich(&self, raw: &RawChunk) -> EnrichedChunk {
        let content = raw.content.as_str();
        let content_clean = clean_text(content);
        let word_count = content_clean.split(' ').filter(|w| w.chars().count() > 2).count();

        let metadata = ChunkMetadata {
            id: Some(format!("{}:p{}:c{}", raw.source, raw.page, raw.chunk_index)),
            source: raw.source.clone(),
            page: raw.page,
            category: self.categorizer.categorize(content),
            chapter: chapter_of(content),
            section: section_of(content),
            has_code: Some(is_match(&RE_PROMPT_LINE, content) || is_match(&RE_CODE_WORD, content)),
            has_example: Some(is_match(&RE_EXAMPLE_TAG, content) || is_match(&RE_PROMPT_CALL, content)),
            word_count: Some(u32::try_from(word_count).unwrap_or(u32::MAX)),
            extra: serde_json::Map::new(),
        };
        EnrichedChunk { chunk: DocumentChunk { content: raw.content.clone(), metadata }, content_clean }
    }
}

fn chapter_of(content: &str) -> Option<String> {
    [&RE_CHAPTER, &RE_CHAPTER_SHORT]
        .into_iter()
        .filter_map(|re| re.as_ref()?.captures(content)?.get(1).map(|m| m.as_str().trim().to_string()))
        .find(|c| !c.is_empty())
}

fn section_of(content: &str) -> Option<String> {
    let m = RE_SECTION.as_ref()?.find(content)?;
    Some(m.as_str().trim().to_string())
}
