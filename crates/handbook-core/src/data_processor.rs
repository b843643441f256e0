use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;

/// Form feed: page separator in pre-extracted handbook text.
pub const PAGE_BREAK: char = '\u{c}';

/// A slice of one handbook page, before enrichment and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub source: String,
    /// 1-based page number within `source`.
    pub page: u32,
    pub chunk_index: usize,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<RawChunk>> {
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<RawChunk>> {
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited to first files");
        }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<RawChunk>> {
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, total = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let source = self.source_name(file_path);
            all_chunks.extend(self.chunk_document(&content, &source));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed handbook text");
        Ok(all_chunks)
    }

    /// Split a document into pages, then pack each page's paragraphs into
    /// chunks of at most `max_tokens`. Oversized paragraphs are split on words
    /// with overlap.
    pub fn chunk_document(&self, content: &str, source: &str) -> Vec<RawChunk> {
        let mut out = Vec::new();
        for (page_index, page) in content.split(PAGE_BREAK).enumerate() {
            let page_no = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
            for piece in self.chunk_page(page) {
                out.push(RawChunk { source: source.to_string(), page: page_no, chunk_index: out.len(), content: piece });
            }
        }
        out
    }

    fn chunk_page(&self, page: &str) -> Vec<String> {
        let max = self.chunking_config.max_tokens;
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;
        for paragraph in page.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let tokens = self.count_tokens(paragraph);
            if tokens > max {
                if !current.is_empty() { chunks.push(std::mem::take(&mut current)); current_tokens = 0; }
                chunks.extend(self.split_paragraph_with_overlap(paragraph));
                continue;
            }
            if current_tokens + tokens > max && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            if !current.is_empty() { current.push_str("\n\n"); }
            current.push_str(paragraph);
            current_tokens += tokens;
        }
        if !current.is_empty() { chunks.push(current); }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn source_name(&self, file_path: &Path) -> String {
        file_path
            .file_name()
            .map_or_else(|| file_path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.chunking_config.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}
