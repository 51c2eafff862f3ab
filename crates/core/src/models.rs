use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_EMBEDDING_MODEL: &str = "char-3gram-384";
pub const DEFAULT_CHUNK_SIZE: usize = 1_500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_OCR_DPI: u32 = 300;
pub const DEFAULT_GENERATION_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATION_MODEL: &str = "mistral:7b-instruct-q4_K_M";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

pub const INDEX_FILE_NAME: &str = "index.bin";
pub const METADATA_FILE_NAME: &str = "chunks.json";

/// Text of one PDF page after extraction or recognition, whitespace-normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_number: u32,
    pub text: String,
    pub source: PageSource,
}

/// How the text of a page was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSource {
    TextLayer,
    Recognized,
}

/// Every page of a document, split into the records that carry text and the
/// page numbers that yielded nothing.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub total_pages: usize,
    pub pages: Vec<PageRecord>,
    pub dropped_pages: Vec<u32>,
}

impl ExtractedDocument {
    pub fn pages_from(&self, source: PageSource) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|page| page.source == source)
            .map(|page| page.page_number)
            .collect()
    }
}

/// Atomic retrieval unit. Never spans pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub position: usize,
    pub distance: f32,
    pub chunk: Chunk,
}

impl RetrievedChunk {
    pub fn page_number(&self) -> u32 {
        self.chunk.page_number
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

/// Build- and query-time tuning shared by both pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub ocr_dpi: u32,
    pub index_dir: PathBuf,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            ocr_dpi: DEFAULT_OCR_DPI,
            index_dir: PathBuf::from("data/indexes"),
        }
    }
}

impl PipelineOptions {
    pub fn index_path(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILE_NAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.index_dir.join(METADATA_FILE_NAME)
    }

    pub fn with_index_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.index_dir = dir.as_ref().to_path_buf();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATION_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
        }
    }
}

/// Outcome of the offline build pipeline.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub build_id: String,
    pub total_pages: usize,
    pub text_layer_pages: Vec<u32>,
    pub recognized_pages: Vec<u32>,
    pub dropped_pages: Vec<u32>,
    pub chunk_count: usize,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// A grounded answer together with the evidence it was generated from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub context: String,
    pub retrieved: Vec<RetrievedChunk>,
}
