pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod store;
pub mod traits;

pub use chunking::{chunk_pages, normalize_whitespace, Boundary, ChunkingConfig, TextSplitter};
pub use embeddings::{CharacterNgramEmbedder, Embedder};
pub use error::{ArtifactError, IndexError, IngestError, SearchError};
pub use extractor::{assemble_pages, LopdfExtractor, PdfExtractor};
pub use generation::OllamaGenerator;
pub use index::{FlatL2Index, Neighbor};
pub use ingest::{build_in_memory, build_index, digest_file, BuiltIndex};
pub use models::{
    Answer, BuildReport, Chunk, ExtractedDocument, GenerationOptions, PageRecord, PageSource,
    PipelineOptions, RetrievedChunk,
};
pub use ocr::{select_recognizer, EndpointRecognizer, OcrEndpointConfig, PageRenderer, TesseractRecognizer};
pub use orchestrator::{AnswerEngine, PreparedPrompt, StackCell};
pub use prompt::{build_context, build_prompt, context_preview, CONTEXT_PREVIEW_CHARS, SYSTEM_INSTRUCTION};
pub use retriever::Retriever;
pub use store::{load_artifacts, save_artifacts, ArtifactPaths, ChunkMetadata, LoadedArtifacts};
pub use traits::{Generator, PageRecognizer};
