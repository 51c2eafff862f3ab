use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::index::FlatL2Index;
use crate::models::{BuildReport, ExtractedDocument, PageSource, PipelineOptions};
use crate::store::{save_artifacts, ArtifactPaths, ChunkMetadata};
use crate::IngestError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Everything the build pipeline produces before anything touches disk.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub extracted: ExtractedDocument,
    pub index: FlatL2Index,
    pub metadata: ChunkMetadata,
}

/// Extract, chunk, embed and index one PDF in memory.
pub fn build_in_memory<X, E>(
    pdf_path: &Path,
    extractor: &X,
    embedder: &E,
    options: &PipelineOptions,
) -> Result<BuiltIndex, IngestError>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
{
    let chunking = ChunkingConfig::from(options);
    chunking.validate()?;

    let source_checksum = digest_file(pdf_path)?;
    let extracted = extractor.extract_pages(pdf_path)?;
    info!(
        path = %pdf_path.display(),
        total_pages = extracted.total_pages,
        kept_pages = extracted.pages.len(),
        dropped_pages = extracted.dropped_pages.len(),
        "extracted pdf"
    );

    let chunks = chunk_pages(&extracted.pages, chunking)?;
    if chunks.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no text could be extracted or recognized in {}",
            pdf_path.display()
        )));
    }

    let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
    let vectors = embedder.embed_batch(&texts);
    let index = FlatL2Index::build(&vectors)?;
    info!(
        chunk_count = chunks.len(),
        dimensions = index.dimensions(),
        model = embedder.model_id(),
        "embedded chunks"
    );

    let metadata = ChunkMetadata {
        build_id: Uuid::new_v4(),
        model: embedder.model_id().to_string(),
        source_path: pdf_path.to_string_lossy().to_string(),
        source_checksum,
        built_at: Utc::now(),
        chunk_size: chunking.chunk_size,
        chunk_overlap: chunking.chunk_overlap,
        chunks,
    };

    Ok(BuiltIndex {
        extracted,
        index,
        metadata,
    })
}

/// Runs the whole build pipeline and persists both artifacts. Nothing is
/// written unless every step succeeded.
pub fn build_index<X, E>(
    pdf_path: &Path,
    extractor: &X,
    embedder: &E,
    options: &PipelineOptions,
) -> Result<BuildReport, IngestError>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
{
    let built = build_in_memory(pdf_path, extractor, embedder, options)?;
    let paths = ArtifactPaths::new(options.index_path(), options.metadata_path());
    save_artifacts(&paths, &built.index, &built.metadata)?;

    info!(
        index = %paths.index.display(),
        metadata = %paths.metadata.display(),
        build_id = %built.metadata.build_id,
        "index complete"
    );

    Ok(BuildReport {
        build_id: built.metadata.build_id.to_string(),
        total_pages: built.extracted.total_pages,
        text_layer_pages: built.extracted.pages_from(PageSource::TextLayer),
        recognized_pages: built.extracted.pages_from(PageSource::Recognized),
        dropped_pages: built.extracted.dropped_pages.clone(),
        chunk_count: built.metadata.chunks.len(),
        index_path: paths.index,
        metadata_path: paths.metadata,
    })
}
