use crate::embeddings::Embedder;
use crate::error::{ArtifactError, IndexError, SearchError};
use crate::index::FlatL2Index;
use crate::models::{Chunk, RetrievedChunk};
use crate::store::LoadedArtifacts;

/// Query-time view over a built index and the chunks it was built from.
pub struct Retriever<E> {
    embedder: E,
    index: FlatL2Index,
    chunks: Vec<Chunk>,
}

impl<E: Embedder> Retriever<E> {
    /// Pairs an index with its chunks. Position *i* of the index must belong
    /// to `chunks[i]`, so lengths and dimensions are checked up front.
    pub fn new(embedder: E, index: FlatL2Index, chunks: Vec<Chunk>) -> Result<Self, SearchError> {
        if index.len() != chunks.len() {
            return Err(ArtifactError::CountMismatch {
                index: index.len(),
                metadata: chunks.len(),
            }
            .into());
        }
        if index.dimensions() != embedder.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimensions(),
                found: embedder.dimensions(),
            }
            .into());
        }

        Ok(Self {
            embedder,
            index,
            chunks,
        })
    }

    pub fn from_artifacts(embedder: E, artifacts: LoadedArtifacts) -> Result<Self, SearchError> {
        Self::new(embedder, artifacts.index, artifacts.metadata.chunks)
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Up to `k` chunks nearest to the question, nearest first.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>, SearchError> {
        if question.trim().is_empty() {
            return Err(SearchError::InvalidQuery("question is empty".to_string()));
        }

        let query_vector = self.embedder.embed(question);
        self.retrieve_by_vector(&query_vector, k)
    }

    pub fn retrieve_by_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let neighbors = self.index.search(query_vector, k)?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let chunk = self.chunks.get(neighbor.position).cloned().ok_or_else(|| {
                    SearchError::Request(format!(
                        "index position {} has no chunk",
                        neighbor.position
                    ))
                })?;
                Ok(RetrievedChunk {
                    position: neighbor.position,
                    distance: neighbor.distance,
                    chunk,
                })
            })
            .collect()
    }
}
