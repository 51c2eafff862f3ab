use crate::embeddings::Embedder;
use crate::models::{Answer, PipelineOptions, RetrievedChunk};
use crate::prompt::{build_context, build_prompt, SYSTEM_INSTRUCTION};
use crate::retriever::Retriever;
use crate::store::{load_artifacts, ArtifactPaths};
use crate::traits::Generator;
use crate::SearchError;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Retrieval output turned into the exact text sent to the generator.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub retrieved: Vec<RetrievedChunk>,
    pub context: String,
    pub prompt: String,
}

/// Answers questions against one loaded corpus: retrieve, assemble, generate.
pub struct AnswerEngine<E, G> {
    retriever: Retriever<E>,
    generator: G,
    top_k: usize,
}

impl<E, G> AnswerEngine<E, G>
where
    E: Embedder + Send + Sync,
    G: Generator + Send + Sync,
{
    pub fn new(retriever: Retriever<E>, generator: G, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    /// Loads the persisted artifacts named by `options` and checks they were
    /// built with `embedder`'s model.
    pub fn load(options: &PipelineOptions, embedder: E, generator: G) -> Result<Self, SearchError> {
        let paths = ArtifactPaths::new(options.index_path(), options.metadata_path());
        if !paths.exist() {
            return Err(SearchError::NotReady(format!(
                "no index under {}; build one first",
                options.index_dir.display()
            )));
        }
        let artifacts = load_artifacts(&paths, embedder.model_id())?;
        info!(
            index = %paths.index.display(),
            chunks = artifacts.metadata.chunks.len(),
            build_id = %artifacts.metadata.build_id,
            source = %artifacts.metadata.source_path,
            "loaded index"
        );

        let retriever = Retriever::from_artifacts(embedder, artifacts)?;
        Ok(Self::new(retriever, generator, options.top_k))
    }

    pub fn prepare(&self, question: &str) -> Result<PreparedPrompt, SearchError> {
        let retrieved = self.retriever.retrieve(question, self.top_k)?;
        let context = build_context(&retrieved);
        let prompt = build_prompt(&context, question);
        debug!(
            hits = retrieved.len(),
            pages = ?retrieved.iter().map(RetrievedChunk::page_number).collect::<Vec<_>>(),
            "assembled prompt"
        );

        Ok(PreparedPrompt {
            retrieved,
            context,
            prompt,
        })
    }

    /// One question end to end. A failure here concerns this question only;
    /// the engine stays usable.
    pub async fn answer(&self, question: &str) -> Result<Answer, SearchError> {
        let prepared = self.prepare(question)?;
        let text = self
            .generator
            .generate(SYSTEM_INSTRUCTION, &prepared.prompt)
            .await?;

        Ok(Answer {
            question: question.to_string(),
            text,
            context: prepared.context,
            retrieved: prepared.retrieved,
        })
    }
}

/// Holds a value that is loaded once, on first use, and then shared read-only
/// until the cell is dropped.
pub struct StackCell<T> {
    cell: OnceLock<T>,
}

impl<T> Default for StackCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StackCell<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Returns the stored value, running `load` only while the cell is empty.
    /// A failed load leaves the cell empty so a later call can retry.
    pub fn get_or_load<F, Err>(&self, load: F) -> Result<&T, Err>
    where
        F: FnOnce() -> Result<T, Err>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = load()?;
        Ok(self.cell.get_or_init(|| value))
    }
}
