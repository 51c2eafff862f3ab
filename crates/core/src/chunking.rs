use crate::error::IngestError;
use crate::models::{Chunk, PageRecord, PipelineOptions};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&PipelineOptions> for ChunkingConfig {
    fn from(value: &PipelineOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Shortest window a boundary split may produce. Keeps every step forward
    /// past the overlap and stops snapping from yielding slivers.
    fn min_window(&self) -> usize {
        (self.chunk_overlap + 1).max(self.chunk_size / 2)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Kinds of split point, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Paragraph,
    Sentence,
    Word,
    Character,
}

struct BoundaryStrategy {
    kind: Boundary,
    pattern: Option<Regex>,
}

impl BoundaryStrategy {
    fn new(kind: Boundary) -> Result<Self, IngestError> {
        let pattern = match kind {
            Boundary::Paragraph => Some(Regex::new(r"\n\s*\n")?),
            Boundary::Sentence => Some(Regex::new(r#"[.!?]["')\]]?\s"#)?),
            Boundary::Word => Some(Regex::new(r"\s")?),
            Boundary::Character => None,
        };
        Ok(Self { kind, pattern })
    }

    /// Split offset (in chars, exclusive chunk end) within `(lo, hi]`,
    /// nearest to `hi`, or `None` when this boundary does not occur there.
    fn candidate(&self, text: &str, offsets: &[usize], lo: usize, hi: usize) -> Option<usize> {
        let Some(pattern) = &self.pattern else {
            return Some(hi);
        };

        let base = offsets[lo];
        let last_end = pattern
            .find_iter(&text[base..offsets[hi]])
            .last()
            .map(|found| base + found.end())?;

        offsets.binary_search(&last_end).ok().filter(|end| *end > lo)
    }
}

/// Splits text into overlapping windows of at most `chunk_size` chars,
/// snapping each cut to the best boundary in the second part of the window.
pub struct TextSplitter {
    config: ChunkingConfig,
    strategies: Vec<BoundaryStrategy>,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let strategies = [
            Boundary::Paragraph,
            Boundary::Sentence,
            Boundary::Word,
            Boundary::Character,
        ]
        .into_iter()
        .map(BoundaryStrategy::new)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, strategies })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with_boundaries(text)
            .into_iter()
            .map(|(piece, _)| piece)
            .collect()
    }

    /// Like [`TextSplitter::split`], also reporting which boundary ended each
    /// window (`None` for the final window of the text).
    pub fn split_with_boundaries(&self, text: &str) -> Vec<(String, Option<Boundary>)> {
        let offsets = text
            .char_indices()
            .map(|(index, _)| index)
            .chain(std::iter::once(text.len()))
            .collect::<Vec<_>>();
        let total = offsets.len() - 1;
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < total {
            if total - start <= chunk_size {
                pieces.push((text[offsets[start]..].to_string(), None));
                break;
            }

            let target = start + chunk_size;
            let lo = start + self.config.min_window();
            let (end, boundary) = self
                .strategies
                .iter()
                .find_map(|strategy| {
                    strategy
                        .candidate(text, &offsets, lo, target)
                        .map(|end| (end, strategy.kind))
                })
                .unwrap_or((target, Boundary::Character));

            pieces.push((text[offsets[start]..offsets[end]].to_string(), Some(boundary)));
            start = end - chunk_overlap;
        }

        pieces
    }
}

/// Chunks every page independently, in page order; each chunk keeps the page
/// number it came from. Trailing whitespace left by a boundary cut is dropped
/// from the chunk text; window offsets are unaffected.
pub fn chunk_pages(pages: &[PageRecord], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    let splitter = TextSplitter::new(config)?;

    Ok(pages
        .iter()
        .flat_map(|page| {
            splitter
                .split(&page.text)
                .into_iter()
                .map(|text| text.trim_end().to_string())
                .filter(|text| !text.is_empty())
                .map(|text| Chunk {
                    page_number: page.page_number,
                    text,
                })
        })
        .collect())
}
