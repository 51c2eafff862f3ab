use crate::error::IngestError;
use crate::models::DEFAULT_EMBEDDING_MODEL;
use regex::Regex;

const MIN_NGRAM: usize = 1;
const MAX_NGRAM: usize = 5;
const MIN_DIMENSIONS: usize = 8;
const MAX_DIMENSIONS: usize = 4_096;

pub trait Embedder {
    /// Identifier of the model configuration; recorded in built artifacts.
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    /// One vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashed character n-gram embedder, named `char-<n>gram-<dims>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterNgramEmbedder {
    model_id: String,
    ngram: usize,
    dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(3, 384)
    }
}

impl CharacterNgramEmbedder {
    fn new(ngram: usize, dimensions: usize) -> Self {
        Self {
            model_id: format!("char-{ngram}gram-{dimensions}"),
            ngram,
            dimensions,
        }
    }

    /// Resolves a model identifier. Unknown or out-of-range identifiers are a
    /// startup error.
    pub fn from_model_id(model_id: &str) -> Result<Self, IngestError> {
        let pattern = Regex::new(r"^char-(\d+)gram-(\d+)$")?;
        let captures = pattern
            .captures(model_id.trim())
            .ok_or_else(|| IngestError::UnsupportedModel(model_id.to_string()))?;

        let ngram = captures[1]
            .parse::<usize>()
            .map_err(|_| IngestError::UnsupportedModel(model_id.to_string()))?;
        let dimensions = captures[2]
            .parse::<usize>()
            .map_err(|_| IngestError::UnsupportedModel(model_id.to_string()))?;

        if !(MIN_NGRAM..=MAX_NGRAM).contains(&ngram) {
            return Err(IngestError::UnsupportedModel(format!(
                "{model_id}: n-gram size must be within {MIN_NGRAM}..={MAX_NGRAM}"
            )));
        }
        if !(MIN_DIMENSIONS..=MAX_DIMENSIONS).contains(&dimensions) {
            return Err(IngestError::UnsupportedModel(format!(
                "{model_id}: dimensions must be within {MIN_DIMENSIONS}..={MAX_DIMENSIONS}"
            )));
        }

        Ok(Self::new(ngram, dimensions))
    }

    pub fn default_model_id() -> &'static str {
        DEFAULT_EMBEDDING_MODEL
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash = 1469598103934665603u64;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        let ngram = self.ngram.min(chars.len());
        for window in chars.windows(ngram) {
            let token = window.iter().collect::<String>();
            let bucket = (fnv1a(&token) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder};
    use crate::IngestError;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Load capacity per square meter");
        let second = embedder.embed("Load capacity per square meter");
        assert_eq!(first, second);
    }

    #[test]
    fn default_model_matches_default_id() {
        let parsed = CharacterNgramEmbedder::from_model_id(CharacterNgramEmbedder::default_model_id())
            .expect("default id should parse");
        assert_eq!(parsed, CharacterNgramEmbedder::default());
        assert_eq!(parsed.model_id(), "char-3gram-384");
        assert_eq!(parsed.dimensions(), 384);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder::from_model_id("char-2gram-32").expect("valid id");
        assert_eq!(embedder.embed("abc").len(), 32);
        assert_eq!(embedder.embed("a").len(), 32);
    }

    #[test]
    fn unsupported_models_are_rejected() {
        for id in ["all-MiniLM-L6-v2", "char-9gram-128", "char-3gram-4", "char-3gram-"] {
            assert!(
                matches!(
                    CharacterNgramEmbedder::from_model_id(id),
                    Err(IngestError::UnsupportedModel(_))
                ),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn vectors_are_unit_length_and_empty_text_is_zero() {
        let embedder = CharacterNgramEmbedder::default();
        let norm = embedder
            .embed("Roof truss")
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed("").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn batch_preserves_input_order() {
        let embedder = CharacterNgramEmbedder::default();
        let batch = embedder.embed_batch(&["first text", "second text", "first text"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], embedder.embed("first text"));
        assert_eq!(batch[1], embedder.embed("second text"));
        assert_eq!(batch[0], batch[2]);
    }
}
