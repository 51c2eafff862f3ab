//! On-disk artifacts: `index.bin` (vectors) and `chunks.json` (chunk metadata).
//!
//! The two files join positionally: vector *i* belongs to `chunks[i]`. The
//! index header pins the pair together with the build id, the chunk count and
//! the SHA-256 of the metadata bytes, so a stale or swapped file is rejected
//! on load instead of producing wrong citations.

use crate::error::ArtifactError;
use crate::index::{read_u32, FlatL2Index};
use crate::models::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MAGIC: &[u8; 8] = b"PDFRAGIX";
const FORMAT_VERSION: u32 = 1;
const MAX_MODEL_ID_LEN: u32 = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub build_id: Uuid,
    pub model: String,
    pub source_path: String,
    pub source_checksum: String,
    pub built_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<Chunk>,
}

/// Both artifacts, validated against each other.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub index: FlatL2Index,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            metadata: metadata.into(),
        }
    }

    pub fn exist(&self) -> bool {
        self.index.is_file() && self.metadata.is_file()
    }
}

struct IndexHeader {
    model: String,
    build_id: Uuid,
    metadata_sha256: [u8; 32],
}

impl IndexHeader {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.model.len() as u32).to_le_bytes())?;
        writer.write_all(self.model.as_bytes())?;
        writer.write_all(self.build_id.as_bytes())?;
        writer.write_all(&self.metadata_sha256)
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, ArtifactError> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| ArtifactError::BadMagic)?;
        if &magic != MAGIC {
            return Err(ArtifactError::BadMagic);
        }

        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        let model_len = read_u32(reader)?;
        if model_len > MAX_MODEL_ID_LEN {
            return Err(ArtifactError::Corrupt(format!(
                "model id length {model_len} is implausible"
            )));
        }
        let mut model = vec![0u8; model_len as usize];
        let mut build_id = [0u8; 16];
        let mut metadata_sha256 = [0u8; 32];
        for field in [&mut model[..], &mut build_id[..], &mut metadata_sha256[..]] {
            reader
                .read_exact(field)
                .map_err(|error| ArtifactError::Corrupt(error.to_string()))?;
        }

        let model = String::from_utf8(model)
            .map_err(|_| ArtifactError::Corrupt("model id is not UTF-8".to_string()))?;

        Ok(Self {
            model,
            build_id: Uuid::from_bytes(build_id),
            metadata_sha256,
        })
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes both artifacts. Each is written to a temporary sibling first and
/// renamed into place once both are complete.
pub fn save_artifacts(
    paths: &ArtifactPaths,
    index: &FlatL2Index,
    metadata: &ChunkMetadata,
) -> Result<(), ArtifactError> {
    if index.len() != metadata.chunks.len() {
        return Err(ArtifactError::CountMismatch {
            index: index.len(),
            metadata: metadata.chunks.len(),
        });
    }

    let metadata_bytes = serde_json::to_vec_pretty(metadata)?;
    let header = IndexHeader {
        model: metadata.model.clone(),
        build_id: metadata.build_id,
        metadata_sha256: sha256(&metadata_bytes),
    };

    let mut index_bytes = Vec::new();
    header
        .write_to(&mut index_bytes)
        .and_then(|_| index.write_to(&mut index_bytes))
        .map_err(io_error(&paths.index))?;

    for path in [&paths.index, &paths.metadata] {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }

    let index_tmp = temporary_sibling(&paths.index);
    let metadata_tmp = temporary_sibling(&paths.metadata);
    fs::write(&index_tmp, &index_bytes).map_err(io_error(&index_tmp))?;
    fs::write(&metadata_tmp, &metadata_bytes).map_err(io_error(&metadata_tmp))?;
    fs::rename(&index_tmp, &paths.index).map_err(io_error(&paths.index))?;
    fs::rename(&metadata_tmp, &paths.metadata).map_err(io_error(&paths.metadata))?;

    Ok(())
}

/// Loads and cross-checks both artifacts. `expected_model` is the embedding
/// model configured for queries; artifacts built with another one are refused.
pub fn load_artifacts(
    paths: &ArtifactPaths,
    expected_model: &str,
) -> Result<LoadedArtifacts, ArtifactError> {
    let index_bytes = fs::read(&paths.index).map_err(io_error(&paths.index))?;
    let metadata_bytes = fs::read(&paths.metadata).map_err(io_error(&paths.metadata))?;

    let mut reader = index_bytes.as_slice();
    let header = IndexHeader::read_from(&mut reader)?;
    let index = FlatL2Index::read_from(&mut reader)?;
    if !reader.is_empty() {
        return Err(ArtifactError::Corrupt(format!(
            "{} trailing bytes after vectors",
            reader.len()
        )));
    }

    if sha256(&metadata_bytes) != header.metadata_sha256 {
        return Err(ArtifactError::ChecksumMismatch);
    }

    let metadata: ChunkMetadata = serde_json::from_slice(&metadata_bytes)?;

    if metadata.build_id != header.build_id {
        return Err(ArtifactError::BuildMismatch {
            index: header.build_id.to_string(),
            metadata: metadata.build_id.to_string(),
        });
    }
    if index.len() != metadata.chunks.len() {
        return Err(ArtifactError::CountMismatch {
            index: index.len(),
            metadata: metadata.chunks.len(),
        });
    }
    if header.model != expected_model || metadata.model != expected_model {
        return Err(ArtifactError::ModelMismatch {
            expected: expected_model.to_string(),
            found: header.model,
        });
    }

    Ok(LoadedArtifacts { index, metadata })
}
