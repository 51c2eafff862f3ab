//! Exhaustive nearest-neighbour index over squared Euclidean distance.
//!
//! Vectors are stored contiguously in insertion order; a vector's position is
//! the handle callers use to find its chunk.

use crate::error::{ArtifactError, IndexError};
use std::cmp::Ordering;
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimensions: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Bulk build. Every vector must have the dimension of the first one.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, IndexError> {
        let first = vectors.first().ok_or(IndexError::Empty)?;
        let dimensions = first.len();
        if dimensions == 0 {
            return Err(IndexError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }

        let mut data = Vec::with_capacity(dimensions * vectors.len());
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(IndexError::RaggedInput {
                    position,
                    expected: dimensions,
                    found: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimensions, data })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `min(k, len)` nearest vectors, ascending by distance; equal
    /// distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if k == 0 {
            return Err(IndexError::ZeroK);
        }
        if self.is_empty() {
            return Err(IndexError::Empty);
        }
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                found: query.len(),
            });
        }

        let mut scored = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(vector, query),
            })
            .collect::<Vec<_>>();

        scored.sort_by(compare_neighbors);
        scored.truncate(k);
        Ok(scored)
    }

    /// Raw payload: dimension (u32 LE), count (u64 LE), then every f32 LE.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&(self.dimensions as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ArtifactError> {
        let dimensions = read_u32(reader)? as usize;
        let count = usize::try_from(read_u64(reader)?)
            .map_err(|_| ArtifactError::Corrupt("vector count overflows usize".to_string()))?;
        if dimensions == 0 || count == 0 {
            return Err(ArtifactError::Corrupt(format!(
                "index header declares {count} vectors of dimension {dimensions}"
            )));
        }

        let values = dimensions
            .checked_mul(count)
            .ok_or_else(|| ArtifactError::Corrupt("index size overflows".to_string()))?;
        let byte_len = values
            .checked_mul(4)
            .ok_or_else(|| ArtifactError::Corrupt("index byte length overflows".to_string()))?;
        let mut bytes = Vec::new();
        reader
            .by_ref()
            .take(byte_len as u64)
            .read_to_end(&mut bytes)
            .map_err(|error| ArtifactError::Corrupt(error.to_string()))?;
        if bytes.len() != byte_len {
            return Err(ArtifactError::Corrupt(format!(
                "expected {byte_len} vector bytes, found {}",
                bytes.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        Ok(Self { dimensions, data })
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32, ArtifactError> {
    let mut raw = [0u8; 4];
    reader
        .read_exact(&mut raw)
        .map_err(|error| ArtifactError::Corrupt(error.to_string()))?;
    Ok(u32::from_le_bytes(raw))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64, ArtifactError> {
    let mut raw = [0u8; 8];
    reader
        .read_exact(&mut raw)
        .map_err(|error| ArtifactError::Corrupt(error.to_string()))?;
    Ok(u64::from_le_bytes(raw))
}

fn compare_neighbors(left: &Neighbor, right: &Neighbor) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then(left.position.cmp(&right.position))
}
