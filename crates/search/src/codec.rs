//! Fixed-width byte encoding of embedding vectors
//!
//! Vectors are stored as `D` consecutive little-endian float32 values, which
//! is the layout RediSearch expects for a `FLOAT32` vector field.

use docqa_common::errors::AppError;
use thiserror::Error;

const F32_WIDTH: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Byte length {0} is not a multiple of 4")]
    Misaligned(usize),
}

impl From<CodecError> for AppError {
    fn from(e: CodecError) -> Self {
        AppError::IndexService {
            message: e.to_string(),
        }
    }
}

/// Encode a vector of the declared dimension
pub fn encode_vector(vector: &[f32], dimension: usize) -> Result<Vec<u8>, CodecError> {
    if vector.len() != dimension {
        return Err(CodecError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }

    let mut bytes = Vec::with_capacity(dimension * F32_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    Ok(bytes)
}

/// Decode bytes written by `encode_vector`
pub fn decode_vector(bytes: &[u8], dimension: usize) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % F32_WIDTH != 0 {
        return Err(CodecError::Misaligned(bytes.len()));
    }
    let actual = bytes.len() / F32_WIDTH;
    if actual != dimension {
        return Err(CodecError::DimensionMismatch {
            expected: dimension,
            actual,
        });
    }

    Ok(bytes
        .chunks_exact(F32_WIDTH)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
