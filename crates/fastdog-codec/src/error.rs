use std::io;

use crate::format::HEADER_SIZE;

/// Header-level failures. Deterministic for a given buffer, so never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("buffer too short for header: {len} bytes, need {}", HEADER_SIZE)]
    TooShort { len: usize },

    #[error("magic mismatch: found {found:02x?}")]
    BadMagic { found: Vec<u8> },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("length mismatch: header declares {declared} compressed bytes, only {available} available")]
    LengthMismatch { declared: u32, available: usize },

    #[error("missing original-size trailer after {compressed_size}-byte payload")]
    MissingTrailer { compressed_size: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("integrity check failed: header declares {expected} bytes, inflated {actual}")]
    Integrity { expected: u32, actual: usize },

    #[error("inflate failed: {0}")]
    Inflate(String),

    #[error("payload is not a valid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("declared original size {size} exceeds limit of {limit} bytes")]
    SizeLimit { size: u32, limit: u32 },

    #[error("expected format version {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("payload of {len} bytes does not fit a u32 size field")]
    Oversized { len: usize },

    #[error("failed to compress payload: {0}")]
    Encode(#[source] io::Error),
}

impl Error {
    /// True for failures that depend on the backend that produced them rather
    /// than on the input header, i.e. ones another backend might not repeat.
    pub fn is_backend_fault(&self) -> bool {
        matches!(self, Self::Integrity { .. } | Self::Inflate(_))
    }
}

/// Failures while reading embedded buffers out of a scene document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("decoded payload is binary, not a JSON scene document")]
    NotJson,

    #[error("scene document has no buffer at index {0}")]
    MissingBuffer(usize),

    #[error("buffer {0} is not an embedded base64 data URI")]
    NotEmbedded(usize),

    #[error("buffer {index} declares {declared} bytes but decodes to {actual}")]
    LengthMismatch {
        index: usize,
        declared: u64,
        actual: usize,
    },

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
