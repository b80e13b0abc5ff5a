//! Envelope layout, header parsing and encoding.
//!
//! ```text
//! [0..8)          magic "FASTDOG\0"
//! [8..12)         version          u32 LE
//! [12..16)        compressed size  u32 LE
//! [16..16+C)      zlib stream
//! [16+C..20+C)    original size    u32 LE (trailer)
//! ```

use std::io::Write;
use std::ops::Range;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::error::{Error, FormatError, Result};

pub const MAGIC: [u8; 8] = *b"FASTDOG\0";
pub const HEADER_SIZE: usize = 16;
pub const TRAILER_SIZE: usize = 4;

/// Payload is a UTF-8 JSON scene document.
pub const FORMAT_VERSION_JSON: u32 = 1;
/// Payload is a raw binary scene container. Any later version is binary too.
pub const FORMAT_VERSION_BINARY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload interpretation: 1 is a JSON document, 2 and above raw binary.
    pub version: u32,

    /// Length of the zlib payload that follows the header.
    pub compressed_size: u32,

    /// Inflated length, read from the trailer after the payload.
    pub original_size: u32,
}

impl Header {
    /// Byte range of the compressed payload inside the envelope.
    pub fn payload_range(&self) -> Range<usize> {
        HEADER_SIZE..HEADER_SIZE + self.compressed_size as usize
    }

    /// Total envelope length including the trailer.
    pub fn envelope_len(&self) -> usize {
        envelope_len(self.compressed_size)
    }

    pub fn is_json(&self) -> bool {
        self.version == FORMAT_VERSION_JSON
    }

    /// `compressed / original`, 0 for an empty payload.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            f64::from(self.compressed_size) / f64::from(self.original_size)
        }
    }
}

fn envelope_len(compressed_size: u32) -> usize {
    HEADER_SIZE + compressed_size as usize + TRAILER_SIZE
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

/// True iff the buffer holds a full header and starts with [`MAGIC`].
pub fn validate_format(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_SIZE && bytes[..MAGIC.len()] == MAGIC
}

fn check_magic(bytes: &[u8]) -> std::result::Result<(), FormatError> {
    let n = bytes.len().min(MAGIC.len());
    if bytes[..n] != MAGIC[..n] {
        return Err(FormatError::BadMagic {
            found: bytes[..n].to_vec(),
        });
    }
    Ok(())
}

pub fn parse_header(bytes: &[u8]) -> std::result::Result<Header, FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::TooShort { len: bytes.len() });
    }
    check_magic(bytes)?;

    let version = read_u32(bytes, 8);
    if version == 0 {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let compressed_size = read_u32(bytes, 12);
    let available = bytes.len() - HEADER_SIZE;
    if compressed_size as usize > available {
        return Err(FormatError::LengthMismatch {
            declared: compressed_size,
            available,
        });
    }

    let trailer_at = HEADER_SIZE + compressed_size as usize;
    if bytes.len() < trailer_at + TRAILER_SIZE {
        return Err(FormatError::MissingTrailer { compressed_size });
    }

    Ok(Header {
        version,
        compressed_size,
        original_size: read_u32(bytes, trailer_at),
    })
}

/// Inspect a possibly partial envelope.
///
/// Rejects a wrong magic as soon as any of its bytes are present and returns
/// the full envelope length once the fixed header has arrived.
pub fn peek_envelope_len(bytes: &[u8]) -> std::result::Result<Option<usize>, FormatError> {
    check_magic(bytes)?;
    if bytes.len() < HEADER_SIZE {
        return Ok(None);
    }
    let version = read_u32(bytes, 8);
    if version == 0 {
        return Err(FormatError::UnsupportedVersion(version));
    }
    Ok(Some(envelope_len(read_u32(bytes, 12))))
}

/// Wrap `payload` into an envelope of the given format version.
pub fn encode(version: u32, payload: &[u8]) -> Result<Vec<u8>> {
    if version == 0 {
        return Err(FormatError::UnsupportedVersion(version).into());
    }
    let original_size =
        u32::try_from(payload.len()).map_err(|_| Error::Oversized { len: payload.len() })?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).map_err(Error::Encode)?;
    let compressed = encoder.finish().map_err(Error::Encode)?;
    let compressed_size =
        u32::try_from(compressed.len()).map_err(|_| Error::Oversized { len: compressed.len() })?;

    let mut out = Vec::with_capacity(envelope_len(compressed_size));
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&compressed_size.to_le_bytes());
    out.extend_from_slice(&compressed);
    out.extend_from_slice(&original_size.to_le_bytes());
    Ok(out)
}

/// Serialize `document` and wrap it as a version 1 envelope.
pub fn encode_json(document: &serde_json::Value) -> Result<Vec<u8>> {
    encode(FORMAT_VERSION_JSON, &serde_json::to_vec(document)?)
}
