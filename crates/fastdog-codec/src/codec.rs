//! The decode pipeline: header → slice → inflate → verify → interpret.

use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::format::{self, Header};

/// Decoded payload of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedData {
    /// Version 1 scene document.
    Json(serde_json::Value),
    /// Inflated bytes, either binary-format payloads or raw output requests.
    Binary(Bytes),
}

impl DecodedData {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Json(_) => None,
            Self::Binary(b) => Some(b),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeStats {
    /// Inflated length declared by the envelope.
    pub original_size: u32,

    /// Length of the zlib payload.
    pub compressed_size: u32,

    /// `compressed_size / original_size`, 0 for an empty payload.
    pub compression_ratio: f64,

    /// Time spent parsing, inflating and interpreting, in milliseconds.
    pub decode_time_ms: f64,

    /// Version field of the envelope header.
    pub format_version: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub data: DecodedData,
    pub stats: DecodeStats,
}

/// Per-call decode knobs. Serialized into cache keys, so keep it plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Skip JSON materialization and return the inflated bytes.
    pub raw: bool,
    /// Reject envelopes whose declared original size is larger.
    pub max_original_size: Option<u32>,
    /// Reject envelopes of any other format version.
    pub expected_version: Option<u32>,
}

impl DecodeOptions {
    pub fn raw() -> Self {
        Self {
            raw: true,
            ..Self::default()
        }
    }

    pub fn max_original_size(mut self, limit: u32) -> Self {
        self.max_original_size = Some(limit);
        self
    }

    pub fn expected_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }

    fn check(&self, header: &Header) -> Result<()> {
        if let Some(limit) = self.max_original_size
            && header.original_size > limit
        {
            return Err(Error::SizeLimit {
                size: header.original_size,
                limit,
            });
        }
        if let Some(expected) = self.expected_version
            && header.version != expected
        {
            return Err(Error::VersionMismatch {
                expected,
                found: header.version,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Document,
    Binary { zero_copy: bool },
}

impl Backend {
    /// Cheap structural check; does not inflate.
    pub fn validate(&self, bytes: &[u8]) -> bool {
        format::validate_format(bytes)
    }

    /// Decode to a JSON document (version 1) or bytes (version ≥ 2).
    pub fn decode(&mut self, bytes: &[u8], options: &DecodeOptions) -> Result<DecodeResult> {
        let output = if options.raw {
            Output::Binary { zero_copy: false }
        } else {
            Output::Document
        };
        self.run(bytes, options, output)
    }

    /// Decode to a fresh copy of the inflated bytes.
    pub fn decode_to_binary(
        &mut self,
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> Result<DecodeResult> {
        self.run(bytes, options, Output::Binary { zero_copy: false })
    }

    /// Decode to a view of backend-owned memory.
    pub fn decode_zero_copy(
        &mut self,
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> Result<DecodeResult> {
        self.run(bytes, options, Output::Binary { zero_copy: true })
    }

    pub fn decode_with(
        &mut self,
        bytes: &[u8],
        zero_copy: bool,
        options: &DecodeOptions,
    ) -> Result<DecodeResult> {
        if zero_copy {
            self.decode_zero_copy(bytes, options)
        } else {
            self.decode(bytes, options)
        }
    }

    fn run(&mut self, bytes: &[u8], options: &DecodeOptions, output: Output) -> Result<DecodeResult> {
        let started = Instant::now();
        let header = format::parse_header(bytes)?;
        options.check(&header)?;

        let payload = &bytes[header.payload_range()];
        let zero_copy = matches!(output, Output::Binary { zero_copy: true });
        let inflated = self.inflate(payload, header.original_size, zero_copy)?;

        let data = match output {
            Output::Document if header.is_json() => {
                DecodedData::Json(serde_json::from_slice(&inflated)?)
            }
            _ => DecodedData::Binary(inflated),
        };

        Ok(DecodeResult {
            data,
            stats: DecodeStats {
                original_size: header.original_size,
                compressed_size: header.compressed_size,
                compression_ratio: header.compression_ratio(),
                decode_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                format_version: header.version,
            },
        })
    }
}

/// Decode an envelope with a throwaway fallback backend.
pub fn decode(bytes: &[u8]) -> Result<DecodeResult> {
    Backend::fallback().decode(bytes, &DecodeOptions::default())
}

/// Decode an envelope to raw bytes with a throwaway fallback backend.
pub fn decode_to_binary(bytes: &[u8]) -> Result<DecodeResult> {
    Backend::fallback().decode_to_binary(bytes, &DecodeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::format::{encode, encode_json};
    use serde_json::json;

    fn both() -> [Backend; 2] {
        [Backend::primary(), Backend::fallback()]
    }

    #[test]
    fn json_envelope_decodes_on_both_backends() {
        let envelope = encode_json(&json!({"x": 1})).unwrap();
        for mut backend in both() {
            let result = backend.decode(&envelope, &DecodeOptions::default()).unwrap();
            assert_eq!(result.data, DecodedData::Json(json!({"x": 1})));
            assert_eq!(result.stats.original_size, 7);
            assert_eq!(result.stats.format_version, 1);
        }
    }

    #[test]
    fn binary_version_is_not_parsed() {
        let envelope = encode(2, &[1, 2, 3, 4]).unwrap();
        let result = decode(&envelope).unwrap();
        assert_eq!(result.data.as_bytes().unwrap().as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn raw_option_skips_json() {
        let envelope = encode_json(&json!([1, 2])).unwrap();
        let mut backend = Backend::primary();
        let result = backend.decode(&envelope, &DecodeOptions::raw()).unwrap();
        assert_eq!(result.data.as_bytes().unwrap().as_ref(), b"[1,2]");
    }

    #[test]
    fn zero_copy_hands_out_arena_memory() {
        let payload = vec![42u8; 4096];
        let envelope = encode(2, &payload).unwrap();
        let mut backend = Backend::primary();
        let result = backend
            .decode_zero_copy(&envelope, &DecodeOptions::default())
            .unwrap();
        assert_eq!(result.data.as_bytes().unwrap().as_ref(), payload.as_slice());
        let Backend::Primary(primary) = &backend else {
            unreachable!()
        };
        assert!(primary.arena_capacity() < payload.len());
    }

    #[test]
    fn wrong_original_size_is_integrity_error() {
        let mut envelope = encode(2, b"abcdef").unwrap();
        let len = envelope.len();
        envelope[len - 4..].copy_from_slice(&5u32.to_le_bytes());
        for mut backend in both() {
            let err = backend
                .decode(&envelope, &DecodeOptions::default())
                .unwrap_err();
            assert!(matches!(err, Error::Integrity { expected: 5, .. }), "{err}");
            assert!(err.is_backend_fault());
        }
    }

    #[test]
    fn corrupt_stream_fails_inflate_or_integrity() {
        let mut envelope = encode(2, &[9u8; 64]).unwrap();
        envelope[format::HEADER_SIZE] ^= 0xff;
        for mut backend in both() {
            let err = backend
                .decode(&envelope, &DecodeOptions::default())
                .unwrap_err();
            assert!(err.is_backend_fault(), "{}: {err}", backend.kind());
        }
    }

    #[test]
    fn options_enforce_limits() {
        let envelope = encode(2, &[0u8; 100]).unwrap();
        let mut backend = Backend::of_kind(BackendKind::Fallback);
        assert!(matches!(
            backend.decode(&envelope, &DecodeOptions::default().max_original_size(10)),
            Err(Error::SizeLimit { size: 100, limit: 10 })
        ));
        assert!(matches!(
            backend.decode(&envelope, &DecodeOptions::default().expected_version(1)),
            Err(Error::VersionMismatch { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn invalid_json_is_reported() {
        let envelope = encode(1, b"{not json").unwrap();
        assert!(matches!(decode(&envelope), Err(Error::Json(_))));
    }
}
