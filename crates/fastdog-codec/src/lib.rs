//! FastDog container format.
//!
//! # Architecture
//!
//! - `format.rs` - Envelope layout, header parsing, encoding
//! - `backend/` - Primary (arena-backed) and fallback (streaming) inflaters
//! - `codec.rs` - Decode pipeline shared by both backends
//! - `stream.rs` - Incremental decoding of partially received envelopes
//! - `document.rs` - Embedded buffer access for JSON scene documents
//!
//! Integers are little-endian u32. Payloads are zlib streams; the version
//! field only selects how the inflated bytes are interpreted.

pub use backend::{ARENA_RETAIN_LIMIT, Backend, BackendKind, FallbackBackend, PrimaryBackend};
pub use codec::{DecodeOptions, DecodeResult, DecodeStats, DecodedData, decode, decode_to_binary};
pub use document::SceneDocument;
pub use error::{DocumentError, Error, FormatError, Result};
pub use format::{
    FORMAT_VERSION_BINARY, FORMAT_VERSION_JSON, HEADER_SIZE, Header, MAGIC, TRAILER_SIZE, encode,
    encode_json, parse_header, peek_envelope_len, validate_format,
};
pub use stream::{ChunkOutcome, StreamDecoder};

mod backend;
mod codec;
mod document;
mod error;
pub mod format;
mod stream;
