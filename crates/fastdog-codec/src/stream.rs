//! Incremental decoding of an envelope that arrives in pieces.
//!
//! Chunks must be fed in byte-offset order. The decoder buffers them until
//! the full envelope is present and then runs the regular pipeline once, so
//! the outcome does not depend on how the input was sliced.

use std::sync::Arc;

use bytes::BytesMut;
use tracing::debug;

use crate::backend::{Backend, BackendKind};
use crate::codec::{DecodeOptions, DecodeResult};
use crate::error::Error;
use crate::format;

/// Result of feeding one chunk.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    /// `false` once the envelope has been rejected.
    pub success: bool,
    /// Set once the full envelope was received and decoded.
    pub is_complete: bool,
    /// Fraction of the envelope received, in `0.0..=1.0`.
    pub progress: f64,
    /// Why the envelope was rejected. Repeated on every later call until reset.
    pub error: Option<Arc<Error>>,
    /// Present only on the call that completed the envelope.
    pub data: Option<DecodeResult>,
}

#[derive(Debug, Clone)]
enum StreamState {
    Collecting,
    Complete,
    Failed(Arc<Error>),
}

#[derive(Debug)]
pub struct StreamDecoder {
    backend: Backend,
    options: DecodeOptions,
    zero_copy: bool,
    buffer: BytesMut,
    expected: Option<usize>,
    state: StreamState,
}

impl StreamDecoder {
    pub fn new(backend: Backend) -> Self {
        Self::with_options(backend, DecodeOptions::default(), false)
    }

    pub fn with_options(backend: Backend, options: DecodeOptions, zero_copy: bool) -> Self {
        Self {
            backend,
            options,
            zero_copy,
            buffer: BytesMut::new(),
            expected: None,
            state: StreamState::Collecting,
        }
    }

    pub fn add_chunk(&mut self, chunk: &[u8]) -> ChunkOutcome {
        match &self.state {
            StreamState::Complete => return self.outcome(None),
            StreamState::Failed(e) => return self.failed(e.clone()),
            StreamState::Collecting => {}
        }

        self.buffer.extend_from_slice(chunk);

        if self.expected.is_none() {
            match format::peek_envelope_len(&self.buffer) {
                Ok(Some(len)) => {
                    debug!(expected = len, "envelope size known");
                    self.expected = Some(len);
                }
                Ok(None) => {}
                Err(e) => return self.fail(e.into()),
            }
        }

        let Some(expected) = self.expected else {
            return self.outcome(None);
        };
        if self.buffer.len() < expected {
            return self.outcome(None);
        }

        let result =
            self.backend
                .decode_with(&self.buffer[..expected], self.zero_copy, &self.options);
        match result {
            Ok(decoded) => {
                self.state = StreamState::Complete;
                self.outcome(Some(decoded))
            }
            Err(e) => self.fail(e),
        }
    }

    /// Drop buffered input and start over with the same backend.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.state = StreamState::Collecting;
    }

    pub fn progress(&self) -> f64 {
        match (&self.state, self.expected) {
            (StreamState::Complete, _) => 1.0,
            (_, Some(expected)) if expected > 0 => {
                (self.buffer.len() as f64 / expected as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Full envelope length, once the header has arrived.
    pub fn expected_size(&self) -> Option<usize> {
        self.expected
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, StreamState::Complete)
    }

    /// The full envelope, once every byte of it has been received. Stays
    /// available after a failed decode so another backend can retry it.
    pub fn envelope(&self) -> Option<&[u8]> {
        let expected = self.expected?;
        (self.buffer.len() >= expected).then(|| &self.buffer[..expected])
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn zero_copy(&self) -> bool {
        self.zero_copy
    }

    /// Release the buffer and the backend.
    pub fn free(self) {
        debug!(buffered = self.buffer.len(), "stream decoder released");
    }

    fn fail(&mut self, error: Error) -> ChunkOutcome {
        let error = Arc::new(error);
        self.state = StreamState::Failed(error.clone());
        self.failed(error)
    }

    fn failed(&self, error: Arc<Error>) -> ChunkOutcome {
        ChunkOutcome {
            success: false,
            is_complete: false,
            progress: self.progress(),
            error: Some(error),
            data: None,
        }
    }

    fn outcome(&self, data: Option<DecodeResult>) -> ChunkOutcome {
        ChunkOutcome {
            success: true,
            is_complete: self.is_complete(),
            progress: self.progress(),
            error: None,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FORMAT_VERSION_BINARY, HEADER_SIZE, encode, encode_json};
    use serde_json::json;

    #[test]
    fn progress_unknown_until_header_arrives() {
        let envelope = encode_json(&json!({"x": 1})).unwrap();
        let mut decoder = StreamDecoder::new(Backend::primary());

        let outcome = decoder.add_chunk(&envelope[..HEADER_SIZE - 1]);
        assert!(outcome.success);
        assert_eq!(outcome.progress, 0.0);
        assert_eq!(decoder.expected_size(), None);

        let outcome = decoder.add_chunk(&envelope[HEADER_SIZE - 1..HEADER_SIZE]);
        assert_eq!(decoder.expected_size(), Some(envelope.len()));
        assert!(outcome.progress > 0.0 && outcome.progress < 1.0);
    }

    #[test]
    fn completes_exactly_once() {
        let envelope = encode(FORMAT_VERSION_BINARY, &[5u8; 32]).unwrap();
        let mut decoder = StreamDecoder::new(Backend::fallback());
        let outcome = decoder.add_chunk(&envelope);
        assert!(outcome.is_complete);
        assert!(outcome.data.is_some());

        let again = decoder.add_chunk(b"trailing");
        assert!(again.success && again.is_complete);
        assert!(again.data.is_none());
        assert_eq!(decoder.buffer_size(), envelope.len());
    }

    #[test]
    fn bad_magic_fails_early_and_sticks() {
        let mut decoder = StreamDecoder::new(Backend::primary());
        let outcome = decoder.add_chunk(b"NOPE");
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(!decoder.add_chunk(b"more").success);

        decoder.reset();
        assert_eq!(decoder.buffer_size(), 0);
        let envelope = encode_json(&json!(null)).unwrap();
        assert!(decoder.add_chunk(&envelope).is_complete);
    }

    #[test]
    fn trailing_bytes_in_final_chunk_are_ignored() {
        let envelope = encode_json(&json!({"k": "v"})).unwrap();
        let mut input = envelope.clone();
        input.extend_from_slice(b"garbage");
        let mut decoder = StreamDecoder::new(Backend::primary());
        let outcome = decoder.add_chunk(&input);
        assert_eq!(
            outcome.data.unwrap().data.as_json(),
            Some(&json!({"k": "v"}))
        );
    }
}
