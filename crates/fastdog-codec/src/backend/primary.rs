use bytes::{Bytes, BytesMut};
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Error, Result};

/// Smallest output reservation for a call.
const MIN_RESERVE: usize = 4 * 1024;

/// Expected zlib expansion used for the first reservation. The arena doubles
/// from there as output actually arrives.
const EXPANSION_HINT: usize = 4;

/// Arena capacity kept between calls; anything above is released.
pub const ARENA_RETAIN_LIMIT: usize = 8 * 1024 * 1024;

/// First output reservation for a payload. The declared size is only an upper
/// bound, never trusted for allocation.
pub(crate) fn initial_reserve(payload_len: usize, limit: usize) -> usize {
    payload_len
        .saturating_mul(EXPANSION_HINT)
        .max(MIN_RESERVE)
        .min(limit)
}

/// One-shot inflater over a reusable output arena.
///
/// Zero-copy output is split off the arena, so the arena is only reclaimed
/// once every handed-out view has been dropped.
#[derive(Debug)]
pub struct PrimaryBackend {
    inflater: Decompress,
    arena: BytesMut,
    memory_limit: Option<usize>,
}

impl PrimaryBackend {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inflater: Decompress::new(true),
            arena: BytesMut::with_capacity(capacity),
            memory_limit: None,
        }
    }

    /// Cap the output a single call may produce. Larger payloads fail with an
    /// inflate fault, leaving them to another backend.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Bytes currently reserved by the arena.
    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub(crate) fn inflate(
        &mut self,
        payload: &[u8],
        original_size: u32,
        zero_copy: bool,
    ) -> Result<Bytes> {
        let result = self.inflate_into_arena(payload, original_size).map(|_| {
            if zero_copy {
                self.arena.split().freeze()
            } else {
                Bytes::copy_from_slice(&self.arena)
            }
        });
        if self.arena.capacity() > ARENA_RETAIN_LIMIT {
            self.arena = BytesMut::new();
        }
        result
    }

    fn inflate_into_arena(&mut self, payload: &[u8], original_size: u32) -> Result<()> {
        let expected = original_size as usize;
        // One spare byte makes an oversized stream observable.
        let limit = expected.saturating_add(1);

        self.inflater.reset(true);
        self.arena.clear();
        let ceiling = self.memory_limit.unwrap_or(usize::MAX);
        self.arena
            .resize(initial_reserve(payload.len(), limit).min(ceiling), 0);

        loop {
            let consumed = self.inflater.total_in() as usize;
            let filled = self.inflater.total_out() as usize;
            let status = self
                .inflater
                .decompress(
                    &payload[consumed..],
                    &mut self.arena[filled..],
                    FlushDecompress::Finish,
                )
                .map_err(|e| Error::Inflate(e.to_string()));
            let written = self.inflater.total_out() as usize;

            match status {
                Ok(Status::StreamEnd) => {
                    self.arena.truncate(written);
                    break;
                }
                Err(e) => {
                    self.arena.clear();
                    return Err(e);
                }
                Ok(_) if written < self.arena.len() => {
                    let stalled = written == filled && self.inflater.total_in() as usize == consumed;
                    if stalled || self.inflater.total_in() as usize >= payload.len() {
                        self.arena.clear();
                        return Err(Error::Inflate("unexpected end of zlib stream".to_string()));
                    }
                }
                Ok(_) if self.arena.len() >= limit => {
                    self.arena.clear();
                    return Err(Error::Integrity {
                        expected: original_size,
                        actual: written,
                    });
                }
                Ok(_) if self.arena.len() >= ceiling => {
                    self.arena.clear();
                    return Err(Error::Inflate(format!(
                        "output exceeds the {ceiling} byte memory limit"
                    )));
                }
                Ok(_) => {
                    let grown = self.arena.len().saturating_mul(2).min(limit).min(ceiling);
                    self.arena.resize(grown, 0);
                }
            }
        }

        let written = self.arena.len();
        if written != expected {
            self.arena.clear();
            return Err(Error::Integrity {
                expected: original_size,
                actual: written,
            });
        }
        Ok(())
    }
}

impl Default for PrimaryBackend {
    fn default() -> Self {
        Self::new()
    }
}
