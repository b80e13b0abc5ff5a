use std::io::Read;

use bytes::Bytes;
use flate2::read::ZlibDecoder;

use super::primary::initial_reserve;
use crate::error::{Error, Result};

/// Streaming inflater with no retained state between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackBackend;

impl FallbackBackend {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn inflate(&mut self, payload: &[u8], original_size: u32) -> Result<Bytes> {
        let expected = u64::from(original_size);
        let limit = (original_size as usize).saturating_add(1);
        let mut out = Vec::with_capacity(initial_reserve(payload.len(), limit));
        ZlibDecoder::new(payload)
            .take(expected + 1)
            .read_to_end(&mut out)
            .map_err(|e| Error::Inflate(e.to_string()))?;

        if out.len() as u64 != expected {
            return Err(Error::Integrity {
                expected: original_size,
                actual: out.len(),
            });
        }
        Ok(Bytes::from(out))
    }
}
