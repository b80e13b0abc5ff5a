//! Error types for fastdog-fetch.

use thiserror::Error;

use crate::core::ByteRange;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The client could not complete a request (DNS, connect, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered, but not with 2xx/206. Never retried.
    #[error("unexpected HTTP status {status} for {resource}")]
    Status { resource: String, status: u16 },

    /// A ranged response carried a different number of bytes than requested.
    #[error("range {range} returned {actual} bytes")]
    ShortBody { range: ByteRange, actual: usize },

    /// Every attempt at one request failed with a transport error. Resume data
    /// is kept so a later call can continue from `downloaded`.
    #[error("{resource} failed after {attempts} attempts ({downloaded} bytes kept): {message}")]
    RetriesExhausted {
        resource: String,
        attempts: u32,
        downloaded: u64,
        message: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ShortBody { .. })
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
