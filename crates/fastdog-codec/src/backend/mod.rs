//! Interchangeable inflate implementations.
//!
//! Both variants run the same envelope pipeline (see [`crate::codec`]); they
//! differ only in how the zlib payload is inflated and who owns the output.

mod fallback;
mod primary;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use fallback::FallbackBackend;
pub use primary::{ARENA_RETAIN_LIMIT, PrimaryBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Accelerated one-shot inflater with a reusable arena.
    Primary,
    /// Portable streaming inflater.
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Primary => write!(f, "primary"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug)]
pub enum Backend {
    Primary(PrimaryBackend),
    Fallback(FallbackBackend),
}

impl Backend {
    pub fn primary() -> Self {
        Self::Primary(PrimaryBackend::new())
    }

    pub fn fallback() -> Self {
        Self::Fallback(FallbackBackend::new())
    }

    /// Fresh backend of the given kind, with no shared state.
    pub fn of_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Primary => Self::primary(),
            BackendKind::Fallback => Self::fallback(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Primary(_) => BackendKind::Primary,
            Self::Fallback(_) => BackendKind::Fallback,
        }
    }

    pub(crate) fn inflate(
        &mut self,
        payload: &[u8],
        original_size: u32,
        zero_copy: bool,
    ) -> Result<Bytes> {
        match self {
            Self::Primary(b) => b.inflate(payload, original_size, zero_copy),
            Self::Fallback(b) => b.inflate(payload, original_size),
        }
    }
}
