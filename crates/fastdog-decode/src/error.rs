use std::sync::Arc;
use std::time::Duration;

use fastdog_codec::BackendKind;

/// Why the primary backend could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendInitError {
    #[error("host lacks the primary backend capability")]
    Unsupported,

    #[error("instantiation attempt {attempt} failed: {message}")]
    Instantiate { attempt: u32, message: String },

    #[error("instantiation attempt {attempt} timed out after {timeout:?}")]
    Timeout { attempt: u32, timeout: Duration },

    #[error("warm-up decode failed: {0}")]
    WarmUp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("no usable decode backend on this host")]
    EnvironmentUnsupported,

    #[error("backend initialization failed: {0}")]
    BackendInit(#[from] BackendInitError),

    /// `attempt` counts backends tried for the call: 1 for the active
    /// backend, 2 for the fallback retry after a primary fault.
    #[error("{backend} backend failed to decode (attempt {attempt}): {source}")]
    Decode {
        backend: BackendKind,
        attempt: u32,
        #[source]
        source: Arc<fastdog_codec::Error>,
    },

    #[error("all backends failed (primary: {primary}; fallback: {fallback})")]
    AllBackendsFailed {
        primary: Arc<fastdog_codec::Error>,
        fallback: Arc<fastdog_codec::Error>,
    },

    #[error("decode worker {0} is no longer running")]
    WorkerGone(usize),
}

impl DecoderError {
    /// The underlying codec error of the last backend attempted, if any.
    pub fn codec_error(&self) -> Option<&fastdog_codec::Error> {
        match self {
            Self::Decode { source, .. } => Some(source.as_ref()),
            Self::AllBackendsFailed { fallback, .. } => Some(fallback.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecoderError>;
