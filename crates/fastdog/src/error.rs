//! Error types for fastdog.

use std::sync::Arc;

use fastdog_state::LoadingState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    State(#[from] fastdog_state::StateError),

    #[error(transparent)]
    Decoder(#[from] fastdog_decode::DecoderError),

    #[error(transparent)]
    Fetch(#[from] fastdog_fetch::FetchError),

    /// The envelope being streamed in was rejected before it was complete.
    #[error("streaming decode failed: {0}")]
    Stream(#[source] Arc<fastdog_codec::Error>),

    #[error("download ended after {received} bytes without a complete envelope")]
    Incomplete {
        received: usize,
        expected: Option<usize>,
    },

    #[error("model build failed: {0}")]
    Build(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LoadError {
    /// Phase recorded in the state machine when this error ends a load.
    pub fn phase(&self, current: LoadingState) -> LoadingState {
        match self {
            Self::Fetch(_) => LoadingState::Downloading,
            Self::Stream(_) | Self::Incomplete { .. } => LoadingState::Decoding,
            Self::Build(_) => LoadingState::Building,
            Self::State(_) | Self::Decoder(_) => current,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
