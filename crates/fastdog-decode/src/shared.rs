//! Process-wide decoder, created on first request and dropped on demand.
//!
//! Prefer owning a [`DualDecoder`] directly. This exists for call sites that
//! cannot thread one through.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::DecoderConfig;
use crate::decoder::DualDecoder;

pub type SharedDecoder = Arc<tokio::sync::Mutex<DualDecoder>>;

static INSTANCE: Lazy<Mutex<Option<SharedDecoder>>> = Lazy::new(|| Mutex::new(None));

/// Return the shared decoder, creating it from `config` if none exists.
///
/// `config` is ignored once an instance is alive.
pub fn get_or_init(config: &DecoderConfig) -> SharedDecoder {
    let mut slot = INSTANCE.lock();
    slot.get_or_insert_with(|| {
        debug!("creating shared decoder");
        Arc::new(tokio::sync::Mutex::new(DualDecoder::new(config.clone())))
    })
    .clone()
}

pub fn is_initialized() -> bool {
    INSTANCE.lock().is_some()
}

/// Drop the shared decoder. Handles already given out stay usable; the next
/// [`get_or_init`] builds a fresh instance. Returns whether one existed.
pub fn dispose() -> bool {
    let disposed = INSTANCE.lock().take().is_some();
    if disposed {
        debug!("shared decoder disposed");
    }
    disposed
}
