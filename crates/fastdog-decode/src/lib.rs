//! Dual-backend decoding for FastDog envelopes.
//!
//! # Architecture
//!
//! - `select.rs` - Host probing, primary bring-up with retry and warm-up
//! - `decoder.rs` - [`DualDecoder`]: cache, dispatch, per-call fallback, counters
//! - `cache.rs` - Prefix-keyed LRU of decode results
//! - `worker.rs` - Background decoders behind a task-id keyed channel
//! - `shared.rs` - Optional lazily created process-wide instance
//!
//! A decoder demotes itself to the fallback backend permanently when the
//! primary cannot be brought up; a single failing call on a healthy primary
//! is retried on fallback without demoting.

pub use cache::{CacheKey, CacheStats, DecodeCache, PREFIX_LEN};
pub use config::DecoderConfig;
pub use decoder::DualDecoder;
pub use error::{BackendInitError, DecoderError, Result};
pub use select::{BackendHost, NativeHost, Selection, init_delay, select_backend};
pub use stats::{BackendCounters, ErrorStats, PerformanceStats};
pub use worker::{DecodeWorkerPool, TaskId};

mod cache;
mod config;
mod decoder;
mod error;
mod select;
pub mod shared;
mod stats;
mod worker;
