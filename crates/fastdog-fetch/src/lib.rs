//! Chunked, resumable range downloads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Options, progress snapshots, resume data, final stats
//! - `core` - Pure transformations: range planning, speed and ETA
//! - `effects` - The [`RangeClient`] seam and the [`Downloader`] loop
//!
//! # Behaviour
//!
//! - **Ordered delivery**: chunks reach the sink in byte-offset order
//! - **Same-range retry**: a transport failure retries the failed range with a
//!   fixed backoff; earlier ranges are never fetched again
//! - **Cooperative control**: pause holds before the next request, cancel
//!   aborts the in-flight one
//! - **Mechanism-only**: the overall give-up policy belongs to the caller

mod core;
mod data;
mod effects;
mod error;

pub use self::core::{ByteRange, RateMeter, estimate_eta, next_range, ranges};
pub use data::{DownloadStatus, Eta, FinalStats, Progress, ResumeData, StreamOptions};
pub use effects::{
    ChunkSink, DownloadControl, Downloader, FnSink, RangeClient, RangeResponse, ResourceInfo,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{FetchError, Result};
