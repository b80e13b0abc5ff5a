use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for [`Downloader::download_stream`](crate::Downloader::download_stream).
///
/// # Examples
///
/// ```
/// use fastdog_fetch::StreamOptions;
/// use std::time::Duration;
///
/// let options = StreamOptions::default()
///     .chunk_size(256 * 1024)
///     .max_retries(5)
///     .retry_backoff(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Bytes per range request. Zero downloads the resource with one
    /// unranged request and a single `on_chunk` call.
    ///
    /// Default: 1 MiB
    pub chunk_size: u64,

    /// Continue from stored resume data for the same resource.
    ///
    /// Default: true
    pub enable_resume: bool,

    /// Retries per range after a transport failure.
    ///
    /// - Total attempts per range = 1 + max_retries
    /// - Status errors are never retried
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Fixed delay before each retry.
    ///
    /// Default: 1s
    pub retry_backoff: Duration,

    /// How often a paused transfer checks whether it may continue.
    ///
    /// Default: 100ms
    pub pause_poll_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            enable_resume: true,
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

impl StreamOptions {
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn enable_resume(mut self, enabled: bool) -> Self {
        self.enable_resume = enabled;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = delay;
        self
    }

    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }
}
