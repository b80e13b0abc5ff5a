use std::time::Duration;

use fastdog_decode::DecoderConfig;
use fastdog_fetch::StreamOptions;
use serde::{Deserialize, Serialize};

/// Everything a [`ModelLoader`](crate::ModelLoader) can be tuned with.
///
/// # Examples
///
/// ```
/// use fastdog::LoaderConfig;
///
/// let config = LoaderConfig::default()
///     .chunk_size(512 * 1024)
///     .max_cache_size(4)
///     .enable_logging(false);
/// assert_eq!(config.stream_options().chunk_size, 512 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Emit the loader's own `tracing` events. Lower crates log regardless;
    /// filter those through the subscriber.
    ///
    /// Default: true
    pub enable_logging: bool,

    /// Default: true
    pub enable_cache: bool,

    /// Default: 32
    pub max_cache_size: usize,

    /// Used both for primary backend bring-up and for retries per range.
    ///
    /// Default: 3
    pub retry_attempts: u32,

    /// Zero downloads with a single request.
    ///
    /// Default: 1 MiB
    pub chunk_size: u64,

    /// Default: true
    pub enable_resume: bool,

    /// Fixed delay between range retries.
    ///
    /// Default: 1s
    pub retry_backoff: Duration,

    /// Default: 5s
    pub init_timeout: Duration,

    /// Default: 100ms
    pub init_base_delay: Duration,

    /// Default: 100ms
    pub pause_poll_interval: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let decoder = DecoderConfig::default();
        let stream = StreamOptions::default();
        Self {
            enable_logging: true,
            enable_cache: decoder.enable_cache,
            max_cache_size: decoder.max_cache_size,
            retry_attempts: decoder.retry_attempts,
            chunk_size: stream.chunk_size,
            enable_resume: stream.enable_resume,
            retry_backoff: stream.retry_backoff,
            init_timeout: decoder.init_timeout,
            init_base_delay: decoder.init_base_delay,
            pause_poll_interval: stream.pause_poll_interval,
        }
    }
}

impl LoaderConfig {
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn enable_resume(mut self, enabled: bool) -> Self {
        self.enable_resume = enabled;
        self
    }

    pub fn retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = delay;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn init_base_delay(mut self, delay: Duration) -> Self {
        self.init_base_delay = delay;
        self
    }

    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::default()
            .enable_cache(self.enable_cache)
            .max_cache_size(self.max_cache_size)
            .retry_attempts(self.retry_attempts)
            .init_base_delay(self.init_base_delay)
            .init_timeout(self.init_timeout)
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::default()
            .chunk_size(self.chunk_size)
            .enable_resume(self.enable_resume)
            .max_retries(self.retry_attempts)
            .retry_backoff(self.retry_backoff)
            .pause_poll_interval(self.pause_poll_interval)
    }
}
