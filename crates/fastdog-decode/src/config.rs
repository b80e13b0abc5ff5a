use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`DualDecoder`](crate::DualDecoder).
///
/// # Examples
///
/// ```
/// use fastdog_decode::DecoderConfig;
/// use std::time::Duration;
///
/// let config = DecoderConfig::default()
///     .max_cache_size(8)
///     .retry_attempts(2)
///     .init_timeout(Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Serve repeated decodes of identical input from the LRU cache.
    ///
    /// Default: true
    pub enable_cache: bool,

    /// Number of results kept before the least recently used is evicted.
    /// Zero disables caching.
    ///
    /// Default: 32
    pub max_cache_size: usize,

    /// Instantiation attempts for the primary backend before demoting.
    ///
    /// Default: 3
    pub retry_attempts: u32,

    /// Delay unit between instantiation attempts; attempt N waits `N × base`.
    ///
    /// Default: 100ms
    pub init_base_delay: Duration,

    /// Upper bound for a single instantiation attempt.
    ///
    /// Default: 5s
    pub init_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            max_cache_size: 32,
            retry_attempts: 3,
            init_base_delay: Duration::from_millis(100),
            init_timeout: Duration::from_secs(5),
        }
    }
}

impl DecoderConfig {
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

    pub fn init_base_delay(mut self, delay: Duration) -> Self {
        self.init_base_delay = delay;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub(crate) fn cache_capacity(&self) -> usize {
        if self.enable_cache { self.max_cache_size } else { 0 }
    }
}
