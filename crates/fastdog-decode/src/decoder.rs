use std::sync::Arc;
use std::time::Instant;

use fastdog_codec::{
    Backend, BackendKind, DecodeOptions, DecodeResult, StreamDecoder, validate_format,
};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, DecodeCache};
use crate::config::DecoderConfig;
use crate::error::{DecoderError, Result};
use crate::select::{BackendHost, NativeHost, select_backend};
use crate::stats::{ErrorStats, PerformanceStats};

#[derive(Debug)]
enum BackendState {
    Uninitialized,
    Ready(Backend),
}

/// Decoder that prefers the primary backend and falls back to the portable one.
///
/// Backend selection happens once, on first use. A demotion to fallback is
/// permanent for the instance. Decode calls take `&mut self`; callers that
/// need concurrency use one instance per task or a
/// [`DecodeWorkerPool`](crate::DecodeWorkerPool).
pub struct DualDecoder {
    config: DecoderConfig,
    host: Arc<dyn BackendHost>,
    state: BackendState,
    cache: DecodeCache,
    perf: PerformanceStats,
    errors: ErrorStats,
}

impl std::fmt::Debug for DualDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualDecoder")
            .field("config", &self.config)
            .field("active", &self.active_backend())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DualDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_host(config, Arc::new(NativeHost))
    }

    pub fn with_host(config: DecoderConfig, host: Arc<dyn BackendHost>) -> Self {
        let cache = DecodeCache::new(config.cache_capacity());
        Self {
            config,
            host,
            state: BackendState::Uninitialized,
            cache,
            perf: PerformanceStats::default(),
            errors: ErrorStats::default(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Select a backend if none is active yet. Idempotent.
    pub async fn initialize(&mut self) -> Result<BackendKind> {
        if let BackendState::Ready(backend) = &self.state {
            return Ok(backend.kind());
        }
        let selection = select_backend(self.host.as_ref(), &self.config).await?;
        if let Some(e) = &selection.init_error {
            self.errors.init_failures += 1;
            self.errors.last_error = Some(e.to_string());
        }
        let kind = selection.backend.kind();
        self.state = BackendState::Ready(selection.backend);
        Ok(kind)
    }

    /// `None` until [`initialize`](Self::initialize) or the first decode.
    pub fn active_backend(&self) -> Option<BackendKind> {
        match &self.state {
            BackendState::Uninitialized => None,
            BackendState::Ready(backend) => Some(backend.kind()),
        }
    }

    pub fn validate(&self, data: &[u8]) -> bool {
        validate_format(data)
    }

    pub async fn decode(
        &mut self,
        data: &[u8],
        zero_copy: bool,
        options: &DecodeOptions,
    ) -> Result<DecodeResult> {
        self.initialize().await?;

        let key = self
            .cache
            .is_enabled()
            .then(|| CacheKey::new(data, zero_copy, options));
        if let Some(key) = &key
            && let Some(hit) = self.cache.get(key)
        {
            debug!(len = data.len(), "decode served from cache");
            return Ok(hit);
        }

        let result = self.decode_uncached(data, zero_copy, options)?;
        if let Some(key) = key {
            self.cache.insert(key, result.clone());
        }
        Ok(result)
    }

    fn decode_uncached(
        &mut self,
        data: &[u8],
        zero_copy: bool,
        options: &DecodeOptions,
    ) -> Result<DecodeResult> {
        let BackendState::Ready(backend) = &mut self.state else {
            return Err(DecoderError::EnvironmentUnsupported);
        };
        let kind = backend.kind();
        let started = Instant::now();
        match backend.decode_with(data, zero_copy, options) {
            Ok(result) => {
                self.perf.record(kind, elapsed_ms(started));
                Ok(result)
            }
            Err(e) => self.recover(kind, data, zero_copy, options, Arc::new(e)),
        }
    }

    /// Settle the final outcome of a [`StreamDecoder`] obtained from
    /// [`stream_decoder`](Self::stream_decoder).
    ///
    /// Counts the stream's decode like any other; a primary backend fault is
    /// retried once on the fallback with the buffered envelope.
    pub fn finish_stream(
        &mut self,
        stream: &StreamDecoder,
        outcome: std::result::Result<DecodeResult, Arc<fastdog_codec::Error>>,
    ) -> Result<DecodeResult> {
        let kind = stream.backend_kind();
        match (outcome, stream.envelope()) {
            (Ok(result), _) => {
                self.perf.record(kind, result.stats.decode_time_ms);
                Ok(result)
            }
            (Err(e), Some(envelope)) => {
                self.recover(kind, envelope, stream.zero_copy(), stream.options(), e)
            }
            (Err(e), None) => {
                self.errors.record(kind, &e);
                Err(DecoderError::Decode {
                    backend: kind,
                    attempt: 1,
                    source: e,
                })
            }
        }
    }

    fn recover(
        &mut self,
        kind: BackendKind,
        data: &[u8],
        zero_copy: bool,
        options: &DecodeOptions,
        error: Arc<fastdog_codec::Error>,
    ) -> Result<DecodeResult> {
        self.errors.record(kind, &error);
        if kind != BackendKind::Primary
            || !error.is_backend_fault()
            || !self.host.supports(BackendKind::Fallback)
        {
            return Err(DecoderError::Decode {
                backend: kind,
                attempt: 1,
                source: error,
            });
        }

        warn!(error = %error, "primary decode failed, retrying on fallback");
        let started = Instant::now();
        match Backend::fallback().decode_with(data, zero_copy, options) {
            Ok(result) => {
                self.perf.record(BackendKind::Fallback, elapsed_ms(started));
                self.perf.fallbacks_taken += 1;
                Ok(result)
            }
            Err(fallback_error) => {
                self.errors.record(BackendKind::Fallback, &fallback_error);
                if fallback_error.is_backend_fault() {
                    Err(DecoderError::AllBackendsFailed {
                        primary: error,
                        fallback: Arc::new(fallback_error),
                    })
                } else {
                    Err(DecoderError::Decode {
                        backend: BackendKind::Fallback,
                        attempt: 2,
                        source: Arc::new(fallback_error),
                    })
                }
            }
        }
    }

    /// Incremental decoder bound to a fresh backend of the active kind.
    pub async fn stream_decoder(
        &mut self,
        options: DecodeOptions,
        zero_copy: bool,
    ) -> Result<StreamDecoder> {
        let kind = self.initialize().await?;
        Ok(StreamDecoder::with_options(
            Backend::of_kind(kind),
            options,
            zero_copy,
        ))
    }

    pub fn performance_stats(&self) -> &PerformanceStats {
        &self.perf
    }

    pub fn error_stats(&self) -> &ErrorStats {
        &self.errors
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn reset_stats(&mut self) {
        self.perf = PerformanceStats::default();
        self.errors = ErrorStats::default();
        self.cache.reset_stats();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
