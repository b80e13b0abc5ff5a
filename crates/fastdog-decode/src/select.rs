//! Backend selection: probe, instantiate with backoff, warm up, or demote.

use std::time::Duration;

use async_trait::async_trait;
use fastdog_codec::{Backend, BackendKind, DecodeOptions, PrimaryBackend};
use tracing::{debug, info, warn};

use crate::config::DecoderConfig;
use crate::error::{BackendInitError, DecoderError, Result};

/// Host capabilities and primary-backend construction.
///
/// `supports` must be a cheap synchronous check; `instantiate_primary` may
/// suspend and is bounded by [`DecoderConfig::init_timeout`].
#[async_trait]
pub trait BackendHost: Send + Sync {
    fn supports(&self, kind: BackendKind) -> bool;

    async fn instantiate_primary(
        &self,
        attempt: u32,
    ) -> std::result::Result<PrimaryBackend, BackendInitError>;
}

/// Host where both backends are built in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

const PRIMARY_ARENA_BYTES: usize = 64 * 1024;

#[async_trait]
impl BackendHost for NativeHost {
    fn supports(&self, _kind: BackendKind) -> bool {
        true
    }

    async fn instantiate_primary(
        &self,
        _attempt: u32,
    ) -> std::result::Result<PrimaryBackend, BackendInitError> {
        Ok(PrimaryBackend::with_capacity(PRIMARY_ARENA_BYTES))
    }
}

/// Delay before instantiation attempt `attempt + 1`: `attempt × base`.
pub fn init_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

/// Outcome of [`select_backend`].
#[derive(Debug)]
pub struct Selection {
    pub backend: Backend,
    /// Set when the primary backend was wanted but could not be used.
    pub init_error: Option<BackendInitError>,
}

/// Pick the backend for a decoder instance.
///
/// A primary failure of any kind yields the fallback; the caller is expected
/// to keep that choice for the instance's lifetime.
pub async fn select_backend(host: &dyn BackendHost, config: &DecoderConfig) -> Result<Selection> {
    let fallback_ok = host.supports(BackendKind::Fallback);

    let init_error = if host.supports(BackendKind::Primary) {
        match bring_up_primary(host, config).await {
            Ok(primary) => {
                info!("primary decode backend ready");
                return Ok(Selection {
                    backend: Backend::Primary(primary),
                    init_error: None,
                });
            }
            Err(e) => e,
        }
    } else if fallback_ok {
        BackendInitError::Unsupported
    } else {
        return Err(DecoderError::EnvironmentUnsupported);
    };

    if !fallback_ok {
        return Err(DecoderError::BackendInit(init_error));
    }
    warn!(error = %init_error, "primary decode backend unavailable, using fallback");
    Ok(Selection {
        backend: Backend::fallback(),
        init_error: Some(init_error),
    })
}

async fn bring_up_primary(
    host: &dyn BackendHost,
    config: &DecoderConfig,
) -> std::result::Result<PrimaryBackend, BackendInitError> {
    let attempts = config.retry_attempts.max(1);
    let mut last_error = BackendInitError::Unsupported;

    for attempt in 1..=attempts {
        match tokio::time::timeout(config.init_timeout, host.instantiate_primary(attempt)).await {
            Ok(Ok(primary)) => return warm_up(primary),
            Ok(Err(e)) => last_error = e,
            Err(_) => {
                last_error = BackendInitError::Timeout {
                    attempt,
                    timeout: config.init_timeout,
                }
            }
        }
        debug!(attempt, error = %last_error, "primary instantiation failed");
        if attempt < attempts {
            tokio::time::sleep(init_delay(attempt, config.init_base_delay)).await;
        }
    }
    Err(last_error)
}

fn warm_up(primary: PrimaryBackend) -> std::result::Result<PrimaryBackend, BackendInitError> {
    let sample = serde_json::json!({"warmup": [0, 1, 2]});
    let envelope =
        fastdog_codec::encode_json(&sample).map_err(|e| BackendInitError::WarmUp(e.to_string()))?;

    let mut backend = Backend::Primary(primary);
    let result = backend
        .decode(&envelope, &DecodeOptions::default())
        .map_err(|e| BackendInitError::WarmUp(e.to_string()))?;
    if result.data.as_json() != Some(&sample) {
        return Err(BackendInitError::WarmUp(
            "warm-up output does not match input".to_string(),
        ));
    }

    match backend {
        Backend::Primary(primary) => Ok(primary),
        Backend::Fallback(_) => Err(BackendInitError::WarmUp(
            "backend changed kind during warm-up".to_string(),
        )),
    }
}
