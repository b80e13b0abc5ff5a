use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fastdog_codec::{BackendKind, DecodeOptions, PrimaryBackend, encode, encode_json};
use fastdog_decode::{
    BackendHost, BackendInitError, DecodeWorkerPool, DecoderConfig, DecoderError, DualDecoder,
    shared,
};
use serde_json::json;

struct BrokenPrimary;

#[async_trait]
impl BackendHost for BrokenPrimary {
    fn supports(&self, _kind: BackendKind) -> bool {
        true
    }

    async fn instantiate_primary(&self, attempt: u32) -> Result<PrimaryBackend, BackendInitError> {
        Err(BackendInitError::Instantiate {
            attempt,
            message: "no accelerated module".to_string(),
        })
    }
}

/// Primary that comes up fine but cannot hold a large output.
struct TightPrimary;

#[async_trait]
impl BackendHost for TightPrimary {
    fn supports(&self, _kind: BackendKind) -> bool {
        true
    }

    async fn instantiate_primary(&self, _attempt: u32) -> Result<PrimaryBackend, BackendInitError> {
        Ok(PrimaryBackend::new().with_memory_limit(256))
    }
}

fn large_envelope() -> Vec<u8> {
    let nodes: Vec<_> = (0..100).map(|i| json!({"name": format!("node-{i}")})).collect();
    encode_json(&json!({"nodes": nodes})).unwrap()
}

struct NothingSupported;

#[async_trait]
impl BackendHost for NothingSupported {
    fn supports(&self, _kind: BackendKind) -> bool {
        false
    }

    async fn instantiate_primary(&self, _attempt: u32) -> Result<PrimaryBackend, BackendInitError> {
        Err(BackendInitError::Unsupported)
    }
}

fn quick() -> DecoderConfig {
    DecoderConfig::default()
        .retry_attempts(2)
        .init_base_delay(Duration::from_millis(1))
}

fn envelope(n: u32) -> Vec<u8> {
    encode_json(&json!({"n": n})).unwrap()
}

#[tokio::test]
async fn cache_hit_skips_the_backend() {
    let mut decoder = DualDecoder::new(quick());
    let data = envelope(1);
    let opts = DecodeOptions::default();

    let first = decoder.decode(&data, false, &opts).await.unwrap();
    let decodes = decoder.performance_stats().total_decodes();
    let second = decoder.decode(&data, false, &opts).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(decoder.performance_stats().total_decodes(), decodes);
    let cache = decoder.cache_stats();
    assert_eq!((cache.hits, cache.misses, cache.size), (1, 1, 1));
}

#[tokio::test]
async fn cache_evicts_least_recently_used() {
    let mut decoder = DualDecoder::new(quick().max_cache_size(2));
    let opts = DecodeOptions::default();
    for n in 0..3 {
        decoder.decode(&envelope(n), false, &opts).await.unwrap();
    }
    assert_eq!(decoder.cache_stats().evictions, 1);
    assert_eq!(decoder.cache_stats().size, 2);

    // the first envelope was evicted and has to be decoded again
    decoder.decode(&envelope(0), false, &opts).await.unwrap();
    assert_eq!(decoder.performance_stats().total_decodes(), 4);
    decoder.decode(&envelope(2), false, &opts).await.unwrap();
    assert_eq!(decoder.performance_stats().total_decodes(), 4);
}

#[tokio::test]
async fn disabled_cache_always_decodes() {
    let mut decoder = DualDecoder::new(quick().enable_cache(false));
    let data = envelope(9);
    for _ in 0..3 {
        decoder.decode(&data, false, &DecodeOptions::default()).await.unwrap();
    }
    assert_eq!(decoder.performance_stats().total_decodes(), 3);
    assert_eq!(decoder.cache_stats().capacity, 0);
}

#[tokio::test]
async fn native_host_runs_on_primary() {
    let mut decoder = DualDecoder::new(quick());
    assert_eq!(decoder.active_backend(), None);
    assert_eq!(decoder.initialize().await.unwrap(), BackendKind::Primary);
    decoder.decode(&envelope(3), false, &DecodeOptions::default()).await.unwrap();
    assert_eq!(decoder.performance_stats().primary.decodes, 1);
}

#[tokio::test]
async fn failed_primary_demotes_permanently() {
    let mut decoder = DualDecoder::with_host(quick(), Arc::new(BrokenPrimary));
    let result = decoder
        .decode(&envelope(4), false, &DecodeOptions::default())
        .await
        .unwrap();

    assert_eq!(result.data.as_json(), Some(&json!({"n": 4})));
    assert_eq!(decoder.active_backend(), Some(BackendKind::Fallback));
    assert_eq!(decoder.performance_stats().fallback.decodes, 1);
    assert_eq!(decoder.error_stats().init_failures, 1);

    decoder.initialize().await.unwrap();
    assert_eq!(decoder.active_backend(), Some(BackendKind::Fallback));
    assert_eq!(decoder.error_stats().init_failures, 1);
}

#[tokio::test]
async fn no_backend_at_all_is_unsupported() {
    let mut decoder = DualDecoder::with_host(quick(), Arc::new(NothingSupported));
    let err = decoder
        .decode(&envelope(5), false, &DecodeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DecoderError::EnvironmentUnsupported));
}

#[tokio::test]
async fn integrity_fault_is_tried_on_both_backends() {
    let mut data = encode(2, &[1, 2, 3, 4]).unwrap();
    let trailer = data.len() - 4;
    data[trailer..].copy_from_slice(&5u32.to_le_bytes());

    let mut decoder = DualDecoder::new(quick());
    let err = decoder
        .decode(&data, false, &DecodeOptions::default())
        .await
        .unwrap_err();

    let DecoderError::AllBackendsFailed { primary, fallback } = &err else {
        panic!("expected both backends to fail, got {err:?}");
    };
    assert!(primary.is_backend_fault());
    assert!(fallback.is_backend_fault());
    assert_eq!(decoder.error_stats().primary, 1);
    assert_eq!(decoder.error_stats().fallback, 1);
    assert_eq!(decoder.performance_stats().fallbacks_taken, 0);
    assert_eq!(decoder.active_backend(), Some(BackendKind::Primary));
}

#[tokio::test]
async fn primary_fault_is_retried_on_fallback() {
    let mut decoder = DualDecoder::with_host(quick(), Arc::new(TightPrimary));
    let data = large_envelope();

    let result = decoder.decode(&data, false, &DecodeOptions::default()).await.unwrap();

    assert_eq!(result.data.as_json().unwrap()["nodes"][99]["name"], "node-99");
    assert_eq!(decoder.active_backend(), Some(BackendKind::Primary));
    assert_eq!(decoder.performance_stats().fallbacks_taken, 1);
    assert_eq!(decoder.performance_stats().fallback.decodes, 1);
    assert_eq!(decoder.error_stats().primary, 1);

    // small payloads still fit the primary
    decoder.decode(&envelope(1), false, &DecodeOptions::default()).await.unwrap();
    assert_eq!(decoder.performance_stats().primary.decodes, 1);
}

#[tokio::test]
async fn finished_stream_is_counted_and_recovered() {
    let mut decoder = DualDecoder::with_host(quick(), Arc::new(TightPrimary));

    let mut small = decoder.stream_decoder(DecodeOptions::default(), false).await.unwrap();
    let done = small.add_chunk(&envelope(2));
    let result = decoder.finish_stream(&small, Ok(done.data.unwrap())).unwrap();
    assert_eq!(result.data.as_json(), Some(&json!({"n": 2})));
    assert_eq!(decoder.performance_stats().primary.decodes, 1);

    let mut large = decoder.stream_decoder(DecodeOptions::default(), false).await.unwrap();
    let failed = large.add_chunk(&large_envelope());
    let result = decoder.finish_stream(&large, Err(failed.error.unwrap())).unwrap();
    assert!(result.data.is_json());
    assert_eq!(decoder.performance_stats().fallbacks_taken, 1);
    assert_eq!(decoder.error_stats().primary, 1);
}

#[tokio::test]
async fn stream_failure_before_the_envelope_is_complete_is_not_retried() {
    let mut decoder = DualDecoder::new(quick());
    let mut stream = decoder.stream_decoder(DecodeOptions::default(), false).await.unwrap();
    let failed = stream.add_chunk(b"NOTADOG\0");

    let err = decoder.finish_stream(&stream, Err(failed.error.unwrap())).unwrap_err();
    assert!(matches!(
        err,
        DecoderError::Decode {
            backend: BackendKind::Primary,
            attempt: 1,
            ..
        }
    ));
    assert_eq!(decoder.performance_stats().fallbacks_taken, 0);
}

#[tokio::test]
async fn format_errors_are_not_retried() {
    let mut decoder = DualDecoder::new(quick());
    let err = decoder
        .decode(b"NOTADOG\0 and some more", false, &DecodeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DecoderError::Decode {
            backend: BackendKind::Primary,
            ..
        }
    ));
    assert_eq!(decoder.error_stats().fallback, 0);
}

#[tokio::test]
async fn stream_decoder_follows_the_active_backend() {
    let mut decoder = DualDecoder::with_host(quick(), Arc::new(BrokenPrimary));
    let mut stream = decoder
        .stream_decoder(DecodeOptions::default(), false)
        .await
        .unwrap();
    let data = envelope(6);
    let (head, tail) = data.split_at(10);
    assert!(!stream.add_chunk(head).is_complete);
    let done = stream.add_chunk(tail);
    assert!(done.is_complete);
    assert_eq!(done.data.unwrap().data.as_json(), Some(&json!({"n": 6})));
}

#[tokio::test]
async fn reset_stats_clears_counters() {
    let mut decoder = DualDecoder::new(quick());
    decoder.decode(&envelope(7), false, &DecodeOptions::default()).await.unwrap();
    decoder.decode(&envelope(7), false, &DecodeOptions::default()).await.unwrap();
    decoder.reset_stats();
    assert_eq!(decoder.performance_stats().total_decodes(), 0);
    assert_eq!(decoder.cache_stats().hits, 0);
    assert_eq!(decoder.cache_stats().size, 1);

    decoder.clear_cache();
    assert_eq!(decoder.cache_stats().size, 0);
}

#[tokio::test]
async fn worker_pool_with_demoted_host() {
    let pool = DecodeWorkerPool::spawn_with_host(2, quick(), Arc::new(BrokenPrimary));
    assert_eq!(pool.worker_count(), 2);
    let result = pool
        .decode(Bytes::from(envelope(8)), true, DecodeOptions::raw())
        .await
        .unwrap();
    assert!(!result.data.is_json());
    pool.shutdown().await;
}

#[tokio::test]
async fn shared_instance_lives_until_disposed() {
    shared::dispose();
    let a = shared::get_or_init(&quick());
    let b = shared::get_or_init(&DecoderConfig::default());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(shared::is_initialized());

    a.lock()
        .await
        .decode(&envelope(10), false, &DecodeOptions::default())
        .await
        .unwrap();

    assert!(shared::dispose());
    assert!(!shared::is_initialized());
    assert!(!shared::dispose());
    let c = shared::get_or_init(&quick());
    assert!(!Arc::ptr_eq(&a, &c));
    shared::dispose();
}
