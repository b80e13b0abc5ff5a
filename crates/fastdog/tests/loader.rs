use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fastdog::codec::{BackendKind, PrimaryBackend, SceneDocument, encode_json};
use fastdog::decode::{BackendHost, BackendInitError, DualDecoder};
use fastdog::fetch::{ByteRange, FetchError, RangeClient, RangeResponse, ResourceInfo};
use fastdog::state::LoadingState;
use fastdog::{LoadError, LoadOutcome, LoaderConfig, ModelBuilder, ModelLoader, SceneDocumentBuilder};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct Refused;

struct Server {
    body: Bytes,
    status: Option<u16>,
    latency: Duration,
    /// Ranges starting at or past this offset are refused.
    refuse_from: Mutex<Option<u64>>,
    requests: Mutex<Vec<Option<ByteRange>>>,
}

impl Server {
    fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            status: None,
            latency: Duration::ZERO,
            refuse_from: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn slow(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl RangeClient for Server {
    type Error = Refused;

    async fn probe(&self, _resource_id: &str) -> Result<ResourceInfo, Refused> {
        Ok(ResourceInfo {
            total_bytes: Some(self.body.len() as u64),
            accepts_ranges: true,
        })
    }

    async fn fetch(&self, _resource_id: &str, range: Option<ByteRange>) -> Result<RangeResponse, Refused> {
        self.requests.lock().push(range);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(r) = range
            && self.refuse_from.lock().is_some_and(|from| r.start >= from)
        {
            return Err(Refused);
        }
        if let Some(status) = self.status {
            return Ok(RangeResponse {
                status,
                body: Bytes::new(),
            });
        }
        Ok(match range {
            Some(r) => RangeResponse {
                status: 206,
                body: self.body.slice(r.start as usize..=r.end as usize),
            },
            None => RangeResponse {
                status: 200,
                body: self.body.clone(),
            },
        })
    }
}

fn scene() -> Vec<u8> {
    encode_json(&json!({
        "asset": {"version": "2.0"},
        "nodes": [{"name": "tower"}, {"name": "bridge"}],
        "buffers": [{"byteLength": 4, "uri": "data:application/octet-stream;base64,AQIDBA=="}]
    }))
    .unwrap()
}

fn config(chunk: u64) -> LoaderConfig {
    LoaderConfig::default()
        .chunk_size(chunk)
        .retry_attempts(1)
        .retry_backoff(Duration::from_millis(5))
        .init_base_delay(Duration::from_millis(1))
}

type Seen = Arc<Mutex<Vec<(LoadingState, f64)>>>;

fn watch(loader: &ModelLoader<Server, SceneDocument>) -> Seen {
    let seen: Seen = Arc::default();
    let sink = seen.clone();
    loader.subscribe(move |event| sink.lock().push((event.state(), event.context().progress)));
    seen
}

fn states(seen: &Seen) -> Vec<LoadingState> {
    let mut states: Vec<LoadingState> = seen.lock().iter().map(|(s, _)| *s).collect();
    states.dedup();
    states
}

#[tokio::test]
async fn streams_decodes_and_builds() {
    let mut loader = ModelLoader::new(Server::new(scene()), config(16));
    let seen = watch(&loader);

    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();

    let document = outcome.model().unwrap();
    assert_eq!(document.root()["nodes"][1]["name"], "bridge");
    assert_eq!(document.buffer(0).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(loader.state(), LoadingState::Success);

    use LoadingState::*;
    assert_eq!(states(&seen), vec![Loading, Downloading, Decoding, Building, Success]);

    let progress: Vec<f64> = seen.lock().iter().map(|(_, p)| *p).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert!(progress.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(progress.last(), Some(&100.0));
    assert!(loader.client().request_count() > 1);
    assert_eq!(loader.performance_stats().primary.decodes, 1);
}

#[tokio::test]
async fn single_request_when_unchunked() {
    let mut loader = ModelLoader::new(Server::new(scene()), config(0));
    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();
    assert!(outcome.model().is_some());
    assert_eq!(*loader.client().requests.lock(), vec![None]);
}

#[tokio::test]
async fn bad_magic_stops_the_download_early() {
    let mut body = scene();
    body[..8].copy_from_slice(b"NOTADOG\0");
    let mut loader = ModelLoader::new(Server::new(body), config(8));

    let err = loader
        .load("city.fdg", &mut SceneDocumentBuilder)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Stream(_)));
    assert_eq!(loader.client().request_count(), 1);
    let handle = loader.handle();
    assert_eq!(handle.state(), LoadingState::Error);
    assert_eq!(handle.context().error.unwrap().phase, LoadingState::Decoding);
}

#[tokio::test]
async fn truncated_resource_is_incomplete() {
    let full = scene();
    let mut loader = ModelLoader::new(Server::new(full[..full.len() - 4].to_vec()), config(32));

    let err = loader
        .load("city.fdg", &mut SceneDocumentBuilder)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoadError::Incomplete { expected: Some(n), .. } if n == full.len()
    ));
    assert_eq!(loader.state(), LoadingState::Error);
}

#[tokio::test]
async fn server_error_fails_in_download_phase() {
    let mut server = Server::new(scene());
    server.status = Some(500);
    let mut loader = ModelLoader::new(server, config(16));

    let err = loader
        .load("city.fdg", &mut SceneDocumentBuilder)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Fetch(_)));
    let error = loader.handle().context().error.unwrap();
    assert_eq!(error.phase, LoadingState::Downloading);
    assert!(error.message.contains("500"));
}

#[tokio::test]
async fn builder_failure_is_reported_as_building() {
    #[derive(Debug, thiserror::Error)]
    #[error("mesh has no vertices")]
    struct EmptyMesh;

    struct Rejecting;

    impl ModelBuilder for Rejecting {
        type Model = SceneDocument;
        type Error = EmptyMesh;

        async fn build(&mut self, _decoded: fastdog::codec::DecodeResult) -> Result<SceneDocument, EmptyMesh> {
            Err(EmptyMesh)
        }
    }

    let mut loader = ModelLoader::new(Server::new(scene()), config(64));
    let err = loader.load("city.fdg", &mut Rejecting).await.unwrap_err();

    assert!(matches!(err, LoadError::Build(_)));
    let error = loader.handle().context().error.unwrap();
    assert_eq!(error.phase, LoadingState::Building);
    assert_eq!(error.message, "model build failed: mesh has no vertices");
}

#[tokio::test(start_paused = true)]
async fn cancel_from_another_task() {
    let server = Server::new(scene()).slow(Duration::from_millis(100));
    let mut loader = ModelLoader::new(server, config(8));
    let handle = loader.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.cancel().unwrap();
    });

    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(loader.state(), LoadingState::Cancelled);
    assert!(loader.client().request_count() <= 3);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_from_another_task() {
    let body = scene();
    let chunks = body.len().div_ceil(8);
    let mut loader = ModelLoader::new(Server::new(body).slow(Duration::from_millis(100)), config(8));
    let seen = watch(&loader);
    let handle = loader.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.pause().unwrap();
        assert!(handle.can_resume());
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.resume().unwrap();
    });

    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();

    assert!(outcome.model().is_some());
    assert_eq!(loader.client().request_count(), chunks);
    let states = states(&seen);
    let paused = states.iter().position(|s| *s == LoadingState::Paused).unwrap();
    assert_eq!(states[paused + 1], LoadingState::Downloading);
}

#[tokio::test]
async fn reload_after_success_starts_over() {
    let mut loader = ModelLoader::new(Server::new(scene()), config(64));
    loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();
    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    assert_eq!(loader.state(), LoadingState::Success);
}

#[tokio::test]
async fn in_memory_decode_goes_through_the_cache() {
    let mut loader: ModelLoader<Server, SceneDocument> =
        ModelLoader::new(Server::new(Bytes::new()), config(0));
    let envelope = scene();

    let first = loader.decode_bytes(&envelope).await.unwrap();
    let second = loader.decode_bytes(&envelope).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(loader.cache_stats().hits, 1);
    assert_eq!(loader.performance_stats().total_decodes(), 1);
}

#[tokio::test]
async fn reload_continues_an_interrupted_download() {
    let body = scene();
    let server = Server::new(body.clone());
    *server.refuse_from.lock() = Some(32);
    let mut loader = ModelLoader::new(server, config(16));

    let err = loader
        .load("city.fdg", &mut SceneDocumentBuilder)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Fetch(FetchError::RetriesExhausted { downloaded: 32, .. })
    ));
    assert_eq!(loader.state(), LoadingState::Error);

    *loader.client().refuse_from.lock() = None;
    let before = loader.client().request_count();
    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();

    assert_eq!(outcome.model().unwrap().root()["nodes"][0]["name"], "tower");
    let requests = loader.client().requests.lock()[before..].to_vec();
    assert_eq!(requests.len(), (body.len() - 32).div_ceil(16));
    assert_eq!(requests[0], Some(ByteRange::new(32, 47)));
}

#[tokio::test]
async fn reload_of_another_resource_starts_from_zero() {
    let server = Server::new(scene());
    *server.refuse_from.lock() = Some(32);
    let mut loader = ModelLoader::new(server, config(16));
    loader
        .load("city.fdg", &mut SceneDocumentBuilder)
        .await
        .unwrap_err();

    *loader.client().refuse_from.lock() = None;
    let before = loader.client().request_count();
    loader.load("harbour.fdg", &mut SceneDocumentBuilder).await.unwrap();

    assert_eq!(
        loader.client().requests.lock()[before],
        Some(ByteRange::new(0, 15))
    );
}

/// Primary backend that comes up but cannot hold a full scene.
struct TightPrimary;

#[async_trait]
impl BackendHost for TightPrimary {
    fn supports(&self, _kind: BackendKind) -> bool {
        true
    }

    async fn instantiate_primary(&self, _attempt: u32) -> Result<PrimaryBackend, BackendInitError> {
        Ok(PrimaryBackend::new().with_memory_limit(64))
    }
}

#[tokio::test]
async fn streamed_envelope_falls_back_when_primary_faults() {
    let config = config(16);
    let decoder = DualDecoder::with_host(config.decoder_config(), Arc::new(TightPrimary));
    let mut loader = ModelLoader::with_decoder(Server::new(scene()), config, decoder);

    let outcome = loader.load("city.fdg", &mut SceneDocumentBuilder).await.unwrap();

    assert_eq!(outcome.model().unwrap().buffer(0).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(loader.decoder().active_backend(), Some(BackendKind::Primary));
    let perf = loader.performance_stats();
    assert_eq!((perf.primary.decodes, perf.fallback.decodes), (0, 1));
    assert_eq!(perf.fallbacks_taken, 1);
    assert_eq!(loader.error_stats().primary, 1);
}
