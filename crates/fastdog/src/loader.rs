use std::sync::Arc;

use bytes::Bytes;
use fastdog_codec::{DecodeOptions, DecodeResult, StreamDecoder};
use fastdog_decode::{CacheStats, DualDecoder, ErrorStats, PerformanceStats};
use fastdog_fetch::{ChunkSink, DownloadControl, Downloader, FinalStats, Progress, RangeClient};
use fastdog_state::{
    ListenerId, LoadingContext, LoadingEvent, LoadingState, StateError, StateMachine,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::builder::ModelBuilder;
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};

/// Download share of overall progress. Decoding ends at
/// [`DECODED_PROGRESS`], success at 100.
const DOWNLOAD_SHARE: f64 = 90.0;
const DECODED_PROGRESS: f64 = 95.0;

type SharedMachine<M> = Arc<Mutex<StateMachine<Arc<M>>>>;

type StreamOutcome = std::result::Result<DecodeResult, Arc<fastdog_codec::Error>>;

/// Prefix of an interrupted download, kept so a resumed transfer can
/// continue feeding the same decoder.
struct PartialLoad {
    resource_id: String,
    stream: StreamDecoder,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome<M> {
    Loaded(Arc<M>),
    Cancelled,
}

impl<M> LoadOutcome<M> {
    pub fn model(&self) -> Option<&Arc<M>> {
        match self {
            Self::Loaded(model) => Some(model),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Steers a running [`ModelLoader::load`] from another task.
///
/// Listeners run while the state lock is held and must not call back into
/// the handle.
pub struct LoaderHandle<M> {
    machine: SharedMachine<M>,
    control: Arc<DownloadControl>,
}

impl<M> Clone for LoaderHandle<M> {
    fn clone(&self) -> Self {
        Self {
            machine: self.machine.clone(),
            control: self.control.clone(),
        }
    }
}

impl<M> LoaderHandle<M> {
    /// Hold the download before its next range. Only valid while downloading.
    pub fn pause(&self) -> std::result::Result<(), StateError> {
        self.machine.lock().pause()?;
        self.control.pause();
        Ok(())
    }

    pub fn resume(&self) -> std::result::Result<(), StateError> {
        self.machine.lock().resume()?;
        self.control.resume();
        Ok(())
    }

    /// Abort the load. The in-flight request is dropped; a build already
    /// under way finishes but its model is discarded.
    pub fn cancel(&self) -> std::result::Result<(), StateError> {
        self.machine.lock().cancel()?;
        self.control.cancel();
        Ok(())
    }

    pub fn can_pause(&self) -> bool {
        self.machine.lock().can_pause()
    }

    pub fn can_resume(&self) -> bool {
        self.machine.lock().can_resume()
    }

    pub fn can_cancel(&self) -> bool {
        self.machine.lock().can_cancel()
    }

    pub fn state(&self) -> LoadingState {
        self.machine.lock().state()
    }

    pub fn context(&self) -> LoadingContext<Arc<M>> {
        self.machine.lock().context().clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&LoadingEvent<'_, Arc<M>>) + Send + 'static,
    {
        self.machine.lock().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.machine.lock().unsubscribe(id)
    }
}

/// Downloads an envelope, decodes it while it streams in and hands the
/// result to a [`ModelBuilder`], driving a [`StateMachine`] throughout.
pub struct ModelLoader<C: RangeClient, M> {
    config: LoaderConfig,
    downloader: Downloader<C>,
    decoder: DualDecoder,
    machine: SharedMachine<M>,
    partial: Option<PartialLoad>,
}

impl<C, M> ModelLoader<C, M>
where
    C: RangeClient,
    M: Send + Sync + 'static,
{
    pub fn new(client: C, config: LoaderConfig) -> Self {
        let decoder = DualDecoder::new(config.decoder_config());
        Self::with_decoder(client, config, decoder)
    }

    /// Use a decoder built elsewhere, e.g. with a custom backend host.
    pub fn with_decoder(client: C, config: LoaderConfig, decoder: DualDecoder) -> Self {
        Self {
            config,
            downloader: Downloader::new(client),
            decoder,
            machine: Arc::new(Mutex::new(StateMachine::new())),
            partial: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn handle(&self) -> LoaderHandle<M> {
        LoaderHandle {
            machine: self.machine.clone(),
            control: self.downloader.control().clone(),
        }
    }

    pub fn state(&self) -> LoadingState {
        self.machine.lock().state()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&LoadingEvent<'_, Arc<M>>) + Send + 'static,
    {
        self.machine.lock().subscribe(listener)
    }

    pub fn client(&self) -> &C {
        self.downloader.client()
    }

    pub fn decoder(&self) -> &DualDecoder {
        &self.decoder
    }

    pub fn performance_stats(&self) -> &PerformanceStats {
        self.decoder.performance_stats()
    }

    pub fn error_stats(&self) -> &ErrorStats {
        self.decoder.error_stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.decoder.cache_stats()
    }

    /// Decode an envelope already in memory, through the result cache.
    pub async fn decode_bytes(&mut self, data: &[u8]) -> Result<DecodeResult> {
        Ok(self
            .decoder
            .decode(data, false, &DecodeOptions::default())
            .await?)
    }

    /// Load `resource_id` and build it with `builder`.
    ///
    /// A finished previous load is reset first. Failures move the state
    /// machine to error with the phase they occurred in and are returned;
    /// cancellation through a [`LoaderHandle`] yields
    /// [`LoadOutcome::Cancelled`]. With resume enabled, a load of the same
    /// resource after a failed transfer continues from the bytes already
    /// received.
    pub async fn load<B>(&mut self, resource_id: &str, builder: &mut B) -> Result<LoadOutcome<M>>
    where
        B: ModelBuilder<Model = M>,
    {
        self.downloader.control().rearm();
        {
            let mut machine = self.machine.lock();
            if machine.state().is_terminal() {
                machine.reset();
            }
            machine.start_loading()?;
        }
        if self.config.enable_logging {
            info!(resource_id, "model load started");
        }

        let result = self.run(resource_id, builder).await;
        match &result {
            Ok(LoadOutcome::Loaded(_)) if self.config.enable_logging => {
                info!(resource_id, "model loaded");
            }
            Ok(LoadOutcome::Cancelled) if self.config.enable_logging => {
                info!(resource_id, "model load cancelled");
            }
            Err(e) => self.record_failure(resource_id, e),
            _ => {}
        }
        result
    }

    async fn run<B>(&mut self, resource_id: &str, builder: &mut B) -> Result<LoadOutcome<M>>
    where
        B: ModelBuilder<Model = M>,
    {
        let backend = self.decoder.initialize().await?;
        if self.config.enable_logging {
            debug!(%backend, "decoder ready");
        }

        if !self.advance(StateMachine::start_downloading)? {
            return Ok(LoadOutcome::Cancelled);
        }
        let stream = self.stream_for(resource_id).await?;
        let (stream, stats, finished) = self.download(resource_id, stream).await?;
        if stats.is_cancelled() {
            self.ensure_cancelled();
            return Ok(LoadOutcome::Cancelled);
        }
        self.leave_pause();

        if !self.advance(StateMachine::start_decoding)? {
            return Ok(LoadOutcome::Cancelled);
        }
        let Some(outcome) = finished else {
            return Err(LoadError::Incomplete {
                received: stream.buffer_size(),
                expected: stream.expected_size(),
            });
        };
        let decoded = self.decoder.finish_stream(&stream, outcome)?;
        stream.free();
        let _ = self
            .machine
            .lock()
            .update_progress(DECODED_PROGRESS, Some("Decoded".to_string()));

        if !self.advance(StateMachine::start_building)? {
            return Ok(LoadOutcome::Cancelled);
        }
        let model = builder
            .build(decoded)
            .await
            .map_err(|e| LoadError::Build(Box::new(e)))?;
        let model = Arc::new(model);

        if !self.advance(|machine| machine.succeed(model.clone()))? {
            return Ok(LoadOutcome::Cancelled);
        }
        Ok(LoadOutcome::Loaded(model))
    }

    /// The decoder holding an interrupted download's prefix when the
    /// transfer will pick up where it stopped, else a fresh one.
    async fn stream_for(&mut self, resource_id: &str) -> Result<StreamDecoder> {
        let control = self.downloader.control();
        if let Some(partial) = self.partial.take()
            && self.config.enable_resume
            && partial.resource_id == resource_id
            && control.resume_data().is_some_and(|resume| {
                resume.resource_id == resource_id
                    && resume.downloaded == partial.stream.buffer_size() as u64
            })
        {
            debug!(
                resource_id,
                buffered = partial.stream.buffer_size(),
                "continuing interrupted load"
            );
            return Ok(partial.stream);
        }
        control.clear_resume_data();
        Ok(self
            .decoder
            .stream_decoder(DecodeOptions::default(), false)
            .await?)
    }

    async fn download(
        &mut self,
        resource_id: &str,
        stream: StreamDecoder,
    ) -> Result<(StreamDecoder, FinalStats, Option<StreamOutcome>)> {
        let mut sink = LoadSink {
            stream,
            machine: &self.machine,
            control: self.downloader.control(),
            finished: None,
            failure: None,
        };
        let options = self.config.stream_options();
        let result = self
            .downloader
            .download_stream(resource_id, &options, &mut sink)
            .await;

        let LoadSink {
            stream,
            finished,
            failure,
            ..
        } = sink;
        if let Some(error) = failure {
            return Err(LoadError::Stream(error));
        }
        match result {
            Ok(stats) => Ok((stream, stats, finished)),
            Err(e) => {
                if self.downloader.control().resume_data().is_some() {
                    self.partial = Some(PartialLoad {
                        resource_id: resource_id.to_string(),
                        stream,
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Apply `step`; `Ok(false)` if it was refused because the load has been
    /// cancelled in the meantime.
    fn advance<F>(&self, step: F) -> Result<bool>
    where
        F: FnOnce(&mut StateMachine<Arc<M>>) -> fastdog_state::Result<()>,
    {
        let mut machine = self.machine.lock();
        match step(&mut machine) {
            Ok(()) => Ok(true),
            Err(_) if machine.state() == LoadingState::Cancelled => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_cancelled(&self) {
        let mut machine = self.machine.lock();
        if machine.can_cancel() {
            let _ = machine.cancel();
        }
    }

    /// The last range can land after a pause request; nothing is left to
    /// hold back, so continue.
    fn leave_pause(&self) {
        let mut machine = self.machine.lock();
        if machine.state() == LoadingState::Paused {
            debug!("download finished while paused");
            let _ = machine.resume();
            self.downloader.control().resume();
        }
    }

    fn record_failure(&self, resource_id: &str, error: &LoadError) {
        let mut machine = self.machine.lock();
        let phase = error.phase(machine.state());
        if machine.state() == LoadingState::Paused {
            let _ = machine.resume();
        }
        if let Err(e) = machine.fail(error.to_string(), phase) {
            warn!(error = %e, "could not record load failure");
        }
        if self.config.enable_logging {
            warn!(resource_id, %phase, %error, "model load failed");
        }
    }
}

struct LoadSink<'a, M> {
    stream: StreamDecoder,
    machine: &'a Mutex<StateMachine<Arc<M>>>,
    control: &'a DownloadControl,
    /// Outcome of the decode run once the whole envelope arrived.
    finished: Option<StreamOutcome>,
    /// Envelope rejected before it was complete.
    failure: Option<Arc<fastdog_codec::Error>>,
}

impl<M> ChunkSink for LoadSink<'_, M> {
    fn on_start(&mut self, resumed_from: u64) {
        if self.stream.buffer_size() as u64 != resumed_from {
            debug!(
                resumed_from,
                buffered = self.stream.buffer_size(),
                "transfer restarted, dropping buffered prefix"
            );
            self.stream.reset();
        }
    }

    fn on_chunk(&mut self, chunk: &Bytes) {
        if self.failure.is_some() || self.finished.is_some() {
            return;
        }
        let outcome = self.stream.add_chunk(chunk);
        match (outcome.error, outcome.data) {
            (Some(error), _) if self.stream.envelope().is_none() => {
                // nothing useful can arrive after a bad header
                self.failure = Some(error);
                self.control.cancel();
            }
            (Some(error), _) => self.finished = Some(Err(error)),
            (None, Some(decoded)) => self.finished = Some(Ok(decoded)),
            (None, None) => {}
        }
    }

    fn on_progress(&mut self, progress: &Progress) {
        if self.failure.is_some() {
            return;
        }
        let message = match progress.total {
            Some(total) => format!("Downloaded {} of {} bytes", progress.downloaded, total),
            None => format!("Downloaded {} bytes", progress.downloaded),
        };
        let overall = progress.percent * DOWNLOAD_SHARE / 100.0;
        if let Err(e) = self.machine.lock().update_progress(overall, Some(message)) {
            debug!(error = %e, "download progress not recorded");
        }
    }
}
