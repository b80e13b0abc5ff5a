use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{ByteRange, RateMeter, estimate_eta, next_range};
use crate::data::{DownloadStatus, FinalStats, Progress, ResumeData, StreamOptions};
use crate::effects::control::DownloadControl;
use crate::effects::http::RangeClient;
use crate::effects::sink::ChunkSink;
use crate::error::{FetchError, Result};

/// Streams a resource range by range into a [`ChunkSink`].
///
/// Pause, cancel and resume state live in a shared [`DownloadControl`] so
/// another task can steer a transfer while it runs.
pub struct Downloader<C: RangeClient> {
    client: C,
    control: Arc<DownloadControl>,
}

struct Transfer<'a> {
    resource_id: &'a str,
    total: Option<u64>,
    ranged: bool,
    resumed_from: u64,
    downloaded: u64,
    retries: u32,
    started: Instant,
    meter: RateMeter,
}

impl Transfer<'_> {
    fn snapshot(&self) -> ResumeData {
        ResumeData::new(self.resource_id, self.downloaded, self.total)
    }

    fn progress(&mut self, at: Instant) -> Progress {
        let speed = self.meter.sample(at, self.downloaded);
        let eta = self
            .total
            .and_then(|total| estimate_eta(total.saturating_sub(self.downloaded), speed));
        Progress {
            percent: Progress::percent_of(self.downloaded, self.total),
            downloaded: self.downloaded,
            total: self.total,
            speed,
            eta,
        }
    }

    fn finish(&self, status: DownloadStatus) -> FinalStats {
        let elapsed = self.started.elapsed();
        let fetched = self.downloaded - self.resumed_from;
        let secs = elapsed.as_secs_f64();
        FinalStats {
            status,
            downloaded: self.downloaded,
            total: self.total,
            resumed_from: self.resumed_from,
            retries: self.retries,
            elapsed,
            average_speed: if secs > 0.0 { fetched as f64 / secs } else { 0.0 },
        }
    }
}

impl<C: RangeClient> Downloader<C> {
    pub fn new(client: C) -> Self {
        Self::with_control(client, Arc::new(DownloadControl::new()))
    }

    pub fn with_control(client: C, control: Arc<DownloadControl>) -> Self {
        Self { client, control }
    }

    pub fn control(&self) -> &Arc<DownloadControl> {
        &self.control
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Download `resource_id` into `sink`.
    ///
    /// With `chunk_size > 0` and a server that reports a length and accepts
    /// ranges, the resource is requested in chunk-aligned ranges and every
    /// range is delivered as soon as it arrives. Otherwise one unranged
    /// request delivers everything in a single `on_chunk` call.
    ///
    /// Cancellation is reported as [`DownloadStatus::Cancelled`], not as an
    /// error.
    pub async fn download_stream<S>(
        &self,
        resource_id: &str,
        options: &StreamOptions,
        sink: &mut S,
    ) -> Result<FinalStats>
    where
        S: ChunkSink + ?Sized,
    {
        let started = Instant::now();
        let token = self.control.token();

        let info = match or_cancel(&token, self.client.probe(resource_id)).await {
            None => return Ok(self.cancelled(resource_id, started)),
            Some(info) => info.map_err(|e| FetchError::Transport(e.to_string()))?,
        };

        let total = info.total_bytes;
        let ranged = options.chunk_size > 0 && info.accepts_ranges && total.is_some();
        let resumed_from = if ranged && options.enable_resume {
            self.control
                .resume_data()
                .and_then(|data| data.offset_for(resource_id, total))
                .unwrap_or(0)
        } else {
            0
        };
        info!(resource_id, ?total, ranged, resumed_from, "download started");
        sink.on_start(resumed_from);

        let mut transfer = Transfer {
            resource_id,
            total,
            ranged,
            resumed_from,
            downloaded: resumed_from,
            retries: 0,
            started,
            meter: RateMeter::new(started, resumed_from),
        };

        let status = match total.filter(|_| ranged) {
            Some(total) => self.run_ranged(&token, &mut transfer, total, options, sink).await?,
            None => self.run_whole(&token, &mut transfer, options, sink).await?,
        };

        let stats = transfer.finish(status);
        match status {
            DownloadStatus::Completed => {
                self.control.clear_resume_data();
                info!(resource_id, bytes = stats.downloaded, retries = stats.retries, "download completed");
            }
            DownloadStatus::Cancelled => {
                self.control.clear_resume_data();
                info!(resource_id, bytes = stats.downloaded, "download cancelled");
            }
        }
        Ok(stats)
    }

    async fn run_ranged<S: ChunkSink + ?Sized>(
        &self,
        token: &CancellationToken,
        transfer: &mut Transfer<'_>,
        total: u64,
        options: &StreamOptions,
        sink: &mut S,
    ) -> Result<DownloadStatus> {
        while let Some(range) = next_range(transfer.downloaded, total, options.chunk_size) {
            if !self.wait_while_paused(token, options.pause_poll_interval).await {
                return Ok(DownloadStatus::Cancelled);
            }
            let Some(body) = self.fetch_with_retry(token, transfer, Some(range), options).await?
            else {
                return Ok(DownloadStatus::Cancelled);
            };
            debug!(resource_id = transfer.resource_id, %range, "range received");
            self.deliver(transfer, body, sink);
        }
        Ok(DownloadStatus::Completed)
    }

    async fn run_whole<S: ChunkSink + ?Sized>(
        &self,
        token: &CancellationToken,
        transfer: &mut Transfer<'_>,
        options: &StreamOptions,
        sink: &mut S,
    ) -> Result<DownloadStatus> {
        if !self.wait_while_paused(token, options.pause_poll_interval).await {
            return Ok(DownloadStatus::Cancelled);
        }
        let Some(body) = self.fetch_with_retry(token, transfer, None, options).await? else {
            return Ok(DownloadStatus::Cancelled);
        };
        if transfer.total.is_none() {
            transfer.total = Some(body.len() as u64);
        }
        self.deliver(transfer, body, sink);
        Ok(DownloadStatus::Completed)
    }

    fn deliver<S: ChunkSink + ?Sized>(&self, transfer: &mut Transfer<'_>, body: Bytes, sink: &mut S) {
        transfer.downloaded += body.len() as u64;
        if transfer.ranged {
            self.control.set_resume_data(transfer.snapshot());
        }
        sink.on_chunk(&body);
        let progress = transfer.progress(Instant::now());
        sink.on_progress(&progress);
    }

    /// `Ok(None)` when cancelled while requesting or backing off.
    async fn fetch_with_retry(
        &self,
        token: &CancellationToken,
        transfer: &mut Transfer<'_>,
        range: Option<ByteRange>,
        options: &StreamOptions,
    ) -> Result<Option<Bytes>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let Some(outcome) = or_cancel(token, self.client.fetch(transfer.resource_id, range)).await
            else {
                return Ok(None);
            };

            let failure = match outcome {
                Ok(response) if response.is_success() => match range {
                    Some(range) if response.body.len() as u64 != range.len() => FetchError::ShortBody {
                        range,
                        actual: response.body.len(),
                    },
                    _ => return Ok(Some(response.body)),
                },
                Ok(response) => {
                    return Err(FetchError::Status {
                        resource: transfer.resource_id.to_string(),
                        status: response.status,
                    });
                }
                Err(e) => FetchError::Transport(e.to_string()),
            };

            if transfer.ranged {
                self.control.set_resume_data(transfer.snapshot());
            }
            if attempt > options.max_retries {
                return Err(FetchError::RetriesExhausted {
                    resource: transfer.resource_id.to_string(),
                    attempts: attempt,
                    downloaded: transfer.downloaded,
                    message: failure.to_string(),
                });
            }

            transfer.retries += 1;
            warn!(
                resource_id = transfer.resource_id,
                attempt,
                error = %failure,
                "request failed, retrying after {:?}",
                options.retry_backoff
            );
            if or_cancel(token, tokio::time::sleep(options.retry_backoff))
                .await
                .is_none()
            {
                return Ok(None);
            }
        }
    }

    /// `false` if cancelled before or while paused.
    async fn wait_while_paused(&self, token: &CancellationToken, interval: Duration) -> bool {
        let mut announced = false;
        while self.control.is_paused() {
            if !announced {
                debug!("waiting for resume");
                announced = true;
            }
            if or_cancel(token, tokio::time::sleep(interval)).await.is_none() {
                return false;
            }
        }
        !token.is_cancelled()
    }

    fn cancelled(&self, resource_id: &str, started: Instant) -> FinalStats {
        self.control.clear_resume_data();
        info!(resource_id, "download cancelled before start");
        FinalStats {
            status: DownloadStatus::Cancelled,
            downloaded: 0,
            total: None,
            resumed_from: 0,
            retries: 0,
            elapsed: started.elapsed(),
            average_speed: 0.0,
        }
    }
}

/// Run `fut` unless `token` fires first.
async fn or_cancel<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}
