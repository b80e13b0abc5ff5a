use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::data::ResumeData;

/// Pause, cancel and resume state shared between a running transfer and
/// whoever controls it. Clone the surrounding `Arc` to hand it out.
#[derive(Debug, Default)]
pub struct DownloadControl {
    paused: AtomicBool,
    cancel: Mutex<CancellationToken>,
    resume: Mutex<Option<ResumeData>>,
}

impl DownloadControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the transfer before its next range request.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            debug!("download paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            debug!("download resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Abort the in-flight request and stop. Resume data is discarded.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
        self.resume.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_cancelled()
    }

    /// Replace a fired cancellation token and clear the pause flag so the
    /// control can drive a new transfer. Resume data is left alone.
    pub fn rearm(&self) {
        let mut cancel = self.cancel.lock();
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
        self.paused.store(false, Ordering::SeqCst);
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    pub fn resume_data(&self) -> Option<ResumeData> {
        self.resume.lock().clone()
    }

    pub fn set_resume_data(&self, data: ResumeData) {
        *self.resume.lock() = Some(data);
    }

    pub fn clear_resume_data(&self) {
        self.resume.lock().take();
    }
}
