use serde::{Deserialize, Serialize};

use crate::state::LoadingState;

/// What went wrong, and in which phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingError {
    /// Human-readable failure description.
    pub message: String,

    /// State the load was in when it failed.
    pub phase: LoadingState,
}

/// Data carried alongside the current [`LoadingState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingContext<D> {
    /// 0 to 100.
    pub progress: f64,
    /// Status line for the current phase.
    pub message: String,
    /// Set on entering error, cleared by reset.
    pub error: Option<LoadingError>,
    /// Result of a successful load.
    pub data: Option<D>,
}

impl<D> Default for LoadingContext<D> {
    fn default() -> Self {
        Self {
            progress: 0.0,
            message: String::new(),
            error: None,
            data: None,
        }
    }
}

/// Fields to overwrite on a transition. Unset fields keep their value.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPatch<D> {
    progress: Option<f64>,
    message: Option<String>,
    error: Option<Option<LoadingError>>,
    data: Option<D>,
}

impl<D> Default for ContextPatch<D> {
    fn default() -> Self {
        Self {
            progress: None,
            message: None,
            error: None,
            data: None,
        }
    }
}

impl<D> ContextPatch<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to 0..=100 when applied.
    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, error: LoadingError) -> Self {
        self.error = Some(Some(error));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn apply(self, context: LoadingContext<D>) -> LoadingContext<D> {
        LoadingContext {
            progress: self.progress.map_or(context.progress, clamp_progress),
            message: self.message.unwrap_or(context.message),
            error: self.error.unwrap_or(context.error),
            data: self.data.or(context.data),
        }
    }
}

pub(crate) fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 100.0) }
}
