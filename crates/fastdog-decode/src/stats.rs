use fastdog_codec::BackendKind;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendCounters {
    /// Successful decodes served by this backend.
    pub decodes: u64,
    /// Wall time spent in those decodes, in milliseconds.
    pub total_time_ms: f64,
}

impl BackendCounters {
    pub fn average_time_ms(&self) -> f64 {
        if self.decodes == 0 {
            0.0
        } else {
            self.total_time_ms / self.decodes as f64
        }
    }
}

/// Successful decodes per backend. Cache hits are not counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Counters for the primary backend.
    pub primary: BackendCounters,
    /// Counters for the fallback backend.
    pub fallback: BackendCounters,
    /// Calls that failed on primary and were then served by fallback.
    pub fallbacks_taken: u64,
}

impl PerformanceStats {
    pub fn backend(&self, kind: BackendKind) -> &BackendCounters {
        match kind {
            BackendKind::Primary => &self.primary,
            BackendKind::Fallback => &self.fallback,
        }
    }

    pub fn total_decodes(&self) -> u64 {
        self.primary.decodes + self.fallback.decodes
    }

    pub(crate) fn record(&mut self, kind: BackendKind, time_ms: f64) {
        let counters = match kind {
            BackendKind::Primary => &mut self.primary,
            BackendKind::Fallback => &mut self.fallback,
        };
        counters.decodes += 1;
        counters.total_time_ms += time_ms;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    /// Decode failures on the primary backend.
    pub primary: u64,
    /// Decode failures on the fallback backend.
    pub fallback: u64,
    /// Primary bring-up failures that led to demotion.
    pub init_failures: u64,
    /// Message of the most recent failure, prefixed with its backend.
    pub last_error: Option<String>,
}

impl ErrorStats {
    pub fn backend(&self, kind: BackendKind) -> u64 {
        match kind {
            BackendKind::Primary => self.primary,
            BackendKind::Fallback => self.fallback,
        }
    }

    pub fn total(&self) -> u64 {
        self.primary + self.fallback
    }

    pub(crate) fn record(&mut self, kind: BackendKind, error: &fastdog_codec::Error) {
        match kind {
            BackendKind::Primary => self.primary += 1,
            BackendKind::Fallback => self.fallback += 1,
        }
        self.last_error = Some(format!("{kind}: {error}"));
    }
}
