use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coarse remaining-time estimate, rounded up within its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eta {
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
}

impl Eta {
    pub fn from_secs(secs: f64) -> Self {
        let secs = secs.max(0.0);
        if secs < 60.0 {
            Eta::Seconds(secs.ceil() as u64)
        } else if secs < 3600.0 {
            Eta::Minutes((secs / 60.0).ceil() as u64)
        } else {
            Eta::Hours((secs / 3600.0).ceil() as u64)
        }
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Seconds(n) => write!(f, "{n}s"),
            Eta::Minutes(n) => write!(f, "{n}m"),
            Eta::Hours(n) => write!(f, "{n}h"),
        }
    }
}

/// Snapshot passed to [`ChunkSink::on_progress`](crate::ChunkSink::on_progress)
/// after each chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// 0 to 100. Stays 0 while the total is unknown, 100 on completion.
    pub percent: f64,
    /// Bytes received so far, including any resumed prefix.
    pub downloaded: u64,
    /// Resource length, if known.
    pub total: Option<u64>,
    /// Bytes per second between the last two samples.
    pub speed: f64,
    /// Estimated time left, once both the total and a speed are known.
    pub eta: Option<Eta>,
}

impl Progress {
    pub(crate) fn percent_of(downloaded: u64, total: Option<u64>) -> f64 {
        match total {
            Some(0) => 100.0,
            Some(total) => (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|total| self.downloaded >= total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Completed,
    Cancelled,
}

/// Result of one [`download_stream`](crate::Downloader::download_stream) call.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalStats {
    /// Whether the transfer ran to the end or was cancelled.
    pub status: DownloadStatus,

    /// Bytes held at the end, including any resumed prefix.
    pub downloaded: u64,

    /// Resource length, if it became known.
    pub total: Option<u64>,

    /// Offset this call started from.
    pub resumed_from: u64,

    /// Transport retries across all ranges.
    pub retries: u32,

    /// Wall time of this call.
    pub elapsed: Duration,

    /// Bytes fetched by this call divided by `elapsed`.
    pub average_speed: f64,
}

impl FinalStats {
    pub fn is_cancelled(&self) -> bool {
        self.status == DownloadStatus::Cancelled
    }
}
