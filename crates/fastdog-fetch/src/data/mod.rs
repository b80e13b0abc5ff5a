//! Plain data passed into and out of a transfer.

mod options;
mod progress;
mod resume;

pub use options::StreamOptions;
pub use progress::{DownloadStatus, Eta, FinalStats, Progress};
pub use resume::ResumeData;
