//! I/O: the client seam, transfer control and the download loop.

mod control;
mod downloader;
mod http;
mod sink;

pub use control::DownloadControl;
pub use downloader::Downloader;
pub use http::{RangeClient, RangeResponse, ResourceInfo};
pub use sink::{ChunkSink, FnSink};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
