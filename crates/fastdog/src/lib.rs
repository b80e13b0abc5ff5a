//! Streaming loader for FastDog scene models.
//!
//! # Architecture
//!
//! - `fastdog-codec` - Envelope format, backends, incremental decoding
//! - `fastdog-decode` - Backend selection with fallback, result cache, workers
//! - `fastdog-fetch` - Chunked, resumable, pausable range downloads
//! - `fastdog-state` - Checked loading lifecycle with typed listeners
//! - this crate - [`ModelLoader`] ties them together
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "reqwest")]
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use fastdog::fetch::ReqwestClient;
//! use fastdog::{LoaderConfig, ModelLoader, SceneDocumentBuilder};
//!
//! fastdog::logging::init(tracing::Level::INFO);
//!
//! let mut loader = ModelLoader::new(ReqwestClient::new()?, LoaderConfig::default());
//! let handle = loader.handle();
//! handle.subscribe(|event| println!("{:?} {:.0}%", event.state(), event.context().progress));
//!
//! let outcome = loader
//!     .load("https://example.com/city.fdg", &mut SceneDocumentBuilder)
//!     .await?;
//! if let Some(document) = outcome.model() {
//!     println!("{} buffers", document.buffer_count());
//! }
//! # Ok(())
//! # }
//! ```

pub use builder::{ModelBuilder, SceneDocumentBuilder};
pub use config::LoaderConfig;
pub use error::{LoadError, Result};
pub use loader::{LoadOutcome, LoaderHandle, ModelLoader};

pub use fastdog_codec as codec;
pub use fastdog_decode as decode;
pub use fastdog_fetch as fetch;
pub use fastdog_state as state;

mod builder;
mod config;
mod error;
mod loader;
pub mod logging;
