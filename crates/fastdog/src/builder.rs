use std::future::Future;

use fastdog_codec::{DecodeResult, DocumentError, SceneDocument};

/// Turns a decoded envelope into the caller's model type.
///
/// This is where a scene graph would be assembled; the loader only needs the
/// result or an error.
pub trait ModelBuilder: Send {
    type Model: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn build(
        &mut self,
        decoded: DecodeResult,
    ) -> impl Future<Output = std::result::Result<Self::Model, Self::Error>> + Send;
}

/// Accepts version 1 envelopes and checks that every embedded buffer decodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneDocumentBuilder;

impl ModelBuilder for SceneDocumentBuilder {
    type Model = SceneDocument;
    type Error = DocumentError;

    async fn build(&mut self, decoded: DecodeResult) -> std::result::Result<SceneDocument, DocumentError> {
        let document = SceneDocument::from_result(&decoded).ok_or(DocumentError::NotJson)?;
        document.buffers()?;
        Ok(document)
    }
}
