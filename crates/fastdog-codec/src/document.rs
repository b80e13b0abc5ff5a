//! Read access to version 1 scene documents.
//!
//! Binary buffers travel inside the JSON as `data:` URIs with base64 content,
//! e.g. `{"buffers": [{"byteLength": 4, "uri": "data:application/octet-stream;base64,AQIDBA=="}]}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::codec::{DecodeResult, DecodedData};
use crate::error::DocumentError;

const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    root: Value,
}

impl SceneDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// `None` when the result carries binary data.
    pub fn from_result(result: &DecodeResult) -> Option<Self> {
        match &result.data {
            DecodedData::Json(v) => Some(Self::new(v.clone())),
            DecodedData::Binary(_) => None,
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers_array().map_or(0, Vec::len)
    }

    pub fn buffer(&self, index: usize) -> Result<Vec<u8>, DocumentError> {
        let entry = self
            .buffers_array()
            .and_then(|buffers| buffers.get(index))
            .ok_or(DocumentError::MissingBuffer(index))?;

        let uri = entry
            .get("uri")
            .and_then(Value::as_str)
            .filter(|uri| uri.starts_with("data:"))
            .ok_or(DocumentError::NotEmbedded(index))?;
        let (_, encoded) = uri
            .split_once(BASE64_MARKER)
            .ok_or(DocumentError::NotEmbedded(index))?;

        let bytes = STANDARD.decode(encoded)?;
        if let Some(declared) = entry.get("byteLength").and_then(Value::as_u64)
            && declared != bytes.len() as u64
        {
            return Err(DocumentError::LengthMismatch {
                index,
                declared,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    pub fn buffers(&self) -> Result<Vec<Vec<u8>>, DocumentError> {
        (0..self.buffer_count()).map(|i| self.buffer(i)).collect()
    }

    fn buffers_array(&self) -> Option<&Vec<Value>> {
        self.root.get("buffers").and_then(Value::as_array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_buffers_decode() {
        let doc = SceneDocument::new(json!({
            "buffers": [
                {"byteLength": 4, "uri": "data:application/octet-stream;base64,AQIDBA=="},
                {"uri": "data:application/gltf-buffer;base64,"}
            ]
        }));
        assert_eq!(doc.buffer_count(), 2);
        assert_eq!(doc.buffers().unwrap(), vec![vec![1, 2, 3, 4], vec![]]);
    }

    #[test]
    fn external_uri_is_rejected() {
        let doc = SceneDocument::new(json!({"buffers": [{"uri": "mesh.bin"}]}));
        assert!(matches!(doc.buffer(0), Err(DocumentError::NotEmbedded(0))));
        assert!(matches!(doc.buffer(1), Err(DocumentError::MissingBuffer(1))));
    }

    #[test]
    fn declared_length_is_checked() {
        let doc = SceneDocument::new(json!({
            "buffers": [{"byteLength": 9, "uri": "data:;base64,AQIDBA=="}]
        }));
        assert!(matches!(
            doc.buffer(0),
            Err(DocumentError::LengthMismatch { declared: 9, actual: 4, .. })
        ));
    }

    #[test]
    fn documents_without_buffers_are_empty() {
        let doc = SceneDocument::new(json!({"x": 1}));
        assert_eq!(doc.buffer_count(), 0);
        assert!(doc.buffers().unwrap().is_empty());
    }
}
