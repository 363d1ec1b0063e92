//! Buffers and buffer views.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::Extensions;

/// Raw binary payload, sourced from a file, the network, a `data:` URI, or
/// the GLB BIN chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    /// Declared payload length in bytes.
    pub byte_length: usize,
    /// Location of the payload; absent for the GLB-embedded buffer.
    pub uri: Option<String>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,

    /// Resolved payload. Written at most once, read-only afterwards.
    #[serde(skip)]
    pub(crate) payload: OnceCell<Arc<[u8]>>,
}

impl Buffer {
    /// The resolved payload, if the resolver has populated it.
    #[must_use]
    pub fn payload(&self) -> Option<&Arc<[u8]>> {
        self.payload.get()
    }

    /// Whether the payload comes from the container rather than a URI.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.uri.is_none()
    }
}

/// Intended GPU usage of a buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum Target {
    /// Vertex attribute data (`34962`).
    ArrayBuffer,
    /// Index data (`34963`).
    ElementArrayBuffer,
}

impl TryFrom<u32> for Target {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            34962 => Ok(Self::ArrayBuffer),
            34963 => Ok(Self::ElementArrayBuffer),
            _ => Err(format!("invalid bufferView target: {value}")),
        }
    }
}

/// A byte-range window into a buffer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Distance between consecutive elements; tightly packed when absent.
    pub byte_stride: Option<usize>,
    pub target: Option<Target>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl BufferView {
    /// Exclusive end offset of the view inside its buffer, `None` on overflow.
    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.byte_offset.checked_add(self.byte_length)
    }
}
