//! Byte/JSON extraction
//!
//! Accepts raw `.gltf` text or a `.glb` container and isolates the JSON
//! document plus the optional embedded binary payload.

pub mod glb;

use std::path::Path;

use crate::error::{Error, Result};

pub use glb::{GlbHeader, GlbWriter};

/// How the raw source bytes are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Plain UTF-8 JSON text (`.gltf`).
    Json,
    /// Binary container (`.glb`).
    Binary,
}

impl SourceKind {
    /// Pick the framing from a file extension.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSource`] for anything but `.gltf`/`.glb`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("gltf") => Ok(Self::Json),
            Some("glb") => Ok(Self::Binary),
            _ => Err(Error::UnsupportedSource(path.to_path_buf())),
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Binary => "binary container",
        }
    }
}

/// JSON text and optional binary payload isolated from a source.
#[derive(Debug, Clone)]
pub struct ExtractedSource {
    /// The glTF JSON document text.
    pub json: String,
    /// Payload of the BIN chunk, if the container had one.
    pub bin: Option<Vec<u8>>,
}

/// Isolate the JSON chunk and binary payload from raw bytes.
///
/// # Errors
/// For binary input, returns an error if the header magic, version, or total
/// length is wrong, chunk 0 is not `JSON`, or chunk 1 is present but not
/// `BIN`. Returns [`Error::Utf8Error`] if the JSON text is not UTF-8.
pub fn extract(data: &[u8], kind: SourceKind) -> Result<ExtractedSource> {
    match kind {
        SourceKind::Json => Ok(ExtractedSource {
            json: decode_json_text(data.to_vec())?,
            bin: None,
        }),
        SourceKind::Binary => extract_glb(data),
    }
}

fn extract_glb(data: &[u8]) -> Result<ExtractedSource> {
    let header = GlbHeader::read(data)?;
    let chunks = glb::read_chunks(data)?;

    let json_chunk = chunks.first().ok_or(Error::TruncatedGlb {
        offset: glb::HEADER_SIZE,
        needed: glb::CHUNK_HEADER_SIZE,
        available: 0,
    })?;
    if json_chunk.kind != glb::CHUNK_JSON {
        return Err(Error::UnexpectedChunkType {
            index: 0,
            expected: glb::CHUNK_JSON,
            found: json_chunk.kind,
        });
    }

    let bin = match chunks.get(1) {
        Some(chunk) if chunk.kind == glb::CHUNK_BIN => Some(chunk.data.to_vec()),
        Some(chunk) => {
            return Err(Error::UnexpectedChunkType {
                index: 1,
                expected: glb::CHUNK_BIN,
                found: chunk.kind,
            });
        }
        None => None,
    };

    if chunks.len() > 2 {
        tracing::debug!("Ignoring {} trailing GLB chunks", chunks.len() - 2);
    }

    tracing::debug!(
        "GLB v{}: {} bytes, JSON {} bytes, BIN {} bytes",
        header.version,
        header.length,
        json_chunk.data.len(),
        bin.as_ref().map_or(0, Vec::len)
    );

    Ok(ExtractedSource {
        json: decode_json_text(json_chunk.data.to_vec())?,
        bin,
    })
}

fn decode_json_text(mut bytes: Vec<u8>) -> Result<String> {
    // Padding is spaces per the container format, but some writers use NULs
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    Ok(String::from_utf8(bytes)?)
}
