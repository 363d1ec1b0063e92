//! Reference resolution
//!
//! Materialises buffer payloads on first use and binds buffer views,
//! accessors and images to the bytes behind them. A buffer is loaded at most
//! once; every later request observes the same payload.

pub mod accessor;
pub mod images;
pub mod uri;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{Buffer, GltfDocument};
use crate::scheduling::LoadMode;

pub use accessor::AccessorReader;
pub use uri::{FetchPolicy, UriSource};

/// Largest difference allowed between buffer 0 and the BIN chunk, which may
/// carry up to three bytes of alignment padding.
const BIN_PADDING: usize = 3;

/// A buffer view bound to its buffer's payload.
///
/// Cheap to clone and `Send`, so decode jobs can own their input.
#[derive(Debug, Clone)]
pub struct ViewSlice {
    data: Arc<[u8]>,
    offset: usize,
    length: usize,
    /// Explicit element stride from the view, if any.
    pub stride: Option<usize>,
}

impl ViewSlice {
    /// The bytes covered by the view.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.length]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Resolves buffers and views for one asset graph.
#[derive(Debug)]
pub struct Resolver {
    policy: FetchPolicy,
    bin: Option<Arc<[u8]>>,
}

impl Resolver {
    /// `bin` is the BIN chunk of a GLB source, if any.
    #[must_use]
    pub fn new(policy: FetchPolicy, bin: Option<Vec<u8>>) -> Self {
        Self {
            policy,
            bin: bin.map(Arc::from),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    #[must_use]
    pub fn mode(&self) -> LoadMode {
        self.policy.mode
    }

    #[must_use]
    pub fn base_dir(&self) -> Option<&PathBuf> {
        self.policy.base_dir.as_ref()
    }

    /// The payload of buffer `index`, loading it on first request.
    ///
    /// # Errors
    /// Fails if the buffer has no source, the source cannot be read, or the
    /// payload is shorter than `byteLength`.
    pub async fn buffer(&self, doc: &GltfDocument, index: usize) -> Result<Arc<[u8]>> {
        let buffer = doc
            .buffers
            .get(index)
            .ok_or_else(|| Error::missing("resolver", "buffer", index))?;

        let payload = buffer
            .payload
            .get_or_try_init(|| self.load_buffer(index, buffer))
            .await?;
        Ok(Arc::clone(payload))
    }

    async fn load_buffer(&self, index: usize, buffer: &Buffer) -> Result<Arc<[u8]>> {
        let mut data = match (&buffer.uri, index) {
            (Some(uri), _) => self.policy.fetch(uri).await?,
            (None, 0) => {
                let bin = self.bin.as_ref().ok_or(Error::MissingBufferSource(0))?;
                check_bin_length(buffer.byte_length, bin.len())?;
                bin[..buffer.byte_length].to_vec()
            }
            (None, _) => return Err(Error::MissingBufferSource(index)),
        };

        if data.len() < buffer.byte_length {
            return Err(Error::BufferTooShort {
                index,
                declared: buffer.byte_length,
                actual: data.len(),
            });
        }
        data.truncate(buffer.byte_length);

        tracing::debug!("Resolved buffer {index} ({} bytes)", data.len());
        Ok(Arc::from(data))
    }

    /// Bind buffer view `index` to its buffer, loading the buffer if needed.
    ///
    /// # Errors
    /// Fails if the buffer cannot be resolved or the view's range falls
    /// outside it.
    pub async fn view(&self, doc: &GltfDocument, index: usize) -> Result<ViewSlice> {
        let view = doc
            .buffer_views
            .get(index)
            .ok_or_else(|| Error::missing("resolver", "bufferView", index))?;
        let data = self.buffer(doc, view.buffer).await?;

        if view.end().is_none_or(|end| end > data.len()) {
            return Err(Error::BufferViewOutOfRange {
                view: index,
                buffer: view.buffer,
                offset: view.byte_offset,
                length: view.byte_length,
                buffer_length: data.len(),
            });
        }

        Ok(ViewSlice {
            data,
            offset: view.byte_offset,
            length: view.byte_length,
            stride: view.byte_stride,
        })
    }

    /// Bind every buffer view, in index order.
    pub async fn views(&self, doc: &GltfDocument) -> Result<Vec<ViewSlice>> {
        let mut views = Vec::with_capacity(doc.buffer_views.len());
        for index in 0..doc.buffer_views.len() {
            views.push(self.view(doc, index).await?);
        }
        Ok(views)
    }
}

/// Check that a GLB BIN chunk can back buffer 0.
///
/// # Errors
/// Returns [`Error::BinChunkLengthMismatch`] unless the chunk holds exactly
/// `declared` bytes plus at most three bytes of padding.
pub fn check_bin_length(declared: usize, chunk: usize) -> Result<()> {
    if chunk < declared || chunk - declared > BIN_PADDING {
        return Err(Error::BinChunkLengthMismatch { declared, chunk });
    }
    Ok(())
}
