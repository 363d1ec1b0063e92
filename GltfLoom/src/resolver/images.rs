//! Image source resolution and decoding.

use std::path::PathBuf;

use image::{ImageFormat, RgbaImage};

use super::{Resolver, UriSource, ViewSlice};
use crate::error::{Error, Result};
use crate::schema::{GltfDocument, Image};

/// Encoded image bytes and their declared media type.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub index: usize,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// The on-disk path of an image referenced by a plain file URI.
#[must_use]
pub fn local_path(image: &Image, resolver: &Resolver) -> Option<PathBuf> {
    let uri = image.uri.as_deref()?;
    match UriSource::parse(uri, resolver.base_dir().map(PathBuf::as_path)).ok()? {
        UriSource::File(path) => Some(path),
        _ => None,
    }
}

/// Fetch the encoded bytes of image `index` from its URI or buffer view.
pub async fn load(
    doc: &GltfDocument,
    views: &[ViewSlice],
    resolver: &Resolver,
    index: usize,
) -> Result<EncodedImage> {
    let image = doc
        .images
        .get(index)
        .ok_or_else(|| Error::missing("texture", "image", index))?;

    if let Some(uri) = &image.uri {
        let bytes = resolver.policy().fetch(uri).await?;
        let mime_type = match UriSource::parse(uri, None)? {
            UriSource::Data { mime, .. } => mime.or_else(|| image.mime_type.clone()),
            _ => image.mime_type.clone(),
        };
        return Ok(EncodedImage {
            index,
            bytes,
            mime_type,
        });
    }

    if let Some(view) = image.buffer_view {
        let slice = views
            .get(view)
            .ok_or_else(|| Error::missing(format!("image {index}"), "bufferView", view))?;
        return Ok(EncodedImage {
            index,
            bytes: slice.bytes().to_vec(),
            mime_type: image.mime_type.clone(),
        });
    }

    Err(Error::MissingImageSource(index))
}

impl EncodedImage {
    /// Decode to 8-bit RGBA.
    ///
    /// The declared media type picks the decoder; without one the format is
    /// guessed from the data.
    pub fn decode(&self) -> Result<RgbaImage> {
        let format = self.mime_type.as_deref().and_then(ImageFormat::from_mime_type);
        let decoded = match format {
            Some(format) => image::load_from_memory_with_format(&self.bytes, format),
            None => image::load_from_memory(&self.bytes),
        }
        .map_err(|e| Error::ImageDecodeFailed {
            index: self.index,
            message: e.to_string(),
        })?;
        Ok(decoded.to_rgba8())
    }
}
