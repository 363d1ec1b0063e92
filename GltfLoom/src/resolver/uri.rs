//! URI classification and fetching for buffers and images.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};
use crate::scheduling::LoadMode;

/// Where a `uri` field points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriSource {
    /// Inline `data:` URI with its media type (if any) and payload text.
    Data {
        mime: Option<String>,
        base64: bool,
        payload: String,
    },
    /// `http://` or `https://` resource.
    Remote(String),
    /// Path relative to the asset's directory (or absolute).
    File(PathBuf),
}

impl UriSource {
    /// Classify `uri`, joining relative file paths onto `base_dir`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidUri`] if a file URI's escapes do not decode
    /// to UTF-8.
    pub fn parse(uri: &str, base_dir: Option<&Path>) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').unwrap_or((rest, ""));
            let mime = header
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            return Ok(Self::Data {
                mime,
                base64: header.ends_with(";base64"),
                payload: payload.to_string(),
            });
        }

        let lower = uri.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Remote(uri.to_string()));
        }

        let decoded = percent_decode_str(uri)
            .decode_utf8()
            .map_err(|e| Error::InvalidUri {
                uri: truncate_uri(uri),
                message: e.to_string(),
            })?;
        let relative = PathBuf::from(decoded.into_owned());
        Ok(match base_dir {
            Some(base) if relative.is_relative() => Self::File(base.join(relative)),
            _ => Self::File(relative),
        })
    }
}

/// Decode a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<(Option<String>, Vec<u8>)> {
    match UriSource::parse(uri, None)? {
        UriSource::Data {
            mime,
            base64: true,
            payload,
        } => {
            let bytes = STANDARD
                .decode(payload.trim())
                .map_err(|e| Error::InvalidDataUri(e.to_string()))?;
            Ok((mime, bytes))
        }
        _ => Err(Error::InvalidDataUri(truncate_uri(uri))),
    }
}

fn truncate_uri(uri: &str) -> String {
    const MAX: usize = 48;
    match uri.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &uri[..end]),
        None => uri.to_string(),
    }
}

/// Network and I/O policy for one import.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub base_dir: Option<PathBuf>,
    pub mode: LoadMode,
    pub allow_network: bool,
}

impl FetchPolicy {
    /// Read the bytes a URI points to.
    ///
    /// Local files use blocking reads in synchronous mode and `tokio::fs` in
    /// asynchronous mode. Network URIs are only fetched asynchronously.
    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        match UriSource::parse(uri, self.base_dir.as_deref())? {
            UriSource::Data { .. } => decode_data_uri(uri).map(|(_, bytes)| bytes),
            UriSource::Remote(url) => self.fetch_remote(url).await,
            UriSource::File(path) => {
                tracing::debug!("Reading {}", path.display());
                let result = match self.mode {
                    LoadMode::Synchronous => std::fs::read(&path),
                    LoadMode::Asynchronous => tokio::fs::read(&path).await,
                };
                result.map_err(|e| Error::FetchFailed {
                    uri: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn fetch_remote(&self, url: String) -> Result<Vec<u8>> {
        if self.mode == LoadMode::Synchronous || !self.allow_network {
            return Err(Error::NetworkNotAllowed(url));
        }

        tracing::debug!("Fetching {url}");
        let failed = |e: reqwest::Error| Error::FetchFailed {
            uri: url.clone(),
            message: e.to_string(),
        };
        let response = reqwest::get(url.as_str())
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;
        let bytes = response.bytes().await.map_err(failed)?;
        Ok(bytes.to_vec())
    }
}
