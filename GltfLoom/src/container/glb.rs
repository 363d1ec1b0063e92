//! GLB binary container framing
//!
//! A GLB file is a 12-byte header followed by 8-byte-prefixed chunks:
//!
//! ```text
//! magic:u32 version:u32 length:u32
//! chunkLength:u32 chunkType:u32 payload[chunkLength]   (JSON, mandatory)
//! chunkLength:u32 chunkType:u32 payload[chunkLength]   (BIN, optional)
//! ```
//!
//! All integers are little-endian.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// `glTF` in little-endian byte order.
pub const MAGIC: u32 = 0x46546C67;

/// The only container version this reader accepts.
pub const VERSION: u32 = 2;

/// Chunk type tag for the JSON chunk (`JSON`).
pub const CHUNK_JSON: u32 = 0x4E4F534A;

/// Chunk type tag for the binary chunk (`BIN\0`).
pub const CHUNK_BIN: u32 = 0x004E4942;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of a chunk header in bytes.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Validated GLB file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    /// Container version (always 2 once validated).
    pub version: u32,
    /// Total length of the file in bytes.
    pub length: u32,
}

impl GlbHeader {
    /// Read and validate the header against the full container bytes.
    ///
    /// # Errors
    /// Returns an error naming the first invariant that fails: magic,
    /// version, or total length.
    pub fn read(data: &[u8]) -> Result<Self> {
        ensure_available(data, 0, HEADER_SIZE)?;
        let mut reader = Cursor::new(data);

        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(Error::InvalidGlbMagic(magic));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::UnsupportedGlbVersion(version));
        }

        let length = reader.read_u32::<LittleEndian>()?;
        if length as usize != data.len() {
            return Err(Error::GlbLengthMismatch {
                declared: length,
                actual: data.len(),
            });
        }

        Ok(Self { version, length })
    }
}

/// One chunk borrowed from the container bytes.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Chunk type tag.
    pub kind: u32,
    /// Chunk payload, excluding the 8-byte chunk header.
    pub data: &'a [u8],
}

/// Iterate the chunks that follow the header.
///
/// # Errors
/// Returns an error if a chunk header or payload runs past the end of the data.
pub fn read_chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>> {
    let mut chunks = Vec::new();
    let mut offset = HEADER_SIZE;

    while offset < data.len() {
        ensure_available(data, offset, CHUNK_HEADER_SIZE)?;
        let mut reader = Cursor::new(&data[offset..]);
        let length = reader.read_u32::<LittleEndian>()? as usize;
        let kind = reader.read_u32::<LittleEndian>()?;
        offset += CHUNK_HEADER_SIZE;

        ensure_available(data, offset, length)?;
        chunks.push(Chunk {
            kind,
            data: &data[offset..offset + length],
        });
        offset += length;
    }

    Ok(chunks)
}

fn ensure_available(data: &[u8], offset: usize, needed: usize) -> Result<()> {
    let available = data.len().saturating_sub(offset);
    if available < needed {
        return Err(Error::TruncatedGlb {
            offset,
            needed,
            available,
        });
    }
    Ok(())
}

/// Writes GLB containers with 4-byte aligned chunks.
///
/// The JSON chunk is padded with spaces and the BIN chunk with zeros, as the
/// container format requires.
#[derive(Debug, Default)]
pub struct GlbWriter {
    json: Vec<u8>,
    bin: Option<Vec<u8>>,
}

impl GlbWriter {
    /// Start a container around a JSON document.
    pub fn new(json: impl Into<String>) -> Self {
        Self {
            json: json.into().into_bytes(),
            bin: None,
        }
    }

    /// Attach the binary payload for buffer 0.
    #[must_use]
    pub fn with_bin(mut self, bin: impl Into<Vec<u8>>) -> Self {
        self.bin = Some(bin.into());
        self
    }

    /// Build the container bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let json_padding = padding(self.json.len());
        let json_chunk_len = self.json.len() + json_padding;

        let bin_chunk_len = self.bin.as_ref().map(|bin| bin.len() + padding(bin.len()));
        let total_len = HEADER_SIZE
            + CHUNK_HEADER_SIZE
            + json_chunk_len
            + bin_chunk_len.map_or(0, |len| CHUNK_HEADER_SIZE + len);

        let mut output = Vec::with_capacity(total_len);

        // GLB header
        output.extend_from_slice(&MAGIC.to_le_bytes());
        output.extend_from_slice(&VERSION.to_le_bytes());
        output.extend_from_slice(&(total_len as u32).to_le_bytes());

        // JSON chunk
        output.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
        output.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        output.extend_from_slice(&self.json);
        output.resize(output.len() + json_padding, b' ');

        // Binary chunk
        if let (Some(bin), Some(chunk_len)) = (self.bin, bin_chunk_len) {
            output.extend_from_slice(&(chunk_len as u32).to_le_bytes());
            output.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            let bin_padding = chunk_len - bin.len();
            output.extend_from_slice(&bin);
            output.resize(output.len() + bin_padding, 0);
        }

        output
    }
}

fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}
