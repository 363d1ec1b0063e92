//! Error types for `GltfLoom`

use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of an [`Error`].
///
/// Format errors mean the asset itself is malformed; resolution errors mean a
/// referenced piece of data could not be obtained. Neither is ever retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed container, schema, or unsupported required feature.
    Format,
    /// A buffer, image, or referenced index could not be resolved.
    Resolution,
    /// The import was cancelled through its [`crate::CancelToken`].
    Cancelled,
}

/// The error type for `GltfLoom` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== GLB Container Errors ====================
    /// The data is too short to hold a GLB header or chunk header.
    #[error("truncated GLB: needed {needed} bytes at offset {offset}, have {available}")]
    TruncatedGlb {
        /// Byte offset where the read started.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes left in the buffer.
        available: usize,
    },

    /// The first four bytes are not the `glTF` magic.
    #[error("invalid GLB magic: expected 0x46546C67, found {0:#010X}")]
    InvalidGlbMagic(u32),

    /// The container version is not 2.
    #[error("unsupported GLB version: {0} (expected 2)")]
    UnsupportedGlbVersion(u32),

    /// The header's total length disagrees with the actual data length.
    #[error("GLB length mismatch: header declares {declared} bytes, data has {actual}")]
    GlbLengthMismatch {
        /// Length declared in the header.
        declared: u32,
        /// Actual length of the provided bytes.
        actual: usize,
    },

    /// A chunk carries the wrong type tag for its position.
    #[error("GLB chunk {index} has type {found:#010X}, expected {expected:#010X}")]
    UnexpectedChunkType {
        /// Chunk position (0 = JSON, 1 = BIN).
        index: usize,
        /// Expected type tag.
        expected: u32,
        /// Type tag found in the file.
        found: u32,
    },

    /// Buffer 0 and the BIN chunk disagree on the payload length.
    #[error("BIN chunk length {chunk} does not match buffer 0 byteLength {declared}")]
    BinChunkLengthMismatch {
        /// `byteLength` declared by buffer 0.
        declared: usize,
        /// Length of the BIN chunk payload.
        chunk: usize,
    },

    /// The source file extension is neither `.gltf`, `.glb` nor `.zip`.
    #[error("unsupported source file: {0}")]
    UnsupportedSource(PathBuf),

    /// A zip archive contained no `.gltf` or `.glb` file at its top level.
    #[error("no glTF file found in archive directory {0}")]
    NoGltfInArchive(PathBuf),

    /// The zip archive could not be opened or extracted.
    #[error("failed to extract archive {path}: {message}")]
    ArchiveExtractionFailed {
        /// Path of the archive.
        path: PathBuf,
        /// The error message from the archive reader.
        message: String,
    },

    // ==================== Schema Errors ====================
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The JSON chunk is not valid UTF-8.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// The asset declares a glTF version other than 2.x.
    #[error("unsupported glTF asset version: {0}")]
    UnsupportedAssetVersion(String),

    /// The asset requires an extension this importer does not implement.
    #[error("required extension unsupported: {0}")]
    UnsupportedRequiredExtension(String),

    /// The number of primitive attribute blocks differs from the primitive count.
    #[error("mesh primitive attribute mismatch: {primitives} primitives, {blocks} attribute blocks")]
    PrimitiveAttributeMismatch {
        /// Declared primitives across all meshes.
        primitives: usize,
        /// Parsed `attributes` blocks.
        blocks: usize,
    },

    /// An accessor declares an unknown component type.
    #[error("invalid accessor component type: {0}")]
    InvalidComponentType(u32),

    /// An accessor declares an unknown element type.
    #[error("invalid accessor element type: {0}")]
    InvalidElementType(String),

    /// A primitive declares an unknown draw mode.
    #[error("invalid primitive mode: {0}")]
    InvalidPrimitiveMode(u32),

    /// A primitive has no `POSITION` attribute.
    #[error("mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions {
        /// Mesh index.
        mesh: usize,
        /// Primitive index within the mesh.
        primitive: usize,
    },

    /// A buffer view range falls outside its buffer.
    #[error("bufferView {view} range {offset}+{length} exceeds buffer {buffer} of {buffer_length} bytes")]
    BufferViewOutOfRange {
        /// Buffer view index.
        view: usize,
        /// Owning buffer index.
        buffer: usize,
        /// View byte offset.
        offset: usize,
        /// View byte length.
        length: usize,
        /// Buffer byte length.
        buffer_length: usize,
    },

    /// An accessor reads past the end of its buffer view.
    #[error("accessor {accessor} needs {needed} bytes but its view provides {available}")]
    AccessorOutOfRange {
        /// Accessor index.
        accessor: usize,
        /// Bytes required by offset, stride and count.
        needed: usize,
        /// Bytes available in the view.
        available: usize,
    },

    /// An accessor's element count does not fit in addressable memory.
    #[error("accessor {accessor} count {count} is too large")]
    AccessorTooLarge {
        /// Accessor index.
        accessor: usize,
        /// Declared element count.
        count: usize,
    },

    /// A sparse index points past the accessor's element count.
    #[error("accessor {accessor} sparse index {index} exceeds count {count}")]
    SparseIndexOutOfRange {
        /// Accessor index.
        accessor: usize,
        /// Offending sparse index.
        index: usize,
        /// Accessor element count.
        count: usize,
    },

    /// An accessor has the wrong element type for the attribute it feeds.
    #[error("accessor {accessor} has element type {found}, {semantic} expects {expected}")]
    AttributeTypeMismatch {
        /// Accessor index.
        accessor: usize,
        /// Attribute semantic, e.g. `NORMAL`.
        semantic: String,
        /// Expected element type.
        expected: &'static str,
        /// Element type found.
        found: &'static str,
    },

    /// A vertex attribute has a different element count than `POSITION`.
    #[error("accessor {accessor} for {semantic} has {found} elements, POSITION has {expected}")]
    AttributeCountMismatch {
        /// Accessor index.
        accessor: usize,
        /// Attribute semantic.
        semantic: String,
        /// Vertex count from `POSITION`.
        expected: usize,
        /// Element count of the attribute accessor.
        found: usize,
    },

    /// An index accessor refers to a vertex that does not exist.
    #[error("index accessor {accessor} refers to vertex {index}, primitive has {vertex_count}")]
    VertexIndexOutOfRange {
        /// Index accessor.
        accessor: usize,
        /// Offending vertex index.
        index: u32,
        /// Vertex count of the primitive.
        vertex_count: usize,
    },

    /// The node hierarchy reachable from a scene contains a cycle.
    #[error("node {0} is its own ancestor")]
    CyclicNodeGraph(usize),

    /// A node is reachable more than once within one scene.
    #[error("node {0} has more than one parent")]
    SharedNode(usize),

    // ==================== Resolution Errors ====================
    /// A cross-reference points past the end of its target array.
    #[error("{owner} references missing {target} {index}")]
    MissingReference {
        /// Description of the referencing object, e.g. `accessor 3`.
        owner: String,
        /// Name of the target array, e.g. `bufferView`.
        target: &'static str,
        /// The dangling index.
        index: usize,
    },

    /// A buffer has no URI and the container carried no BIN chunk for it.
    #[error("buffer {0} has no data source")]
    MissingBufferSource(usize),

    /// A resolved buffer payload is shorter than its declared length.
    #[error("buffer {index} payload is {actual} bytes, byteLength declares {declared}")]
    BufferTooShort {
        /// Buffer index.
        index: usize,
        /// Declared `byteLength`.
        declared: usize,
        /// Bytes actually obtained.
        actual: usize,
    },

    /// A buffer or image could not be fetched.
    #[error("failed to fetch {uri}: {message}")]
    FetchFailed {
        /// The URI or path that was requested.
        uri: String,
        /// The underlying failure.
        message: String,
    },

    /// A network URI was requested while loading synchronously or with
    /// network access disabled.
    #[error("network fetch not allowed for {0}")]
    NetworkNotAllowed(String),

    /// A relative URI does not percent-decode to UTF-8.
    #[error("invalid URI {uri}: {message}")]
    InvalidUri {
        /// The URI as written in the document.
        uri: String,
        /// The decoder error message.
        message: String,
    },

    /// A `data:` URI is malformed or not base64 encoded.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// An image could not be decoded.
    #[error("failed to decode image {index}: {message}")]
    ImageDecodeFailed {
        /// Image index.
        index: usize,
        /// The decoder error message.
        message: String,
    },

    /// An image has neither a URI nor a buffer view.
    #[error("image {0} has no data source")]
    MissingImageSource(usize),

    /// A host texture stayed unreadable after reprocessing.
    #[error("texture at {0} is not readable")]
    TextureNotReadable(PathBuf),

    /// A host texture was marked readable; construction must restart once.
    #[error("texture at {0} was reprocessed, construction restart required")]
    ReprocessRequired(PathBuf),

    // ==================== Construction Errors ====================
    /// The renderer collaborator rejected an operation.
    #[error("renderer error: {0}")]
    Renderer(String),

    /// A background job panicked or was aborted.
    #[error("background task failed: {0}")]
    BackgroundTask(String),

    /// The import was cancelled.
    #[error("import cancelled")]
    Cancelled,
}

impl Error {
    /// Classify this error for the caller.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_)
            | Self::MissingReference { .. }
            | Self::MissingBufferSource(_)
            | Self::BufferTooShort { .. }
            | Self::FetchFailed { .. }
            | Self::NetworkNotAllowed(_)
            | Self::InvalidUri { .. }
            | Self::InvalidDataUri(_)
            | Self::ImageDecodeFailed { .. }
            | Self::MissingImageSource(_)
            | Self::TextureNotReadable(_)
            | Self::ReprocessRequired(_)
            | Self::Renderer(_)
            | Self::BackgroundTask(_)
            | Self::NoGltfInArchive(_)
            | Self::ArchiveExtractionFailed { .. } => ErrorKind::Resolution,
            _ => ErrorKind::Format,
        }
    }

    /// Shorthand for a [`Error::MissingReference`].
    pub(crate) fn missing(owner: impl Into<String>, target: &'static str, index: usize) -> Self {
        Self::MissingReference {
            owner: owner.into(),
            target,
            index,
        }
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

/// A specialized Result type for `GltfLoom` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidGlbMagic(0).kind(), ErrorKind::Format);
        assert_eq!(
            Error::UnsupportedRequiredExtension("XYZ_not_supported".into()).kind(),
            ErrorKind::Format
        );
        assert_eq!(Error::MissingBufferSource(0).kind(), ErrorKind::Resolution);
        assert_eq!(Error::missing("node 0", "mesh", 4).kind(), ErrorKind::Resolution);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
