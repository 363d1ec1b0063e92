//! Progress and warning types shared across the import pipeline

use std::sync::Arc;

// ============================================================================
// Progress Types
// ============================================================================

/// Progress callback type for import operations
pub type ImportProgressCallback = Arc<dyn Fn(&ImportProgress) + Send + Sync>;

/// Progress information during an import
#[derive(Debug, Clone)]
pub struct ImportProgress {
    /// Current pipeline phase
    pub phase: ImportPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items in this phase
    pub total: usize,
    /// Name of the item being processed (if applicable)
    pub current_item: Option<String>,
}

impl ImportProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: ImportPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_item: None,
        }
    }

    /// Create a progress update with an item name
    #[must_use]
    pub fn with_item(
        phase: ImportPhase,
        current: usize,
        total: usize,
        item: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_item: Some(item.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    /// Reading the source file (and unpacking a zip wrapper)
    ReadingFile,
    /// Extracting and parsing the JSON document
    Parsing,
    /// Resolving buffers and buffer views
    Buffers,
    /// Decoding images and creating textures
    Textures,
    /// Creating materials
    Materials,
    /// Building the node hierarchy
    Scenes,
    /// Import complete
    Complete,
}

impl ImportPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingFile => "Reading file",
            Self::Parsing => "Parsing document",
            Self::Buffers => "Resolving buffers",
            Self::Textures => "Loading textures",
            Self::Materials => "Creating materials",
            Self::Scenes => "Building scenes",
            Self::Complete => "Complete",
        }
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// A non-fatal problem; the import continued with the feature degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// An entry of `extensionsUsed` is not supported and was ignored.
    UnsupportedExtension(String),
    /// The document has no scenes; the returned root is empty.
    NoScenes,
    /// No default scene is declared; the first scene was used.
    NoDefaultScene,
    /// A texture has no image source and was skipped.
    TextureWithoutSource(usize),
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedExtension(name) => write!(f, "unsupported extension ignored: {name}"),
            Self::NoScenes => write!(f, "document has no scenes"),
            Self::NoDefaultScene => write!(f, "no default scene declared, using scene 0"),
            Self::TextureWithoutSource(index) => write!(f, "texture {index} has no image source"),
        }
    }
}
