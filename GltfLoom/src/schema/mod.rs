//! Schema deserialization
//!
//! Maps glTF JSON text onto the typed asset graph. Every object keeps its
//! `extensions` and `extras` as generic JSON so nothing is lost, and derived
//! data (buffer payloads, renderer handles) is attached in place by later
//! stages through `#[serde(skip)]` fields.

pub mod accessor;
pub mod animation;
pub mod buffer;
pub mod material;
pub mod mesh;
pub mod node;
pub mod texture;
mod validate;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::ImportWarning;

pub use accessor::{Accessor, ComponentType, ElementType, Sparse};
pub use animation::Animation;
pub use buffer::{Buffer, BufferView};
pub use material::{AlphaMode, Material, MaterialExtension, SpecularGlossiness, TextureInfo};
pub use mesh::{Attributes, ConstructedMesh, Mesh, Mode, Primitive};
pub use node::{Camera, Node, Scene, Skin};
pub use texture::{Image, Sampler, Texture};
pub use validate::validate_references;

/// Arbitrary extension objects keyed by extension name.
pub type Extensions = serde_json::Map<String, Value>;

/// Extensions this importer understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[material::SPECULAR_GLOSSINESS];

/// Metadata about the glTF asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl Default for AssetInfo {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            min_version: None,
            generator: None,
            copyright: None,
            extensions: None,
            extras: None,
        }
    }
}

/// Root of the asset graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfDocument {
    pub asset: AssetInfo,
    #[serde(default)]
    pub extensions_used: Vec<String>,
    #[serde(default)]
    pub extensions_required: Vec<String>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub animations: Vec<Animation>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub cameras: Vec<Camera>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub samplers: Vec<Sampler>,
    /// Default scene index.
    pub scene: Option<usize>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub skins: Vec<Skin>,
    #[serde(default)]
    pub textures: Vec<Texture>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl GltfDocument {
    /// Total primitive count across all meshes.
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|m| m.primitives.len()).sum()
    }
}

/// A deserialized document plus the non-fatal issues found while parsing.
#[derive(Debug)]
pub struct ParsedDocument {
    pub document: GltfDocument,
    pub warnings: Vec<ImportWarning>,
}

/// Parse glTF JSON text into a validated asset graph.
///
/// # Errors
/// Fails on malformed JSON, a non-2.x asset version, an unsupported required
/// extension, primitives without an attribute block, or any dangling index.
pub fn parse_document(json: &str) -> Result<ParsedDocument> {
    let mut document: GltfDocument = serde_json::from_str(json)?;
    let mut warnings = Vec::new();

    if !document.asset.version.starts_with("2.") {
        return Err(Error::UnsupportedAssetVersion(document.asset.version));
    }

    for extension in &document.extensions_required {
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::UnsupportedRequiredExtension(extension.clone()));
        }
    }

    for extension in &document.extensions_used {
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            tracing::warn!("Ignoring unsupported extension {extension}");
            warnings.push(ImportWarning::UnsupportedExtension(extension.clone()));
        }
    }

    bind_attributes(&mut document)?;

    for material in &mut document.materials {
        material.bind_extension()?;
    }

    validate_references(&document)?;

    tracing::debug!(
        "Parsed glTF {}: {} meshes, {} primitives, {} nodes, {} scenes",
        document.asset.version,
        document.meshes.len(),
        document.primitive_count(),
        document.nodes.len(),
        document.scenes.len()
    );

    Ok(ParsedDocument { document, warnings })
}

/// Bind every primitive's raw `attributes` block into its attribute map.
fn bind_attributes(document: &mut GltfDocument) -> Result<()> {
    let primitives = document.primitive_count();
    let blocks = document
        .meshes
        .iter()
        .flat_map(|m| &m.primitives)
        .filter(|p| p.raw_attributes.is_some())
        .count();

    if blocks != primitives {
        return Err(Error::PrimitiveAttributeMismatch { primitives, blocks });
    }

    for primitive in document.meshes.iter_mut().flat_map(|m| &mut m.primitives) {
        if let Some(raw) = primitive.raw_attributes.take() {
            primitive.attributes = Attributes::from_map(&raw);
        }
    }
    Ok(())
}
