//! # GltfLoom
//!
//! A glTF 2.0 importer that rebuilds `.gltf`, `.glb` and zip-wrapped assets
//! into a renderer-agnostic scene graph.
//!
//! ## Pipeline
//!
//! - **Container** - GLB header and chunk framing, or plain JSON text
//! - **Schema** - typed asset graph with reference validation
//! - **Resolver** - buffers, buffer views, accessors and images
//! - **Assembler** - vertex streams, index lists and combined meshes
//! - **Scene** - node hierarchy construction through a [`Renderer`]
//!
//! Stages run in a fixed order (buffer views, textures, materials, scenes).
//! Renderer calls always happen on the caller's context; decoding moves to
//! the blocking pool in asynchronous mode.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gltfloom::{HeadlessRenderer, ImportOptions, import_gltf_blocking};
//!
//! let mut renderer = HeadlessRenderer::new();
//! let asset = import_gltf_blocking("model.glb", &mut renderer, &ImportOptions::default())?;
//! println!("Built {} nodes", asset.object.document.nodes.len());
//! # Ok::<(), gltfloom::Error>(())
//! ```
//!
//! ### Asynchronous import
//!
//! ```no_run
//! use gltfloom::prelude::*;
//!
//! # async fn run() -> gltfloom::Result<()> {
//! let mut renderer = HeadlessRenderer::new();
//! let options = ImportOptions::new().with_scene(SceneSelection::Default);
//! let asset = import_gltf("scene.gltf", &mut renderer, &options).await?;
//! for warning in &asset.warnings {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod container;
pub mod error;
pub mod import;
pub mod material;
pub mod renderer;
pub mod resolver;
pub mod scene;
pub mod scheduling;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};
pub use import::{
    GltfObject, ImportOptions, ImportedAsset, SceneSelection, import_gltf, import_gltf_blocking,
    import_gltf_bytes,
};
pub use renderer::{HeadlessRenderer, Renderer};
pub use scheduling::{CancelToken, LoadMode};
pub use types::{ImportPhase, ImportProgress, ImportProgressCallback, ImportWarning};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::import::{
        GltfObject, ImportOptions, ImportedAsset, SceneSelection, import_gltf,
        import_gltf_blocking, import_gltf_bytes,
    };
    pub use crate::scheduling::{CancelToken, LoadMode};
    pub use crate::types::{ImportPhase, ImportProgress, ImportWarning};

    // Renderer collaborator
    pub use crate::renderer::{
        HeadlessRenderer, MaterialHandle, MeshHandle, NodeHandle, Renderer, TextureHandle,
        TextureParams, Transform,
    };
    pub use crate::assembler::MeshGeometry;
    pub use crate::material::MaterialParams;
    pub use crate::scene::{BuildEvent, NodeState};

    // Container and schema
    pub use crate::container::{GlbWriter, SourceKind};
    pub use crate::schema::{GltfDocument, parse_document};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
