//! Renderer collaborator interface
//!
//! The importer never owns meshes, textures, materials or scene nodes. It
//! computes their parameters and hands them to a [`Renderer`], which returns
//! opaque handles. Every method is called from the primary context only.

mod headless;

use std::path::Path;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use image::RgbaImage;

use crate::assembler::MeshGeometry;
use crate::error::{Error, Result};
use crate::material::MaterialParams;
use crate::schema::Sampler;

pub use headless::{HeadlessNode, HeadlessRenderer, HeadlessTexture, RendererCall};

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// A scene-graph node owned by the renderer.
    NodeHandle
);
handle!(
    /// Uploaded geometry.
    MeshHandle
);
handle!(
    /// A material instance.
    MaterialHandle
);
handle!(
    /// A texture, created by the importer or owned by the host.
    TextureHandle
);

/// Any object the importer asked the renderer to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererObject {
    Node(NodeHandle),
    Mesh(MeshHandle),
    Material(MaterialHandle),
    Texture(TextureHandle),
}

/// Local transform of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Decoded pixels plus sampling state for a texture to create.
#[derive(Debug, Clone)]
pub struct TextureParams {
    pub name: Option<String>,
    pub image: Arc<RgbaImage>,
    pub sampler: Sampler,
    /// Data texture (normal, metal/roughness, occlusion) rather than colour.
    pub linear: bool,
}

/// A texture the host pipeline already imported from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTexture {
    pub handle: TextureHandle,
    /// Whether the host keeps the pixel data CPU-readable.
    pub readable: bool,
}

/// The rendering backend that receives the constructed asset.
///
/// Nodes are created inactive and unparented.
pub trait Renderer {
    fn create_node(&mut self, name: &str) -> Result<NodeHandle>;

    fn set_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<()>;

    fn set_local_transform(&mut self, node: NodeHandle, transform: &Transform) -> Result<()>;

    fn set_active(&mut self, node: NodeHandle, active: bool) -> Result<()>;

    fn create_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle>;

    /// Bind a mesh to a node with one material per submesh.
    fn attach_mesh(
        &mut self,
        node: NodeHandle,
        mesh: MeshHandle,
        materials: &[Option<MaterialHandle>],
    ) -> Result<()>;

    fn create_texture(&mut self, texture: &TextureParams) -> Result<TextureHandle>;

    fn create_material(&mut self, material: &MaterialParams) -> Result<MaterialHandle>;

    /// Release an object created during a failed import.
    fn destroy(&mut self, object: RendererObject);

    /// Look up a texture the host already imported from `path`.
    fn host_texture(&mut self, _path: &Path) -> Option<HostTexture> {
        None
    }

    /// Ask the host to keep the texture at `path` CPU-readable and reprocess it.
    fn make_readable(&mut self, path: &Path) -> Result<()> {
        Err(Error::TextureNotReadable(path.to_path_buf()))
    }
}

/// Wraps a renderer and records everything it creates.
///
/// On a failed import the recorded objects are destroyed newest first, so no
/// partial scene graph outlives the error.
pub(crate) struct TrackedRenderer<'a> {
    inner: &'a mut dyn Renderer,
    created: Vec<RendererObject>,
}

impl<'a> TrackedRenderer<'a> {
    pub(crate) fn new(inner: &'a mut dyn Renderer) -> Self {
        Self {
            inner,
            created: Vec::new(),
        }
    }

    pub(crate) fn created(&self) -> usize {
        self.created.len()
    }

    /// Destroy every recorded object in reverse creation order.
    pub(crate) fn rollback(&mut self) {
        if !self.created.is_empty() {
            tracing::debug!("Destroying {} renderer objects", self.created.len());
        }
        while let Some(object) = self.created.pop() {
            self.inner.destroy(object);
        }
    }
}

impl Renderer for TrackedRenderer<'_> {
    fn create_node(&mut self, name: &str) -> Result<NodeHandle> {
        let node = self.inner.create_node(name)?;
        self.created.push(RendererObject::Node(node));
        Ok(node)
    }

    fn set_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<()> {
        self.inner.set_parent(node, parent)
    }

    fn set_local_transform(&mut self, node: NodeHandle, transform: &Transform) -> Result<()> {
        self.inner.set_local_transform(node, transform)
    }

    fn set_active(&mut self, node: NodeHandle, active: bool) -> Result<()> {
        self.inner.set_active(node, active)
    }

    fn create_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle> {
        let mesh = self.inner.create_mesh(geometry)?;
        self.created.push(RendererObject::Mesh(mesh));
        Ok(mesh)
    }

    fn attach_mesh(
        &mut self,
        node: NodeHandle,
        mesh: MeshHandle,
        materials: &[Option<MaterialHandle>],
    ) -> Result<()> {
        self.inner.attach_mesh(node, mesh, materials)
    }

    fn create_texture(&mut self, texture: &TextureParams) -> Result<TextureHandle> {
        let handle = self.inner.create_texture(texture)?;
        self.created.push(RendererObject::Texture(handle));
        Ok(handle)
    }

    fn create_material(&mut self, material: &MaterialParams) -> Result<MaterialHandle> {
        let handle = self.inner.create_material(material)?;
        self.created.push(RendererObject::Material(handle));
        Ok(handle)
    }

    fn destroy(&mut self, object: RendererObject) {
        self.created.retain(|o| *o != object);
        self.inner.destroy(object);
    }

    // Host textures belong to the host and are never recorded.
    fn host_texture(&mut self, path: &Path) -> Option<HostTexture> {
        self.inner.host_texture(path)
    }

    fn make_readable(&mut self, path: &Path) -> Result<()> {
        self.inner.make_readable(path)
    }
}
