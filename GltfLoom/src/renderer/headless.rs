//! In-memory renderer that records every call.
//!
//! Used by the CLI to inspect imports and by tests to observe build order.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{
    HostTexture, MaterialHandle, MeshHandle, NodeHandle, Renderer, RendererObject, TextureHandle,
    TextureParams, Transform,
};
use crate::assembler::MeshGeometry;
use crate::error::{Error, Result};
use crate::material::MaterialParams;

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererCall {
    CreateNode(NodeHandle),
    SetParent { node: NodeHandle, parent: NodeHandle },
    SetLocalTransform(NodeHandle),
    SetActive { node: NodeHandle, active: bool },
    CreateMesh(MeshHandle),
    AttachMesh { node: NodeHandle, mesh: MeshHandle },
    CreateTexture(TextureHandle),
    CreateMaterial(MaterialHandle),
    Destroy(RendererObject),
    MakeReadable(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessNode {
    pub name: String,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
    pub transform: Transform,
    pub active: bool,
    pub mesh: Option<(MeshHandle, Vec<Option<MaterialHandle>>)>,
}

/// Summary of a created texture; pixels are not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub linear: bool,
}

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_id: u64,
    nodes: BTreeMap<NodeHandle, HeadlessNode>,
    meshes: BTreeMap<MeshHandle, MeshGeometry>,
    materials: BTreeMap<MaterialHandle, MaterialParams>,
    textures: BTreeMap<TextureHandle, HeadlessTexture>,
    host_textures: HashMap<PathBuf, HostTexture>,
    calls: Vec<RendererCall>,
}

impl HeadlessRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Pretend the host already imported a texture from `path`.
    pub fn register_host_texture(&mut self, path: impl Into<PathBuf>, readable: bool) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.host_textures
            .insert(path.into(), HostTexture { handle, readable });
        handle
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> &[RendererCall] {
        &self.calls
    }

    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&HeadlessNode> {
        self.nodes.get(&handle)
    }

    #[must_use]
    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshGeometry> {
        self.meshes.get(&handle)
    }

    #[must_use]
    pub fn material(&self, handle: MaterialHandle) -> Option<&MaterialParams> {
        self.materials.get(&handle)
    }

    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> Option<&HeadlessTexture> {
        self.textures.get(&handle)
    }

    /// Number of importer-created objects still alive.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.nodes.len() + self.meshes.len() + self.materials.len() + self.textures.len()
    }

    /// Depth-first walk below (and including) `root` as `(depth, node)`.
    #[must_use]
    pub fn walk(&self, root: NodeHandle) -> Vec<(usize, NodeHandle)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, root)];
        while let Some((depth, handle)) = stack.pop() {
            let Some(node) = self.nodes.get(&handle) else {
                continue;
            };
            out.push((depth, handle));
            for &child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    /// Find the first node with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(&handle, _)| handle)
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut HeadlessNode> {
        self.nodes
            .get_mut(&handle)
            .ok_or_else(|| Error::Renderer(format!("unknown node {}", handle.0)))
    }
}

impl Renderer for HeadlessRenderer {
    fn create_node(&mut self, name: &str) -> Result<NodeHandle> {
        let handle = NodeHandle(self.next());
        self.nodes.insert(
            handle,
            HeadlessNode {
                name: name.to_string(),
                ..Default::default()
            },
        );
        self.calls.push(RendererCall::CreateNode(handle));
        Ok(handle)
    }

    fn set_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<()> {
        if !self.nodes.contains_key(&parent) {
            return Err(Error::Renderer(format!("unknown parent node {}", parent.0)));
        }
        let previous = self.node_mut(node)?.parent.replace(parent);
        if let Some(previous) = previous.and_then(|p| self.nodes.get_mut(&p)) {
            previous.children.retain(|&c| c != node);
        }
        self.node_mut(parent)?.children.push(node);
        self.calls.push(RendererCall::SetParent { node, parent });
        Ok(())
    }

    fn set_local_transform(&mut self, node: NodeHandle, transform: &Transform) -> Result<()> {
        self.node_mut(node)?.transform = *transform;
        self.calls.push(RendererCall::SetLocalTransform(node));
        Ok(())
    }

    fn set_active(&mut self, node: NodeHandle, active: bool) -> Result<()> {
        self.node_mut(node)?.active = active;
        self.calls.push(RendererCall::SetActive { node, active });
        Ok(())
    }

    fn create_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle> {
        let handle = MeshHandle(self.next());
        self.meshes.insert(handle, geometry.clone());
        self.calls.push(RendererCall::CreateMesh(handle));
        Ok(handle)
    }

    fn attach_mesh(
        &mut self,
        node: NodeHandle,
        mesh: MeshHandle,
        materials: &[Option<MaterialHandle>],
    ) -> Result<()> {
        if !self.meshes.contains_key(&mesh) {
            return Err(Error::Renderer(format!("unknown mesh {}", mesh.0)));
        }
        self.node_mut(node)?.mesh = Some((mesh, materials.to_vec()));
        self.calls.push(RendererCall::AttachMesh { node, mesh });
        Ok(())
    }

    fn create_texture(&mut self, texture: &TextureParams) -> Result<TextureHandle> {
        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            HeadlessTexture {
                name: texture.name.clone(),
                width: texture.image.width(),
                height: texture.image.height(),
                linear: texture.linear,
            },
        );
        self.calls.push(RendererCall::CreateTexture(handle));
        Ok(handle)
    }

    fn create_material(&mut self, material: &MaterialParams) -> Result<MaterialHandle> {
        let handle = MaterialHandle(self.next());
        self.materials.insert(handle, material.clone());
        self.calls.push(RendererCall::CreateMaterial(handle));
        Ok(handle)
    }

    fn destroy(&mut self, object: RendererObject) {
        match object {
            RendererObject::Node(handle) => {
                if let Some(node) = self.nodes.remove(&handle) {
                    if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                        parent.children.retain(|&c| c != handle);
                    }
                    for child in node.children {
                        if let Some(child) = self.nodes.get_mut(&child) {
                            child.parent = None;
                        }
                    }
                }
            }
            RendererObject::Mesh(handle) => {
                self.meshes.remove(&handle);
            }
            RendererObject::Material(handle) => {
                self.materials.remove(&handle);
            }
            RendererObject::Texture(handle) => {
                self.textures.remove(&handle);
            }
        }
        self.calls.push(RendererCall::Destroy(object));
    }

    fn host_texture(&mut self, path: &Path) -> Option<HostTexture> {
        self.host_textures.get(path).copied()
    }

    fn make_readable(&mut self, path: &Path) -> Result<()> {
        let texture = self
            .host_textures
            .get_mut(path)
            .ok_or_else(|| Error::TextureNotReadable(path.to_path_buf()))?;
        texture.readable = true;
        self.calls.push(RendererCall::MakeReadable(path.to_path_buf()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parenting_and_destroy() {
        let mut renderer = HeadlessRenderer::new();
        let root = renderer.create_node("root").unwrap();
        let child = renderer.create_node("child").unwrap();
        renderer.set_parent(child, root).unwrap();
        assert!(!renderer.node(child).unwrap().active);
        assert_eq!(renderer.node(root).unwrap().children, vec![child]);
        assert_eq!(renderer.walk(root), vec![(0, root), (1, child)]);

        renderer.destroy(RendererObject::Node(child));
        assert!(renderer.node(root).unwrap().children.is_empty());
        assert_eq!(renderer.live_objects(), 1);
    }

    #[test]
    fn test_host_textures() {
        let mut renderer = HeadlessRenderer::new();
        let path = Path::new("tex/albedo.png");
        renderer.register_host_texture(path, false);
        assert!(!renderer.host_texture(path).unwrap().readable);

        renderer.make_readable(path).unwrap();
        assert!(renderer.host_texture(path).unwrap().readable);
        assert!(renderer.make_readable(Path::new("missing.png")).is_err());
    }
}
