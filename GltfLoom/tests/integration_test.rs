use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use glam::{Vec3, Vec4};
use gltfloom::assembler::{IndexFormat, MeshGeometry};
use gltfloom::material::MaterialParams;
use gltfloom::prelude::*;
use gltfloom::renderer::{HostTexture, RendererCall, RendererObject};
use image::{ImageFormat, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

/// Packs typed arrays into one 4-byte aligned binary buffer and describes
/// them as buffer views and accessors.
#[derive(Default)]
struct BinBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BinBuilder {
    fn view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
        }));
        self.bin.extend_from_slice(bytes);
        self.views.len() - 1
    }

    fn accessor(&mut self, bytes: &[u8], component_type: u32, count: usize, ty: &str) -> usize {
        let view = self.view(bytes);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component_type,
            "count": count,
            "type": ty,
        }));
        self.accessors.len() - 1
    }

    fn vec3(&mut self, values: &[[f32; 3]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        self.accessor(&bytes, 5126, values.len(), "VEC3")
    }

    fn vec4(&mut self, values: &[[f32; 4]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        self.accessor(&bytes, 5126, values.len(), "VEC4")
    }

    fn joints(&mut self, values: &[[u8; 4]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().copied().collect();
        self.accessor(&bytes, 5121, values.len(), "VEC4")
    }

    fn indices_u16(&mut self, values: &[u16]) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.accessor(&bytes, 5123, values.len(), "SCALAR")
    }

    /// Merge the buffer description into `doc` and return JSON text plus BIN.
    fn finish(self, mut doc: Value) -> (String, Vec<u8>) {
        doc["asset"] = json!({"version": "2.0"});
        doc["buffers"] = json!([{"byteLength": self.bin.len()}]);
        doc["bufferViews"] = Value::Array(self.views);
        doc["accessors"] = Value::Array(self.accessors);
        (doc.to_string(), self.bin)
    }
}

fn triangle() -> BinBuilder {
    let mut bin = BinBuilder::default();
    bin.vec3(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    bin.indices_u16(&[0, 1, 2]);
    bin
}

fn triangle_glb(extra: Value) -> Vec<u8> {
    let mut doc = json!({
        "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "nodes": [{"name": "root", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
        "scene": 0,
    });
    if let (Some(doc), Value::Object(extra)) = (doc.as_object_mut(), extra) {
        doc.extend(extra);
    }
    let (json, bin) = triangle().finish(doc);
    GlbWriter::new(json).with_bin(bin).build()
}

fn png_bytes(pixel: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(2, 2, Rgba(pixel));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn png_data_uri(pixel: [u8; 4]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(pixel)))
}

fn sync() -> ImportOptions {
    ImportOptions::new().synchronous()
}

async fn import_glb(
    data: Vec<u8>,
    renderer: &mut HeadlessRenderer,
    options: &ImportOptions,
) -> Result<ImportedAsset> {
    import_gltf_bytes(data, SourceKind::Binary, "fixture", None, renderer, options).await
}

fn mesh_of<'a>(renderer: &'a HeadlessRenderer, name: &str) -> (&'a MeshGeometry, Vec<Option<MaterialHandle>>) {
    let node = renderer.node(renderer.find(name).unwrap()).unwrap();
    let (mesh, slots) = node.mesh.clone().unwrap();
    (renderer.mesh(mesh).unwrap(), slots)
}

// ============================================================================
// Container
// ============================================================================

#[tokio::test]
async fn test_glb_triangle_import() {
    let mut renderer = HeadlessRenderer::new();
    let asset = import_glb(triangle_glb(json!({})), &mut renderer, &sync())
        .await
        .unwrap();

    assert!(asset.warnings.is_empty());
    assert!(renderer.node(asset.root).unwrap().active);

    let (mesh, slots) = mesh_of(&renderer, "root");
    assert_eq!(mesh.name.as_deref(), Some("tri"));
    assert_eq!(mesh.positions[1], Vec3::X);
    assert_eq!(mesh.index_format(), IndexFormat::U16);
    assert_eq!(slots, vec![None]);

    let buffer = &asset.object.document.buffers[0];
    assert_eq!(buffer.payload().unwrap().len(), buffer.byte_length);
    assert!(asset.object.document.meshes[0].constructed.is_some());
}

#[tokio::test]
async fn test_glb_header_mutations_are_format_errors() {
    let glb = triangle_glb(json!({}));
    let mutations: Vec<(&str, Box<dyn Fn(&mut Vec<u8>)>)> = vec![
        ("magic", Box::new(|d: &mut Vec<u8>| d[0] = b'x')),
        ("version", Box::new(|d: &mut Vec<u8>| d[4] = 1)),
        ("length", Box::new(|d: &mut Vec<u8>| d[8] = d[8].wrapping_add(4))),
        ("chunk type", Box::new(|d: &mut Vec<u8>| d[16] = b'X')),
        ("truncated", Box::new(|d: &mut Vec<u8>| d.truncate(10))),
    ];

    for (label, mutate) in mutations {
        let mut data = glb.clone();
        mutate(&mut data);
        let mut renderer = HeadlessRenderer::new();
        let err = import_glb(data, &mut renderer, &sync()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{label}: {err}");
        assert!(renderer.calls().is_empty(), "{label}");
    }
}

#[tokio::test]
async fn test_bin_chunk_longer_than_padding_is_rejected() {
    let (json, mut bin) = triangle().finish(json!({}));
    bin.extend_from_slice(&[0; 8]);
    let glb = GlbWriter::new(json).with_bin(bin).build();

    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &sync()).await.unwrap_err();
    assert!(matches!(err, Error::BinChunkLengthMismatch { .. }));
}

#[tokio::test]
async fn test_overflowing_view_offset_is_an_error() {
    let (json, bin) = triangle().finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));
    let mut doc: Value = serde_json::from_str(&json).unwrap();
    doc["bufferViews"][0]["byteOffset"] = json!(u64::MAX);
    let glb = GlbWriter::new(doc.to_string()).with_bin(bin).build();

    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &sync()).await.unwrap_err();
    assert!(matches!(err, Error::BufferViewOutOfRange { view: 0, .. }));
    assert_eq!(renderer.live_objects(), 0);
}

#[tokio::test]
async fn test_unsupported_required_extension() {
    let glb = triangle_glb(json!({
        "extensionsUsed": ["XYZ_not_supported"],
        "extensionsRequired": ["XYZ_not_supported"],
    }));
    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &sync()).await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedRequiredExtension(ref name) if name == "XYZ_not_supported"));
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn test_used_extension_only_warns() {
    let glb = triangle_glb(json!({"extensionsUsed": ["XYZ_not_supported"]}));
    let mut renderer = HeadlessRenderer::new();
    let asset = import_glb(glb, &mut renderer, &sync()).await.unwrap();
    assert_eq!(
        asset.warnings,
        vec![ImportWarning::UnsupportedExtension("XYZ_not_supported".to_string())]
    );
}

// ============================================================================
// Accessors and primitives
// ============================================================================

#[tokio::test]
async fn test_sparse_accessor_without_view() {
    let mut bin = BinBuilder::default();
    let indices = bin.view(&[2]);
    let values = bin.view(&[1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>());
    bin.accessors.push(json!({
        "componentType": 5126,
        "count": 4,
        "type": "VEC3",
        "sparse": {
            "count": 1,
            "indices": {"bufferView": indices, "componentType": 5121},
            "values": {"bufferView": values},
        },
    }));
    let (json, data) = bin.finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "mode": 0}]}],
        "nodes": [{"name": "points", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));

    let mut renderer = HeadlessRenderer::new();
    let glb = GlbWriter::new(json).with_bin(data).build();
    import_glb(glb, &mut renderer, &sync()).await.unwrap();

    let (mesh, _) = mesh_of(&renderer, "points");
    assert_eq!(
        mesh.positions,
        vec![Vec3::ZERO, Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO]
    );
}

#[tokio::test]
async fn test_bone_weights_are_normalized() {
    let mut bin = triangle();
    let joints = bin.joints(&[[0, 1, 0, 0], [1, 0, 0, 0], [2, 3, 0, 0]]);
    let weights = bin.vec4(&[[2.0, 2.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0], [1.0, 3.0, 0.0, 0.0]]);
    let (json, data) = bin.finish(json!({
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": 0, "JOINTS_0": joints, "WEIGHTS_0": weights},
            "indices": 1,
        }]}],
        "nodes": [{"name": "skinned", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));

    let mut renderer = HeadlessRenderer::new();
    let glb = GlbWriter::new(json).with_bin(data).build();
    import_glb(glb, &mut renderer, &sync()).await.unwrap();

    let (mesh, _) = mesh_of(&renderer, "skinned");
    let bones = mesh.bone_weights.as_ref().unwrap();
    assert_eq!(bones[0].weights, [0.5, 0.5, 0.0, 0.0]);
    assert_eq!(bones[0].joints, [0, 1, 0, 0]);
    assert_eq!(bones[1].weights, [0.0; 4]);
    assert_eq!(bones[2].weights, [0.25, 0.75, 0.0, 0.0]);
}

async fn point_cloud(count: usize) -> IndexFormat {
    let mut bin = BinBuilder::default();
    let positions: Vec<[f32; 3]> = (0..count).map(|i| [i as f32, 0.0, 0.0]).collect();
    bin.vec3(&positions);
    let (json, data) = bin.finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "mode": 0}]}],
        "nodes": [{"name": "cloud", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));

    let mut renderer = HeadlessRenderer::new();
    let glb = GlbWriter::new(json).with_bin(data).build();
    import_glb(glb, &mut renderer, &ImportOptions::new()).await.unwrap();

    let (mesh, _) = mesh_of(&renderer, "cloud");
    assert_eq!(mesh.vertex_count(), count);
    mesh.index_format()
}

#[tokio::test]
async fn test_index_width_follows_vertex_count() {
    assert_eq!(point_cloud(100).await, IndexFormat::U16);
    assert_eq!(point_cloud(70_000).await, IndexFormat::U32);
}

#[tokio::test]
async fn test_primitives_sharing_material_use_one_slot() {
    let mut bin = triangle();
    bin.vec3(&[[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);
    let (json, data) = bin.finish(json!({
        "materials": [{"name": "shared", "alphaMode": "BLEND"}],
        "meshes": [{"primitives": [
            {"attributes": {"POSITION": 0}, "indices": 1, "material": 0},
            {"attributes": {"POSITION": 2}, "material": 0},
        ]}],
        "nodes": [{"name": "pair", "mesh": 0}, {"name": "twin", "mesh": 0}],
        "scenes": [{"nodes": [0, 1]}],
    }));

    let mut renderer = HeadlessRenderer::new();
    let glb = GlbWriter::new(json).with_bin(data).build();
    import_glb(glb, &mut renderer, &sync()).await.unwrap();

    let (mesh, slots) = mesh_of(&renderer, "pair");
    assert_eq!(mesh.submeshes.len(), 1);
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.submeshes[0].indices.to_u32(), vec![0, 1, 2, 3, 4, 5]);

    let material = renderer.material(slots[0].unwrap()).unwrap();
    assert_eq!(material.name, "shared");
    assert_eq!(material.blend.render_queue, 3000);
    assert!(!material.blend.z_write);

    let meshes = renderer
        .calls()
        .iter()
        .filter(|c| matches!(c, RendererCall::CreateMesh(_)))
        .count();
    assert_eq!(meshes, 1);
    assert_eq!(mesh_of(&renderer, "twin").1, slots);
}

// ============================================================================
// Scene graph
// ============================================================================

#[tokio::test]
async fn test_visibility_waits_for_subtree() {
    let glb = triangle_glb(json!({
        "nodes": [
            {"name": "root", "children": [1, 3]},
            {"name": "mid", "children": [2], "translation": [0.0, 2.0, 0.0]},
            {"name": "leaf", "mesh": 0},
            {"name": "side"},
        ],
    }));
    let mut renderer = HeadlessRenderer::new();
    let asset = import_glb(glb, &mut renderer, &sync()).await.unwrap();

    let at = |node: usize, state: NodeState| {
        asset
            .trace
            .iter()
            .position(|e| e.node == node && e.state == state)
            .unwrap()
    };
    let root_visible = at(0, NodeState::Visible);
    for node in 1..4 {
        assert!(at(node, NodeState::ChildrenAttached) < root_visible);
        assert!(at(node, NodeState::Visible) < root_visible);
    }
    assert!(at(2, NodeState::MeshAttached) < at(2, NodeState::ChildrenAttached));
    assert!(at(2, NodeState::Visible) < at(3, NodeState::Created));

    let mid = renderer.node(renderer.find("mid").unwrap()).unwrap();
    assert_eq!(mid.transform.translation, Vec3::new(0.0, 2.0, 0.0));

    let depths: Vec<(usize, String)> = renderer
        .walk(asset.root)
        .into_iter()
        .map(|(depth, h)| (depth, renderer.node(h).unwrap().name.clone()))
        .collect();
    assert_eq!(
        depths,
        vec![
            (0, "fixture".to_string()),
            (1, "root".to_string()),
            (2, "mid".to_string()),
            (3, "leaf".to_string()),
            (2, "side".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_node_with_two_parents_fails_and_cleans_up() {
    let glb = triangle_glb(json!({
        "nodes": [
            {"name": "left", "children": [2]},
            {"name": "right", "children": [2]},
            {"name": "shared", "mesh": 0},
        ],
        "scenes": [{"nodes": [0, 1]}],
    }));
    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &sync()).await.unwrap_err();

    assert!(matches!(err, Error::SharedNode(2)));
    assert_eq!(renderer.live_objects(), 0);
}

#[tokio::test]
async fn test_document_without_scenes_returns_empty_root() {
    let (json, data) = triangle().finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
    }));
    let mut renderer = HeadlessRenderer::new();
    let glb = GlbWriter::new(json).with_bin(data).build();
    let asset = import_glb(glb, &mut renderer, &sync().no_activate()).await.unwrap();

    assert_eq!(asset.warnings, vec![ImportWarning::NoScenes]);
    assert_eq!(renderer.walk(asset.root).len(), 1);
    assert!(!renderer.node(asset.root).unwrap().active);
}

// ============================================================================
// Materials and textures
// ============================================================================

#[tokio::test]
async fn test_metallic_roughness_texture_is_remapped() {
    let glb = triangle_glb(json!({
        "images": [{"uri": png_data_uri([0, 64, 200, 255])}, {"uri": png_data_uri([255, 0, 0, 255])}],
        "textures": [{"source": 0}, {"source": 1, "name": "albedo"}],
        "materials": [{"pbrMetallicRoughness": {
            "baseColorTexture": {"index": 1},
            "metallicRoughnessTexture": {"index": 0},
            "roughnessFactor": 0.25,
        }}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
    }));
    let mut renderer = HeadlessRenderer::new();
    let asset = import_glb(glb, &mut renderer, &sync()).await.unwrap();

    let textures = &asset.object.document.textures;
    let plain = textures[0].handle.unwrap();
    let remapped = textures[0].metallic_gloss_handle.unwrap();
    assert_ne!(plain, remapped);
    assert!(renderer.texture(remapped).unwrap().linear);
    assert!(!renderer.texture(textures[1].handle.unwrap()).unwrap().linear);

    let (_, slots) = mesh_of(&renderer, "root");
    let material: &MaterialParams = renderer.material(slots[0].unwrap()).unwrap();
    assert_eq!(material.name, "glTF Material 0");
    assert_eq!(material.metallic_gloss_texture.unwrap().texture, remapped);
    assert_eq!(material.base_color_texture.unwrap().texture, textures[1].handle.unwrap());
    assert_eq!(material.smoothness, 0.75);
    assert_eq!(material.base_color, Vec4::ONE);
}

#[tokio::test]
async fn test_failed_texture_rolls_back_renderer_objects() {
    let glb = triangle_glb(json!({
        "images": [{"uri": png_data_uri([1, 2, 3, 255])}, {"uri": "missing/texture.png"}],
        "textures": [{"source": 0}, {"source": 1}],
    }));
    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &sync()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert_eq!(renderer.live_objects(), 0);
    assert!(
        renderer
            .calls()
            .iter()
            .any(|c| matches!(c, RendererCall::Destroy(RendererObject::Texture(_))))
    );
}

fn write_gltf_with_host_texture(dir: &Path) -> PathBuf {
    let (json, bin) = triangle().finish(json!({
        "images": [{"uri": "albedo.png"}],
        "textures": [{"source": 0}],
        "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
        "nodes": [{"name": "root", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));
    let mut doc: Value = serde_json::from_str(&json).unwrap();
    doc["buffers"][0]["uri"] = json!("model.bin");
    std::fs::write(dir.join("model.bin"), bin).unwrap();

    let path = dir.join("model.gltf");
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

#[test]
fn test_unreadable_host_texture_restarts_once() {
    let dir = tempdir().unwrap();
    let path = write_gltf_with_host_texture(dir.path());

    let mut renderer = HeadlessRenderer::new();
    let host = renderer.register_host_texture(dir.path().join("albedo.png"), false);
    let asset = import_gltf_blocking(&path, &mut renderer, &ImportOptions::default()).unwrap();

    let reprocessed = renderer
        .calls()
        .iter()
        .filter(|c| matches!(c, RendererCall::MakeReadable(_)))
        .count();
    assert_eq!(reprocessed, 1);

    let (_, slots) = mesh_of(&renderer, "root");
    let material = renderer.material(slots[0].unwrap()).unwrap();
    assert_eq!(material.base_color_texture.unwrap().texture, host);
    assert_eq!(asset.object.source.as_deref(), Some(path.as_path()));
}

/// Delegates to a headless renderer but never actually makes textures readable.
struct StubbornRenderer(HeadlessRenderer);

impl Renderer for StubbornRenderer {
    fn create_node(&mut self, name: &str) -> Result<NodeHandle> {
        self.0.create_node(name)
    }
    fn set_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<()> {
        self.0.set_parent(node, parent)
    }
    fn set_local_transform(&mut self, node: NodeHandle, transform: &Transform) -> Result<()> {
        self.0.set_local_transform(node, transform)
    }
    fn set_active(&mut self, node: NodeHandle, active: bool) -> Result<()> {
        self.0.set_active(node, active)
    }
    fn create_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle> {
        self.0.create_mesh(geometry)
    }
    fn attach_mesh(
        &mut self,
        node: NodeHandle,
        mesh: MeshHandle,
        materials: &[Option<MaterialHandle>],
    ) -> Result<()> {
        self.0.attach_mesh(node, mesh, materials)
    }
    fn create_texture(&mut self, texture: &TextureParams) -> Result<TextureHandle> {
        self.0.create_texture(texture)
    }
    fn create_material(&mut self, material: &MaterialParams) -> Result<MaterialHandle> {
        self.0.create_material(material)
    }
    fn destroy(&mut self, object: RendererObject) {
        self.0.destroy(object);
    }
    fn host_texture(&mut self, path: &Path) -> Option<HostTexture> {
        self.0.host_texture(path)
    }
    fn make_readable(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_second_reprocess_request_fails() {
    let dir = tempdir().unwrap();
    let path = write_gltf_with_host_texture(dir.path());

    let mut headless = HeadlessRenderer::new();
    headless.register_host_texture(dir.path().join("albedo.png"), false);
    let mut renderer = StubbornRenderer(headless);

    let err = import_gltf_blocking(&path, &mut renderer, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::TextureNotReadable(_)));
    assert_eq!(renderer.0.live_objects(), 0);
}

// ============================================================================
// Sources, load modes and cancellation
// ============================================================================

#[test]
fn test_blocking_import_with_external_buffer() {
    let dir = tempdir().unwrap();
    let (json, bin) = triangle().finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "nodes": [{"name": "root", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));
    let mut doc: Value = serde_json::from_str(&json).unwrap();
    doc["buffers"][0]["uri"] = json!("tri%20data.bin");
    std::fs::write(dir.path().join("tri data.bin"), bin).unwrap();
    let path = dir.path().join("tri.gltf");
    std::fs::write(&path, doc.to_string()).unwrap();

    let mut renderer = HeadlessRenderer::new();
    let asset = import_gltf_blocking(&path, &mut renderer, &ImportOptions::default()).unwrap();
    assert_eq!(asset.object.load_mode, LoadMode::Synchronous);
    assert_eq!(asset.object.name, "tri");
    assert_eq!(mesh_of(&renderer, "root").0.vertex_count(), 3);
}

#[test]
fn test_missing_buffer_file_is_resolution_error() {
    let dir = tempdir().unwrap();
    let (json, _) = triangle().finish(json!({}));
    let mut doc: Value = serde_json::from_str(&json).unwrap();
    doc["buffers"][0]["uri"] = json!("nowhere.bin");
    let path = dir.path().join("broken.gltf");
    std::fs::write(&path, doc.to_string()).unwrap();

    let mut renderer = HeadlessRenderer::new();
    let err = import_gltf_blocking(&path, &mut renderer, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert_eq!(renderer.live_objects(), 0);
}

#[tokio::test]
async fn test_network_uri_refused_in_sync_mode() {
    let (json, _) = triangle().finish(json!({}));
    let mut doc: Value = serde_json::from_str(&json).unwrap();
    doc["buffers"][0]["uri"] = json!("https://example.invalid/tri.bin");

    let mut renderer = HeadlessRenderer::new();
    let err = import_gltf_bytes(
        doc.to_string().into_bytes(),
        SourceKind::Json,
        "remote",
        None,
        &mut renderer,
        &sync(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::NetworkNotAllowed(_)));
}

#[test]
fn test_zip_wrapped_asset() {
    let dir = tempdir().unwrap();
    let (json, bin) = triangle().finish(json!({
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "nodes": [{"name": "zipped", "mesh": 0}],
        "scenes": [{"nodes": [0]}],
    }));
    let glb = GlbWriter::new(json).with_bin(bin).build();

    let archive = dir.path().join("bundle.zip");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&archive).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("readme.txt", options).unwrap();
    zip.write_all(b"not a model").unwrap();
    zip.start_file("bundle.glb", options).unwrap();
    zip.write_all(&glb).unwrap();
    zip.finish().unwrap();

    let mut renderer = HeadlessRenderer::new();
    let asset = import_gltf_blocking(&archive, &mut renderer, &ImportOptions::default()).unwrap();
    assert_eq!(asset.object.source, Some(dir.path().join("bundle").join("bundle.glb")));
    assert!(renderer.find("zipped").is_some());

    // The extracted directory is reused on the next import.
    std::fs::remove_file(&archive).unwrap();
    let mut renderer = HeadlessRenderer::new();
    assert!(import_gltf_blocking(&archive, &mut renderer, &ImportOptions::default()).is_ok());
}

#[test]
fn test_zip_without_gltf() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("empty.zip");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&archive).unwrap());
    zip.start_file("notes.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"nothing here").unwrap();
    zip.finish().unwrap();

    let mut renderer = HeadlessRenderer::new();
    let err = import_gltf_blocking(&archive, &mut renderer, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NoGltfInArchive(_)));
}

#[tokio::test]
async fn test_async_import_reports_progress() {
    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&phases);
    let options = ImportOptions::new().with_progress(Arc::new(move |p: &ImportProgress| {
        seen.lock().unwrap().push(p.phase);
    }));

    let mut renderer = HeadlessRenderer::new();
    import_glb(triangle_glb(json!({})), &mut renderer, &options)
        .await
        .unwrap();

    let phases = phases.lock().unwrap();
    assert_eq!(phases.first(), Some(&ImportPhase::Parsing));
    assert_eq!(phases.last(), Some(&ImportPhase::Complete));
    assert!(phases.contains(&ImportPhase::Scenes));
}

#[tokio::test]
async fn test_cancellation_cleans_up() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let options = sync()
        .with_cancel_token(cancel)
        .with_progress(Arc::new(move |p: &ImportProgress| {
            if p.phase == ImportPhase::Materials {
                trigger.cancel();
            }
        }));

    let glb = triangle_glb(json!({
        "materials": [{"name": "m"}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
    }));
    let mut renderer = HeadlessRenderer::new();
    let err = import_glb(glb, &mut renderer, &options).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(renderer.live_objects(), 0);
    assert!(
        renderer
            .calls()
            .contains(&RendererCall::Destroy(RendererObject::Material(MaterialHandle(1))))
    );
}
