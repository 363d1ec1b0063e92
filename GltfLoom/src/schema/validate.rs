//! Cross-reference range checks over a parsed document.

use super::GltfDocument;
use crate::error::{Error, Result};

fn check(owner: impl FnOnce() -> String, target: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::missing(owner(), target, index))
    }
}

fn check_opt(
    owner: impl FnOnce() -> String,
    target: &'static str,
    index: Option<usize>,
    len: usize,
) -> Result<()> {
    index.map_or(Ok(()), |index| check(owner, target, index, len))
}

/// Range-check every index in the document.
///
/// # Errors
/// Returns [`Error::MissingReference`] for the first dangling index found.
pub fn validate_references(doc: &GltfDocument) -> Result<()> {
    for (i, view) in doc.buffer_views.iter().enumerate() {
        check(|| format!("bufferView {i}"), "buffer", view.buffer, doc.buffers.len())?;
    }

    for (i, accessor) in doc.accessors.iter().enumerate() {
        let owner = || format!("accessor {i}");
        check_opt(owner, "bufferView", accessor.buffer_view, doc.buffer_views.len())?;
        if let Some(sparse) = &accessor.sparse {
            let views = doc.buffer_views.len();
            check(owner, "bufferView", sparse.indices.buffer_view, views)?;
            check(owner, "bufferView", sparse.values.buffer_view, views)?;
        }
    }

    for (i, image) in doc.images.iter().enumerate() {
        check_opt(|| format!("image {i}"), "bufferView", image.buffer_view, doc.buffer_views.len())?;
    }

    for (i, texture) in doc.textures.iter().enumerate() {
        let owner = || format!("texture {i}");
        check_opt(owner, "image", texture.source, doc.images.len())?;
        check_opt(owner, "sampler", texture.sampler, doc.samplers.len())?;
    }

    for (i, material) in doc.materials.iter().enumerate() {
        for texture in material.texture_refs() {
            check(|| format!("material {i}"), "texture", texture, doc.textures.len())?;
        }
    }

    for (m, mesh) in doc.meshes.iter().enumerate() {
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            let owner = || format!("mesh {m} primitive {p}");
            for (_, accessor) in primitive.attributes.iter() {
                check(owner, "accessor", accessor, doc.accessors.len())?;
            }
            check_opt(owner, "accessor", primitive.indices, doc.accessors.len())?;
            check_opt(owner, "material", primitive.material, doc.materials.len())?;
        }
    }

    for (i, node) in doc.nodes.iter().enumerate() {
        let owner = || format!("node {i}");
        check_opt(owner, "mesh", node.mesh, doc.meshes.len())?;
        check_opt(owner, "camera", node.camera, doc.cameras.len())?;
        check_opt(owner, "skin", node.skin, doc.skins.len())?;
        for &child in &node.children {
            check(owner, "node", child, doc.nodes.len())?;
        }
    }

    for (i, scene) in doc.scenes.iter().enumerate() {
        for &root in &scene.nodes {
            check(|| format!("scene {i}"), "node", root, doc.nodes.len())?;
        }
    }
    check_opt(|| "document".to_string(), "scene", doc.scene, doc.scenes.len())?;

    for (i, skin) in doc.skins.iter().enumerate() {
        let owner = || format!("skin {i}");
        check_opt(owner, "accessor", skin.inverse_bind_matrices, doc.accessors.len())?;
        check_opt(owner, "node", skin.skeleton, doc.nodes.len())?;
        for &joint in &skin.joints {
            check(owner, "node", joint, doc.nodes.len())?;
        }
    }

    for (i, animation) in doc.animations.iter().enumerate() {
        let owner = || format!("animation {i}");
        for sampler in &animation.samplers {
            check(owner, "accessor", sampler.input, doc.accessors.len())?;
            check(owner, "accessor", sampler.output, doc.accessors.len())?;
        }
        for channel in &animation.channels {
            check(owner, "sampler", channel.sampler, animation.samplers.len())?;
            check_opt(owner, "node", channel.target.node, doc.nodes.len())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::schema::parse_document;

    #[test]
    fn test_dangling_mesh_reference() {
        let err = parse_document(
            r#"{"asset":{"version":"2.0"},"nodes":[{"mesh":3}],"scenes":[{"nodes":[0]}]}"#,
        )
        .unwrap_err();
        match err {
            Error::MissingReference { owner, target, index } => {
                assert_eq!(owner, "node 0");
                assert_eq!(target, "mesh");
                assert_eq!(index, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dangling_material_texture() {
        let err = parse_document(
            r#"{"asset":{"version":"2.0"},
                "materials":[{"pbrMetallicRoughness":{"baseColorTexture":{"index":0}}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingReference { target: "texture", .. }));
    }
}
