//! Material parameters handed to the renderer
//!
//! The importer never builds a material object itself. It converts a glTF
//! material into [`MaterialParams`] using a metallic/smoothness convention:
//! metalness in red, smoothness in alpha, smoothness derived from roughness.

use glam::{Vec3, Vec4};
use image::RgbaImage;

use crate::renderer::TextureHandle;
use crate::schema::{AlphaMode, GltfDocument, Material, MaterialExtension, TextureInfo};

/// Source or destination blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    Zero,
    OneMinusSrcAlpha,
}

/// Blend state, depth writes and render ordering for an alpha mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendPolicy {
    pub src_blend: BlendFactor,
    pub dst_blend: BlendFactor,
    pub z_write: bool,
    /// Draw order bucket: 2000 opaque, 2450 cutout, 3000 transparent.
    pub render_queue: u32,
    pub alpha_test: bool,
    pub premultiplied_alpha: bool,
}

impl BlendPolicy {
    #[must_use]
    pub fn for_alpha_mode(mode: AlphaMode) -> Self {
        match mode {
            AlphaMode::Opaque => Self {
                src_blend: BlendFactor::One,
                dst_blend: BlendFactor::Zero,
                z_write: true,
                render_queue: 2000,
                alpha_test: false,
                premultiplied_alpha: false,
            },
            AlphaMode::Mask => Self {
                src_blend: BlendFactor::One,
                dst_blend: BlendFactor::Zero,
                z_write: true,
                render_queue: 2450,
                alpha_test: true,
                premultiplied_alpha: false,
            },
            AlphaMode::Blend => Self {
                src_blend: BlendFactor::One,
                dst_blend: BlendFactor::OneMinusSrcAlpha,
                z_write: false,
                render_queue: 3000,
                alpha_test: false,
                premultiplied_alpha: true,
            },
        }
    }
}

/// A texture bound to a material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub texture: TextureHandle,
    /// UV set the slot samples.
    pub tex_coord: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParams {
    pub name: String,
    pub base_color: Vec4,
    pub base_color_texture: Option<TextureSlot>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub blend: BlendPolicy,
    pub metallic: f32,
    pub smoothness: f32,
    /// Metalness in red, smoothness in alpha.
    pub metallic_gloss_texture: Option<TextureSlot>,
    /// Specular colour, set only for specular-glossiness materials.
    pub specular: Option<Vec3>,
    pub normal_texture: Option<TextureSlot>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureSlot>,
    pub occlusion_strength: f32,
    pub emissive_color: Vec3,
    pub emissive_texture: Option<TextureSlot>,
    pub double_sided: bool,
}

fn slot(doc: &GltfDocument, info: Option<&TextureInfo>) -> Option<TextureSlot> {
    let info = info?;
    let texture = doc.textures.get(info.index)?.handle?;
    Some(TextureSlot {
        texture,
        tex_coord: info.tex_coord,
    })
}

impl MaterialParams {
    /// Compute renderer parameters for material `index`.
    ///
    /// Texture slots use the handles created by the texture stage; a texture
    /// that was skipped leaves its slot empty.
    #[must_use]
    pub fn from_material(doc: &GltfDocument, index: usize, material: &Material) -> Self {
        let pbr = &material.pbr_metallic_roughness;
        let name = material
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("glTF Material {index}"));

        let metallic_gloss_texture = pbr.metallic_roughness_texture.as_ref().and_then(|info| {
            let texture = doc.textures.get(info.index)?;
            Some(TextureSlot {
                texture: texture.metallic_gloss_handle.or(texture.handle)?,
                tex_coord: info.tex_coord,
            })
        });

        let mut params = Self {
            name,
            base_color: Vec4::from_array(pbr.base_color_factor),
            base_color_texture: slot(doc, pbr.base_color_texture.as_ref()),
            alpha_mode: material.alpha_mode,
            alpha_cutoff: material.alpha_cutoff,
            blend: BlendPolicy::for_alpha_mode(material.alpha_mode),
            metallic: pbr.metallic_factor,
            smoothness: (pbr.roughness_factor - 1.0).abs(),
            metallic_gloss_texture,
            specular: None,
            normal_texture: material.normal_texture.as_ref().and_then(|n| {
                Some(TextureSlot {
                    texture: doc.textures.get(n.index)?.handle?,
                    tex_coord: n.tex_coord,
                })
            }),
            normal_scale: material.normal_texture.as_ref().map_or(1.0, |n| n.scale),
            occlusion_texture: material.occlusion_texture.as_ref().and_then(|o| {
                Some(TextureSlot {
                    texture: doc.textures.get(o.index)?.handle?,
                    tex_coord: o.tex_coord,
                })
            }),
            occlusion_strength: material.occlusion_texture.as_ref().map_or(1.0, |o| o.strength),
            emissive_color: Vec3::from_array(material.emissive_factor),
            emissive_texture: slot(doc, material.emissive_texture.as_ref()),
            double_sided: material.double_sided,
        };

        if let Some(MaterialExtension::SpecularGlossiness(sg)) = &material.extension {
            params.base_color = Vec4::from_array(sg.diffuse_factor);
            params.base_color_texture = slot(doc, sg.diffuse_texture.as_ref());
            params.metallic = 0.0;
            params.smoothness = sg.glossiness_factor;
            params.metallic_gloss_texture = slot(doc, sg.specular_glossiness_texture.as_ref());
            params.specular = Some(Vec3::from_array(sg.specular_factor));
        }

        params
    }
}

/// Repack a metallic/roughness texture for the metallic/smoothness convention.
///
/// Each pixel becomes `(g, 0, 0, b)`: green moves to red, blue to alpha.
#[must_use]
pub fn remap_metallic_roughness(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [_, g, b, _] = pixel.0;
        pixel.0 = [g, 0, 0, b];
    }
    out
}

/// Texture indices sampled through a metallic/roughness slot.
#[must_use]
pub fn metallic_roughness_textures(doc: &GltfDocument) -> Vec<usize> {
    let mut indices: Vec<usize> = doc
        .materials
        .iter()
        .filter(|m| m.extension.is_none())
        .filter_map(|m| m.pbr_metallic_roughness.metallic_roughness_texture.as_ref())
        .map(|info| info.index)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
