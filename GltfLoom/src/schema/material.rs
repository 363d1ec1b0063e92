//! Material definitions and the specular-glossiness extension record.

use serde::Deserialize;
use serde_json::Value;

use super::Extensions;
use crate::renderer::MaterialHandle;

/// Extension name of the one material extension modelled here.
pub const SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";

/// Reference from a material to a texture.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: usize,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: usize,
    #[serde(default = "one")]
    pub scale: f32,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: usize,
    #[serde(default = "one")]
    pub strength: f32,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default = "white")]
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default = "one")]
    pub metallic_factor: f32,
    #[serde(default = "one")]
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: white(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            extensions: None,
            extras: None,
        }
    }
}

/// How the alpha channel of the base colour is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// `KHR_materials_pbrSpecularGlossiness` parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecularGlossiness {
    #[serde(default = "white")]
    pub diffuse_factor: [f32; 4],
    pub diffuse_texture: Option<TextureInfo>,
    #[serde(default = "white3")]
    pub specular_factor: [f32; 3],
    #[serde(default = "one")]
    pub glossiness_factor: f32,
    pub specular_glossiness_texture: Option<TextureInfo>,
}

/// A recognised material extension, discriminated by name.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialExtension {
    SpecularGlossiness(SpecularGlossiness),
}

impl MaterialExtension {
    /// Texture references carried by the extension.
    pub fn textures(&self) -> impl Iterator<Item = &TextureInfo> {
        match self {
            Self::SpecularGlossiness(sg) => sg
                .diffuse_texture
                .iter()
                .chain(sg.specular_glossiness_texture.iter()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: Option<String>,
    #[serde(default)]
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    pub normal_texture: Option<NormalTextureInfo>,
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default)]
    pub emissive_factor: [f32; 3],
    #[serde(default)]
    pub alpha_mode: AlphaMode,
    #[serde(default = "default_alpha_cutoff")]
    pub alpha_cutoff: f32,
    #[serde(default)]
    pub double_sided: bool,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,

    /// Parsed form of a recognised entry in `extensions`.
    #[serde(skip)]
    pub extension: Option<MaterialExtension>,
    #[serde(skip)]
    pub handle: Option<MaterialHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            pbr_metallic_roughness: PbrMetallicRoughness::default(),
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: default_alpha_cutoff(),
            double_sided: false,
            extensions: None,
            extras: None,
            extension: None,
            handle: None,
        }
    }
}

impl Material {
    /// Parse the recognised extension out of the raw `extensions` map.
    pub(crate) fn bind_extension(&mut self) -> serde_json::Result<()> {
        let Some(raw) = self
            .extensions
            .as_ref()
            .and_then(|map| map.get(SPECULAR_GLOSSINESS))
        else {
            return Ok(());
        };
        let sg = SpecularGlossiness::deserialize(raw)?;
        self.extension = Some(MaterialExtension::SpecularGlossiness(sg));
        Ok(())
    }

    /// Every texture this material references, core and extension.
    pub fn texture_refs(&self) -> Vec<usize> {
        let pbr = &self.pbr_metallic_roughness;
        let mut refs: Vec<usize> = [
            pbr.base_color_texture.as_ref().map(|t| t.index),
            pbr.metallic_roughness_texture.as_ref().map(|t| t.index),
            self.normal_texture.as_ref().map(|t| t.index),
            self.occlusion_texture.as_ref().map(|t| t.index),
            self.emissive_texture.as_ref().map(|t| t.index),
        ]
        .into_iter()
        .flatten()
        .collect();

        if let Some(extension) = &self.extension {
            refs.extend(extension.textures().map(|t| t.index));
        }
        refs
    }
}

fn one() -> f32 {
    1.0
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn white3() -> [f32; 3] {
    [1.0; 3]
}

fn default_alpha_cutoff() -> f32 {
    0.5
}
