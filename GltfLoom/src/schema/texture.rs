//! Textures, images and samplers.

use serde::Deserialize;
use serde_json::Value;

use super::Extensions;
use crate::renderer::TextureHandle;

/// Texel filter, as the glTF sampler enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TryFrom<u32> for Filter {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            9728 => Ok(Self::Nearest),
            9729 => Ok(Self::Linear),
            9984 => Ok(Self::NearestMipmapNearest),
            9985 => Ok(Self::LinearMipmapNearest),
            9986 => Ok(Self::NearestMipmapLinear),
            9987 => Ok(Self::LinearMipmapLinear),
            _ => Err(format!("invalid sampler filter: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum Wrap {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

impl TryFrom<u32> for Wrap {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            33071 => Ok(Self::ClampToEdge),
            33648 => Ok(Self::MirroredRepeat),
            10497 => Ok(Self::Repeat),
            _ => Err(format!("invalid sampler wrap mode: {value}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    pub mag_filter: Option<Filter>,
    pub min_filter: Option<Filter>,
    #[serde(default)]
    pub wrap_s: Wrap,
    #[serde(default)]
    pub wrap_t: Wrap,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

/// Image data referenced by textures, either by URI or from a buffer view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub uri: Option<String>,
    /// Required when `buffer_view` is set.
    pub mime_type: Option<String>,
    pub buffer_view: Option<usize>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Texture {
    pub sampler: Option<usize>,
    pub source: Option<usize>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,

    #[serde(skip)]
    pub handle: Option<TextureHandle>,
    /// Channel-remapped variant used as a metallic/smoothness map.
    #[serde(skip)]
    pub metallic_gloss_handle: Option<TextureHandle>,
}
