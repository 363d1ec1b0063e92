//! Meshes and their primitives.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::Extensions;
use crate::error::Error;
use crate::renderer::{MaterialHandle, MeshHandle};

/// Topology used to draw a primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum Mode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl TryFrom<u32> for Mode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Points),
            1 => Ok(Self::Lines),
            2 => Ok(Self::LineLoop),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::Triangles),
            5 => Ok(Self::TriangleStrip),
            6 => Ok(Self::TriangleFan),
            _ => Err(Error::InvalidPrimitiveMode(value)),
        }
    }
}

/// Attribute semantics bound to accessor indices.
///
/// Known semantics get their own slot; anything else (`TEXCOORD_4`,
/// `_CUSTOM`, extra color sets) is kept in `other`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub position: Option<usize>,
    pub normal: Option<usize>,
    pub tangent: Option<usize>,
    pub texcoord: [Option<usize>; 4],
    pub color_0: Option<usize>,
    pub joints_0: Option<usize>,
    pub weights_0: Option<usize>,
    pub other: BTreeMap<String, usize>,
}

impl Attributes {
    /// Bind a parsed `attributes` object.
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, usize>) -> Self {
        let mut attributes = Self::default();
        for (semantic, &accessor) in map {
            match semantic.as_str() {
                "POSITION" => attributes.position = Some(accessor),
                "NORMAL" => attributes.normal = Some(accessor),
                "TANGENT" => attributes.tangent = Some(accessor),
                "TEXCOORD_0" => attributes.texcoord[0] = Some(accessor),
                "TEXCOORD_1" => attributes.texcoord[1] = Some(accessor),
                "TEXCOORD_2" => attributes.texcoord[2] = Some(accessor),
                "TEXCOORD_3" => attributes.texcoord[3] = Some(accessor),
                "COLOR_0" => attributes.color_0 = Some(accessor),
                "JOINTS_0" => attributes.joints_0 = Some(accessor),
                "WEIGHTS_0" => attributes.weights_0 = Some(accessor),
                _ => {
                    attributes.other.insert(semantic.clone(), accessor);
                }
            }
        }
        attributes
    }

    /// Every bound `(semantic, accessor)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        const UV: [&str; 4] = ["TEXCOORD_0", "TEXCOORD_1", "TEXCOORD_2", "TEXCOORD_3"];

        let known = [
            ("POSITION", self.position),
            ("NORMAL", self.normal),
            ("TANGENT", self.tangent),
            ("COLOR_0", self.color_0),
            ("JOINTS_0", self.joints_0),
            ("WEIGHTS_0", self.weights_0),
        ]
        .into_iter()
        .chain(UV.into_iter().zip(self.texcoord));

        let mut pairs: Vec<(&str, usize)> = Vec::new();
        for (name, accessor) in known {
            if let Some(accessor) = accessor {
                pairs.push((name, accessor));
            }
        }
        pairs.extend(self.other.iter().map(|(k, &v)| (k.as_str(), v)));
        pairs.into_iter()
    }
}

/// One drawable unit within a mesh.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Primitive {
    /// Raw `attributes` object as parsed; bound into `attributes` afterwards.
    #[serde(rename = "attributes")]
    pub(crate) raw_attributes: Option<BTreeMap<String, usize>>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    #[serde(default)]
    pub mode: Mode,
    /// Morph targets, retained but not applied.
    pub targets: Option<Vec<BTreeMap<String, usize>>>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,

    #[serde(skip)]
    pub attributes: Attributes,
}

/// Renderer objects built for a mesh, shared by every node that uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructedMesh {
    pub mesh: MeshHandle,
    /// One slot per submesh; `None` uses the renderer's default material.
    pub materials: Vec<Option<MaterialHandle>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub primitives: Vec<Primitive>,
    /// Default morph weights.
    pub weights: Option<Vec<f32>>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,

    #[serde(skip)]
    pub constructed: Option<ConstructedMesh>,
}
