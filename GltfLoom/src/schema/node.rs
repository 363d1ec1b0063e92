//! Nodes, scenes, skins and cameras.

use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;
use serde_json::Value;

use super::Extensions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub camera: Option<usize>,
    pub skin: Option<usize>,
    /// Column-major local transform.
    pub matrix: Option<[f32; 16]>,
    pub translation: Option<[f32; 3]>,
    /// Unit quaternion, `[x, y, z, w]`.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub weights: Option<Vec<f32>>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl Node {
    /// Local transform as translation, rotation and scale.
    ///
    /// A non-identity matrix is decomposed. An identity (or absent) matrix
    /// defers to the TRS fields, each defaulting to the identity component.
    #[must_use]
    pub fn local_trs(&self) -> (Vec3, Quat, Vec3) {
        if let Some(matrix) = self.matrix {
            let matrix = Mat4::from_cols_array(&matrix);
            if matrix != Mat4::IDENTITY {
                let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
                return (translation, rotation, scale);
            }
        }

        let translation = self.translation.map_or(Vec3::ZERO, Vec3::from_array);
        let rotation = self
            .rotation
            .map_or(Quat::IDENTITY, |r| Quat::from_array(r).normalize());
        let scale = self.scale.map_or(Vec3::ONE, Vec3::from_array);
        (translation, rotation, scale)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scene {
    pub name: Option<String>,
    /// Root nodes, built in this order.
    #[serde(default)]
    pub nodes: Vec<usize>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub name: Option<String>,
    /// Accessor of MAT4 inverse bind matrices, one per joint.
    pub inverse_bind_matrices: Option<usize>,
    pub skeleton: Option<usize>,
    pub joints: Vec<usize>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    /// Absent for an infinite projection.
    pub zfar: Option<f32>,
    pub znear: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Orthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Camera {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: CameraKind,
    pub perspective: Option<Perspective>,
    pub orthographic: Option<Orthographic>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}
