//! Primitive assembly
//!
//! Turns one primitive's accessors into typed vertex and index arrays that no
//! renderer has seen yet. Binding happens on the primary context; decoding
//! is a pure function that the scheduler can move to the background.

mod combine;

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::resolver::{AccessorReader, ViewSlice};
use crate::schema::{ElementType, GltfDocument, Mode};

pub use combine::combine;

/// Vertex count above which 32-bit indices are required.
pub const MAX_U16_VERTICES: usize = 65_535;

/// Primitive topology after strip and fan expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
}

/// Width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    #[must_use]
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count > MAX_U16_VERTICES {
            Self::U32
        } else {
            Self::U16
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    /// Pack indices at the given width.
    #[must_use]
    pub fn pack(indices: Vec<u32>, format: IndexFormat) -> Self {
        match format {
            IndexFormat::U16 => Self::U16(indices.into_iter().map(|i| i as u16).collect()),
            IndexFormat::U32 => Self::U32(indices),
        }
    }

    #[must_use]
    pub fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::U16,
            Self::U32(_) => IndexFormat::U32,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            Self::U16(v) => v.iter().map(|&i| u32::from(i)).collect(),
            Self::U32(v) => v.clone(),
        }
    }
}

/// Four joint indices with their normalized weights.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoneWeight {
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Bounds of a point set; a zero box when empty.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            };
        };
        points.iter().fold(Self { min: first, max: first }, |b, &p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        })
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Decoded geometry of a single primitive.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec4>>,
    pub uvs: [Option<Vec<Vec2>>; 4],
    pub colors: Option<Vec<Vec4>>,
    pub bone_weights: Option<Vec<BoneWeight>>,
    pub indices: Vec<u32>,
    pub topology: Topology,
    pub material: Option<usize>,
}

impl PrimitiveGeometry {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// A renderer-ready submesh: one index list and one material slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    pub indices: Indices,
    pub topology: Topology,
    /// Document material index; `None` for the renderer's default.
    pub material: Option<usize>,
}

/// Geometry handed to [`crate::Renderer::create_mesh`].
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec4>>,
    pub uvs: [Option<Vec<Vec2>>; 4],
    pub colors: Option<Vec<Vec4>>,
    pub bone_weights: Option<Vec<BoneWeight>>,
    pub submeshes: Vec<SubMesh>,
    pub bounds: Aabb,
}

impl MeshGeometry {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn index_format(&self) -> IndexFormat {
        IndexFormat::for_vertex_count(self.vertex_count())
    }

    /// Material slots, one per submesh.
    #[must_use]
    pub fn material_slots(&self) -> Vec<Option<usize>> {
        self.submeshes.iter().map(|s| s.material).collect()
    }
}

/// Divide a weight vector by its component sum.
///
/// A vector summing to (near) zero is returned unchanged.
#[must_use]
pub fn normalize_weights(weights: [f32; 4]) -> [f32; 4] {
    let sum: f32 = weights.iter().sum();
    if sum.abs() <= f32::EPSILON {
        return weights;
    }
    weights.map(|w| w / sum)
}

/// Accessors of one primitive, bound to resolved views and ready to decode.
#[derive(Debug, Clone)]
pub struct PrimitiveInputs {
    mesh: usize,
    primitive: usize,
    position: AccessorReader,
    normal: Option<AccessorReader>,
    tangent: Option<AccessorReader>,
    texcoord: [Option<AccessorReader>; 4],
    color: Option<AccessorReader>,
    joints: Option<AccessorReader>,
    weights: Option<AccessorReader>,
    indices: Option<AccessorReader>,
    mode: Mode,
    material: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Normal,
    Tangent,
    TexCoord(usize),
    Color,
    Joints,
    Weights,
}

impl Slot {
    fn semantic(self) -> String {
        match self {
            Self::Normal => "NORMAL".to_string(),
            Self::Tangent => "TANGENT".to_string(),
            Self::TexCoord(set) => format!("TEXCOORD_{set}"),
            Self::Color => "COLOR_0".to_string(),
            Self::Joints => "JOINTS_0".to_string(),
            Self::Weights => "WEIGHTS_0".to_string(),
        }
    }

    fn accepts(self) -> &'static [ElementType] {
        match self {
            Self::Normal => &[ElementType::Vec3],
            Self::TexCoord(_) => &[ElementType::Vec2],
            Self::Color => &[ElementType::Vec3, ElementType::Vec4],
            Self::Tangent | Self::Joints | Self::Weights => &[ElementType::Vec4],
        }
    }
}

fn expect_type(reader: &AccessorReader, semantic: String, accepts: &[ElementType]) -> Result<()> {
    if accepts.contains(&reader.element_type) {
        return Ok(());
    }
    Err(Error::AttributeTypeMismatch {
        accessor: reader.index(),
        semantic,
        expected: accepts[0].as_str(),
        found: reader.element_type.as_str(),
    })
}

impl PrimitiveInputs {
    /// Bind primitive `primitive` of mesh `mesh` to resolved views.
    ///
    /// # Errors
    /// Fails if `POSITION` is absent, an attribute has the wrong element type
    /// or count, or an accessor does not fit its view.
    pub fn bind(doc: &GltfDocument, views: &[ViewSlice], mesh: usize, primitive: usize) -> Result<Self> {
        let prim = doc
            .meshes
            .get(mesh)
            .and_then(|m| m.primitives.get(primitive))
            .ok_or_else(|| Error::missing("scene", "mesh", mesh))?;
        let attributes = &prim.attributes;

        let position_index = attributes
            .position
            .ok_or(Error::MissingPositions { mesh, primitive })?;
        let position = AccessorReader::new(doc, views, position_index)?;
        expect_type(&position, "POSITION".to_string(), &[ElementType::Vec3])?;
        let vertex_count = position.count;

        let bind = |slot: Slot, index: Option<usize>| -> Result<Option<AccessorReader>> {
            let Some(index) = index else {
                return Ok(None);
            };
            let reader = AccessorReader::new(doc, views, index)?;
            expect_type(&reader, slot.semantic(), slot.accepts())?;
            if reader.count != vertex_count {
                return Err(Error::AttributeCountMismatch {
                    accessor: index,
                    semantic: slot.semantic(),
                    expected: vertex_count,
                    found: reader.count,
                });
            }
            Ok(Some(reader))
        };

        let mut texcoord: [Option<AccessorReader>; 4] = Default::default();
        for (set, slot) in texcoord.iter_mut().enumerate() {
            *slot = bind(Slot::TexCoord(set), attributes.texcoord[set])?;
        }

        let indices = match prim.indices {
            Some(index) => {
                let reader = AccessorReader::new(doc, views, index)?;
                expect_type(&reader, "indices".to_string(), &[ElementType::Scalar])?;
                Some(reader)
            }
            None => None,
        };

        Ok(Self {
            mesh,
            primitive,
            normal: bind(Slot::Normal, attributes.normal)?,
            tangent: bind(Slot::Tangent, attributes.tangent)?,
            texcoord,
            color: bind(Slot::Color, attributes.color_0)?,
            joints: bind(Slot::Joints, attributes.joints_0)?,
            weights: bind(Slot::Weights, attributes.weights_0)?,
            position,
            indices,
            mode: prim.mode,
            material: prim.material,
        })
    }

    /// Decode every bound accessor into a [`PrimitiveGeometry`].
    ///
    /// Attribute accessors are decoded in parallel.
    pub fn assemble(self) -> Result<PrimitiveGeometry> {
        let mut jobs: Vec<(Slot, &AccessorReader)> = Vec::new();
        let optional = [
            (Slot::Normal, &self.normal),
            (Slot::Tangent, &self.tangent),
            (Slot::Color, &self.color),
            (Slot::Joints, &self.joints),
            (Slot::Weights, &self.weights),
        ];
        for (slot, reader) in optional {
            if let Some(reader) = reader {
                jobs.push((slot, reader));
            }
        }
        for (set, reader) in self.texcoord.iter().enumerate() {
            if let Some(reader) = reader {
                jobs.push((Slot::TexCoord(set), reader));
            }
        }

        let positions = self.position.read_vec3()?;
        let decoded: Vec<(Slot, Vec<f32>, usize)> = jobs
            .par_iter()
            .map(|&(slot, reader)| -> Result<(Slot, Vec<f32>, usize)> {
                Ok((slot, reader.read_f32()?, reader.element_type.components()))
            })
            .collect::<Result<_>>()?;

        let mut geometry = PrimitiveGeometry {
            positions,
            material: self.material,
            ..Default::default()
        };
        let mut joints: Option<Vec<[u32; 4]>> = None;
        let mut weights: Option<Vec<[f32; 4]>> = None;

        for (slot, values, components) in decoded {
            match slot {
                Slot::Normal => geometry.normals = Some(to_vec3(&values)),
                Slot::Tangent => geometry.tangents = Some(to_vec4(&values)),
                Slot::TexCoord(set) => geometry.uvs[set] = Some(to_vec2(&values)),
                Slot::Color if components == 3 => {
                    geometry.colors = Some(to_vec3(&values).into_iter().map(|c| c.extend(1.0)).collect());
                }
                Slot::Color => geometry.colors = Some(to_vec4(&values)),
                Slot::Joints => {
                    joints = Some(
                        values
                            .chunks_exact(4)
                            .map(|j| [j[0] as u32, j[1] as u32, j[2] as u32, j[3] as u32])
                            .collect(),
                    );
                }
                Slot::Weights => {
                    weights = Some(values.chunks_exact(4).map(|w| [w[0], w[1], w[2], w[3]]).collect());
                }
            }
        }

        if let (Some(joints), Some(weights)) = (joints, weights) {
            geometry.bone_weights = Some(
                joints
                    .into_iter()
                    .zip(weights)
                    .map(|(joints, weights)| BoneWeight {
                        joints,
                        weights: normalize_weights(weights),
                    })
                    .collect(),
            );
        }

        let vertex_count = geometry.vertex_count();
        let indices = match &self.indices {
            Some(reader) => {
                let indices = reader.read_u32()?;
                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(Error::VertexIndexOutOfRange {
                        accessor: reader.index(),
                        index: bad,
                        vertex_count,
                    });
                }
                indices
            }
            None => (0..vertex_count as u32).collect(),
        };

        let (topology, indices) = expand_topology(self.mode, indices);
        geometry.topology = topology;
        geometry.indices = indices;

        tracing::trace!(
            "Assembled mesh {} primitive {}: {} vertices, {} indices",
            self.mesh,
            self.primitive,
            vertex_count,
            geometry.indices.len()
        );
        Ok(geometry)
    }
}

fn to_vec2(values: &[f32]) -> Vec<Vec2> {
    values.chunks_exact(2).map(Vec2::from_slice).collect()
}

fn to_vec3(values: &[f32]) -> Vec<Vec3> {
    values.chunks_exact(3).map(Vec3::from_slice).collect()
}

fn to_vec4(values: &[f32]) -> Vec<Vec4> {
    values.chunks_exact(4).map(Vec4::from_slice).collect()
}

/// Convert strips and fans to triangle lists; other modes pass through.
#[must_use]
pub fn expand_topology(mode: Mode, indices: Vec<u32>) -> (Topology, Vec<u32>) {
    match mode {
        Mode::Points => (Topology::Points, indices),
        Mode::Lines => (Topology::Lines, indices),
        Mode::LineLoop => (Topology::LineLoop, indices),
        Mode::LineStrip => (Topology::LineStrip, indices),
        Mode::Triangles => (Topology::Triangles, indices),
        Mode::TriangleStrip => {
            let triangles = indices
                .windows(3)
                .enumerate()
                .flat_map(|(i, w)| {
                    // Odd triangles swap their first two vertices to keep winding
                    if i % 2 == 0 { [w[0], w[1], w[2]] } else { [w[1], w[0], w[2]] }
                })
                .collect();
            (Topology::Triangles, triangles)
        }
        Mode::TriangleFan => {
            let triangles = match indices.split_first() {
                Some((&hub, rest)) => rest
                    .windows(2)
                    .flat_map(|w| [w[0], w[1], hub])
                    .collect(),
                None => Vec::new(),
            };
            (Topology::Triangles, triangles)
        }
    }
}
