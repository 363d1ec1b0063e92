//! Union of a mesh's primitives into one renderer mesh.

use glam::{Vec2, Vec3, Vec4};

use super::{Aabb, BoneWeight, IndexFormat, Indices, MeshGeometry, PrimitiveGeometry, SubMesh, Topology};

/// Append `source` (or `len` fill values when absent) to `target`.
fn append<T: Copy>(target: &mut Option<Vec<T>>, source: Option<Vec<T>>, len: usize, fill: T) {
    if let Some(target) = target {
        match source {
            Some(values) => target.extend(values),
            None => target.extend(std::iter::repeat_n(fill, len)),
        }
    }
}

/// Combine primitives into a single mesh.
///
/// A lone primitive becomes the mesh as is. Several primitives share one
/// vertex array; their index lists are grouped into one submesh per distinct
/// `(material, topology)` pair, in first-seen order. A submesh draws with a
/// single topology, so one material used by triangles and lines occupies two
/// slots that point at the same material. An attribute present in any
/// primitive is present in the result, filled with defaults where missing.
#[must_use]
pub fn combine(name: Option<String>, primitives: Vec<PrimitiveGeometry>) -> MeshGeometry {
    let vertex_count: usize = primitives.iter().map(PrimitiveGeometry::vertex_count).sum();
    let format = IndexFormat::for_vertex_count(vertex_count);

    let any = |f: fn(&PrimitiveGeometry) -> bool| primitives.iter().any(f);
    let mut normals: Option<Vec<Vec3>> = any(|p| p.normals.is_some()).then(Vec::new);
    let mut tangents: Option<Vec<Vec4>> = any(|p| p.tangents.is_some()).then(Vec::new);
    let mut colors: Option<Vec<Vec4>> = any(|p| p.colors.is_some()).then(Vec::new);
    let mut bone_weights: Option<Vec<BoneWeight>> =
        any(|p| p.bone_weights.is_some()).then(Vec::new);
    let mut uvs: [Option<Vec<Vec2>>; 4] =
        std::array::from_fn(|set| primitives.iter().any(|p| p.uvs[set].is_some()).then(Vec::new));

    let mut positions = Vec::with_capacity(vertex_count);
    let mut groups: Vec<(Option<usize>, Topology, Vec<u32>)> = Vec::new();

    for primitive in primitives {
        let base = positions.len() as u32;
        let len = primitive.vertex_count();

        positions.extend(primitive.positions);
        append(&mut normals, primitive.normals, len, Vec3::ZERO);
        append(&mut tangents, primitive.tangents, len, Vec4::ZERO);
        append(&mut colors, primitive.colors, len, Vec4::ONE);
        append(&mut bone_weights, primitive.bone_weights, len, BoneWeight::default());
        for (target, source) in uvs.iter_mut().zip(primitive.uvs) {
            append(target, source, len, Vec2::ZERO);
        }

        let key = (primitive.material, primitive.topology);
        let shifted = primitive.indices.into_iter().map(|i| i + base);
        match groups.iter_mut().find(|(m, t, _)| (*m, *t) == key) {
            Some((_, _, indices)) => indices.extend(shifted),
            None => groups.push((key.0, key.1, shifted.collect())),
        }
    }

    let submeshes = groups
        .into_iter()
        .map(|(material, topology, indices)| SubMesh {
            indices: Indices::pack(indices, format),
            topology,
            material,
        })
        .collect();

    MeshGeometry {
        name,
        bounds: Aabb::from_points(&positions),
        positions,
        normals,
        tangents,
        uvs,
        colors,
        bone_weights,
        submeshes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(material: Option<usize>, offset: f32, with_normals: bool) -> PrimitiveGeometry {
        let positions = vec![
            Vec3::new(offset, 0.0, 0.0),
            Vec3::new(offset + 1.0, 0.0, 0.0),
            Vec3::new(offset + 1.0, 1.0, 0.0),
            Vec3::new(offset, 1.0, 0.0),
        ];
        PrimitiveGeometry {
            normals: with_normals.then(|| vec![Vec3::Z; 4]),
            positions,
            indices: vec![0, 1, 2, 0, 2, 3],
            material,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_primitive_binds_directly() {
        let mesh = combine(Some("quad".into()), vec![quad(Some(0), 0.0, true)]);
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.submeshes[0].indices, Indices::U16(vec![0, 1, 2, 0, 2, 3]));
    }

    #[test]
    fn test_shared_material_yields_one_slot() {
        let mesh = combine(None, vec![quad(Some(3), 0.0, true), quad(Some(3), 2.0, true)]);
        assert_eq!(mesh.material_slots(), vec![Some(3)]);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(
            mesh.submeshes[0].indices.to_u32(),
            vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]
        );
        assert_eq!(mesh.bounds.max, Vec3::new(3.0, 1.0, 0.0));
    }

    #[test]
    fn test_shared_material_split_by_topology() {
        let outline = PrimitiveGeometry {
            positions: vec![Vec3::ZERO, Vec3::X],
            indices: vec![0, 1],
            topology: Topology::Lines,
            material: Some(1),
            ..Default::default()
        };
        let mesh = combine(None, vec![quad(Some(1), 0.0, false), outline, quad(Some(1), 2.0, false)]);

        assert_eq!(mesh.material_slots(), vec![Some(1), Some(1)]);
        assert_eq!(mesh.submeshes[0].topology, Topology::Triangles);
        assert_eq!(mesh.submeshes[0].indices.len(), 12);
        assert_eq!(mesh.submeshes[1].topology, Topology::Lines);
        assert_eq!(mesh.submeshes[1].indices.to_u32(), vec![4, 5]);
    }

    #[test]
    fn test_distinct_materials_and_fill() {
        let mesh = combine(None, vec![quad(Some(0), 0.0, true), quad(None, 2.0, false)]);
        assert_eq!(mesh.material_slots(), vec![Some(0), None]);
        let normals = mesh.normals.unwrap();
        assert_eq!(normals.len(), 8);
        assert_eq!(normals[5], Vec3::ZERO);
        assert!(mesh.colors.is_none());
    }
}
