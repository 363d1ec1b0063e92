//! Accessor decoding.
//!
//! An [`AccessorReader`] owns everything needed to decode one accessor, so
//! it can be moved into a background job. Decoding reads the base view (or
//! zero-fills when there is none), then applies sparse overrides in order.

use byteorder::{ByteOrder, LittleEndian};
use glam::{Vec2, Vec3, Vec4};

use super::ViewSlice;
use crate::error::{Error, Result};
use crate::schema::{ComponentType, ElementType, GltfDocument};

#[derive(Debug, Clone)]
struct SparseReader {
    count: usize,
    indices: ViewSlice,
    indices_offset: usize,
    index_type: ComponentType,
    values: ViewSlice,
    values_offset: usize,
}

/// A validated, self-contained accessor.
#[derive(Debug, Clone)]
pub struct AccessorReader {
    index: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub normalized: bool,
    pub count: usize,
    base: Option<(ViewSlice, usize)>,
    sparse: Option<SparseReader>,
}

impl AccessorReader {
    /// Bind accessor `index` to the resolved buffer views.
    ///
    /// # Errors
    /// Fails if the accessor or one of its views is missing, or any read
    /// would run past the end of its view.
    pub fn new(doc: &GltfDocument, views: &[ViewSlice], index: usize) -> Result<Self> {
        let accessor = doc
            .accessors
            .get(index)
            .ok_or_else(|| Error::missing("primitive", "accessor", index))?;
        let owner = || format!("accessor {index}");
        let view = |view: usize| {
            views
                .get(view)
                .cloned()
                .ok_or_else(|| Error::missing(owner(), "bufferView", view))
        };

        let element_size = accessor.element_size();
        if accessor.count.checked_mul(element_size).is_none() {
            return Err(Error::AccessorTooLarge {
                accessor: index,
                count: accessor.count,
            });
        }

        let base = match accessor.buffer_view {
            Some(v) => {
                let slice = view(v)?;
                let stride = slice.stride.unwrap_or(element_size);
                let needed = span(accessor.byte_offset, stride, element_size, accessor.count);
                ensure_fits(index, needed, slice.len())?;
                Some((slice, accessor.byte_offset))
            }
            None => None,
        };

        let sparse = match &accessor.sparse {
            Some(sparse) => {
                let indices = view(sparse.indices.buffer_view)?;
                let index_size = sparse.indices.component_type.size();
                let needed = span(sparse.indices.byte_offset, index_size, index_size, sparse.count);
                ensure_fits(index, needed, indices.len())?;

                let values = view(sparse.values.buffer_view)?;
                let needed = span(sparse.values.byte_offset, element_size, element_size, sparse.count);
                ensure_fits(index, needed, values.len())?;

                Some(SparseReader {
                    count: sparse.count,
                    indices,
                    indices_offset: sparse.indices.byte_offset,
                    index_type: sparse.indices.component_type,
                    values,
                    values_offset: sparse.values.byte_offset,
                })
            }
            None => None,
        };

        Ok(Self {
            index,
            component_type: accessor.component_type,
            element_type: accessor.element_type,
            normalized: accessor.normalized,
            count: accessor.count,
            base,
            sparse,
        })
    }

    /// Accessor index in the document.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Decode every component as `f32`, element-major.
    ///
    /// Normalized integers are mapped to `[0, 1]` or `[-1, 1]`; other
    /// integers convert by value.
    pub fn read_f32(&self) -> Result<Vec<f32>> {
        let (ct, normalized) = (self.component_type, self.normalized);
        self.decode(|bytes| component_f32(bytes, ct, normalized))
    }

    /// Decode every component as an unsigned integer, element-major.
    pub fn read_u32(&self) -> Result<Vec<u32>> {
        let ct = self.component_type;
        self.decode(|bytes| component_u32(bytes, ct))
    }

    pub fn read_vec2(&self) -> Result<Vec<Vec2>> {
        Ok(self.read_f32()?.chunks_exact(2).map(Vec2::from_slice).collect())
    }

    pub fn read_vec3(&self) -> Result<Vec<Vec3>> {
        Ok(self.read_f32()?.chunks_exact(3).map(Vec3::from_slice).collect())
    }

    pub fn read_vec4(&self) -> Result<Vec<Vec4>> {
        Ok(self.read_f32()?.chunks_exact(4).map(Vec4::from_slice).collect())
    }

    fn decode<T, F>(&self, convert: F) -> Result<Vec<T>>
    where
        T: Copy + Default,
        F: Fn(&[u8]) -> T,
    {
        let components = self.element_type.components();
        let len = self
            .count
            .checked_mul(components)
            .ok_or_else(|| Error::AccessorTooLarge {
                accessor: self.index,
                count: self.count,
            })?;
        let mut out = vec![T::default(); len];

        if let Some((slice, offset)) = &self.base {
            let element_size = self.element_type.element_size(self.component_type);
            let stride = slice.stride.unwrap_or(element_size);
            let bytes = slice.bytes();
            for i in 0..self.count {
                let start = offset + i * stride;
                self.read_element(&bytes[start..], &mut out[i * components..], &convert);
            }
        }

        if let Some(sparse) = &self.sparse {
            self.apply_sparse(sparse, &mut out, &convert)?;
        }

        Ok(out)
    }

    fn apply_sparse<T, F>(&self, sparse: &SparseReader, out: &mut [T], convert: &F) -> Result<()>
    where
        F: Fn(&[u8]) -> T,
    {
        let components = self.element_type.components();
        let element_size = self.element_type.element_size(self.component_type);
        let index_size = sparse.index_type.size();
        let indices = &sparse.indices.bytes()[sparse.indices_offset..];
        let values = &sparse.values.bytes()[sparse.values_offset..];

        for i in 0..sparse.count {
            let target = component_u32(&indices[i * index_size..], sparse.index_type) as usize;
            if target >= self.count {
                return Err(Error::SparseIndexOutOfRange {
                    accessor: self.index,
                    index: target,
                    count: self.count,
                });
            }
            self.read_element(
                &values[i * element_size..],
                &mut out[target * components..],
                convert,
            );
        }
        Ok(())
    }

    /// Read one element column by column, skipping matrix column padding.
    fn read_element<T, F>(&self, bytes: &[u8], out: &mut [T], convert: &F)
    where
        F: Fn(&[u8]) -> T,
    {
        let (columns, rows) = self.element_type.columns_rows();
        let size = self.component_type.size();
        let column_stride = self.element_type.column_stride(self.component_type);
        for column in 0..columns {
            for row in 0..rows {
                let at = column * column_stride + row * size;
                out[column * rows + row] = convert(&bytes[at..at + size]);
            }
        }
    }
}

/// Bytes spanned by `count` elements of `size` bytes, `stride` apart.
///
/// `None` when the span does not fit in `usize`.
fn span(offset: usize, stride: usize, size: usize, count: usize) -> Option<usize> {
    if count == 0 {
        return Some(offset);
    }
    stride
        .checked_mul(count - 1)?
        .checked_add(size)?
        .checked_add(offset)
}

fn ensure_fits(accessor: usize, needed: Option<usize>, available: usize) -> Result<()> {
    match needed {
        Some(needed) if needed <= available => Ok(()),
        _ => Err(Error::AccessorOutOfRange {
            accessor,
            needed: needed.unwrap_or(usize::MAX),
            available,
        }),
    }
}

fn component_f32(bytes: &[u8], ct: ComponentType, normalized: bool) -> f32 {
    match (ct, normalized) {
        (ComponentType::F32, _) => LittleEndian::read_f32(bytes),
        (ComponentType::I8, true) => (f32::from(bytes[0] as i8) / 127.0).max(-1.0),
        (ComponentType::U8, true) => f32::from(bytes[0]) / 255.0,
        (ComponentType::I16, true) => (f32::from(LittleEndian::read_i16(bytes)) / 32767.0).max(-1.0),
        (ComponentType::U16, true) => f32::from(LittleEndian::read_u16(bytes)) / 65535.0,
        (ComponentType::U32, true) => LittleEndian::read_u32(bytes) as f32 / u32::MAX as f32,
        (ComponentType::I8, false) => f32::from(bytes[0] as i8),
        (ComponentType::U8, false) => f32::from(bytes[0]),
        (ComponentType::I16, false) => f32::from(LittleEndian::read_i16(bytes)),
        (ComponentType::U16, false) => f32::from(LittleEndian::read_u16(bytes)),
        (ComponentType::U32, false) => LittleEndian::read_u32(bytes) as f32,
    }
}

fn component_u32(bytes: &[u8], ct: ComponentType) -> u32 {
    match ct {
        ComponentType::U8 => u32::from(bytes[0]),
        ComponentType::I8 => (bytes[0] as i8).max(0) as u32,
        ComponentType::U16 => u32::from(LittleEndian::read_u16(bytes)),
        ComponentType::I16 => LittleEndian::read_i16(bytes).max(0) as u32,
        ComponentType::U32 => LittleEndian::read_u32(bytes),
        ComponentType::F32 => LittleEndian::read_f32(bytes).max(0.0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::parse_document;

    fn slice(data: Vec<u8>, stride: Option<usize>) -> ViewSlice {
        let length = data.len();
        ViewSlice {
            data: Arc::from(data),
            offset: 0,
            length,
            stride,
        }
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_sparse_override() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0},{"buffer":0,"byteLength":0},{"buffer":0,"byteLength":0}],
                "accessors":[{"bufferView":0,"componentType":5126,"count":8,"type":"SCALAR",
                    "sparse":{"count":2,
                        "indices":{"bufferView":1,"componentType":5123},
                        "values":{"bufferView":2}}}]}"#,
        )
        .unwrap()
        .document;

        let base: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let indices: Vec<u8> = [2u16, 5].iter().flat_map(|i| i.to_le_bytes()).collect();
        let views = vec![
            slice(f32_bytes(&base), None),
            slice(indices, None),
            slice(f32_bytes(&[20.0, 50.0]), None),
        ];

        let decoded = AccessorReader::new(&doc, &views, 0).unwrap().read_f32().unwrap();
        let mut expected = base.clone();
        expected[2] = 20.0;
        expected[5] = 50.0;
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_sparse_without_view_zero_fills() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0},{"buffer":0,"byteLength":0}],
                "accessors":[{"componentType":5126,"count":4,"type":"SCALAR",
                    "sparse":{"count":1,
                        "indices":{"bufferView":0,"componentType":5121},
                        "values":{"bufferView":1}}}]}"#,
        )
        .unwrap()
        .document;
        let views = vec![slice(vec![3], None), slice(f32_bytes(&[7.0]), None)];

        let decoded = AccessorReader::new(&doc, &views, 0).unwrap().read_f32().unwrap();
        assert_eq!(decoded, vec![0.0, 0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_stride_and_normalized() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0,"byteStride":4}],
                "accessors":[{"bufferView":0,"byteOffset":1,"componentType":5121,
                              "normalized":true,"count":2,"type":"VEC2"}]}"#,
        )
        .unwrap()
        .document;
        // Two interleaved elements: [pad, 255, 0, pad] [pad, 51, 102, pad]
        let views = vec![slice(vec![9, 255, 0, 9, 9, 51, 102, 9], Some(4))];

        let reader = AccessorReader::new(&doc, &views, 0).unwrap();
        assert_eq!(reader.read_vec2().unwrap(), vec![Vec2::new(1.0, 0.0), Vec2::new(0.2, 0.4)]);
        assert_eq!(reader.read_u32().unwrap(), vec![255, 0, 51, 102]);
    }

    #[test]
    fn test_out_of_range() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0}],
                "accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3"}]}"#,
        )
        .unwrap()
        .document;
        let views = vec![slice(vec![0; 24], None)];
        assert!(matches!(
            AccessorReader::new(&doc, &views, 0),
            Err(Error::AccessorOutOfRange { needed: 36, available: 24, .. })
        ));
    }

    #[test]
    fn test_huge_count_is_rejected() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0}],
                "accessors":[
                    {"bufferView":0,"componentType":5126,"count":4611686018427387904,"type":"VEC3"},
                    {"componentType":5126,"count":18446744073709551615,"type":"SCALAR"}]}"#,
        )
        .unwrap()
        .document;
        let views = vec![slice(vec![0; 24], None)];

        assert!(matches!(
            AccessorReader::new(&doc, &views, 0),
            Err(Error::AccessorTooLarge { accessor: 0, .. })
        ));
        assert!(matches!(
            AccessorReader::new(&doc, &views, 1),
            Err(Error::AccessorTooLarge { accessor: 1, .. })
        ));
    }

    #[test]
    fn test_stride_overflow_is_out_of_range() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0}],
                "accessors":[{"bufferView":0,"componentType":5126,"count":4,"type":"SCALAR"}]}"#,
        )
        .unwrap()
        .document;
        let views = vec![slice(vec![0; 16], Some(usize::MAX / 2))];
        assert!(matches!(
            AccessorReader::new(&doc, &views, 0),
            Err(Error::AccessorOutOfRange { needed: usize::MAX, available: 16, .. })
        ));
    }

    #[test]
    fn test_mat2_column_padding() {
        let doc = parse_document(
            r#"{"asset":{"version":"2.0"},
                "buffers":[{"byteLength":0}],
                "bufferViews":[{"buffer":0,"byteLength":0}],
                "accessors":[{"bufferView":0,"componentType":5121,"count":1,"type":"MAT2"}]}"#,
        )
        .unwrap()
        .document;
        let views = vec![slice(vec![1, 2, 0, 0, 3, 4, 0, 0], None)];
        let values = AccessorReader::new(&doc, &views, 0).unwrap().read_u32().unwrap();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }
}
