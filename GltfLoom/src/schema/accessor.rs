//! Accessors: typed views into buffer views.

use serde::Deserialize;
use serde_json::Value;

use super::Extensions;
use crate::error::Error;

/// Numeric type of a single accessor component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Size of one component in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// The glTF enum value.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::I8 => 5120,
            Self::U8 => 5121,
            Self::I16 => 5122,
            Self::U16 => 5123,
            Self::U32 => 5125,
            Self::F32 => 5126,
        }
    }

    /// Whether the type can back an index accessor.
    #[must_use]
    pub fn is_index_type(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32)
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5120 => Ok(Self::I8),
            5121 => Ok(Self::U8),
            5122 => Ok(Self::I16),
            5123 => Ok(Self::U16),
            5125 => Ok(Self::U32),
            5126 => Ok(Self::F32),
            _ => Err(Error::InvalidComponentType(value)),
        }
    }
}

/// Shape of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    /// Number of components per element.
    #[must_use]
    pub fn components(self) -> usize {
        let (columns, rows) = self.columns_rows();
        columns * rows
    }

    /// Matrix shape; vectors are a single column.
    #[must_use]
    pub fn columns_rows(self) -> (usize, usize) {
        match self {
            Self::Scalar => (1, 1),
            Self::Vec2 => (1, 2),
            Self::Vec3 => (1, 3),
            Self::Vec4 => (1, 4),
            Self::Mat2 => (2, 2),
            Self::Mat3 => (3, 3),
            Self::Mat4 => (4, 4),
        }
    }

    /// The glTF spelling, e.g. `VEC3`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    /// Byte stride between matrix columns.
    ///
    /// Matrix columns start on 4-byte boundaries, so MAT2/MAT3 with 1-byte
    /// components and MAT3 with 2-byte components carry column padding.
    #[must_use]
    pub fn column_stride(self, component: ComponentType) -> usize {
        let (_, rows) = self.columns_rows();
        let raw = rows * component.size();
        match self {
            Self::Mat2 | Self::Mat3 => raw.next_multiple_of(4),
            _ => raw,
        }
    }

    /// Size of one tightly packed element in bytes.
    #[must_use]
    pub fn element_size(self, component: ComponentType) -> usize {
        let (columns, _) = self.columns_rows();
        columns * self.column_stride(component)
    }
}

impl TryFrom<String> for ElementType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "SCALAR" => Ok(Self::Scalar),
            "VEC2" => Ok(Self::Vec2),
            "VEC3" => Ok(Self::Vec3),
            "VEC4" => Ok(Self::Vec4),
            "MAT2" => Ok(Self::Mat2),
            "MAT3" => Ok(Self::Mat3),
            "MAT4" => Ok(Self::Mat4),
            _ => Err(Error::InvalidElementType(value)),
        }
    }
}

/// Index list of a sparse override block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

/// Replacement values of a sparse override block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

/// Values that override the base accessor at specific element indices.
#[derive(Debug, Clone, Deserialize)]
pub struct Sparse {
    pub count: usize,
    pub indices: SparseIndices,
    pub values: SparseValues,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

/// Typed view describing how to read elements out of a buffer view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    /// Backing view; absent for zero-initialised (sparse-only) accessors.
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
    pub sparse: Option<Sparse>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

impl Accessor {
    /// Size of one tightly packed element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_type.element_size(self.component_type)
    }
}
