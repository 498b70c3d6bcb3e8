//! Resolves primitive attributes and indices into byte-level views over the
//! scene's buffers.

use glam::{Vec2, Vec3};

use crate::renderer::gl;
use crate::renderer::gltf::{ElementType, Gltf, Primitive};

/// The vertex attributes the viewer binds, with their shader locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    TexCoord0,
    Tangent,
}

impl Attribute {
    pub fn semantic(self) -> &'static str {
        match self {
            Attribute::Position => "POSITION",
            Attribute::Normal => "NORMAL",
            Attribute::TexCoord0 => "TEXCOORD_0",
            Attribute::Tangent => "TANGENT",
        }
    }

    /// The vertex attribute location of this attribute in the shaders.
    pub fn location(self) -> gl::types::GLuint {
        match self {
            Attribute::Position => 0,
            Attribute::Normal => 1,
            Attribute::TexCoord0 => 2,
            Attribute::Tangent => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorView {
    pub accessor: usize,
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_stride: usize,
    pub component_count: usize,
    pub component_type: gl::types::GLenum,
    pub element_type: ElementType,
    pub normalized: bool,
    pub count: usize,
    /// The target declared by the accessor's buffer view, if any.
    pub target: Option<gl::types::GLenum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    pub fn from_component_type(component_type: gl::types::GLenum) -> Option<IndexType> {
        match component_type {
            gl::UNSIGNED_BYTE => Some(IndexType::U8),
            gl::UNSIGNED_SHORT => Some(IndexType::U16),
            gl::UNSIGNED_INT => Some(IndexType::U32),
            _ => None,
        }
    }

    pub fn gl_type(self) -> gl::types::GLenum {
        match self {
            IndexType::U8 => gl::UNSIGNED_BYTE,
            IndexType::U16 => gl::UNSIGNED_SHORT,
            IndexType::U32 => gl::UNSIGNED_INT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexView {
    pub view: AccessorView,
    pub index_type: IndexType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessorError {
    #[error("index accessor {accessor} has unsupported component type {component_type}")]
    UnsupportedIndexType {
        accessor: usize,
        component_type: gl::types::GLenum,
    },
}

/// The size in bytes of one component of the given type.
pub fn component_size(component_type: gl::types::GLenum) -> Option<usize> {
    match component_type {
        gl::BYTE | gl::UNSIGNED_BYTE => Some(1),
        gl::SHORT | gl::UNSIGNED_SHORT => Some(2),
        gl::UNSIGNED_INT | gl::FLOAT => Some(4),
        _ => None,
    }
}

/// Resolves the accessor into a view. Accessors without a buffer view (sparse
/// or zero-filled ones), with dangling references, or with an unknown
/// component type are treated as absent.
pub fn resolve_accessor(gltf: &Gltf, accessor_index: usize) -> Option<AccessorView> {
    let accessor = gltf.accessors.get(accessor_index)?;
    let buffer_view = gltf.buffer_views.get(accessor.buffer_view?)?;
    let component_count = accessor.element_type.component_count();
    let packed_stride = component_size(accessor.component_type)? * component_count;
    let byte_stride = buffer_view
        .byte_stride
        .filter(|&stride| stride > 0)
        .unwrap_or(packed_stride);
    Some(AccessorView {
        accessor: accessor_index,
        buffer: buffer_view.buffer,
        byte_offset: accessor.byte_offset + buffer_view.byte_offset,
        byte_stride,
        component_count,
        component_type: accessor.component_type,
        element_type: accessor.element_type,
        normalized: accessor.normalized,
        count: accessor.count,
        target: buffer_view.target,
    })
}

pub fn resolve_attribute(
    gltf: &Gltf,
    primitive: &Primitive,
    attribute: Attribute,
) -> Option<AccessorView> {
    let &accessor_index = primitive.attributes.get(attribute.semantic())?;
    resolve_accessor(gltf, accessor_index)
}

/// Resolves the primitive's index accessor. `Ok(None)` means the primitive is
/// drawn without indices.
pub fn resolve_indices(gltf: &Gltf, primitive: &Primitive) -> Result<Option<IndexView>, AccessorError> {
    let Some(accessor_index) = primitive.indices else {
        return Ok(None);
    };
    let Some(accessor) = gltf.accessors.get(accessor_index) else {
        return Ok(None);
    };
    let index_type = IndexType::from_component_type(accessor.component_type).ok_or(
        AccessorError::UnsupportedIndexType {
            accessor: accessor_index,
            component_type: accessor.component_type,
        },
    )?;
    Ok(resolve_accessor(gltf, accessor_index).map(|view| IndexView { view, index_type }))
}

impl AccessorView {
    /// The bytes of element `i`, or None if they are outside the buffer.
    fn element_bytes<'a>(&self, gltf: &'a Gltf, i: usize, len: usize) -> Option<&'a [u8]> {
        if i >= self.count {
            return None;
        }
        let buffer = gltf.buffers.get(self.buffer)?;
        let start = self.byte_offset.checked_add(self.byte_stride.checked_mul(i)?)?;
        buffer.get(start..start.checked_add(len)?)
    }

    pub fn read_vec2(&self, gltf: &Gltf, i: usize) -> Option<Vec2> {
        if self.component_type != gl::FLOAT || self.component_count < 2 {
            return None;
        }
        let bytes = self.element_bytes(gltf, i, 8)?;
        Some(Vec2::from_array(bytemuck::pod_read_unaligned::<[f32; 2]>(bytes)))
    }

    pub fn read_vec3(&self, gltf: &Gltf, i: usize) -> Option<Vec3> {
        if self.component_type != gl::FLOAT || self.component_count < 3 {
            return None;
        }
        let bytes = self.element_bytes(gltf, i, 12)?;
        Some(Vec3::from_array(bytemuck::pod_read_unaligned::<[f32; 3]>(bytes)))
    }
}

impl IndexView {
    pub fn read(&self, gltf: &Gltf, i: usize) -> Option<u32> {
        match self.index_type {
            IndexType::U8 => self.view.element_bytes(gltf, i, 1).map(|b| b[0] as u32),
            IndexType::U16 => self
                .view
                .element_bytes(gltf, i, 2)
                .map(|b| bytemuck::pod_read_unaligned::<u16>(b) as u32),
            IndexType::U32 => self
                .view
                .element_bytes(gltf, i, 4)
                .map(bytemuck::pod_read_unaligned::<u32>),
        }
    }

    /// Reads all indices, or None if any of them is out of the buffer's range.
    pub fn read_all(&self, gltf: &Gltf) -> Option<Vec<u32>> {
        (0..self.view.count).map(|i| self.read(gltf, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::fixtures::{self, primitive, SceneBuilder};

    #[test]
    fn packed_stride_follows_the_element_size() {
        let gltf = fixtures::indexed_quad_scene();
        let primitive = &gltf.meshes[0].primitives[0];

        let position = resolve_attribute(&gltf, primitive, Attribute::Position).unwrap();
        assert_eq!(position.byte_stride, 12);
        assert_eq!(position.component_count, 3);
        assert_eq!(position.component_type, gl::FLOAT);

        let uv = resolve_attribute(&gltf, primitive, Attribute::TexCoord0).unwrap();
        assert_eq!(uv.byte_stride, 8);

        let indices = resolve_indices(&gltf, primitive).unwrap().unwrap();
        assert_eq!(indices.index_type, IndexType::U16);
        assert_eq!(indices.view.byte_stride, 2);
        assert_eq!(indices.view.count, 6);
        assert_eq!(indices.read_all(&gltf).unwrap(), vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn offsets_add_up_and_explicit_stride_wins() {
        let mut builder = SceneBuilder::new();
        // Interleaved position + uv, 20 bytes per vertex, behind 4 bytes of padding.
        let interleaved: [f32; 11] = [
            -1.0, // padding
            1.0, 2.0, 3.0, 0.25, 0.5, //
            4.0, 5.0, 6.0, 0.75, 1.0,
        ];
        let positions = builder.push_f32s(&interleaved, ElementType::Vec3);
        let gltf = builder.gltf_mut();
        gltf.buffer_views[0].byte_stride = Some(20);
        gltf.accessors[positions].byte_offset = 4;
        gltf.accessors[positions].count = 2;
        let mut uv_accessor = gltf.accessors[positions].clone();
        uv_accessor.byte_offset = 16;
        uv_accessor.element_type = ElementType::Vec2;
        gltf.accessors.push(uv_accessor);
        let uvs = gltf.accessors.len() - 1;
        let mesh = builder.add_mesh(vec![primitive(
            &[("POSITION", positions), ("TEXCOORD_0", uvs)],
            None,
            None,
        )]);
        builder.add_mesh_node(mesh, glam::Mat4::IDENTITY);
        let gltf = builder.build();
        let primitive = &gltf.meshes[0].primitives[0];

        let position = resolve_attribute(&gltf, primitive, Attribute::Position).unwrap();
        assert_eq!(position.byte_offset, 4);
        assert_eq!(position.byte_stride, 20);
        assert_eq!(position.read_vec3(&gltf, 1), Some(Vec3::new(4.0, 5.0, 6.0)));
        assert_eq!(position.read_vec3(&gltf, 2), None);

        let uv = resolve_attribute(&gltf, primitive, Attribute::TexCoord0).unwrap();
        assert_eq!(uv.read_vec2(&gltf, 0), Some(Vec2::new(0.25, 0.5)));
        assert_eq!(uv.read_vec2(&gltf, 1), Some(Vec2::new(0.75, 1.0)));
    }

    #[test]
    fn buffer_view_offset_is_included() {
        let mut gltf = fixtures::triangle_scene();
        let uv_accessor = gltf.meshes[0].primitives[0].attributes["TEXCOORD_0"];
        let view_index = gltf.accessors[uv_accessor].buffer_view.unwrap();
        gltf.accessors[uv_accessor].byte_offset = 8;
        let primitive = gltf.meshes[0].primitives[0].clone();
        let uv = resolve_attribute(&gltf, &primitive, Attribute::TexCoord0).unwrap();
        assert_eq!(uv.byte_offset, gltf.buffer_views[view_index].byte_offset + 8);
    }

    #[test]
    fn missing_attributes_are_absent_not_errors() {
        let gltf = fixtures::triangle_scene();
        let primitive = &gltf.meshes[0].primitives[0];
        assert!(resolve_attribute(&gltf, primitive, Attribute::Normal).is_none());
        assert!(resolve_attribute(&gltf, primitive, Attribute::Tangent).is_none());
        assert_eq!(resolve_indices(&gltf, primitive), Ok(None));

        let mut sparse = fixtures::triangle_scene();
        sparse.accessors[0].buffer_view = None;
        let primitive = &sparse.meshes[0].primitives[0];
        assert!(resolve_attribute(&sparse, primitive, Attribute::Position).is_none());
    }

    #[test]
    fn signed_index_types_are_rejected() {
        let mut gltf = fixtures::indexed_quad_scene();
        let index_accessor = gltf.meshes[0].primitives[0].indices.unwrap();
        gltf.accessors[index_accessor].component_type = gl::SHORT;
        let primitive = &gltf.meshes[0].primitives[0];
        assert_eq!(
            resolve_indices(&gltf, primitive),
            Err(AccessorError::UnsupportedIndexType {
                accessor: index_accessor,
                component_type: gl::SHORT,
            })
        );
    }

    #[test]
    fn byte_and_int_indices_are_read() {
        let mut builder = SceneBuilder::new();
        let bytes = builder.push_bytes(&[2, 0, 1], gl::UNSIGNED_BYTE, ElementType::Scalar, 3, None);
        let ints = builder.push_bytes(
            bytemuck::cast_slice(&[7u32, 70_000]),
            gl::UNSIGNED_INT,
            ElementType::Scalar,
            2,
            None,
        );
        let gltf = builder.build();
        let view = |accessor| IndexView {
            view: resolve_accessor(&gltf, accessor).unwrap(),
            index_type: IndexType::from_component_type(gltf.accessors[accessor].component_type)
                .unwrap(),
        };
        assert_eq!(view(bytes).read_all(&gltf), Some(vec![2, 0, 1]));
        assert_eq!(view(ints).read_all(&gltf), Some(vec![7, 70_000]));
    }
}
