//! Small in-memory scenes for tests.

use glam::Mat4;

use crate::renderer::gl;
use crate::renderer::gltf::{
    Accessor, BufferView, ElementType, Gltf, Image, Material, Mesh, Node, Primitive, Scene,
    Texture,
};

pub struct SceneBuilder {
    gltf: Gltf,
}

impl SceneBuilder {
    pub fn new() -> SceneBuilder {
        SceneBuilder {
            gltf: Gltf {
                default_scene: Some(0),
                scenes: vec![Scene::default()],
                buffers: vec![Vec::new()],
                ..Default::default()
            },
        }
    }

    /// Appends the bytes to buffer 0 in their own buffer view, and returns the
    /// index of a new accessor covering them.
    pub fn push_bytes(
        &mut self,
        bytes: &[u8],
        component_type: gl::types::GLenum,
        element_type: ElementType,
        count: usize,
        target: Option<gl::types::GLenum>,
    ) -> usize {
        let buffer = &mut self.gltf.buffers[0];
        while buffer.len() % 4 != 0 {
            buffer.push(0);
        }
        let byte_offset = buffer.len();
        buffer.extend_from_slice(bytes);
        self.gltf.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            byte_stride: None,
            target,
        });
        self.gltf.accessors.push(Accessor {
            buffer_view: Some(self.gltf.buffer_views.len() - 1),
            byte_offset: 0,
            component_type,
            element_type,
            count,
            normalized: false,
        });
        self.gltf.accessors.len() - 1
    }

    pub fn push_f32s(&mut self, data: &[f32], element_type: ElementType) -> usize {
        let count = data.len() / element_type.component_count();
        self.push_bytes(
            bytemuck::cast_slice(data),
            gl::FLOAT,
            element_type,
            count,
            Some(gl::ARRAY_BUFFER),
        )
    }

    pub fn push_u16_indices(&mut self, data: &[u16]) -> usize {
        self.push_bytes(
            bytemuck::cast_slice(data),
            gl::UNSIGNED_SHORT,
            ElementType::Scalar,
            data.len(),
            Some(gl::ELEMENT_ARRAY_BUFFER),
        )
    }

    pub fn add_mesh(&mut self, primitives: Vec<Primitive>) -> usize {
        self.gltf.meshes.push(Mesh { primitives });
        self.gltf.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.gltf.materials.push(material);
        self.gltf.materials.len() - 1
    }

    pub fn add_node(&mut self, node: Node, root: bool) -> usize {
        self.gltf.nodes.push(node);
        let index = self.gltf.nodes.len() - 1;
        if root {
            self.gltf.scenes[0].node_indices.push(index);
        }
        index
    }

    pub fn add_mesh_node(&mut self, mesh_index: usize, transform: Mat4) -> usize {
        let node = Node {
            mesh_index: Some(mesh_index),
            transform,
            ..Default::default()
        };
        self.add_node(node, true)
    }

    pub fn gltf_mut(&mut self) -> &mut Gltf {
        &mut self.gltf
    }

    pub fn build(self) -> Gltf {
        self.gltf
    }
}

pub fn primitive(
    attributes: &[(&str, usize)],
    indices: Option<usize>,
    material_index: Option<usize>,
) -> Primitive {
    Primitive {
        attributes: attributes
            .iter()
            .map(|&(name, accessor)| (name.to_string(), accessor))
            .collect(),
        indices,
        material_index,
        mode: gl::TRIANGLES,
    }
}

pub const TRIANGLE_POSITIONS: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
pub const TRIANGLE_UVS: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];

/// One node, one mesh, one non-indexed primitive with POSITION and TEXCOORD_0,
/// no TANGENT, no material.
pub fn triangle_scene() -> Gltf {
    let mut builder = SceneBuilder::new();
    let positions = builder.push_f32s(&TRIANGLE_POSITIONS, ElementType::Vec3);
    let uvs = builder.push_f32s(&TRIANGLE_UVS, ElementType::Vec2);
    let mesh = builder.add_mesh(vec![primitive(
        &[("POSITION", positions), ("TEXCOORD_0", uvs)],
        None,
        None,
    )]);
    builder.add_mesh_node(mesh, Mat4::IDENTITY);
    builder.build()
}

/// A unit quad in the XY plane, indexed with unsigned shorts, with normals and
/// texture coordinates. Vertex 3 is (1, 1, 0).
pub fn indexed_quad_builder(material_index: Option<usize>) -> (SceneBuilder, usize) {
    let mut builder = SceneBuilder::new();
    let positions = builder.push_f32s(
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
        ElementType::Vec3,
    );
    let normals = builder.push_f32s(
        &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        ElementType::Vec3,
    );
    let uvs = builder.push_f32s(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0], ElementType::Vec2);
    let indices = builder.push_u16_indices(&[0, 1, 2, 2, 1, 3]);
    let mesh = builder.add_mesh(vec![primitive(
        &[("POSITION", positions), ("NORMAL", normals), ("TEXCOORD_0", uvs)],
        Some(indices),
        material_index,
    )]);
    (builder, mesh)
}

pub fn indexed_quad_scene() -> Gltf {
    let (mut builder, mesh) = indexed_quad_builder(None);
    builder.add_mesh_node(mesh, Mat4::IDENTITY);
    builder.build()
}

/// The indexed quad with a material whose base color comes from a 1x1 image.
pub fn textured_quad_scene() -> Gltf {
    let (mut builder, mesh) = indexed_quad_builder(Some(0));
    builder.add_material(Material {
        base_color_texture: Some(0),
        ..Default::default()
    });
    builder.add_mesh_node(mesh, Mat4::IDENTITY);
    let gltf = builder.gltf_mut();
    gltf.textures.push(Texture {
        source: Some(0),
        sampler: None,
    });
    gltf.images.push(Image {
        pixels: Some(image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]))),
    });
    builder.build()
}

/// A scene whose only node carries no mesh.
pub fn empty_scene() -> Gltf {
    let mut builder = SceneBuilder::new();
    builder.add_node(Node::default(), true);
    builder.build()
}
