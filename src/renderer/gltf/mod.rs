use std::collections::BTreeMap;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::gl;

pub mod accessor;
pub mod bounds;
#[cfg(test)]
pub mod fixtures;
mod loader;
mod program;
pub mod tangents;

pub use loader::{load_gltf_file, Loaded};
pub use program::*;

/// An in-memory glTF document. Everything here is immutable after loading;
/// GPU-side objects derived from it live in
/// [`GpuResources`](crate::renderer::resources::GpuResources).
#[derive(Debug, Default)]
pub struct Gltf {
    pub default_scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub samplers: Vec<Sampler>,
    pub images: Vec<Image>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub node_indices: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub mesh_index: Option<usize>,
    pub child_node_indices: Vec<usize>,
    pub transform: Mat4,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            name: None,
            mesh_index: None,
            child_node_indices: Vec::new(),
            transform: Mat4::IDENTITY,
        }
    }
}

impl Node {
    /// The node's name for log messages, falling back to its index.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("node {index} ({name:?})"),
            None => format!("node {index}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    /// Attribute semantic (e.g. "POSITION") to accessor index. Sorted, so
    /// "the first attribute" is deterministic.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material_index: Option<usize>,
    /// The GL primitive mode, which glTF defines with the same values.
    pub mode: gl::types::GLenum,
}

impl Default for Primitive {
    fn default() -> Self {
        Primitive {
            attributes: BTreeMap::new(),
            indices: None,
            material_index: None,
            mode: gl::TRIANGLES,
        }
    }
}

/// A metallic-roughness material, with glTF's defaults for omitted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color_factor: Vec4,
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub normal_scale: f32,
    pub emissive_texture: Option<usize>,
    pub emissive_factor: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            base_color_factor: Vec4::ONE,
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            emissive_texture: None,
            emissive_factor: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub source: Option<usize>,
    pub sampler: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub mag_filter: Option<gl::types::GLenum>,
    pub min_filter: Option<gl::types::GLenum>,
    pub wrap_s: gl::types::GLenum,
    pub wrap_t: gl::types::GLenum,
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler {
            mag_filter: None,
            min_filter: None,
            wrap_s: gl::REPEAT,
            wrap_t: gl::REPEAT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Image {
    /// None if the image could not be fetched or decoded.
    pub pixels: Option<image::RgbaImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
    pub fn from_name(name: &str) -> Option<ElementType> {
        match name {
            "SCALAR" => Some(ElementType::Scalar),
            "VEC2" => Some(ElementType::Vec2),
            "VEC3" => Some(ElementType::Vec3),
            "VEC4" => Some(ElementType::Vec4),
            "MAT2" => Some(ElementType::Mat2),
            "MAT3" => Some(ElementType::Mat3),
            "MAT4" => Some(ElementType::Mat4),
            _ => None,
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 | ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    /// The GL component type, which glTF defines with the same values.
    pub component_type: gl::types::GLenum,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
}

#[derive(Debug, Clone)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<gl::types::GLenum>,
}

impl Gltf {
    pub fn default_scene(&self) -> Option<&Scene> {
        self.scenes.get(self.default_scene?)
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.primitives.len()).sum()
    }

    /// Whether any material has a normal texture, i.e. whether toggling normal
    /// mapping can have a visible effect.
    pub fn has_normal_texture(&self) -> bool {
        self.materials.iter().any(|m| m.normal_texture.is_some())
    }

    /// Returns the decoded image behind the texture, if all links of the chain
    /// (texture, its source, the decoded pixels) are present.
    pub fn texture_image(&self, texture_index: usize) -> Option<&image::RgbaImage> {
        let texture = self.textures.get(texture_index)?;
        self.images.get(texture.source?)?.pixels.as_ref()
    }

    /// Visits every node reachable from the default scene's roots, depth-first
    /// in document order, with the node's accumulated world transform. Each
    /// node is visited at most once, so cycles and nodes shared between
    /// parents are cut off at their second appearance.
    pub fn walk_scene(&self, mut visit: impl FnMut(usize, &Node, Mat4)) {
        let Some(scene) = self.default_scene() else {
            return;
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut node_queue = scene
            .node_indices
            .iter()
            .rev()
            .map(|&i| (Mat4::IDENTITY, i))
            .collect::<Vec<_>>();
        while let Some((parent_transform, node_index)) = node_queue.pop() {
            let Some(node) = self.nodes.get(node_index) else {
                log::debug!("scene references missing node {node_index}");
                continue;
            };
            if std::mem::replace(&mut visited[node_index], true) {
                log::debug!("{} is reached a second time, not descending again", node.label(node_index));
                continue;
            }
            let transform = parent_transform * node.transform;
            visit(node_index, node, transform);
            for &child_index in node.child_node_indices.iter().rev() {
                node_queue.push((transform, child_index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn walk_accumulates_parent_transforms_in_document_order() {
        let mut gltf = Gltf {
            default_scene: Some(0),
            scenes: vec![Scene {
                node_indices: vec![0, 2],
            }],
            ..Default::default()
        };
        gltf.nodes = vec![
            Node {
                child_node_indices: vec![1],
                transform: Mat4::from_translation(Vec3::X),
                ..Default::default()
            },
            Node {
                transform: Mat4::from_translation(Vec3::Y),
                ..Default::default()
            },
            Node {
                transform: Mat4::from_scale(Vec3::splat(2.0)),
                ..Default::default()
            },
        ];

        let mut visited = Vec::new();
        gltf.walk_scene(|index, _, world| visited.push((index, world.transform_point3(Vec3::ZERO))));

        assert_eq!(
            visited,
            vec![
                (0, Vec3::new(1.0, 0.0, 0.0)),
                (1, Vec3::new(1.0, 1.0, 0.0)),
                (2, Vec3::ZERO),
            ]
        );
    }

    #[test]
    fn walk_terminates_on_cyclic_hierarchies() {
        let mut gltf = fixtures::triangle_scene();
        gltf.nodes[0].child_node_indices = vec![0];
        let mut visits = 0;
        gltf.walk_scene(|_, _, _| visits += 1);
        assert_eq!(visits, gltf.nodes.len());
    }

    #[test]
    fn repeated_children_are_walked_once() {
        // Every node lists its successor twice and the last one loops back to
        // the root, which would branch exponentially without a visited set.
        let mut gltf = Gltf {
            default_scene: Some(0),
            scenes: vec![Scene { node_indices: vec![0, 0] }],
            ..Default::default()
        };
        let node_count = 60;
        gltf.nodes = (0..node_count)
            .map(|i| {
                let next = (i + 1) % node_count;
                Node {
                    name: Some(format!("link {i}")),
                    child_node_indices: vec![next, next, i],
                    ..Default::default()
                }
            })
            .collect();

        let mut visited = Vec::new();
        gltf.walk_scene(|index, _, _| visited.push(index));
        assert_eq!(visited, (0..node_count).collect::<Vec<_>>());
    }

    #[test]
    fn node_labels_prefer_the_name() {
        let named = Node {
            name: Some("Wheel".to_string()),
            ..Default::default()
        };
        assert_eq!(named.label(3), "node 3 (\"Wheel\")");
        assert_eq!(Node::default().label(4), "node 4");
    }

    #[test]
    fn missing_default_scene_visits_nothing() {
        let mut gltf = fixtures::triangle_scene();
        gltf.default_scene = None;
        let mut visits = 0;
        gltf.walk_scene(|_, _, _| visits += 1);
        assert_eq!(visits, 0);
    }

    #[test]
    fn texture_image_needs_the_whole_chain() {
        let mut gltf = fixtures::textured_quad_scene();
        assert!(gltf.texture_image(0).is_some());
        gltf.images[0].pixels = None;
        assert!(gltf.texture_image(0).is_none());
        gltf.textures[0].source = None;
        assert!(gltf.texture_image(0).is_none());
        assert!(gltf.texture_image(7).is_none());
    }
}
