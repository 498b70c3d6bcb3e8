//! The per-frame record of everything the renderer submits, in submission
//! order. Built by [`scene_pass`](crate::renderer::scene_pass) without any GL
//! calls, and executed by [`Renderer`](crate::renderer::Renderer).

use glam::{Mat4, Vec3, Vec4};

use crate::lighting::POINT_LIGHT_COUNT;
use crate::renderer::gl;
use crate::renderer::resources::DrawCommand;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub viewport: (u32, u32),
    pub view: Mat4,
    pub projection: Mat4,
    pub globals: GlobalUniforms,
    pub point_lights: [PointLightUniforms; POINT_LIGHT_COUNT],
    pub spot_light: SpotLightUniforms,
    pub markers: Vec<MarkerDraw>,
    pub meshes: Vec<MeshDraw>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalUniforms {
    pub normal_map_active: bool,
    /// Direction towards the light, in view space.
    pub light_direction: Vec3,
    pub light_intensity: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightUniforms {
    /// In view space.
    pub position: Vec3,
    pub intensity: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLightUniforms {
    pub position: Vec3,
    pub intensity: Vec3,
    pub direction: Vec3,
    /// Cosine of the inner cone half-angle.
    pub cut_off: f32,
    /// Cosine of the outer cone half-angle.
    pub outer_cut_off: f32,
    pub attenuation_distance: f32,
}

/// One point light's cube, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerDraw {
    pub position: Vec3,
    pub size: f32,
    pub color: Vec3,
}

/// A mesh node, with its transforms and the draws of its primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDraw {
    pub node_index: usize,
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
    pub normal_matrix: Mat4,
    /// CW for transforms that mirror the mesh.
    pub front_face: gl::types::GLenum,
    pub draw_calls: Vec<DrawCall>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub vertex_array: usize,
    pub command: DrawCommand,
    pub material: MaterialBinding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// The 1x1 opaque white texture.
    White,
    /// The GL texture created for this glTF texture index.
    Texture(usize),
}

/// The material uniforms of a draw. Textures other than the base color are
/// None when absent, and their presence flag is set accordingly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialBinding {
    pub base_color_texture: TextureSource,
    pub base_color_factor: Vec4,
    pub metallic_roughness_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_texture: Option<usize>,
    pub emissive_factor: Vec3,
    pub normal_texture: Option<usize>,
    pub normal_scale: f32,
}

impl MaterialBinding {
    /// What a primitive without a (valid) material is drawn with.
    pub const DEFAULT: MaterialBinding = MaterialBinding {
        base_color_texture: TextureSource::White,
        base_color_factor: Vec4::ONE,
        metallic_roughness_texture: None,
        metallic_factor: 1.0,
        roughness_factor: 1.0,
        emissive_texture: None,
        emissive_factor: Vec3::ZERO,
        normal_texture: None,
        normal_scale: 1.0,
    };
}

impl Frame {
    pub fn draw_call_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.draw_calls.len()).sum()
    }
}
