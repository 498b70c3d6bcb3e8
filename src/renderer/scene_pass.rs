//! Walks the scene and the light rig into a [`Frame`].

use glam::{Mat4, Vec2, Vec3};

use crate::camera::Camera;
use crate::lighting::LightingState;
use crate::renderer::draw_calls::{
    DrawCall, Frame, GlobalUniforms, MarkerDraw, MaterialBinding, MeshDraw, PointLightUniforms,
    SpotLightUniforms, TextureSource,
};
use crate::renderer::gl;
use crate::renderer::gltf::Gltf;
use crate::renderer::resources::SceneLayout;

/// Everything a frame is built from. Nothing in here is mutated.
pub struct FrameContext<'a> {
    pub gltf: &'a Gltf,
    pub layout: &'a SceneLayout,
    pub camera: &'a Camera,
    pub projection: Mat4,
    pub lighting: &'a LightingState,
    pub viewport: (u32, u32),
    /// The cursor position in window pixels, origin at the top left.
    pub cursor: Vec2,
}

pub fn build_frame(context: &FrameContext) -> Frame {
    let view = context.camera.view_matrix();
    let lighting = context.lighting;

    let light_direction = if lighting.directional.follows_camera {
        Vec3::Z
    } else {
        view.transform_vector3(lighting.directional.direction).normalize_or_zero()
    };
    let globals = GlobalUniforms {
        normal_map_active: lighting.normal_map_active(),
        light_direction,
        light_intensity: lighting.directional.intensity,
    };

    let point_lights = lighting.point_lights.each_ref().map(|light| PointLightUniforms {
        position: view.transform_point3(light.position),
        intensity: light.intensity,
        distance: light.distance,
    });
    let markers = lighting
        .point_lights
        .iter()
        .map(|light| MarkerDraw {
            position: light.position,
            size: light.marker_size,
            color: light.marker_color,
        })
        .collect();

    let (width, height) = (context.viewport.0.max(1) as f32, context.viewport.1.max(1) as f32);
    let spot_direction = if lighting.spot.follows_cursor {
        Vec3::new(
            (context.cursor.x - width / 2.0) / width,
            -(context.cursor.y - height / 2.0) / height,
            -1.0,
        )
    } else {
        Vec3::NEG_Z
    };
    let spot_light = SpotLightUniforms {
        position: Vec3::ZERO,
        intensity: lighting.spot.intensity,
        direction: spot_direction,
        cut_off: lighting.spot.cutoff.to_radians().cos(),
        outer_cut_off: lighting.spot.outer_cutoff.to_radians().cos(),
        attenuation_distance: lighting.spot.attenuation_distance,
    };

    let mut meshes = Vec::new();
    context.gltf.walk_scene(|node_index, node, world| {
        let Some(mesh_index) = node.mesh_index else {
            return;
        };
        let (Some(mesh), Some(range)) = (
            context.gltf.meshes.get(mesh_index),
            context.layout.mesh_range(mesh_index),
        ) else {
            return;
        };
        let model_view = view * world;
        let front_face = if world.determinant() > 0.0 { gl::CCW } else { gl::CW };
        let mut draw_calls = Vec::with_capacity(range.count);
        for (primitive, vertex_array) in mesh.primitives.iter().zip(range.begin..range.begin + range.count) {
            let Some(command) = context.layout.draw(vertex_array) else {
                continue;
            };
            draw_calls.push(DrawCall {
                vertex_array,
                command,
                material: material_binding(context.gltf, primitive.material_index),
            });
        }
        meshes.push(MeshDraw {
            node_index,
            model_view,
            model_view_projection: context.projection * model_view,
            normal_matrix: model_view.inverse().transpose(),
            front_face,
            draw_calls,
        });
    });

    Frame {
        viewport: context.viewport,
        view,
        projection: context.projection,
        globals,
        point_lights,
        spot_light,
        markers,
        meshes,
    }
}

/// Resolves a primitive's material. Textures whose image didn't load are
/// treated as absent.
pub fn material_binding(gltf: &Gltf, material_index: Option<usize>) -> MaterialBinding {
    let Some(material) = material_index.and_then(|i| gltf.materials.get(i)) else {
        return MaterialBinding::DEFAULT;
    };
    let loaded = |texture: Option<usize>| texture.filter(|&i| gltf.texture_image(i).is_some());
    MaterialBinding {
        base_color_texture: loaded(material.base_color_texture).map_or(TextureSource::White, TextureSource::Texture),
        base_color_factor: material.base_color_factor,
        metallic_roughness_texture: loaded(material.metallic_roughness_texture),
        metallic_factor: material.metallic_factor,
        roughness_factor: material.roughness_factor,
        emissive_texture: loaded(material.emissive_texture),
        emissive_factor: material.emissive_factor,
        normal_texture: loaded(material.normal_texture),
        normal_scale: material.normal_scale,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::camera::projection_matrix;
    use crate::renderer::gltf::bounds::compute_scene_bounds;
    use crate::renderer::gltf::tangents::synthesize_scene;
    use crate::renderer::gltf::{fixtures, Material};
    use crate::renderer::resources::{plan_layout, AttributeSet};

    struct Viewer {
        gltf: Gltf,
        layout: SceneLayout,
        camera: Camera,
        lighting: LightingState,
    }

    impl Viewer {
        fn new(gltf: Gltf) -> Viewer {
            let layout = plan_layout(&gltf, synthesize_scene(&gltf), AttributeSet::WithTangents);
            let bounds = compute_scene_bounds(&gltf);
            Viewer {
                camera: Camera::framing(&bounds),
                lighting: LightingState::new(&bounds, gltf.has_normal_texture()),
                layout,
                gltf,
            }
        }

        fn frame(&self) -> Frame {
            build_frame(&FrameContext {
                gltf: &self.gltf,
                layout: &self.layout,
                camera: &self.camera,
                projection: projection_matrix(4.0 / 3.0, &compute_scene_bounds(&self.gltf)),
                lighting: &self.lighting,
                viewport: (800, 600),
                cursor: Vec2::new(600.0, 150.0),
            })
        }
    }

    #[test]
    fn unchanged_inputs_build_equal_frames() {
        let viewer = Viewer::new(fixtures::textured_quad_scene());
        let first = viewer.frame();
        assert_eq!(first, viewer.frame());
        assert_eq!(first.draw_call_count(), 1);
        assert_eq!(first.markers.len(), 4);
    }

    #[test]
    fn missing_material_draws_white() {
        let viewer = Viewer::new(fixtures::indexed_quad_scene());
        let frame = viewer.frame();
        let material = frame.meshes[0].draw_calls[0].material;
        assert_eq!(material, MaterialBinding::DEFAULT);
        assert_eq!(material.base_color_texture, TextureSource::White);
        assert_eq!(material.base_color_factor, Vec4::ONE);

        // An out-of-range material index takes the same path.
        assert_eq!(material_binding(&viewer.gltf, Some(42)), MaterialBinding::DEFAULT);
    }

    #[test]
    fn textures_resolve_only_with_a_loaded_image() {
        let mut gltf = fixtures::textured_quad_scene();
        gltf.materials[0] = Material {
            base_color_texture: Some(0),
            normal_texture: Some(0),
            emissive_texture: Some(5),
            normal_scale: 0.25,
            ..Default::default()
        };
        let binding = material_binding(&gltf, Some(0));
        assert_eq!(binding.base_color_texture, TextureSource::Texture(0));
        assert_eq!(binding.normal_texture, Some(0));
        assert_eq!(binding.emissive_texture, None);
        assert_eq!(binding.normal_scale, 0.25);

        gltf.images[0].pixels = None;
        let binding = material_binding(&gltf, Some(0));
        assert_eq!(binding.base_color_texture, TextureSource::White);
        assert_eq!(binding.normal_texture, None);
    }


    #[test]
    fn mirrored_nodes_flip_the_front_face() {
        let (mut builder, mesh) = fixtures::indexed_quad_builder(None);
        builder.add_mesh_node(mesh, Mat4::IDENTITY);
        builder.add_mesh_node(mesh, Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)));
        let viewer = Viewer::new(builder.build());
        let frame = viewer.frame();
        assert_eq!(frame.meshes.len(), 2);
        assert_eq!(frame.meshes[0].front_face, gl::CCW);
        assert_eq!(frame.meshes[1].front_face, gl::CW);
        // Both instances draw through the same vertex array.
        assert_eq!(frame.meshes[0].draw_calls[0].vertex_array, frame.meshes[1].draw_calls[0].vertex_array);
    }

    #[test]
    fn matrices_compose_view_and_world() {
        let viewer = Viewer::new(fixtures::indexed_quad_scene());
        let frame = viewer.frame();
        let mesh = &frame.meshes[0];
        let view = viewer.camera.view_matrix();
        assert_eq!(frame.view, view);
        assert!(mesh.model_view.abs_diff_eq(view, 1e-6));
        assert!(mesh.model_view_projection.abs_diff_eq(frame.projection * view, 1e-6));
        assert!(mesh.normal_matrix.abs_diff_eq(view.inverse().transpose(), 1e-6));
    }

    #[test]
    fn lights_are_in_view_space() {
        let mut viewer = Viewer::new(fixtures::indexed_quad_scene());
        viewer.camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        viewer.lighting.directional.direction = Vec3::X;
        let frame = viewer.frame();
        assert!(frame.globals.light_direction.abs_diff_eq(Vec3::X, 1e-6));
        let world = viewer.lighting.point_lights[0].position;
        assert!(frame.point_lights[0].position.abs_diff_eq(world - Vec3::new(0.0, 0.0, 5.0), 1e-5));
        assert_eq!(frame.markers[0].position, world);
        assert_eq!(frame.spot_light.direction, Vec3::NEG_Z);
        assert!((frame.spot_light.cut_off - 8.5f32.to_radians().cos()).abs() < 1e-6);

        viewer.lighting.toggle_light_follows_camera();
        viewer.lighting.toggle_spot_follows_cursor();
        let frame = viewer.frame();
        assert_eq!(frame.globals.light_direction, Vec3::Z);
        assert_eq!(frame.spot_light.direction, Vec3::new(0.25, 0.25, -1.0));
    }

    #[test]
    fn empty_scene_has_no_draws_but_a_finite_rig() {
        let viewer = Viewer::new(fixtures::empty_scene());
        let frame = viewer.frame();
        assert!(frame.meshes.is_empty());
        assert!(frame.view.is_finite());
        assert!(frame.markers.iter().all(|m| m.position.is_finite() && m.size > 0.0));
    }
}
