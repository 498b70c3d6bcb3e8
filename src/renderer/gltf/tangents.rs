//! Synthesizes flat per-triangle tangents for primitives that don't have a
//! TANGENT attribute, from their positions and texture coordinates.

use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_1_SQRT_2;

use glam::{Vec2, Vec3, Vec4};

use crate::renderer::gl;
use crate::renderer::gltf::accessor::{self, AccessorError, Attribute};
use crate::renderer::gltf::{ElementType, Gltf, Primitive};

/// normalize((1, 0, 0, 1)), used for vertices no triangle covers.
pub const FALLBACK_TANGENT: Vec4 = Vec4::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveTangents {
    /// One tangent per triangle corner, in draw order.
    pub visited: Vec<Vec4>,
    /// One tangent per vertex of the POSITION accessor, for uploading as a
    /// vertex attribute.
    pub per_vertex: Vec<Vec4>,
    pub degenerate_triangles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TangentError {
    #[error("POSITION accessor is {0:?}, expected VEC3")]
    PositionNotVec3(ElementType),
    #[error("TEXCOORD_0 accessor is {0:?}, expected VEC2")]
    TexCoordNotVec2(ElementType),
    #[error("POSITION and TEXCOORD_0 must have float components")]
    NotFloat,
    #[error(transparent)]
    Indices(#[from] AccessorError),
    #[error("index accessor reaches outside its buffer")]
    IndicesOutOfRange,
    #[error("vertex {0} is outside the POSITION or TEXCOORD_0 accessor")]
    VertexOutOfRange(u32),
}

/// Synthesized tangents keyed by (mesh index, primitive index).
pub type SceneTangents = HashMap<(usize, usize), PrimitiveTangents>;

/// Walks the default scene and synthesizes tangents for every reachable
/// primitive without a TANGENT attribute. Each primitive is synthesized once,
/// however many nodes instance its mesh. Primitives that can't be synthesized
/// are left out with a warning.
pub fn synthesize_scene(gltf: &Gltf) -> SceneTangents {
    let mut tangents = SceneTangents::new();
    let mut seen = HashSet::new();
    gltf.walk_scene(|_, node, _| {
        let Some(mesh_index) = node.mesh_index else {
            return;
        };
        let Some(mesh) = gltf.meshes.get(mesh_index) else {
            return;
        };
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            if primitive.attributes.contains_key(Attribute::Tangent.semantic())
                || !seen.insert((mesh_index, primitive_index))
            {
                continue;
            }
            match synthesize_primitive(gltf, primitive) {
                Ok(Some(primitive_tangents)) => {
                    if primitive_tangents.degenerate_triangles > 0 {
                        log::debug!(
                            "mesh {mesh_index} primitive {primitive_index}: {} triangles with degenerate texture coordinates",
                            primitive_tangents.degenerate_triangles,
                        );
                    }
                    tangents.insert((mesh_index, primitive_index), primitive_tangents);
                }
                Ok(None) => {}
                Err(err) => log::warn!(
                    "not synthesizing tangents for mesh {mesh_index} primitive {primitive_index}: {err}"
                ),
            }
        }
    });
    tangents
}

/// Synthesizes tangents for one primitive. Returns `Ok(None)` if the
/// primitive lacks POSITION or TEXCOORD_0, or isn't made of triangles.
pub fn synthesize_primitive(
    gltf: &Gltf,
    primitive: &Primitive,
) -> Result<Option<PrimitiveTangents>, TangentError> {
    let Some(positions) = accessor::resolve_attribute(gltf, primitive, Attribute::Position) else {
        return Ok(None);
    };
    let Some(uvs) = accessor::resolve_attribute(gltf, primitive, Attribute::TexCoord0) else {
        return Ok(None);
    };
    if positions.element_type != ElementType::Vec3 {
        return Err(TangentError::PositionNotVec3(positions.element_type));
    }
    if uvs.element_type != ElementType::Vec2 {
        return Err(TangentError::TexCoordNotVec2(uvs.element_type));
    }
    if positions.component_type != gl::FLOAT || uvs.component_type != gl::FLOAT {
        return Err(TangentError::NotFloat);
    }

    let order = match accessor::resolve_indices(gltf, primitive)? {
        Some(indices) => indices
            .read_all(gltf)
            .ok_or(TangentError::IndicesOutOfRange)?,
        None => (0..positions.count as u32).collect(),
    };
    let Some(triangles) = assemble_triangles(primitive.mode, order.len()) else {
        return Ok(None);
    };

    let mut tangents = PrimitiveTangents {
        visited: Vec::with_capacity(triangles.len() * 3),
        per_vertex: vec![FALLBACK_TANGENT; positions.count],
        degenerate_triangles: 0,
    };
    for triangle in triangles {
        let vertices = triangle.map(|corner| order[corner]);
        let mut corner_positions = [Vec3::ZERO; 3];
        let mut corner_uvs = [Vec2::ZERO; 3];
        for (corner, &vertex) in vertices.iter().enumerate() {
            let i = vertex as usize;
            corner_positions[corner] = positions
                .read_vec3(gltf, i)
                .ok_or(TangentError::VertexOutOfRange(vertex))?;
            corner_uvs[corner] = uvs
                .read_vec2(gltf, i)
                .ok_or(TangentError::VertexOutOfRange(vertex))?;
        }
        let (tangent, degenerate) = triangle_tangent(corner_positions, corner_uvs);
        if degenerate {
            tangents.degenerate_triangles += 1;
        }
        for vertex in vertices {
            tangents.visited.push(tangent);
            tangents.per_vertex[vertex as usize] = tangent;
        }
    }
    Ok(Some(tangents))
}

/// Below this sine of the angle between the UV edges, a triangle's texture
/// coordinates are considered collinear.
const DEGENERATE_UV_AREA: f32 = 1e-6;

/// The tangent of one triangle, as normalize((t, 1)) where t points along
/// increasing U. The flag is set if the texture coordinates are degenerate, in
/// which case t is taken along the first edge instead.
pub fn triangle_tangent(positions: [Vec3; 3], uvs: [Vec2; 3]) -> (Vec4, bool) {
    let edge1 = positions[1] - positions[0];
    let edge2 = positions[2] - positions[0];
    let delta_uv1 = uvs[1] - uvs[0];
    let delta_uv2 = uvs[2] - uvs[0];
    let denominator = delta_uv1.perp_dot(delta_uv2);
    // Relative to the UV edge lengths so that small atlas regions still count.
    if denominator.abs() <= DEGENERATE_UV_AREA * delta_uv1.length() * delta_uv2.length() {
        let direction = edge1.try_normalize().unwrap_or(Vec3::X);
        return (direction.extend(1.0).normalize(), true);
    }
    let f = 1.0 / denominator;
    let direction = f * (delta_uv2.y * edge1 - delta_uv1.y * edge2);
    (direction.extend(1.0).normalize(), false)
}

/// Splits `vertex_count` vertices drawn in `mode` into triangles of positions
/// in the draw order, matching GL's winding for strips. None for modes that
/// don't produce triangles.
fn assemble_triangles(mode: gl::types::GLenum, vertex_count: usize) -> Option<Vec<[usize; 3]>> {
    let triangle_count = match mode {
        gl::TRIANGLES => vertex_count / 3,
        gl::TRIANGLE_STRIP | gl::TRIANGLE_FAN => vertex_count.saturating_sub(2),
        _ => return None,
    };
    let triangles = (0..triangle_count).map(|i| match mode {
        gl::TRIANGLES => [3 * i, 3 * i + 1, 3 * i + 2],
        gl::TRIANGLE_STRIP if i % 2 == 1 => [i + 1, i, i + 2],
        gl::TRIANGLE_STRIP => [i, i + 1, i + 2],
        _ => [0, i + 1, i + 2],
    });
    Some(triangles.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::fixtures;
    use glam::Mat4;

    fn assert_close(a: Vec4, b: Vec4) {
        assert!((a - b).abs().max_element() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn single_triangle_gets_one_flat_tangent() {
        let gltf = fixtures::triangle_scene();
        let tangents = synthesize_scene(&gltf);
        let triangle = &tangents[&(0, 0)];

        let expected = Vec4::new(1.0, 0.0, 0.0, 1.0).normalize();
        assert_eq!(triangle.visited.len(), 3);
        for &tangent in &triangle.visited {
            assert_close(tangent, expected);
        }
        assert_eq!(triangle.visited, triangle.per_vertex);
        assert_eq!(triangle.degenerate_triangles, 0);
    }

    #[test]
    fn synthesis_is_bit_identical_when_repeated() {
        let mut gltf = fixtures::indexed_quad_scene();
        // Make the second triangle's tangent differ from the first.
        gltf.buffers[0][12 * 3..12 * 3 + 4].copy_from_slice(&2.0f32.to_le_bytes());
        let bits = |tangents: &SceneTangents| {
            tangents[&(0, 0)]
                .visited
                .iter()
                .flat_map(|t| t.to_array().map(f32::to_bits))
                .collect::<Vec<_>>()
        };
        assert_eq!(bits(&synthesize_scene(&gltf)), bits(&synthesize_scene(&gltf)));
    }

    #[test]
    fn indexed_primitives_follow_the_index_order() {
        let gltf = fixtures::indexed_quad_scene();
        let tangents = synthesize_primitive(&gltf, &gltf.meshes[0].primitives[0])
            .unwrap()
            .unwrap();
        assert_eq!(tangents.visited.len(), 6);
        assert_eq!(tangents.per_vertex.len(), 4);
        for tangent in tangents.visited.iter().chain(&tangents.per_vertex) {
            assert_close(*tangent, FALLBACK_TANGENT);
        }
    }

    #[test]
    fn degenerate_uvs_fall_back_to_the_first_edge() {
        let (tangent, degenerate) = triangle_tangent(
            [Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), Vec3::Z],
            [Vec2::ZERO, Vec2::ZERO, Vec2::ZERO],
        );
        assert!(degenerate);
        assert!(tangent.is_finite());
        assert_close(tangent, Vec4::new(0.0, 1.0, 0.0, 1.0).normalize());

        let (tangent, degenerate) = triangle_tangent([Vec3::ZERO; 3], [Vec2::ZERO; 3]);
        assert!(degenerate);
        assert_close(tangent, FALLBACK_TANGENT);

        let (_, degenerate) = triangle_tangent(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [Vec2::ZERO, Vec2::ONE, Vec2::splat(2.0)],
        );
        assert!(degenerate);
    }

    #[test]
    fn small_atlas_regions_are_not_degenerate() {
        let corner = Vec2::splat(0.5);
        let (tangent, degenerate) = triangle_tangent(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [corner, corner + Vec2::new(1e-4, 0.0), corner + Vec2::new(0.0, 1e-4)],
        );
        assert!(!degenerate);
        assert!(tangent.truncate().normalize().abs_diff_eq(Vec3::X, 1e-4), "{tangent}");
    }

    #[test]
    fn wrong_uv_type_skips_the_primitive() {
        let mut gltf = fixtures::triangle_scene();
        let uv_accessor = gltf.meshes[0].primitives[0].attributes["TEXCOORD_0"];
        gltf.accessors[uv_accessor].element_type = ElementType::Vec3;
        gltf.accessors[uv_accessor].count = 2;
        assert_eq!(
            synthesize_primitive(&gltf, &gltf.meshes[0].primitives[0]),
            Err(TangentError::TexCoordNotVec2(ElementType::Vec3))
        );
        assert!(synthesize_scene(&gltf).is_empty());
    }

    #[test]
    fn existing_tangents_and_missing_uvs_are_left_alone() {
        let mut gltf = fixtures::triangle_scene();
        let positions = gltf.meshes[0].primitives[0].attributes["POSITION"];
        gltf.meshes[0].primitives[0]
            .attributes
            .insert("TANGENT".to_string(), positions);
        assert!(synthesize_scene(&gltf).is_empty());

        let mut gltf = fixtures::triangle_scene();
        gltf.meshes[0].primitives[0].attributes.remove("TEXCOORD_0");
        assert_eq!(synthesize_primitive(&gltf, &gltf.meshes[0].primitives[0]), Ok(None));
    }

    #[test]
    fn instanced_meshes_are_synthesized_once() {
        let (mut builder, mesh) = fixtures::indexed_quad_builder(None);
        builder.add_mesh_node(mesh, Mat4::IDENTITY);
        builder.add_mesh_node(mesh, Mat4::from_translation(Vec3::X));
        let gltf = builder.build();
        assert_eq!(synthesize_scene(&gltf).len(), 1);
    }

    #[test]
    fn out_of_range_indices_are_reported() {
        let mut gltf = fixtures::indexed_quad_scene();
        let index_view = gltf.accessors[gltf.meshes[0].primitives[0].indices.unwrap()]
            .buffer_view
            .unwrap();
        let offset = gltf.buffer_views[index_view].byte_offset;
        gltf.buffers[0][offset..offset + 2].copy_from_slice(&9u16.to_le_bytes());
        assert_eq!(
            synthesize_primitive(&gltf, &gltf.meshes[0].primitives[0]),
            Err(TangentError::VertexOutOfRange(9))
        );
    }

    #[test]
    fn strips_and_fans_are_assembled_like_gl() {
        assert_eq!(
            assemble_triangles(gl::TRIANGLE_STRIP, 5),
            Some(vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]])
        );
        assert_eq!(
            assemble_triangles(gl::TRIANGLE_FAN, 4),
            Some(vec![[0, 1, 2], [0, 2, 3]])
        );
        assert_eq!(assemble_triangles(gl::TRIANGLES, 7).map(|t| t.len()), Some(2));
        assert_eq!(assemble_triangles(gl::LINES, 6), None);
    }
}
