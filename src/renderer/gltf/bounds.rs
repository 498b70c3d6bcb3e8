use glam::Vec3;

use crate::renderer::gltf::accessor::{self, Attribute};
use crate::renderer::gltf::Gltf;

/// A world-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Zero-sized bounds at the origin, which is what scenes without meshes get.
    pub const DEGENERATE: Bounds = Bounds {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.diagonal().length() <= f32::EPSILON
    }

    /// The length of the diagonal, or `fallback` if the bounds have no extent.
    /// Anything scaled by the scene's size should go through this.
    pub fn extent_or(&self, fallback: f32) -> f32 {
        if self.is_degenerate() {
            fallback
        } else {
            self.diagonal().length()
        }
    }
}

/// Computes the bounds of every POSITION in the default scene, transformed
/// into world space.
pub fn compute_scene_bounds(gltf: &Gltf) -> Bounds {
    let mut bounds: Option<Bounds> = None;
    gltf.walk_scene(|_, node, world| {
        let Some(mesh) = node.mesh_index.and_then(|i| gltf.meshes.get(i)) else {
            return;
        };
        for primitive in &mesh.primitives {
            let Some(positions) = accessor::resolve_attribute(gltf, primitive, Attribute::Position)
            else {
                continue;
            };
            for i in 0..positions.count {
                let Some(position) = positions.read_vec3(gltf, i) else {
                    break;
                };
                let position = world.transform_point3(position);
                bounds = Some(match bounds {
                    Some(Bounds { min, max }) => Bounds {
                        min: min.min(position),
                        max: max.max(position),
                    },
                    None => Bounds {
                        min: position,
                        max: position,
                    },
                });
            }
        }
    });
    bounds.unwrap_or(Bounds::DEGENERATE)
}
