//! GPU-side buffers and vertex arrays for a glTF scene.
//!
//! Building happens in two steps: [`plan_layout`] decides, without touching
//! GL, what each vertex array binds and how each primitive is drawn, and
//! [`GpuResources::upload`] creates the GL objects for that plan.

use std::ffi::c_void;

use glam::Vec4;

use crate::renderer::gl;
use crate::renderer::gltf::accessor::{self, AccessorView, Attribute, IndexType};
use crate::renderer::gltf::tangents::SceneTangents;
use crate::renderer::gltf::{Gltf, Primitive};

/// Which vertex attributes get bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSet {
    /// POSITION, NORMAL and TEXCOORD_0.
    Baseline,
    /// The baseline, and TANGENT, synthesized where the scene doesn't have it.
    WithTangents,
}

impl AttributeSet {
    fn attributes(self) -> &'static [Attribute] {
        match self {
            AttributeSet::Baseline => &[Attribute::Position, Attribute::Normal, Attribute::TexCoord0],
            AttributeSet::WithTangents => &[
                Attribute::Position,
                Attribute::Normal,
                Attribute::TexCoord0,
                Attribute::Tangent,
            ],
        }
    }
}

/// The vertex arrays of one mesh's primitives: `begin..begin + count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaoRange {
    pub begin: usize,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSource {
    /// Read from a scene buffer, as the resolved accessor describes.
    Scene(AccessorView),
    /// Read from this vertex array's tightly packed synthesized tangents.
    SynthesizedTangents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub attribute: Attribute,
    pub source: AttributeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    Elements {
        mode: gl::types::GLenum,
        index_type: IndexType,
        /// Offset of the first index in the bound element array buffer.
        byte_offset: usize,
        count: usize,
    },
    Arrays {
        mode: gl::types::GLenum,
        count: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexArrayLayout {
    pub attributes: Vec<AttributeBinding>,
    /// The scene buffer bound as the element array buffer.
    pub element_buffer: Option<usize>,
    pub synthesized_tangents: Option<Vec<Vec4>>,
    /// None if the primitive can't be drawn, e.g. because of an unsupported
    /// index type.
    pub draw: Option<DrawCommand>,
}

/// The plan for every vertex array of the scene, in mesh order, then
/// primitive order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLayout {
    pub vertex_arrays: Vec<VertexArrayLayout>,
    pub mesh_ranges: Vec<VaoRange>,
}

impl SceneLayout {
    pub fn mesh_range(&self, mesh_index: usize) -> Option<VaoRange> {
        self.mesh_ranges.get(mesh_index).copied()
    }

    pub fn draw(&self, vertex_array: usize) -> Option<DrawCommand> {
        self.vertex_arrays.get(vertex_array)?.draw
    }
}

/// Plans one vertex array per primitive. `tangents` is consumed for the
/// primitives that need synthesized tangents, and ignored for the baseline
/// attribute set.
pub fn plan_layout(gltf: &Gltf, mut tangents: SceneTangents, attribute_set: AttributeSet) -> SceneLayout {
    let mut layout = SceneLayout::default();
    for (mesh_index, mesh) in gltf.meshes.iter().enumerate() {
        layout.mesh_ranges.push(VaoRange {
            begin: layout.vertex_arrays.len(),
            count: mesh.primitives.len(),
        });
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            let mut vertex_array = VertexArrayLayout::default();
            for &attribute in attribute_set.attributes() {
                if let Some(view) = accessor::resolve_attribute(gltf, primitive, attribute) {
                    if view.target.is_some_and(|target| target != gl::ARRAY_BUFFER) {
                        log::warn!(
                            "mesh {mesh_index} primitive {primitive_index}: {} accessor's buffer view is not an ARRAY_BUFFER",
                            attribute.semantic(),
                        );
                    }
                    vertex_array.attributes.push(AttributeBinding {
                        attribute,
                        source: AttributeSource::Scene(view),
                    });
                } else if attribute == Attribute::Tangent {
                    if let Some(synthesized) = tangents.remove(&(mesh_index, primitive_index)) {
                        vertex_array.attributes.push(AttributeBinding {
                            attribute,
                            source: AttributeSource::SynthesizedTangents,
                        });
                        vertex_array.synthesized_tangents = Some(synthesized.per_vertex);
                    }
                }
            }
            vertex_array.draw = plan_draw(gltf, primitive, mesh_index, primitive_index, &mut vertex_array);
            layout.vertex_arrays.push(vertex_array);
        }
    }
    layout
}

fn plan_draw(
    gltf: &Gltf,
    primitive: &Primitive,
    mesh_index: usize,
    primitive_index: usize,
    vertex_array: &mut VertexArrayLayout,
) -> Option<DrawCommand> {
    match accessor::resolve_indices(gltf, primitive) {
        Ok(Some(indices)) => {
            if indices.view.target.is_some_and(|target| target != gl::ELEMENT_ARRAY_BUFFER) {
                log::warn!(
                    "mesh {mesh_index} primitive {primitive_index}: index accessor's buffer view is not an ELEMENT_ARRAY_BUFFER"
                );
            }
            vertex_array.element_buffer = Some(indices.view.buffer);
            return Some(DrawCommand::Elements {
                mode: primitive.mode,
                index_type: indices.index_type,
                byte_offset: indices.view.byte_offset,
                count: indices.view.count,
            });
        }
        Ok(None) => {}
        Err(err) => {
            log::warn!("mesh {mesh_index} primitive {primitive_index} is not drawn: {err}");
            return None;
        }
    }

    // Non-indexed: the vertex count of POSITION, or of the first attribute.
    let counts = primitive
        .attributes
        .iter()
        .filter_map(|(name, &accessor)| Some((name.as_str(), gltf.accessors.get(accessor)?.count)))
        .collect::<Vec<_>>();
    let count = counts
        .iter()
        .find(|(name, _)| *name == Attribute::Position.semantic())
        .or(counts.first())
        .map(|&(_, count)| count)?;
    let min_count = counts.iter().map(|&(_, count)| count).min().unwrap_or(count);
    if min_count != count {
        log::warn!(
            "mesh {mesh_index} primitive {primitive_index}: attributes have different counts, drawing {min_count} vertices"
        );
    }
    Some(DrawCommand::Arrays {
        mode: primitive.mode,
        count: min_count,
    })
}

/// The GL buffers and vertex arrays of a scene. Vertex array `i` is
/// [`SceneLayout::vertex_arrays`]`[i]`.
pub struct GpuResources {
    buffers: Vec<gl::types::GLuint>,
    tangent_buffers: Vec<gl::types::GLuint>,
    vertex_arrays: Vec<gl::types::GLuint>,
}

impl GpuResources {
    pub fn upload(gltf: &Gltf, layout: &SceneLayout) -> GpuResources {
        let mut buffers = vec![0; gltf.buffers.len()];
        if !buffers.is_empty() {
            gl::call!(gl::GenBuffers(buffers.len() as i32, buffers.as_mut_ptr()));
        }
        for (&buffer, data) in buffers.iter().zip(&gltf.buffers) {
            gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffer));
            gl::buffer_data(gl::ARRAY_BUFFER, data, gl::STATIC_DRAW);
        }

        let mut vertex_arrays = vec![0; layout.vertex_arrays.len()];
        if !vertex_arrays.is_empty() {
            gl::call!(gl::GenVertexArrays(vertex_arrays.len() as i32, vertex_arrays.as_mut_ptr()));
        }
        let mut tangent_buffers = Vec::new();
        for (&vao, vertex_array) in vertex_arrays.iter().zip(&layout.vertex_arrays) {
            gl::call!(gl::BindVertexArray(vao));
            for binding in &vertex_array.attributes {
                let location = binding.attribute.location();
                gl::call!(gl::EnableVertexAttribArray(location));
                match binding.source {
                    AttributeSource::Scene(view) => {
                        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffers[view.buffer]));
                        gl::call!(gl::VertexAttribPointer(
                            location,
                            view.component_count as i32,
                            view.component_type,
                            if view.normalized { gl::TRUE } else { gl::FALSE },
                            view.byte_stride as i32,
                            view.byte_offset as *const c_void,
                        ));
                    }
                    AttributeSource::SynthesizedTangents => {
                        let Some(tangents) = &vertex_array.synthesized_tangents else {
                            continue;
                        };
                        let mut tangent_buffer = 0;
                        gl::call!(gl::GenBuffers(1, &mut tangent_buffer));
                        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, tangent_buffer));
                        gl::buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(tangents), gl::STATIC_DRAW);
                        gl::call!(gl::VertexAttribPointer(
                            location,
                            4,
                            gl::FLOAT,
                            gl::FALSE,
                            0,
                            std::ptr::null(),
                        ));
                        tangent_buffers.push(tangent_buffer);
                    }
                }
            }
            if let Some(element_buffer) = vertex_array.element_buffer {
                gl::call!(gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, buffers[element_buffer]));
            }
        }
        gl::call!(gl::BindVertexArray(0));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));

        log::info!("Number of VAOs: {}", vertex_arrays.len());
        GpuResources {
            buffers,
            tangent_buffers,
            vertex_arrays,
        }
    }

    pub fn vertex_array(&self, index: usize) -> Option<gl::types::GLuint> {
        self.vertex_arrays.get(index).copied()
    }
}

impl Drop for GpuResources {
    fn drop(&mut self) {
        if !self.vertex_arrays.is_empty() {
            gl::call!(gl::DeleteVertexArrays(self.vertex_arrays.len() as i32, self.vertex_arrays.as_ptr()));
        }
        for buffers in [&self.buffers, &self.tangent_buffers] {
            if !buffers.is_empty() {
                gl::call!(gl::DeleteBuffers(buffers.len() as i32, buffers.as_ptr()));
            }
        }
    }
}
