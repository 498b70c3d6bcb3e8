//! The unit cube used to show where the point lights are.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::renderer::draw_calls::MarkerDraw;
use crate::renderer::gl::{self, ShaderError};

const MARKER_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
uniform mat4 uViewMatrix;
uniform mat4 uProjMatrix;
uniform vec3 uCubePosition;
uniform float uCubeSize;
void main() {
    gl_Position = uProjMatrix * uViewMatrix * vec4(uCubePosition + POSITION * uCubeSize, 1.0);
}
"#;

const MARKER_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
uniform vec3 uColor;
out vec4 FRAG_COLOR;
void main() {
    FRAG_COLOR = vec4(pow(uColor, vec3(1.0 / 2.2)), 1.0);
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct CubeVertex {
    pub position: [f32; 3],
}

/// A cube of side 1 centered on the origin, as 12 counter-clockwise triangles.
pub fn unit_cube() -> [CubeVertex; 36] {
    // (normal axis, sign) for each face, and the two in-plane axes ordered so
    // that u x v points out of the face.
    const FACES: [(usize, f32, usize, usize); 6] = [
        (0, 1.0, 1, 2),
        (0, -1.0, 2, 1),
        (1, 1.0, 2, 0),
        (1, -1.0, 0, 2),
        (2, 1.0, 0, 1),
        (2, -1.0, 1, 0),
    ];
    const CORNERS: [(f32, f32); 6] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
    let mut vertices = [CubeVertex { position: [0.0; 3] }; 36];
    for (face, &(axis, sign, u, v)) in FACES.iter().enumerate() {
        for (corner, &(cu, cv)) in CORNERS.iter().enumerate() {
            let mut position = [0.0; 3];
            position[axis] = 0.5 * sign;
            position[u] = cu;
            position[v] = cv;
            vertices[face * 6 + corner].position = position;
        }
    }
    vertices
}

pub struct MarkerPipeline {
    program: gl::types::GLuint,
    vao: gl::types::GLuint,
    vbo: gl::types::GLuint,
    view_matrix: Option<gl::types::GLint>,
    proj_matrix: Option<gl::types::GLint>,
    cube_position: Option<gl::types::GLint>,
    cube_size: Option<gl::types::GLint>,
    color: Option<gl::types::GLint>,
}

impl MarkerPipeline {
    pub fn new() -> Result<MarkerPipeline, ShaderError> {
        let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, MARKER_VERTEX_SHADER)?;
        let fragment_shader = gl::create_shader(gl::FRAGMENT_SHADER, MARKER_FRAGMENT_SHADER)?;
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        let program = program?;

        let mut vao = 0;
        let mut vbo = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::GenBuffers(1, &mut vbo));
        gl::call!(gl::BindVertexArray(vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, vbo));
        gl::buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&unit_cube()), gl::STATIC_DRAW);
        gl::call!(gl::EnableVertexAttribArray(0));
        gl::call!(gl::VertexAttribPointer(
            0,
            3,
            gl::FLOAT,
            gl::FALSE,
            std::mem::size_of::<CubeVertex>() as i32,
            std::ptr::null(),
        ));
        gl::call!(gl::BindVertexArray(0));

        Ok(MarkerPipeline {
            program,
            vao,
            vbo,
            view_matrix: gl::get_uniform_location(program, "uViewMatrix"),
            proj_matrix: gl::get_uniform_location(program, "uProjMatrix"),
            cube_position: gl::get_uniform_location(program, "uCubePosition"),
            cube_size: gl::get_uniform_location(program, "uCubeSize"),
            color: gl::get_uniform_location(program, "uColor"),
        })
    }

    pub fn draw(&self, markers: &[MarkerDraw], view: &Mat4, projection: &Mat4) {
        gl::call!(gl::UseProgram(self.program));
        gl::call!(gl::BindVertexArray(self.vao));
        if let Some(location) = self.view_matrix {
            gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, view.as_ref().as_ptr()));
        }
        if let Some(location) = self.proj_matrix {
            gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, projection.as_ref().as_ptr()));
        }
        for marker in markers {
            if let Some(location) = self.cube_position {
                gl::call!(gl::Uniform3fv(location, 1, marker.position.as_ref().as_ptr()));
            }
            if let Some(location) = self.cube_size {
                gl::call!(gl::Uniform1f(location, marker.size));
            }
            if let Some(location) = self.color {
                gl::call!(gl::Uniform3fv(location, 1, marker.color.as_ref().as_ptr()));
            }
            gl::call!(gl::DrawArrays(gl::TRIANGLES, 0, 36));
        }
        gl::call!(gl::BindVertexArray(0));
    }
}

impl Drop for MarkerPipeline {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.vao));
        gl::call!(gl::DeleteBuffers(1, &self.vbo));
        gl::call!(gl::DeleteProgram(self.program));
    }
}
