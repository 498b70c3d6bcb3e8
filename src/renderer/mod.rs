use std::ffi::c_void;
use std::path::Path;

use glam::{Mat4, Vec3};
use sdl2::VideoSubsystem;

pub mod cube;
pub mod draw_calls;
pub mod gl;
pub mod gltf;
pub mod resources;
pub mod scene_pass;
pub mod textures;

use cube::MarkerPipeline;
use draw_calls::{Frame, MaterialBinding, TextureSource};
use gltf::{Gltf, ShaderProgram};
use resources::{DrawCommand, GpuResources, SceneLayout};
use textures::TextureObjects;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("offscreen framebuffer is incomplete (status {0:#x})")]
    IncompleteFramebuffer(gl::types::GLenum),
    #[error("read back {actual} bytes for a {width}x{height} image")]
    SizeMismatch { width: u32, height: u32, actual: usize },
    #[error("could not write the image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Everything GL-side the viewer draws with. Dropping it releases every GL
/// object, so it must go before the GL context.
pub struct Renderer {
    program: ShaderProgram,
    markers: MarkerPipeline,
    textures: TextureObjects,
    resources: GpuResources,
}

impl Renderer {
    pub fn new(
        video: &VideoSubsystem,
        gltf: &Gltf,
        layout: &SceneLayout,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<Renderer, gl::ShaderError> {
        gl::load_with(|s| video.gl_get_proc_address(s) as *const core::ffi::c_void);
        if let Err(err) = video.gl_set_swap_interval(1) {
            log::debug!("vsync not available: {err}");
        }

        let program = gltf::create_program(vertex_shader, fragment_shader)?;
        let markers = MarkerPipeline::new()?;
        let textures = TextureObjects::upload(gltf);
        let resources = GpuResources::upload(gltf, layout);
        gl::call!(gl::Enable(gl::DEPTH_TEST));
        Ok(Renderer {
            program,
            markers,
            textures,
            resources,
        })
    }

    /// Submits the frame to the currently bound framebuffer.
    pub fn render(&self, frame: &Frame) {
        let (width, height) = frame.viewport;
        gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
        gl::call!(gl::ClearColor(0.0, 0.0, 0.0, 1.0));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));

        let program = &self.program;
        gl::call!(gl::UseProgram(program.program));
        let globals = &frame.globals;
        set_bool(program.active_normal_map, globals.normal_map_active);
        set_vec3(program.light_direction, globals.light_direction);
        set_vec3(program.light_intensity, globals.light_intensity);
        for (locations, light) in program.point_lights.iter().zip(&frame.point_lights) {
            set_vec3(locations.position, light.position);
            set_vec3(locations.intensity, light.intensity);
            set_f32(locations.distance, light.distance);
        }
        let spot = &frame.spot_light;
        set_vec3(program.spot_light.position, spot.position);
        set_vec3(program.spot_light.intensity, spot.intensity);
        set_vec3(program.spot_light.direction, spot.direction);
        set_f32(program.spot_light.cut_off, spot.cut_off);
        set_f32(program.spot_light.outer_cut_off, spot.outer_cut_off);
        set_f32(program.spot_light.attenuation_distance, spot.attenuation_distance);

        self.markers.draw(&frame.markers, &frame.view, &frame.projection);

        gl::call!(gl::UseProgram(program.program));
        for mesh in &frame.meshes {
            set_mat4(program.model_view_proj_matrix, &mesh.model_view_projection);
            set_mat4(program.model_view_matrix, &mesh.model_view);
            set_mat4(program.normal_matrix, &mesh.normal_matrix);
            gl::call!(gl::FrontFace(mesh.front_face));
            for draw_call in &mesh.draw_calls {
                let Some(vao) = self.resources.vertex_array(draw_call.vertex_array) else {
                    continue;
                };
                self.bind_material(&draw_call.material);
                gl::call!(gl::BindVertexArray(vao));
                match draw_call.command {
                    DrawCommand::Elements {
                        mode,
                        index_type,
                        byte_offset,
                        count,
                    } => gl::call!(gl::DrawElements(
                        mode,
                        count as i32,
                        index_type.gl_type(),
                        byte_offset as *const c_void,
                    )),
                    DrawCommand::Arrays { mode, count } => {
                        gl::call!(gl::DrawArrays(mode, 0, count as i32))
                    }
                }
            }
        }
        gl::call!(gl::BindVertexArray(0));
    }

    fn bind_material(&self, material: &MaterialBinding) {
        let program = &self.program;
        let bind = |unit: gl::types::GLint, source: TextureSource| {
            gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit as u32));
            gl::call!(gl::BindTexture(gl::TEXTURE_2D, self.textures.get(source)));
        };
        bind(gltf::BASE_COLOR_TEXTURE_UNIT, material.base_color_texture);
        set_vec4(program.base_color_factor, material.base_color_factor.to_array());

        let optional = |texture: Option<usize>| texture.map_or(TextureSource::White, TextureSource::Texture);
        bind(gltf::METALLIC_ROUGHNESS_TEXTURE_UNIT, optional(material.metallic_roughness_texture));
        set_bool(program.has_metallic_roughness_texture, material.metallic_roughness_texture.is_some());
        set_f32(program.metallic_factor, material.metallic_factor);
        set_f32(program.roughness_factor, material.roughness_factor);

        bind(gltf::EMISSIVE_TEXTURE_UNIT, optional(material.emissive_texture));
        set_bool(program.has_emissive_texture, material.emissive_texture.is_some());
        set_vec3(program.emissive_factor, material.emissive_factor);

        bind(gltf::NORMAL_TEXTURE_UNIT, optional(material.normal_texture));
        set_bool(program.has_normal_texture, material.normal_texture.is_some());
        set_f32(program.normal_scale, material.normal_scale);
    }
}

fn set_bool(location: Option<gl::types::GLint>, value: bool) {
    if let Some(location) = location {
        gl::call!(gl::Uniform1i(location, value as i32));
    }
}

fn set_f32(location: Option<gl::types::GLint>, value: f32) {
    if let Some(location) = location {
        gl::call!(gl::Uniform1f(location, value));
    }
}

fn set_vec3(location: Option<gl::types::GLint>, value: Vec3) {
    if let Some(location) = location {
        gl::call!(gl::Uniform3f(location, value.x, value.y, value.z));
    }
}

fn set_vec4(location: Option<gl::types::GLint>, [x, y, z, w]: [f32; 4]) {
    if let Some(location) = location {
        gl::call!(gl::Uniform4f(location, x, y, z, w));
    }
}

fn set_mat4(location: Option<gl::types::GLint>, value: &Mat4) {
    if let Some(location) = location {
        gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, value.as_ref().as_ptr()));
    }
}

/// A framebuffer to render a single frame into, when the viewer writes an
/// image instead of showing a window.
pub struct OffscreenTarget {
    framebuffer: gl::types::GLuint,
    renderbuffers: [gl::types::GLuint; 2],
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub fn new(width: u32, height: u32) -> Result<OffscreenTarget, OutputError> {
        let mut framebuffer = 0;
        let mut renderbuffers = [0; 2];
        gl::call!(gl::GenFramebuffers(1, &mut framebuffer));
        gl::call!(gl::GenRenderbuffers(2, renderbuffers.as_mut_ptr()));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer));
        for (&renderbuffer, (format, attachment)) in renderbuffers.iter().zip([
            (gl::RGBA8, gl::COLOR_ATTACHMENT0),
            (gl::DEPTH_COMPONENT24, gl::DEPTH_ATTACHMENT),
        ]) {
            gl::call!(gl::BindRenderbuffer(gl::RENDERBUFFER, renderbuffer));
            gl::call!(gl::RenderbufferStorage(gl::RENDERBUFFER, format, width as i32, height as i32));
            gl::call!(gl::FramebufferRenderbuffer(gl::FRAMEBUFFER, attachment, gl::RENDERBUFFER, renderbuffer));
        }
        let target = OffscreenTarget {
            framebuffer,
            renderbuffers,
            width,
            height,
        };
        let status = gl::call!(gl::CheckFramebufferStatus(gl::FRAMEBUFFER));
        if status != gl::FRAMEBUFFER_COMPLETE {
            return Err(OutputError::IncompleteFramebuffer(status));
        }
        Ok(target)
    }

    /// Reads the rendered frame back as top-to-bottom RGB rows.
    pub fn read_rgb(&self) -> Vec<u8> {
        let mut rgba = vec![0u8; self.width as usize * self.height as usize * 4];
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, self.framebuffer));
        gl::call!(gl::PixelStorei(gl::PACK_ALIGNMENT, 1));
        gl::call!(gl::ReadPixels(
            0,
            0,
            self.width as i32,
            self.height as i32,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            rgba.as_mut_ptr() as *mut c_void,
        ));
        flip_rows(&mut rgba, self.width as usize * 4);
        rgba.chunks_exact(4).flat_map(|pixel| [pixel[0], pixel[1], pixel[2]]).collect()
    }

    pub fn write_png(&self, path: &Path) -> Result<(), OutputError> {
        let rgb = self.read_rgb();
        let actual = rgb.len();
        let image = image::RgbImage::from_raw(self.width, self.height, rgb).ok_or(OutputError::SizeMismatch {
            width: self.width,
            height: self.height,
            actual,
        })?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

impl Drop for OffscreenTarget {
    fn drop(&mut self) {
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, 0));
        gl::call!(gl::DeleteRenderbuffers(2, self.renderbuffers.as_ptr()));
        gl::call!(gl::DeleteFramebuffers(1, &self.framebuffer));
    }
}

/// Reverses the order of the rows, turning GL's bottom-up readback into a
/// top-down image.
pub fn flip_rows(pixels: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = pixels.len() / row_bytes;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (upper, lower) = pixels.split_at_mut(bottom * row_bytes);
        upper[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut lower[..row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_rows_reverses_row_order() {
        let mut pixels = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut pixels, 2);
        assert_eq!(pixels, [3, 3, 2, 2, 1, 1]);

        let mut pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        flip_rows(&mut pixels, 4);
        assert_eq!(pixels, [5, 6, 7, 8, 1, 2, 3, 4]);

        let mut single_row = vec![9, 8, 7];
        flip_rows(&mut single_row, 3);
        assert_eq!(single_row, [9, 8, 7]);
    }
}
