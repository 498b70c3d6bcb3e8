use std::ffi::c_void;

use crate::renderer::draw_calls::TextureSource;
use crate::renderer::gl;
use crate::renderer::gltf::Gltf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub min_filter: gl::types::GLenum,
    pub mag_filter: gl::types::GLenum,
    pub wrap_s: gl::types::GLenum,
    pub wrap_t: gl::types::GLenum,
}

impl SamplerState {
    /// Filters default to LINEAR, wrapping to REPEAT.
    pub fn of_texture(gltf: &Gltf, texture_index: usize) -> SamplerState {
        let sampler = gltf
            .textures
            .get(texture_index)
            .and_then(|texture| gltf.samplers.get(texture.sampler?))
            .cloned()
            .unwrap_or_default();
        SamplerState {
            min_filter: sampler.min_filter.unwrap_or(gl::LINEAR),
            mag_filter: sampler.mag_filter.unwrap_or(gl::LINEAR),
            wrap_s: sampler.wrap_s,
            wrap_t: sampler.wrap_t,
        }
    }

    pub fn needs_mipmaps(&self) -> bool {
        matches!(
            self.min_filter,
            gl::NEAREST_MIPMAP_NEAREST
                | gl::NEAREST_MIPMAP_LINEAR
                | gl::LINEAR_MIPMAP_NEAREST
                | gl::LINEAR_MIPMAP_LINEAR
        )
    }
}

/// One GL texture per glTF texture whose image was decoded, plus the white
/// texture that stands in for missing base color textures.
pub struct TextureObjects {
    textures: Vec<Option<gl::types::GLuint>>,
    white: gl::types::GLuint,
}

impl TextureObjects {
    pub fn upload(gltf: &Gltf) -> TextureObjects {
        let white = create_texture(
            1,
            1,
            &[255, 255, 255, 255],
            SamplerState {
                min_filter: gl::LINEAR,
                mag_filter: gl::LINEAR,
                wrap_s: gl::REPEAT,
                wrap_t: gl::REPEAT,
            },
        );
        let textures = (0..gltf.textures.len())
            .map(|i| {
                let image = gltf.texture_image(i)?;
                let sampler = SamplerState::of_texture(gltf, i);
                Some(create_texture(image.width(), image.height(), image.as_raw(), sampler))
            })
            .collect::<Vec<_>>();
        log::debug!(
            "uploaded {} of {} textures",
            textures.iter().flatten().count(),
            textures.len()
        );
        TextureObjects { textures, white }
    }

    pub fn get(&self, source: TextureSource) -> gl::types::GLuint {
        match source {
            TextureSource::White => self.white,
            TextureSource::Texture(i) => self.textures.get(i).copied().flatten().unwrap_or(self.white),
        }
    }
}

fn create_texture(width: u32, height: u32, rgba: &[u8], sampler: SamplerState) -> gl::types::GLuint {
    let mut texture = 0;
    gl::call!(gl::GenTextures(1, &mut texture));
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
    gl::call!(gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1));
    gl::call!(gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        gl::RGBA8 as i32,
        width as i32,
        height as i32,
        0,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        rgba.as_ptr() as *const c_void,
    ));
    gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, sampler.min_filter as i32));
    gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, sampler.mag_filter as i32));
    gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, sampler.wrap_s as i32));
    gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, sampler.wrap_t as i32));
    if sampler.needs_mipmaps() {
        gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
    }
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
    texture
}

impl Drop for TextureObjects {
    fn drop(&mut self) {
        let names = self
            .textures
            .iter()
            .flatten()
            .copied()
            .chain([self.white])
            .collect::<Vec<_>>();
        gl::call!(gl::DeleteTextures(names.len() as i32, names.as_ptr()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::{fixtures, Sampler};

    #[test]
    fn sampler_defaults_and_overrides() {
        let mut gltf = fixtures::textured_quad_scene();
        let defaults = SamplerState::of_texture(&gltf, 0);
        assert_eq!(defaults.min_filter, gl::LINEAR);
        assert_eq!(defaults.wrap_s, gl::REPEAT);
        assert!(!defaults.needs_mipmaps());

        gltf.samplers.push(Sampler {
            min_filter: Some(gl::LINEAR_MIPMAP_LINEAR),
            mag_filter: Some(gl::NEAREST),
            wrap_s: gl::MIRRORED_REPEAT,
            wrap_t: gl::CLAMP_TO_EDGE,
        });
        gltf.textures[0].sampler = Some(0);
        let state = SamplerState::of_texture(&gltf, 0);
        assert_eq!(state.mag_filter, gl::NEAREST);
        assert_eq!((state.wrap_s, state.wrap_t), (gl::MIRRORED_REPEAT, gl::CLAMP_TO_EDGE));
        assert!(state.needs_mipmaps());

        // A dangling sampler index falls back to the defaults.
        gltf.textures[0].sampler = Some(3);
        assert_eq!(SamplerState::of_texture(&gltf, 0), defaults);
    }
}
