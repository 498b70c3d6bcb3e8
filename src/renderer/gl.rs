#![allow(clippy::all, dead_code, non_upper_case_globals, unused_imports)]

use std::ffi::{c_void, CString};

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

/// Runs a GL call, and in debug builds, panics with the call site if the call
/// raised an error.
macro_rules! call {
    ($expr:expr) => {{
        #[allow(unused_unsafe)]
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("compiling {kind} shader failed: {log}")]
    Compile { kind: &'static str, log: String },
    #[error("linking shader program failed: {0}")]
    Link(String),
}

/// Compiles a shader of the given type, returning the info log on failure.
pub fn create_shader(shader_type: types::GLenum, source: &str) -> Result<types::GLuint, ShaderError> {
    let kind = match shader_type {
        VERTEX_SHADER => "vertex",
        FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    };
    let shader = call!(CreateShader(shader_type));
    let sources = [source.as_bytes().as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr()));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]).into_owned();
        return Err(ShaderError::Compile { kind, log });
    }
    Ok(shader)
}

/// Links the shaders into a program. The shaders are not deleted.
pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, ShaderError> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        let log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]).into_owned();
        return Err(ShaderError::Link(log));
    }
    Ok(program)
}

/// Returns None if the program has no active uniform with the name.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).ok()?;
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location >= 0).then_some(location)
}

/// Uploads the bytes into the buffer currently bound to `target`.
pub fn buffer_data(target: types::GLenum, data: &[u8], usage: types::GLenum) {
    call!(BufferData(
        target,
        data.len() as types::GLsizeiptr,
        data.as_ptr() as *const c_void,
        usage,
    ));
}
