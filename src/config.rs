use std::path::PathBuf;

use clap::Parser;
use glam::Vec3;

use crate::camera::Camera;

#[derive(Parser, Debug)]
#[command(name = "gltf-viewer", about = "View a glTF 2.0 scene")]
pub struct Args {
    /// The .gltf or .glb file to view
    pub file: PathBuf,
    /// Initial camera, as eye_x,eye_y,eye_z,center_x,center_y,center_z,up_x,up_y,up_z
    #[arg(long, allow_hyphen_values = true)]
    pub lookat: Option<String>,
    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    #[arg(long, default_value_t = 720)]
    pub height: u32,
    /// Render one frame into this PNG file instead of opening a window
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Replace the built-in vertex shader
    #[arg(long)]
    pub vertex_shader: Option<PathBuf>,
    /// Replace the built-in fragment shader
    #[arg(long)]
    pub fragment_shader: Option<PathBuf>,
    /// Don't bind or synthesize TANGENT attributes
    #[arg(long)]
    pub without_tangents: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("--lookat needs 9 comma-separated numbers, got {0}")]
    LookatCount(usize),
    #[error("--lookat value {0:?} is not a number")]
    LookatNumber(String),
    #[error("--lookat eye and center must differ")]
    LookatDegenerate,
    #[error("--width and --height must be positive")]
    EmptyViewport,
}

/// Validated settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub file: PathBuf,
    pub camera: Option<Camera>,
    pub width: u32,
    pub height: u32,
    pub output: Option<PathBuf>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    pub with_tangents: bool,
}

impl TryFrom<Args> for ViewerConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<ViewerConfig, ConfigError> {
        if args.width == 0 || args.height == 0 {
            return Err(ConfigError::EmptyViewport);
        }
        Ok(ViewerConfig {
            camera: args.lookat.as_deref().map(parse_lookat).transpose()?,
            file: args.file,
            width: args.width,
            height: args.height,
            output: args.output,
            vertex_shader: args.vertex_shader,
            fragment_shader: args.fragment_shader,
            with_tangents: !args.without_tangents,
        })
    }
}

pub fn parse_lookat(lookat: &str) -> Result<Camera, ConfigError> {
    let values = lookat
        .split(',')
        .map(|value| {
            let value = value.trim();
            value
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ConfigError::LookatNumber(value.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let [ex, ey, ez, cx, cy, cz, ux, uy, uz] = values[..] else {
        return Err(ConfigError::LookatCount(values.len()));
    };
    let camera = Camera::new(Vec3::new(ex, ey, ez), Vec3::new(cx, cy, cz), Vec3::new(ux, uy, uz));
    if camera.eye == camera.center {
        return Err(ConfigError::LookatDegenerate);
    }
    Ok(camera)
}
