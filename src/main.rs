use std::error::Error;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use glam::{Mat4, Vec2};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Scancode;
use sdl2::video::{GLContext, GLProfile, Window};
use sdl2::{EventPump, VideoSubsystem};

mod camera;
mod config;
mod controls;
mod lighting;
mod renderer;

use camera::controller::{CameraController, InputState, MoveKey};
use camera::Camera;
use config::{Args, ViewerConfig};
use controls::{Control, Controls, Effect};
use lighting::LightingState;
use renderer::gltf::bounds::{compute_scene_bounds, Bounds};
use renderer::gltf::tangents::{self, SceneTangents};
use renderer::gltf::{load_gltf_file, Gltf, Loaded, DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};
use renderer::resources::{plan_layout, AttributeSet, SceneLayout};
use renderer::scene_pass::{build_frame, FrameContext};
use renderer::{OffscreenTarget, Renderer};

const MOVE_KEYS: [(Scancode, MoveKey); 8] = [
    (Scancode::W, MoveKey::Forward),
    (Scancode::S, MoveKey::Backward),
    (Scancode::A, MoveKey::Left),
    (Scancode::D, MoveKey::Right),
    (Scancode::Up, MoveKey::Up),
    (Scancode::Down, MoveKey::Down),
    (Scancode::Q, MoveKey::RollLeft),
    (Scancode::E, MoveKey::RollRight),
];

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = ViewerConfig::try_from(Args::parse())?;

    let Loaded { gltf, warnings } =
        load_gltf_file(&config.file).with_context(|| format!("loading {}", config.file.display()))?;
    for warning in &warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "loaded {}: {} nodes, {} meshes, {} primitives, {} materials, {} textures",
        config.file.display(),
        gltf.nodes.len(),
        gltf.meshes.len(),
        gltf.primitive_count(),
        gltf.materials.len(),
        gltf.textures.len(),
    );

    let bounds = compute_scene_bounds(&gltf);
    log::debug!("scene bounds: {:?}", bounds);
    let (tangents, attribute_set) = if config.with_tangents {
        (tangents::synthesize_scene(&gltf), AttributeSet::WithTangents)
    } else {
        (SceneTangents::new(), AttributeSet::Baseline)
    };
    let layout = plan_layout(&gltf, tangents, attribute_set);
    let vertex_shader = shader_source(config.vertex_shader.as_deref(), DEFAULT_VERTEX_SHADER)?;
    let fragment_shader = shader_source(config.fragment_shader.as_deref(), DEFAULT_FRAGMENT_SHADER)?;

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // Linear->SRGB conversion is done in shader, thanks to lacking WebGL support.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let mut window_builder = video_subsystem.window(env!("CARGO_PKG_NAME"), config.width, config.height);
    window_builder.opengl();
    if config.output.is_some() {
        window_builder.hidden();
    } else {
        window_builder.resizable();
    }
    let window = window_builder.build()?;
    let gl_context = window.gl_create_context().map_err(SdlErr)?;

    let renderer = Renderer::new(&video_subsystem, &gltf, &layout, &vertex_shader, &fragment_shader)
        .context("creating the shader programs")?;
    let camera = config.camera.unwrap_or_else(|| Camera::framing(&bounds));
    let lighting = LightingState::new(&bounds, gltf.has_normal_texture());

    if let Some(output) = &config.output {
        let target = OffscreenTarget::new(config.width, config.height)?;
        let frame = build_frame(&FrameContext {
            gltf: &gltf,
            layout: &layout,
            camera: &camera,
            projection: camera::projection_matrix(config.width as f32 / config.height as f32, &bounds),
            lighting: &lighting,
            viewport: (config.width, config.height),
            cursor: Vec2::ZERO,
        });
        renderer.render(&frame);
        target
            .write_png(output)
            .with_context(|| format!("writing {}", output.display()))?;
        log::info!("wrote {}", output.display());
        return Ok(());
    }

    let event_pump = sdl_context.event_pump().map_err(SdlErr)?;
    let mut state = State {
        renderer,
        _gl_context: gl_context,
        controller: CameraController::orbit(camera),
        controls: Controls::new(bounds.extent_or(1.0), camera),
        input: InputState::default(),
        lighting,
        layout,
        gltf,
        bounds,
        video: video_subsystem,
        window,
        event_pump,
        projection: Mat4::IDENTITY,
        last_frame: Instant::now(),
    };
    state.resize();
    while state.run_frame() {}
    Ok(())
}

fn shader_source(path: Option<&Path>, default: &str) -> anyhow::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading shader {}", path.display())),
        None => Ok(default.to_string()),
    }
}

/// Events the frame loop reacts to.
enum Input {
    Control(Control),
    Resized,
}

/// The interactive viewer. The renderer is declared first so that its GL
/// objects are dropped while the context still exists.
struct State {
    renderer: Renderer,
    _gl_context: GLContext,
    controller: CameraController,
    controls: Controls,
    input: InputState,
    lighting: LightingState,
    layout: SceneLayout,
    gltf: Gltf,
    bounds: Bounds,
    video: VideoSubsystem,
    window: Window,
    event_pump: EventPump,
    projection: Mat4,
    last_frame: Instant,
}

impl State {
    /// Handles input and draws one frame. Returns false when the viewer
    /// should exit.
    fn run_frame(&mut self) -> bool {
        let inputs = self
            .event_pump
            .poll_iter()
            .filter_map(|event| match event {
                Event::Quit { .. } => Some(Input::Control(Control::Quit)),
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => Some(Input::Resized),
                Event::KeyDown {
                    keycode: Some(keycode),
                    repeat,
                    ..
                } => Control::for_key(keycode)
                    .filter(|control| !repeat || control.repeats())
                    .map(Input::Control),
                _ => None,
            })
            .collect::<Vec<_>>();
        for input in inputs {
            let control = match input {
                Input::Control(control) => control,
                Input::Resized => {
                    self.resize();
                    continue;
                }
            };
            match self.controls.apply(control, &mut self.controller, &mut self.lighting) {
                Effect::None => {}
                Effect::Quit => return false,
                Effect::ShareLookat(lookat) => {
                    println!("--lookat {lookat}");
                    if let Err(err) = self.video.clipboard().set_clipboard_text(&lookat) {
                        log::warn!("could not copy the camera to the clipboard: {err}");
                    }
                }
            }
        }

        let now = Instant::now();
        let elapsed = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.poll_input();
        self.controller.update(&self.input, elapsed);

        let frame = build_frame(&FrameContext {
            gltf: &self.gltf,
            layout: &self.layout,
            camera: self.controller.camera(),
            projection: self.projection,
            lighting: &self.lighting,
            viewport: self.window.drawable_size(),
            cursor: self.input.cursor,
        });
        self.renderer.render(&frame);
        self.window.gl_swap_window();
        true
    }

    fn poll_input(&mut self) {
        let mouse = self.event_pump.mouse_state();
        let keyboard = self.event_pump.keyboard_state();
        self.input.cursor = Vec2::new(mouse.x() as f32, mouse.y() as f32);
        self.input.left_button = mouse.left();
        self.input.middle_button = mouse.middle();
        self.input.shift =
            keyboard.is_scancode_pressed(Scancode::LShift) || keyboard.is_scancode_pressed(Scancode::RShift);
        self.input.ctrl =
            keyboard.is_scancode_pressed(Scancode::LCtrl) || keyboard.is_scancode_pressed(Scancode::RCtrl);
        for (scancode, key) in MOVE_KEYS {
            self.input.set_held(key, keyboard.is_scancode_pressed(scancode));
        }
    }

    fn resize(&mut self) {
        let (width, height) = self.window.drawable_size();
        let aspect_ratio = width.max(1) as f32 / height.max(1) as f32;
        self.projection = camera::projection_matrix(aspect_ratio, &self.bounds);
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
