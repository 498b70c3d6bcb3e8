//! Runtime controls and their keyboard shortcuts.

use std::f32::consts::TAU;

use glam::Vec3;
use sdl2::keyboard::Keycode;

use crate::camera::controller::CameraController;
use crate::camera::Camera;
use crate::lighting::{LightingState, POINT_LIGHT_COUNT};

/// Degrees the spot cones change by per key press.
const CUTOFF_STEP: f32 = 0.5;
const DIRECTIONAL_FACTOR_STEP: f32 = 0.1;
const LIGHT_FACTOR_STEP: f32 = 0.5;
const ANGLE_STEP: f32 = 5.0 * std::f32::consts::PI / 180.0;
const ATTENUATION_STEP: f32 = 1.0;
/// Colors the point lights and the spot light cycle through.
const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::ONE,
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(1.0, 0.5, 0.0),
    Vec3::new(0.5, 0.9, 0.3),
    Vec3::new(0.3, 0.5, 1.0),
    Vec3::new(1.0, 0.91, 0.0),
];

/// Stepwise controls carry the direction of the step, -1 or 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    SwitchCamera,
    ResetCamera,
    ToggleLightFollowsCamera,
    ToggleSpotFollowsCursor,
    LightsOff,
    LightsOn,
    ToggleNormalMap,
    NarrowSpot,
    WidenSpot,
    InnerCutoff(f32),
    OuterCutoff(f32),
    AttenuationDistance(f32),
    SpotFactor(f32),
    CycleSpotColor,
    SelectPointLight(usize),
    /// Moves the selected point light one step along the axis.
    MovePointLight(Vec3),
    PointLightFactor(f32),
    CyclePointLightColor,
    DimDirectional,
    BrightenDirectional,
    DirectionalTheta(f32),
    DirectionalPhi(f32),
    PrintLookat,
    Quit,
}

impl Control {
    pub fn for_key(keycode: Keycode) -> Option<Control> {
        let control = match keycode {
            Keycode::C => Control::SwitchCamera,
            Keycode::R => Control::ResetCamera,
            Keycode::L => Control::ToggleLightFollowsCamera,
            Keycode::K => Control::ToggleSpotFollowsCursor,
            Keycode::O => Control::LightsOff,
            Keycode::P => Control::LightsOn,
            Keycode::N => Control::ToggleNormalMap,
            Keycode::LeftBracket => Control::NarrowSpot,
            Keycode::RightBracket => Control::WidenSpot,
            Keycode::Num7 => Control::InnerCutoff(-1.0),
            Keycode::Num8 => Control::InnerCutoff(1.0),
            Keycode::Num9 => Control::OuterCutoff(-1.0),
            Keycode::Num0 => Control::OuterCutoff(1.0),
            Keycode::U => Control::AttenuationDistance(-1.0),
            Keycode::I => Control::AttenuationDistance(1.0),
            Keycode::Semicolon => Control::SpotFactor(-1.0),
            Keycode::Quote => Control::SpotFactor(1.0),
            Keycode::Y => Control::CycleSpotColor,
            Keycode::Num1 => Control::SelectPointLight(0),
            Keycode::Num2 => Control::SelectPointLight(1),
            Keycode::Num3 => Control::SelectPointLight(2),
            Keycode::Num4 => Control::SelectPointLight(3),
            Keycode::Home => Control::MovePointLight(Vec3::NEG_X),
            Keycode::End => Control::MovePointLight(Vec3::X),
            Keycode::Insert => Control::MovePointLight(Vec3::Y),
            Keycode::Delete => Control::MovePointLight(Vec3::NEG_Y),
            Keycode::PageUp => Control::MovePointLight(Vec3::NEG_Z),
            Keycode::PageDown => Control::MovePointLight(Vec3::Z),
            Keycode::Comma => Control::PointLightFactor(-1.0),
            Keycode::Period => Control::PointLightFactor(1.0),
            Keycode::T => Control::CyclePointLightColor,
            Keycode::Minus => Control::DimDirectional,
            Keycode::Equals => Control::BrightenDirectional,
            Keycode::Kp8 => Control::DirectionalTheta(-1.0),
            Keycode::Kp2 => Control::DirectionalTheta(1.0),
            Keycode::Kp4 => Control::DirectionalPhi(-1.0),
            Keycode::Kp6 => Control::DirectionalPhi(1.0),
            Keycode::F => Control::PrintLookat,
            Keycode::Escape => Control::Quit,
            _ => return None,
        };
        Some(control)
    }

    /// Whether holding the key down should keep applying the control.
    pub fn repeats(&self) -> bool {
        matches!(
            self,
            Control::NarrowSpot
                | Control::WidenSpot
                | Control::InnerCutoff(_)
                | Control::OuterCutoff(_)
                | Control::AttenuationDistance(_)
                | Control::SpotFactor(_)
                | Control::MovePointLight(_)
                | Control::PointLightFactor(_)
                | Control::DimDirectional
                | Control::BrightenDirectional
                | Control::DirectionalTheta(_)
                | Control::DirectionalPhi(_)
        )
    }
}

/// What the application loop has to do after a control was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Quit,
    /// Print the `--lookat` argument and put it on the clipboard.
    ShareLookat(String),
}

/// Applies controls to the viewer's camera and lights.
#[derive(Debug, Clone)]
pub struct Controls {
    selected_light: usize,
    /// Distance a point light moves per key press.
    light_step: f32,
    fly_speed: f32,
    /// Where [`Control::ResetCamera`] puts the camera back.
    home: Camera,
}

impl Controls {
    /// Steps are proportional to the scene's extent.
    pub fn new(scene_extent: f32, home: Camera) -> Controls {
        Controls {
            selected_light: 0,
            light_step: 0.05 * scene_extent,
            fly_speed: 0.5 * scene_extent,
            home,
        }
    }

    pub fn apply(&mut self, control: Control, camera: &mut CameraController, lighting: &mut LightingState) -> Effect {
        match control {
            Control::SwitchCamera => {
                camera.switch_variant(self.fly_speed);
                log::info!("using the {} camera", camera.name());
            }
            Control::ResetCamera => camera.set_camera(self.home),
            Control::ToggleLightFollowsCamera => lighting.toggle_light_follows_camera(),
            Control::ToggleSpotFollowsCursor => lighting.toggle_spot_follows_cursor(),
            Control::LightsOff => lighting.all_off(),
            Control::LightsOn => lighting.all_on(),
            Control::ToggleNormalMap => {
                if lighting.normal_map_available() {
                    lighting.set_normal_map(!lighting.normal_map_active());
                } else {
                    log::info!("the scene has no normal textures");
                }
            }
            Control::NarrowSpot => lighting.set_both_cutoffs(lighting.spot.cutoff - CUTOFF_STEP),
            Control::WidenSpot => lighting.set_both_cutoffs(lighting.spot.cutoff + CUTOFF_STEP),
            Control::InnerCutoff(sign) => lighting.set_cutoff(lighting.spot.cutoff + sign * CUTOFF_STEP),
            Control::OuterCutoff(sign) => lighting.set_outer_cutoff(lighting.spot.outer_cutoff + sign * CUTOFF_STEP),
            Control::AttenuationDistance(sign) => {
                lighting.set_attenuation_distance(lighting.spot.attenuation_distance + sign * ATTENUATION_STEP)
            }
            Control::SpotFactor(sign) => {
                let spot = &lighting.spot;
                let (color, factor) = (spot.color, spot.factor + sign * LIGHT_FACTOR_STEP);
                lighting.set_spot(color, factor);
            }
            Control::CycleSpotColor => {
                let spot = &lighting.spot;
                let (color, factor) = (next_color(spot.color), spot.factor);
                lighting.set_spot(color, factor);
            }
            Control::SelectPointLight(index) if index < POINT_LIGHT_COUNT => {
                self.selected_light = index;
                log::info!("point light {} selected", index + 1);
            }
            Control::SelectPointLight(_) => {}
            Control::MovePointLight(axis) => lighting.move_point_light(self.selected_light, axis * self.light_step),
            Control::PointLightFactor(sign) => {
                let light = &lighting.point_lights[self.selected_light];
                let (color, factor) = (light.color, light.factor + sign * LIGHT_FACTOR_STEP);
                lighting.set_point_light(self.selected_light, color, factor);
            }
            Control::CyclePointLightColor => {
                let light = &lighting.point_lights[self.selected_light];
                let (color, factor) = (next_color(light.color), light.factor);
                lighting.set_point_light(self.selected_light, color, factor);
            }
            Control::DimDirectional | Control::BrightenDirectional => {
                let step = if control == Control::DimDirectional {
                    -DIRECTIONAL_FACTOR_STEP
                } else {
                    DIRECTIONAL_FACTOR_STEP
                };
                let light = &lighting.directional;
                let (color, factor) = (light.color, light.factor + step);
                lighting.set_directional(color, factor);
            }
            Control::DirectionalTheta(sign) => {
                let light = &lighting.directional;
                let (theta, phi) = (light.theta + sign * ANGLE_STEP, light.phi);
                lighting.set_direction_from_angles(theta, phi);
            }
            Control::DirectionalPhi(sign) => {
                let light = &lighting.directional;
                let (theta, phi) = (light.theta, (light.phi + sign * ANGLE_STEP).rem_euclid(TAU));
                lighting.set_direction_from_angles(theta, phi);
            }
            Control::PrintLookat => return Effect::ShareLookat(camera.camera().lookat_args()),
            Control::Quit => return Effect::Quit,
        }
        Effect::None
    }
}

/// The palette entry after `color`, or the first one if `color` isn't in it.
fn next_color(color: Vec3) -> Vec3 {
    let next = LIGHT_COLORS
        .iter()
        .position(|&c| c == color)
        .map_or(0, |i| (i + 1) % LIGHT_COLORS.len());
    LIGHT_COLORS[next]
}
