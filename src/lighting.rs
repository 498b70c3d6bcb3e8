//! The interactive light and material parameters.

use glam::Vec3;

use crate::renderer::gltf::bounds::Bounds;

pub const POINT_LIGHT_COUNT: usize = 4;
pub const MAX_INTENSITY_FACTOR: f32 = 100.0;
pub const MAX_CUTOFF_DEGREES: f32 = 180.0;
/// How far point lights may be moved from the origin, in multiples of the
/// scene's bounds.
const POINT_LIGHT_RANGE: f32 = 20.0;
/// Marker colors are the light's intensity divided by this, capped at 1.
const MARKER_COLOR_DIVISOR: f32 = 20.0;
const OUTER_CUTOFF_RATIO: f32 = 1.1;
const OFF: Vec3 = Vec3::ZERO;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction towards the light, in world space.
    pub direction: Vec3,
    /// Polar angle of `direction` from +Y, in radians.
    pub theta: f32,
    /// Azimuth of `direction` around +Y from +X, in radians.
    pub phi: f32,
    pub color: Vec3,
    pub factor: f32,
    pub intensity: Vec3,
    pub follows_camera: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub factor: f32,
    pub intensity: Vec3,
    /// The distance at which the light's contribution falls to zero.
    pub distance: f32,
    pub marker_color: Vec3,
    pub marker_size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub factor: f32,
    pub intensity: Vec3,
    /// Inner cone half-angle, in degrees.
    pub cutoff: f32,
    /// Outer cone half-angle, in degrees.
    pub outer_cutoff: f32,
    pub attenuation_distance: f32,
    pub follows_cursor: bool,
}

/// Intensities saved by [`LightingState::all_off`].
#[derive(Debug, Clone, PartialEq)]
struct SavedIntensities {
    directional: Vec3,
    point_lights: [(Vec3, Vec3); POINT_LIGHT_COUNT],
    spot: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightingState {
    pub directional: DirectionalLight,
    pub point_lights: [PointLight; POINT_LIGHT_COUNT],
    pub spot: SpotLight,
    normal_map_enabled: bool,
    normal_map_available: bool,
    saved: Option<SavedIntensities>,
    position_limit: Vec3,
}

impl LightingState {
    /// The default rig, with the point lights placed on corners of the
    /// scene's bounds and marker sizes proportional to its extent.
    pub fn new(bounds: &Bounds, normal_map_available: bool) -> LightingState {
        let extent = bounds.extent_or(1.0);
        let positions = [
            bounds.max,
            bounds.min,
            Vec3::new(bounds.max.x, bounds.min.y, bounds.max.z),
            Vec3::new(bounds.min.x, bounds.max.y, bounds.max.z),
        ];
        let colors = [
            Vec3::ONE,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(0.5, 0.9, 0.3),
        ];
        let distances = [33.0, 21.0, 14.0, 8.0];
        let sizes = [0.2, 0.1, 0.05, 0.02];
        let point_lights = std::array::from_fn(|i| PointLight {
            position: positions[i],
            color: colors[i],
            factor: 1.0,
            intensity: colors[i],
            distance: distances[i],
            marker_color: colors[i],
            marker_size: extent * sizes[i],
        });

        let magnitude = bounds.min.abs().max(bounds.max.abs());
        let position_limit = Vec3::select(magnitude.cmpgt(Vec3::ZERO), magnitude, Vec3::splat(extent));

        let spot_color = Vec3::new(1.0, 0.91, 0.0);
        LightingState {
            directional: DirectionalLight {
                direction: Vec3::ONE,
                theta: (1.0 / 3f32.sqrt()).acos(),
                phi: std::f32::consts::FRAC_PI_4,
                color: Vec3::ONE,
                factor: 1.0,
                intensity: Vec3::ONE,
                follows_camera: false,
            },
            point_lights,
            spot: SpotLight {
                color: spot_color,
                factor: 1.0,
                intensity: spot_color,
                cutoff: 8.5,
                outer_cutoff: 10.5,
                attenuation_distance: 32.0,
                follows_cursor: false,
            },
            normal_map_enabled: normal_map_available,
            normal_map_available,
            saved: None,
            position_limit: POINT_LIGHT_RANGE * position_limit,
        }
    }

    /// Points the directional light along spherical angles, with theta
    /// measured from +Y and phi around it from +X.
    pub fn set_direction_from_angles(&mut self, theta: f32, phi: f32) {
        let light = &mut self.directional;
        light.theta = theta.clamp(0.0, std::f32::consts::PI);
        light.phi = phi.clamp(0.0, std::f32::consts::TAU);
        let (sin_theta, cos_theta) = light.theta.sin_cos();
        let (sin_phi, cos_phi) = light.phi.sin_cos();
        light.direction = Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi);
    }

    pub fn set_directional(&mut self, color: Vec3, factor: f32) {
        let light = &mut self.directional;
        light.color = color;
        light.factor = factor.clamp(0.0, MAX_INTENSITY_FACTOR);
        light.intensity = light.color * light.factor;
        if let Some(saved) = &mut self.saved {
            saved.directional = light.intensity;
        }
    }

    pub fn set_point_light(&mut self, index: usize, color: Vec3, factor: f32) {
        let Some(light) = self.point_lights.get_mut(index) else {
            return;
        };
        light.color = color;
        light.factor = factor.clamp(0.0, MAX_INTENSITY_FACTOR);
        light.intensity = light.color * light.factor;
        light.marker_color = (light.intensity / MARKER_COLOR_DIVISOR).min(Vec3::ONE);
        if let Some(saved) = &mut self.saved {
            saved.point_lights[index] = (light.intensity, light.marker_color);
        }
    }

    /// Moves a point light by `offset`, keeping it within range of the scene.
    pub fn move_point_light(&mut self, index: usize, offset: Vec3) {
        if let Some(light) = self.point_lights.get_mut(index) {
            light.position = (light.position + offset).clamp(-self.position_limit, self.position_limit);
        }
    }

    pub fn set_spot(&mut self, color: Vec3, factor: f32) {
        let light = &mut self.spot;
        light.color = color;
        light.factor = factor.clamp(0.0, MAX_INTENSITY_FACTOR);
        light.intensity = light.color * light.factor;
        if let Some(saved) = &mut self.saved {
            saved.spot = light.intensity;
        }
    }

    pub fn set_cutoff(&mut self, degrees: f32) {
        self.spot.cutoff = degrees.clamp(0.0, MAX_CUTOFF_DEGREES);
    }

    pub fn set_outer_cutoff(&mut self, degrees: f32) {
        self.spot.outer_cutoff = degrees.clamp(0.0, MAX_CUTOFF_DEGREES);
    }

    /// Sets the inner cutoff, and the outer one slightly wider.
    pub fn set_both_cutoffs(&mut self, degrees: f32) {
        self.set_cutoff(degrees);
        self.set_outer_cutoff(self.spot.cutoff * OUTER_CUTOFF_RATIO);
    }

    pub fn set_attenuation_distance(&mut self, distance: f32) {
        self.spot.attenuation_distance = distance.max(0.0);
    }

    pub fn toggle_spot_follows_cursor(&mut self) {
        self.spot.follows_cursor = !self.spot.follows_cursor;
    }

    pub fn toggle_light_follows_camera(&mut self) {
        self.directional.follows_camera = !self.directional.follows_camera;
    }

    /// Turns every light off, remembering the intensities for
    /// [`all_on`](LightingState::all_on). Does nothing if already off. Lights
    /// changed while off stay lit, and keep their new value when turned on.
    pub fn all_off(&mut self) {
        if self.saved.is_some() {
            return;
        }
        self.saved = Some(SavedIntensities {
            directional: self.directional.intensity,
            point_lights: self.point_lights.each_ref().map(|l| (l.intensity, l.marker_color)),
            spot: self.spot.intensity,
        });
        self.directional.intensity = OFF;
        self.spot.intensity = OFF;
        for light in &mut self.point_lights {
            light.intensity = OFF;
            light.marker_color = OFF;
        }
    }

    pub fn all_on(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        self.directional.intensity = saved.directional;
        self.spot.intensity = saved.spot;
        for (light, (intensity, marker_color)) in self.point_lights.iter_mut().zip(saved.point_lights) {
            light.intensity = intensity;
            light.marker_color = marker_color;
        }
    }

    pub fn lights_off(&self) -> bool {
        self.saved.is_some()
    }

    /// Enables or disables normal mapping. Ignored if the scene has no normal
    /// textures.
    pub fn set_normal_map(&mut self, enabled: bool) {
        if self.normal_map_available {
            self.normal_map_enabled = enabled;
        }
    }

    pub fn normal_map_available(&self) -> bool {
        self.normal_map_available
    }

    pub fn normal_map_active(&self) -> bool {
        self.normal_map_available && self.normal_map_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Bounds {
        Bounds {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::ONE,
        }
    }

    #[test]
    fn defaults_follow_the_scene_bounds() {
        let state = LightingState::new(&unit_bounds(), false);
        assert_eq!(state.point_lights[0].position, Vec3::ONE);
        assert_eq!(state.point_lights[1].position, Vec3::splat(-1.0));
        assert_eq!(state.point_lights[2].position, Vec3::new(1.0, -1.0, 1.0));
        assert_eq!(state.point_lights[3].position, Vec3::new(-1.0, 1.0, 1.0));
        let extent = unit_bounds().diagonal().length();
        assert_eq!(state.point_lights[0].marker_size, extent * 0.2);
        assert_eq!(state.point_lights[3].marker_size, extent * 0.02);
        assert_eq!(state.point_lights.each_ref().map(|l| l.distance), [33.0, 21.0, 14.0, 8.0]);
        assert_eq!(state.spot.intensity, Vec3::new(1.0, 0.91, 0.0));
        assert_eq!((state.spot.cutoff, state.spot.outer_cutoff), (8.5, 10.5));
        assert_eq!(state.directional.direction, Vec3::ONE);
    }

    #[test]
    fn degenerate_bounds_still_give_visible_markers() {
        let state = LightingState::new(&Bounds::DEGENERATE, false);
        assert!(state.point_lights.iter().all(|l| l.marker_size > 0.0));
        assert!(state.point_lights.iter().all(|l| l.position.is_finite()));
    }

    #[test]
    fn off_then_on_restores_every_intensity() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.set_point_light(2, Vec3::new(0.0, 1.0, 0.0), 30.0);
        let before = state.clone();

        state.all_off();
        assert!(state.lights_off());
        assert_eq!(state.directional.intensity, Vec3::ZERO);
        assert_eq!(state.spot.intensity, Vec3::ZERO);
        assert!(state.point_lights.iter().all(|l| l.intensity == Vec3::ZERO && l.marker_color == Vec3::ZERO));

        // A second "off" must not overwrite what was saved.
        state.all_off();
        state.all_on();
        assert_eq!(state, before);
    }

    #[test]
    fn point_light_intensity_and_marker_color() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.set_point_light(1, Vec3::new(1.0, 0.5, 0.0), 10.0);
        assert_eq!(state.point_lights[1].intensity, Vec3::new(10.0, 5.0, 0.0));
        assert_eq!(state.point_lights[1].marker_color, Vec3::new(0.5, 0.25, 0.0));
        state.set_point_light(1, Vec3::ONE, 1000.0);
        assert_eq!(state.point_lights[1].factor, MAX_INTENSITY_FACTOR);
        assert_eq!(state.point_lights[1].marker_color, Vec3::ONE);
    }

    #[test]
    fn both_cutoffs_keep_the_outer_cone_wider() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.set_both_cutoffs(20.0);
        assert_eq!(state.spot.cutoff, 20.0);
        assert!((state.spot.outer_cutoff - 22.0).abs() < 1e-5);
        state.set_both_cutoffs(500.0);
        assert_eq!(state.spot.cutoff, MAX_CUTOFF_DEGREES);
        assert_eq!(state.spot.outer_cutoff, MAX_CUTOFF_DEGREES);
    }

    #[test]
    fn point_lights_stay_in_range() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.move_point_light(0, Vec3::new(1000.0, 0.0, -1000.0));
        assert_eq!(state.point_lights[0].position, Vec3::new(20.0, 1.0, -20.0));
        state.move_point_light(9, Vec3::ONE);
    }

    #[test]
    fn direction_from_angles() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.set_direction_from_angles(0.0, 0.0);
        assert!(state.directional.direction.abs_diff_eq(Vec3::Y, 1e-6));
        state.set_direction_from_angles(std::f32::consts::FRAC_PI_2, 0.0);
        assert!(state.directional.direction.abs_diff_eq(Vec3::X, 1e-6));
        state.set_direction_from_angles(-1.0, 10.0);
        assert_eq!(state.directional.theta, 0.0);
        assert_eq!(state.directional.phi, std::f32::consts::TAU);
    }

    #[test]
    fn default_angles_describe_the_default_direction() {
        let mut state = LightingState::new(&unit_bounds(), false);
        let (theta, phi) = (state.directional.theta, state.directional.phi);
        state.set_direction_from_angles(theta, phi);
        assert!(state.directional.direction.abs_diff_eq(Vec3::ONE.normalize(), 1e-6));
    }

    #[test]
    fn normal_map_needs_a_normal_texture() {
        let mut state = LightingState::new(&unit_bounds(), false);
        state.set_normal_map(true);
        assert!(!state.normal_map_active());

        let mut state = LightingState::new(&unit_bounds(), true);
        assert!(state.normal_map_active());
        state.set_normal_map(false);
        assert!(!state.normal_map_active());
    }
}
