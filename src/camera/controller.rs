//! Translates mouse and keyboard input into camera motion.

use glam::{Vec2, Vec3};

use crate::camera::{axis_rotation, Camera};

/// Radians of rotation per pixel of cursor motion.
const ROTATION_PER_PIXEL: f32 = 0.01;
/// Scene units of panning or dollying per pixel of cursor motion.
const DRAG_PER_PIXEL: f32 = 0.01;
/// Radians of roll per second.
const ROLL_SPEED: f32 = 0.5;
const FAST_MULTIPLIER: f32 = 4.0;
/// How close the orbit controller may dolly towards the center.
const MIN_ORBIT_DISTANCE: f32 = 1e-4;

/// Keys the fly controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    RollLeft,
    RollRight,
}

/// A snapshot of the input devices, taken once per frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub cursor: Vec2,
    pub left_button: bool,
    pub middle_button: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub held: Vec<MoveKey>,
}

impl InputState {
    pub fn is_held(&self, key: MoveKey) -> bool {
        self.held.contains(&key)
    }

    pub fn set_held(&mut self, key: MoveKey, held: bool) {
        self.held.retain(|&k| k != key);
        if held {
            self.held.push(key);
        }
    }
}

/// Tracks a button drag, yielding the cursor motion since the last update.
#[derive(Debug, Clone, Copy, Default)]
struct Drag {
    last_cursor: Option<Vec2>,
}

impl Drag {
    fn delta(&mut self, pressed: bool, cursor: Vec2) -> Vec2 {
        if !pressed {
            self.last_cursor = None;
            return Vec2::ZERO;
        }
        let delta = self.last_cursor.map_or(Vec2::ZERO, |last| cursor - last);
        self.last_cursor = Some(cursor);
        delta
    }
}

#[derive(Debug, Clone)]
pub struct OrbitController {
    camera: Camera,
    world_up: Vec3,
    drag: Drag,
}

#[derive(Debug, Clone)]
pub struct FlyController {
    camera: Camera,
    world_up: Vec3,
    speed: f32,
    drag: Drag,
}

#[derive(Debug, Clone)]
pub enum CameraController {
    Orbit(OrbitController),
    Fly(FlyController),
}

impl CameraController {
    pub fn orbit(camera: Camera) -> CameraController {
        CameraController::Orbit(OrbitController {
            camera,
            world_up: Vec3::Y,
            drag: Drag::default(),
        })
    }

    pub fn fly(camera: Camera, speed: f32) -> CameraController {
        CameraController::Fly(FlyController {
            camera,
            world_up: Vec3::Y,
            speed,
            drag: Drag::default(),
        })
    }

    /// Applies one frame of input. Returns whether the camera moved.
    pub fn update(&mut self, input: &InputState, elapsed: f32) -> bool {
        match self {
            CameraController::Orbit(orbit) => orbit.update(input),
            CameraController::Fly(fly) => fly.update(input, elapsed),
        }
    }

    pub fn camera(&self) -> &Camera {
        match self {
            CameraController::Orbit(orbit) => &orbit.camera,
            CameraController::Fly(fly) => &fly.camera,
        }
    }

    pub fn set_camera(&mut self, camera: Camera) {
        match self {
            CameraController::Orbit(orbit) => orbit.camera = camera,
            CameraController::Fly(fly) => fly.camera = camera,
        }
    }

    /// Swaps orbit for fly or the other way around, keeping the pose.
    pub fn switch_variant(&mut self, fly_speed: f32) {
        let camera = *self.camera();
        *self = match self {
            CameraController::Orbit(_) => CameraController::fly(camera, fly_speed),
            CameraController::Fly(_) => CameraController::orbit(camera),
        };
    }

    pub fn name(&self) -> &'static str {
        match self {
            CameraController::Orbit(_) => "orbit",
            CameraController::Fly(_) => "fly",
        }
    }
}

impl OrbitController {
    fn update(&mut self, input: &InputState) -> bool {
        let delta = self.drag.delta(input.middle_button, input.cursor);
        if delta == Vec2::ZERO {
            return false;
        }

        if input.shift {
            // Pan: move eye and center in the camera's plane.
            let truck_left = DRAG_PER_PIXEL * delta.x;
            let pedestal_up = DRAG_PER_PIXEL * delta.y;
            self.camera.move_local(truck_left, pedestal_up, 0.0);
            return true;
        }

        if input.ctrl {
            // Dolly along the view vector, never past the center.
            let mut offset = DRAG_PER_PIXEL * delta.x;
            if offset == 0.0 {
                return false;
            }
            let view = self.camera.center - self.camera.eye;
            let distance = view.length();
            if distance <= MIN_ORBIT_DISTANCE && offset > 0.0 {
                return false;
            }
            if offset > 0.0 {
                offset = offset.min(distance - MIN_ORBIT_DISTANCE);
            }
            let eye = self.camera.eye + offset * (view / distance);
            self.camera = Camera::new(eye, self.camera.center, self.world_up);
            return true;
        }

        let longitude = ROTATION_PER_PIXEL * delta.y;
        let latitude = -ROTATION_PER_PIXEL * delta.x;
        // Rotate the center-to-eye vector vertically about the camera's
        // horizontal axis, then horizontally about world up.
        let depth_axis = self.camera.eye - self.camera.center;
        let depth_axis = axis_rotation(self.camera.left(), longitude) * depth_axis;
        let depth_axis = axis_rotation(self.world_up, latitude) * depth_axis;
        let eye = self.camera.center + depth_axis;
        self.camera = Camera::new(eye, self.camera.center, self.world_up);
        true
    }
}

impl FlyController {
    fn update(&mut self, input: &InputState, elapsed: f32) -> bool {
        let delta = self.drag.delta(input.left_button, input.cursor);
        let speed = if input.ctrl {
            self.speed * FAST_MULTIPLIER
        } else {
            self.speed
        };
        let step = speed * elapsed;
        let axis = |positive: MoveKey, negative: MoveKey| {
            let mut value = 0.0;
            if input.is_held(positive) {
                value += 1.0;
            }
            if input.is_held(negative) {
                value -= 1.0;
            }
            value
        };
        let dolly_in = step * axis(MoveKey::Forward, MoveKey::Backward);
        let truck_left = step * axis(MoveKey::Left, MoveKey::Right);
        let pedestal_up = step * axis(MoveKey::Up, MoveKey::Down);
        let roll_right = ROLL_SPEED * elapsed * axis(MoveKey::RollRight, MoveKey::RollLeft);
        // Cursor going right pans right, i.e. a negative pan-left angle.
        let pan_left = -ROTATION_PER_PIXEL * delta.x;
        let tilt_down = ROTATION_PER_PIXEL * delta.y;

        let moved = [dolly_in, truck_left, pedestal_up, roll_right, pan_left, tilt_down]
            .iter()
            .any(|&v| v != 0.0);
        if !moved {
            return false;
        }
        self.camera.move_local(truck_left, pedestal_up, dolly_in);
        self.camera.rotate_local(roll_right, tilt_down, 0.0);
        self.camera.rotate_world(pan_left, self.world_up);
        true
    }
}
