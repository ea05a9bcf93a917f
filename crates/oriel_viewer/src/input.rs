use std::collections::HashSet;

use glam::{Vec2, Vec3};
use oriel_core::camera::CameraInput;
use winit::keyboard::KeyCode;

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    pub mouse_delta: Vec2,
    pub look_held: bool,
}

impl InputState {
    pub fn press_key(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn add_mouse_delta(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Folds the raw per-frame state into the camera's input struct. W/S and
    /// A/D move in the camera's horizontal plane, Q/E are world-vertical.
    pub fn camera_input(&self) -> CameraInput {
        let mut axis = Vec3::ZERO;
        if self.is_pressed(KeyCode::KeyW) {
            axis.z += 1.0;
        }
        if self.is_pressed(KeyCode::KeyS) {
            axis.z -= 1.0;
        }
        if self.is_pressed(KeyCode::KeyD) {
            axis.x += 1.0;
        }
        if self.is_pressed(KeyCode::KeyA) {
            axis.x -= 1.0;
        }
        if self.is_pressed(KeyCode::KeyE) {
            axis.y += 1.0;
        }
        if self.is_pressed(KeyCode::KeyQ) {
            axis.y -= 1.0;
        }

        CameraInput {
            move_axis: axis,
            sprint: self.is_pressed(KeyCode::ShiftLeft) || self.is_pressed(KeyCode::ShiftRight),
            look_delta: self.mouse_delta,
            look_held: self.look_held,
        }
    }
}
