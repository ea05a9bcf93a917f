use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec2, Vec3};

use crate::transform::Transform;

const NEAR_PLANE: f32 = 0.01;
const FAR_PLANE: f32 = 100.0;
const SPRINT_MULTIPLIER: f32 = 3.0;
const PITCH_EPSILON: f32 = 0.01;

/// Per-frame camera intent, produced once by the input layer and consumed
/// here. Axes are local: x strafes, z walks, y moves along world up.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraInput {
    pub move_axis: Vec3,
    pub sprint: bool,
    pub look_delta: Vec2,
    pub look_held: bool,
}

/// Fly camera with cached view/projection matrices. Left-handed, forward is
/// local +Z, matching the portal-facing convention used everywhere else.
#[derive(Debug, Clone)]
pub struct Camera {
    transform: Transform,
    move_speed: f32,
    look_speed: f32,
    fov: f32,
    aspect: f32,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, move_speed: f32, look_speed: f32, fov: f32, aspect: f32) -> Self {
        let mut transform = Transform::new();
        transform.set_position(position);
        let mut camera = Self {
            transform,
            move_speed,
            look_speed,
            fov,
            aspect,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.refresh_view();
        camera.refresh_projection();
        camera
    }

    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        let mut speed = self.move_speed * dt;
        if input.sprint {
            speed *= SPRINT_MULTIPLIER;
        }

        let axis = input.move_axis;
        if axis.x != 0.0 || axis.z != 0.0 {
            self.transform
                .move_relative(Vec3::new(axis.x, 0.0, axis.z) * speed);
        }
        if axis.y != 0.0 {
            self.transform
                .move_absolute(Vec3::new(0.0, axis.y, 0.0) * speed);
        }

        if input.look_held {
            let yaw = dt * self.look_speed * input.look_delta.x;
            let pitch = dt * self.look_speed * input.look_delta.y;
            self.transform.rotate(pitch, yaw, 0.0);

            // Clamp pitch short of straight up/down to dodge gimbal lock.
            let limit = FRAC_PI_2 - PITCH_EPSILON;
            let rotation = self.transform.pitch_yaw_roll();
            if rotation.x > limit || rotation.x < -limit {
                self.transform.set_pitch_yaw_roll(Vec3::new(
                    rotation.x.clamp(-limit, limit),
                    rotation.y,
                    rotation.z,
                ));
            }
        }

        self.refresh_view();
    }

    /// Rebuilds the cached view matrix from the transform. Must be called
    /// after mutating the transform directly (e.g. a teleport).
    pub fn refresh_view(&mut self) {
        let position = self.transform.position();
        let forward = self.transform.forward();
        self.view = Mat4::look_to_lh(position, forward, Vec3::Y);
    }

    fn refresh_projection(&mut self) {
        self.projection = Mat4::perspective_lh(self.fov, self.aspect, NEAR_PLANE, FAR_PLANE);
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.refresh_projection();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.refresh_projection();
    }
}
