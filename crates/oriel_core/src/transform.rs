use glam::{EulerRot, Mat4, Quat, Vec3};

/// Position/orientation/scale with lazily recomputed world matrices.
///
/// The world matrix composes scale, then rotation, then translation. Both it
/// and its inverse-transpose are rebuilt together the next time either is
/// read after a mutation. Direction vectors are derived from the Euler
/// orientation unless a caller overrides them with the `set_right`/`set_up`/
/// `set_forward` family, in which case the overridden vectors stay
/// authoritative until the next rotation.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    pitch_yaw_roll: Vec3,
    scale: Vec3,
    right: Vec3,
    up: Vec3,
    forward: Vec3,
    world: Mat4,
    world_inverse_transpose: Mat4,
    dirty: bool,
    rotated: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            pitch_yaw_roll: Vec3::ZERO,
            scale: Vec3::ONE,
            right: Vec3::X,
            up: Vec3::Y,
            forward: Vec3::Z,
            world: Mat4::IDENTITY,
            world_inverse_transpose: Mat4::IDENTITY,
            dirty: false,
            rotated: true,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn pitch_yaw_roll(&self) -> Vec3 {
        self.pitch_yaw_roll
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn world_matrix(&mut self) -> Mat4 {
        self.sync();
        self.world
    }

    pub fn world_inverse_transpose(&mut self) -> Mat4 {
        self.sync();
        self.world_inverse_transpose
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_pitch_yaw_roll(&mut self, pitch_yaw_roll: Vec3) {
        self.pitch_yaw_roll = pitch_yaw_roll;
        self.dirty = true;
        self.rotated = true;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        assert!(
            scale.x != 0.0 && scale.y != 0.0 && scale.z != 0.0,
            "zero scale component produces a singular transform"
        );
        self.scale = scale;
        self.dirty = true;
    }

    /// Offset in world space.
    pub fn move_absolute(&mut self, offset: Vec3) {
        self.position += offset;
        self.dirty = true;
    }

    /// Offset in local space: the offset is rotated by the current
    /// orientation before being applied.
    pub fn move_relative(&mut self, offset: Vec3) {
        self.position += self.rotation() * offset;
        self.dirty = true;
    }

    pub fn rotate(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.pitch_yaw_roll += Vec3::new(pitch, yaw, roll);
        self.dirty = true;
        self.rotated = true;
    }

    pub fn scale_by(&mut self, factor: Vec3) {
        assert!(
            factor.x != 0.0 && factor.y != 0.0 && factor.z != 0.0,
            "zero scale component produces a singular transform"
        );
        self.scale *= factor;
        self.dirty = true;
    }

    pub fn right(&mut self) -> Vec3 {
        if self.rotated {
            self.right = self.rotation() * Vec3::X;
        }
        self.right
    }

    pub fn up(&mut self) -> Vec3 {
        if self.rotated {
            self.up = self.rotation() * Vec3::Y;
        }
        self.up
    }

    pub fn forward(&mut self) -> Vec3 {
        if self.rotated {
            self.forward = self.rotation() * Vec3::Z;
        }
        self.forward
    }

    pub fn set_right(&mut self, right: Vec3) {
        self.right = right;
        self.rotated = false;
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.rotated = false;
    }

    pub fn set_forward(&mut self, forward: Vec3) {
        self.forward = forward;
        self.rotated = false;
    }

    /// Local space to world space.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation() * (point * self.scale) + self.position
    }

    /// World space to local space. Exact algebraic inverse of
    /// [`Transform::transform_point`] for the same transform state.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation().inverse() * (point - self.position)) / self.scale
    }

    /// Orientation as a quaternion, matching the pitch/yaw/roll application
    /// order: yaw about Y, then pitch about X, then roll about Z.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.pitch_yaw_roll.y,
            self.pitch_yaw_roll.x,
            self.pitch_yaw_roll.z,
        )
    }

    fn sync(&mut self) {
        if !self.dirty {
            return;
        }

        self.world =
            Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.position);
        self.world_inverse_transpose = self.world.inverse().transpose();
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    use glam::{Mat4, Vec3, Vec4Swizzles};

    use super::Transform;

    const EPS: f32 = 1e-4;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < EPS, "expected {b:?}, got {a:?}");
    }

    #[test]
    fn transform_point_round_trips_through_inverse() {
        let mut transform = Transform::new();
        transform.set_position(Vec3::new(3.0, -1.5, 7.0));
        transform.set_pitch_yaw_roll(Vec3::new(0.3, 1.2, -0.7));
        transform.set_scale(Vec3::new(2.0, 0.5, 4.0));

        for point in [
            Vec3::ZERO,
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-5.0, 0.25, 9.0),
        ] {
            let round_trip = transform.inverse_transform_point(transform.transform_point(point));
            assert_vec3_eq(round_trip, point);
        }
    }

    #[test]
    fn direction_vectors_are_orthonormal_after_rotation() {
        let mut transform = Transform::new();
        transform.set_pitch_yaw_roll(Vec3::new(0.9, -2.1, 0.4));

        let right = transform.right();
        let up = transform.up();
        let forward = transform.forward();

        assert!((right.length() - 1.0).abs() < EPS);
        assert!((up.length() - 1.0).abs() < EPS);
        assert!((forward.length() - 1.0).abs() < EPS);
        assert!(right.dot(up).abs() < EPS);
        assert!(right.dot(forward).abs() < EPS);
        assert!(up.dot(forward).abs() < EPS);
    }

    #[test]
    fn yaw_rotates_forward_within_the_horizontal_plane() {
        let mut transform = Transform::new();
        transform.set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        assert_vec3_eq(transform.forward(), Vec3::X);

        transform.set_pitch_yaw_roll(Vec3::new(0.0, PI, 0.0));
        assert_vec3_eq(transform.forward(), Vec3::NEG_Z);
        assert_vec3_eq(transform.right(), Vec3::NEG_X);
    }

    #[test]
    fn world_matrix_applies_scale_then_rotation_then_translation() {
        let mut transform = Transform::new();
        transform.set_position(Vec3::new(1.0, 2.0, 3.0));
        transform.set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        transform.set_scale(Vec3::new(2.0, 1.0, 1.0));

        // A local +X point is scaled to 2, yawed onto -Z, then translated.
        let transformed = (transform.world_matrix() * Vec3::X.extend(1.0)).xyz();
        assert_vec3_eq(transformed, Vec3::new(1.0, 2.0, 1.0));
        assert_vec3_eq(transformed, transform.transform_point(Vec3::X));
    }

    #[test]
    fn matrices_are_up_to_date_on_every_read() {
        let mut transform = Transform::new();
        assert_eq!(transform.world_matrix(), Mat4::IDENTITY);

        transform.move_absolute(Vec3::new(0.0, 4.0, 0.0));
        let world = transform.world_matrix();
        assert_vec3_eq((world * Vec3::ZERO.extend(1.0)).xyz(), Vec3::new(0.0, 4.0, 0.0));

        transform.rotate(0.0, FRAC_PI_4, 0.0);
        let inverse_transpose = transform.world_inverse_transpose();
        assert!((inverse_transpose.determinant()).abs() > 0.0);
    }

    #[test]
    fn move_relative_follows_orientation() {
        let mut transform = Transform::new();
        transform.set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        transform.move_relative(Vec3::new(0.0, 0.0, 2.0));
        assert_vec3_eq(transform.position(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn overridden_directions_stay_authoritative_until_rotation() {
        let mut transform = Transform::new();
        transform.set_forward(Vec3::new(0.0, 0.0, -1.0));
        assert_vec3_eq(transform.forward(), Vec3::NEG_Z);

        transform.rotate(0.0, FRAC_PI_2, 0.0);
        assert_vec3_eq(transform.forward(), Vec3::X);
    }

    #[test]
    fn non_uniform_scale_inverts_per_axis() {
        let mut transform = Transform::new();
        transform.set_scale(Vec3::new(2.0, 4.0, 8.0));
        let local = transform.inverse_transform_point(Vec3::new(2.0, 4.0, 8.0));
        assert_vec3_eq(local, Vec3::ONE);
    }

    #[test]
    #[should_panic(expected = "zero scale")]
    fn zero_scale_is_rejected() {
        let mut transform = Transform::new();
        transform.set_scale(Vec3::new(1.0, 0.0, 1.0));
    }
}
