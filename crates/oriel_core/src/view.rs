use std::f32::consts::PI;

use glam::{Mat4, Vec3, Vec4};

use crate::transform::Transform;

/// Inward offset subtracted from the clip-plane distance so the oblique near
/// plane does not truncate the portal surface itself. Empirical; tune per
/// scene scale.
pub const PORTAL_CLIP_INSET: f32 = 1.29;

const OBLIQUE_DENOM_EPSILON: f32 = 1e-5;

/// Knobs for the recursive portal walk.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Recursion depth bound shared across all pairs. Work per frame grows
    /// as `portal_count ^ max_recursion`, so keep this small.
    pub max_recursion: u32,
    /// Clip each virtual frustum's near plane to the destination portal
    /// surface instead of reusing the base projection.
    pub oblique_clip: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_recursion: 1,
            oblique_clip: true,
        }
    }
}

/// View matrix as seen from the destination side of a portal: world points
/// are mapped into the destination portal's local frame, spun 180° about up
/// (paired portals face each other), re-expressed in the entry portal's
/// frame, and then pushed through the incoming view.
pub fn portal_view_matrix(entry_world: Mat4, dest_world: Mat4, view: Mat4) -> Mat4 {
    view * entry_world * Mat4::from_rotation_y(PI) * dest_world.inverse()
}

/// Where the virtual camera sits: the real camera position expressed in
/// entry-local coordinates, mirrored through the 180° facing convention,
/// and carried out through the destination portal's transform.
pub fn virtual_camera_position(entry: &Transform, dest: &Transform, camera_pos: Vec3) -> Vec3 {
    let local = entry.inverse_transform_point(camera_pos);
    let mirrored = Vec3::new(-local.x, local.y, -local.z);
    dest.transform_point(mirrored)
}

/// Projection whose near plane coincides with the destination portal's
/// surface (Lengyel's oblique frustum clipping). The clip plane is built
/// from the portal's forward vector and its distance from the origin, moved
/// into view space, and written over the projection's depth row.
pub fn clipped_projection(dest: &mut Transform, view: Mat4, projection: Mat4) -> Mat4 {
    let normal = dest.forward();
    let distance = dest.position().length() - PORTAL_CLIP_INSET;
    let plane_world = Vec4::new(normal.x, normal.y, normal.z, distance);
    let plane_view = view.inverse().transpose() * plane_world;
    apply_oblique_clip(projection, plane_view)
}

fn apply_oblique_clip(projection: Mat4, plane: Vec4) -> Mat4 {
    // Frustum corner opposite the plane, pulled back through the projection.
    let corner = projection.inverse() * Vec4::new(plane.x.signum(), plane.y.signum(), 1.0, 1.0);
    let denom = plane.dot(corner);
    if denom.abs() < OBLIQUE_DENOM_EPSILON {
        // Near-parallel plane; clipping would blow up, keep the base frustum.
        return projection;
    }

    let scaled = plane * (2.0 / denom);
    let mut m = projection.to_cols_array_2d();
    m[0][2] = scaled.x - m[0][3];
    m[1][2] = scaled.y - m[1][3];
    m[2][2] = scaled.z - m[2][3];
    m[3][2] = scaled.w - m[3][3];
    Mat4::from_cols_array_2d(&m)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_4, PI};

    use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

    use crate::transform::Transform;

    use super::{
        apply_oblique_clip, clipped_projection, portal_view_matrix, virtual_camera_position,
    };

    const EPS: f32 = 1e-4;

    #[test]
    fn pure_translation_pair_offsets_and_mirrors_the_camera() {
        // Two portals 10 units apart along X, both at identity orientation.
        // The derived position is the camera offset carried to the far
        // portal, mirrored across the portal normal by the 180° convention.
        let mut entry = Transform::new();
        entry.set_position(Vec3::new(0.0, 2.0, 0.0));
        let mut dest = Transform::new();
        dest.set_position(Vec3::new(10.0, 2.0, 0.0));

        let camera = Vec3::new(1.0, 3.0, -2.0);
        let virtual_pos = virtual_camera_position(&entry, &dest, camera);
        assert!((virtual_pos - Vec3::new(9.0, 3.0, 2.0)).length() < EPS);
    }

    #[test]
    fn virtual_view_sees_destination_side_points_like_the_real_view() {
        // A point one unit behind the destination portal must land exactly
        // where a point one unit in front of the entry portal lands in the
        // real view: looking into a portal shows the far side.
        let mut entry = Transform::new();
        entry.set_position(Vec3::new(0.0, 2.0, 10.0));
        entry.set_pitch_yaw_roll(Vec3::new(0.0, PI, 0.0));
        let mut dest = Transform::new();
        dest.set_position(Vec3::new(20.0, 2.0, 10.0));

        let view = Mat4::look_to_lh(Vec3::new(0.0, 2.0, 0.0), Vec3::Z, Vec3::Y);
        let virtual_view =
            portal_view_matrix(entry.world_matrix(), dest.world_matrix(), view);

        // Entry faces -Z; one unit in front of it (toward the camera).
        let before_entry = Vec3::new(0.0, 2.0, 9.0);
        // Dest faces +Z; the matching point one unit behind its surface.
        let behind_dest = Vec3::new(20.0, 2.0, 11.0);

        let real = (view * before_entry.extend(1.0)).xyz();
        let through = (virtual_view * behind_dest.extend(1.0)).xyz();
        // The virtual point sits one unit deeper than the portal surface.
        assert!((through.x - real.x).abs() < EPS);
        assert!((through.y - real.y).abs() < EPS);
        assert!((through.z - (real.z + 2.0)).abs() < EPS);
    }

    #[test]
    fn degenerate_clip_plane_falls_back_to_base_projection() {
        let projection = Mat4::perspective_lh(FRAC_PI_4, 16.0 / 9.0, 0.01, 100.0);
        let clipped = apply_oblique_clip(projection, Vec4::ZERO);
        assert_eq!(clipped, projection);
    }

    #[test]
    fn clipped_projection_rewrites_only_the_depth_row() {
        let mut dest = Transform::new();
        dest.set_position(Vec3::new(10.0, 2.0, 8.0));
        let view = Mat4::look_to_lh(Vec3::new(0.0, 2.0, 0.0), Vec3::Z, Vec3::Y);
        let projection = Mat4::perspective_lh(FRAC_PI_4, 16.0 / 9.0, 0.01, 100.0);

        let clipped = clipped_projection(&mut dest, view, projection);
        let base = projection.to_cols_array_2d();
        let new = clipped.to_cols_array_2d();
        for col in 0..4 {
            for row in [0, 1, 3] {
                assert_eq!(new[col][row], base[col][row], "column {col} row {row}");
            }
        }
        assert_ne!(clipped, projection);
    }
}
