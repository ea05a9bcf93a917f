use std::f32::consts::PI;

use glam::Vec3;
use tracing::debug;

use crate::camera::Camera;
use crate::portal::{PortalId, PortalSet};

/// Seconds the camera must wait after a teleport before it can cross again.
pub const TELEPORT_COOLDOWN: f32 = 1.0;
/// Signed distance along the portal normal at which a crossing registers.
pub const CROSSING_THRESHOLD: f32 = 0.5;
/// In-plane radius of the portal opening.
pub const FRAME_RADIUS: f32 = 1.0;

/// Emitted when the camera crossed a portal this update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teleport {
    pub entry: PortalId,
    pub destination: PortalId,
}

/// Detects the camera crossing a portal plane and relocates it to the paired
/// portal. Holds the cooldown that stops a fresh teleport from immediately
/// bouncing the camera back through the destination.
#[derive(Debug)]
pub struct PortalCrossing {
    cooldown: f32,
}

impl Default for PortalCrossing {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalCrossing {
    /// Starts with the cooldown already elapsed, so the first crossing fires.
    pub fn new() -> Self {
        Self {
            cooldown: TELEPORT_COOLDOWN,
        }
    }

    pub fn ready(&self) -> bool {
        self.cooldown >= TELEPORT_COOLDOWN
    }

    /// Advances the cooldown and checks the camera against every portal,
    /// first match wins. On a hit the camera pose is rewritten in place and
    /// the crossing is reported.
    pub fn update(
        &mut self,
        portals: &mut PortalSet,
        camera: &mut Camera,
        dt: f32,
    ) -> Option<Teleport> {
        self.cooldown += dt;
        if !self.ready() {
            return None;
        }

        let ids: Vec<PortalId> = portals.ids().collect();
        for id in ids {
            let camera_pos = camera.transform().position();
            let entry = portals.get_mut(id);
            let offset = camera_pos - entry.transform().position();
            let forward = entry.transform_mut().forward();

            let along = offset.dot(forward);
            if along > CROSSING_THRESHOLD {
                continue;
            }
            let in_plane = offset - forward * along;
            if in_plane.length() > FRAME_RADIUS {
                continue;
            }

            let destination = portals.destination_of(id);
            self.teleport(portals, id, destination, camera);
            self.cooldown = 0.0;
            debug!(
                entry = id.index(),
                destination = destination.index(),
                "camera crossed portal"
            );
            return Some(Teleport {
                entry: id,
                destination,
            });
        }
        None
    }

    fn teleport(
        &mut self,
        portals: &mut PortalSet,
        entry: PortalId,
        destination: PortalId,
        camera: &mut Camera,
    ) {
        let camera_pos = camera.transform().position();
        let camera_rot = camera.transform().pitch_yaw_roll();

        // Same mirroring as the virtual camera: express the pose in entry
        // space, spin half a turn about the portal's up axis, re-express in
        // destination space.
        let local = portals.get(entry).transform().inverse_transform_point(camera_pos);
        let mirrored = Vec3::new(-local.x, local.y, -local.z);
        let new_pos = portals.get(destination).transform().transform_point(mirrored);

        let entry_yaw = portals.get(entry).transform().pitch_yaw_roll().y;
        let dest_yaw = portals.get(destination).transform().pitch_yaw_roll().y;
        let new_yaw = dest_yaw + (camera_rot.y + PI - entry_yaw);

        let transform = camera.transform_mut();
        transform.set_position(new_pos);
        transform.set_pitch_yaw_roll(Vec3::new(camera_rot.x, new_yaw, camera_rot.z));
        camera.refresh_view();
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use glam::Vec3;

    use crate::camera::Camera;
    use crate::portal::{Portal, PortalEnd, PortalSet};
    use crate::scene::{MaterialId, MeshId};

    use super::{PortalCrossing, TELEPORT_COOLDOWN};

    fn facing_pair() -> PortalSet {
        // Entry faces -Z at the origin region, its pair sits 10 units along
        // +X facing +Z.
        let mut portals = PortalSet::new();
        let mut a = Portal::new(MeshId(0), MaterialId(0), PortalEnd::A, Vec3::Z);
        a.transform_mut().set_position(Vec3::new(0.0, 2.0, 0.0));
        a.transform_mut().set_pitch_yaw_roll(Vec3::new(0.0, PI, 0.0));
        let mut b = Portal::new(MeshId(0), MaterialId(0), PortalEnd::B, Vec3::Z);
        b.transform_mut().set_position(Vec3::new(10.0, 2.0, 0.0));
        let a = portals.add(a);
        let b = portals.add(b);
        portals.link_pair(a, b);
        portals
    }

    fn camera_at(position: Vec3) -> Camera {
        Camera::new(position, 5.0, 0.5, std::f32::consts::FRAC_PI_4, 16.0 / 9.0)
    }

    #[test]
    fn crossing_relocates_to_the_paired_portal() {
        let mut portals = facing_pair();
        // Entry faces -Z; a camera 0.3 in front of its face is within the
        // crossing threshold.
        let mut camera = camera_at(Vec3::new(0.0, 2.0, -0.3));
        let mut crossing = PortalCrossing::new();

        let teleport = crossing.update(&mut portals, &mut camera, 0.016);
        let teleport = teleport.expect("camera inside the frame should cross");
        assert_eq!(teleport.entry.index(), 0);
        assert_eq!(teleport.destination.index(), 1);

        // 0.3 in front of the entry maps to 0.3 behind the destination face,
        // so forward motion carries the camera out through it.
        let pos = camera.transform().position();
        assert!((pos - Vec3::new(10.0, 2.0, -0.3)).length() < 1e-4, "pos {pos:?}");
        // Entry yaw pi, destination yaw 0: a camera looking along +Z keeps
        // looking along +Z on the far side.
        let yaw = camera.transform().pitch_yaw_roll().y;
        assert!((yaw % (2.0 * PI)).abs() < 1e-5, "yaw {yaw}");
    }

    #[test]
    fn camera_in_front_of_the_plane_does_not_cross() {
        let mut portals = facing_pair();
        // 0.6 in front of the entry along its forward (-Z): past the
        // threshold, still approaching.
        let mut camera = camera_at(Vec3::new(0.0, 2.0, -0.6));
        let mut crossing = PortalCrossing::new();
        assert!(crossing.update(&mut portals, &mut camera, 0.016).is_none());
    }

    #[test]
    fn camera_behind_the_plane_crosses() {
        let mut portals = facing_pair();
        // Behind the entry face (+Z side when forward is -Z) the signed
        // distance is negative, well under the crossing threshold.
        let mut camera = camera_at(Vec3::new(0.0, 2.0, 0.6));
        let mut crossing = PortalCrossing::new();
        assert!(crossing.update(&mut portals, &mut camera, 0.016).is_some());
    }

    #[test]
    fn camera_outside_the_frame_does_not_cross() {
        let mut portals = facing_pair();
        let mut camera = camera_at(Vec3::new(1.5, 2.0, -0.1));
        let mut crossing = PortalCrossing::new();
        assert!(crossing.update(&mut portals, &mut camera, 0.016).is_none());
    }

    #[test]
    fn cooldown_blocks_an_immediate_second_crossing() {
        let mut portals = facing_pair();
        let mut camera = camera_at(Vec3::new(0.0, 2.0, -0.3));
        let mut crossing = PortalCrossing::new();

        assert!(crossing.update(&mut portals, &mut camera, 0.016).is_some());
        assert!(!crossing.ready());

        // The camera now sits just behind the destination face, inside its
        // frame; without the cooldown it would bounce straight back.
        assert!(crossing.update(&mut portals, &mut camera, 0.016).is_none());

        // Once the cooldown elapses the same spot crosses again.
        assert!(crossing
            .update(&mut portals, &mut camera, TELEPORT_COOLDOWN)
            .is_some());
    }

    #[test]
    fn sideways_yaw_is_remapped_through_rotated_portals() {
        let mut portals = PortalSet::new();
        let mut a = Portal::new(MeshId(0), MaterialId(0), PortalEnd::A, Vec3::Z);
        a.transform_mut().set_position(Vec3::new(10.0, 2.0, 3.0));
        a.transform_mut()
            .set_pitch_yaw_roll(Vec3::new(0.0, -FRAC_PI_2, 0.0));
        let mut b = Portal::new(MeshId(0), MaterialId(0), PortalEnd::B, Vec3::Z);
        b.transform_mut().set_position(Vec3::new(-10.0, 2.0, 3.0));
        b.transform_mut()
            .set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        let a = portals.add(a);
        let b = portals.add(b);
        portals.link_pair(a, b);

        // Walking +X into the first portal from its -X facing side.
        let mut camera = camera_at(Vec3::new(9.8, 2.0, 3.0));
        camera
            .transform_mut()
            .set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        camera.refresh_view();

        let mut crossing = PortalCrossing::new();
        let teleport = crossing.update(&mut portals, &mut camera, 0.016);
        assert!(teleport.is_some());

        let pos = camera.transform().position();
        assert!((pos - Vec3::new(-10.2, 2.0, 3.0)).length() < 1e-4, "pos {pos:?}");
        // Still walking +X on the far side.
        let yaw = camera.transform().pitch_yaw_roll().y;
        let wrapped = (yaw - FRAC_PI_2).rem_euclid(2.0 * PI);
        assert!(wrapped < 1e-5 || (2.0 * PI - wrapped) < 1e-5, "yaw {yaw}");
    }
}
