use glam::Vec3;

use crate::portal::{PairingError, PortalSet};
use crate::transform::Transform;

/// Handle to a renderer-owned mesh (index and vertex buffers live GPU-side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

/// Handle to a renderer-owned material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

#[derive(Debug, Clone)]
pub struct Entity {
    pub transform: Transform,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub visible: bool,
}

impl Entity {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            transform: Transform::new(),
            mesh,
            material,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
}

/// Plain light data forwarded to the shading pass.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightKind,
    pub direction: Vec3,
    pub position: Vec3,
    pub range: f32,
    pub intensity: f32,
    pub color: Vec3,
}

impl Light {
    pub fn directional(direction: Vec3, intensity: f32, color: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            direction,
            position: Vec3::ZERO,
            range: 0.0,
            intensity,
            color,
        }
    }

    pub fn point(position: Vec3, range: f32, intensity: f32, color: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            direction: Vec3::ZERO,
            position,
            range,
            intensity,
            color,
        }
    }
}

/// Everything the renderer reads each frame: non-portal entities, the portal
/// arena, and the light list. Construction parameters are literal; there is
/// no asset pipeline behind this.
#[derive(Debug, Default)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub portals: PortalSet,
    pub lights: Vec<Light>,
    pub ambient: Vec3,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load-time validation: every portal must be half of a symmetric pair.
    pub fn validate(&self) -> Result<(), PairingError> {
        self.portals.validate_pairs()
    }
}
