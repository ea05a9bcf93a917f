use std::fmt;

use glam::Vec3;

use crate::scene::{MaterialId, MeshId};
use crate::transform::Transform;

/// Handle into a [`PortalSet`]. Destinations are stored as handles rather
/// than references so the scene stays the single owner of every portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortalId(usize);

impl PortalId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which half of a linked pair a portal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEnd {
    A,
    B,
}

impl PortalEnd {
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Portal {
    transform: Transform,
    mesh: MeshId,
    material: MaterialId,
    end: PortalEnd,
    border_color: Vec3,
    destination: Option<PortalId>,
}

impl Portal {
    pub fn new(mesh: MeshId, material: MaterialId, end: PortalEnd, border_color: Vec3) -> Self {
        Self {
            transform: Transform::new(),
            mesh,
            material,
            end,
            border_color,
            destination: None,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn end(&self) -> PortalEnd {
        self.end
    }

    pub fn border_color(&self) -> Vec3 {
        self.border_color
    }

    pub fn destination(&self) -> Option<PortalId> {
        self.destination
    }

    pub fn set_destination(&mut self, destination: PortalId) {
        self.destination = Some(destination);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    /// A portal has no destination at all.
    Unpaired(PortalId),
    /// A portal's destination does not point back at it.
    Asymmetric(PortalId, PortalId),
}

impl fmt::Display for PairingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaired(id) => write!(f, "portal {} has no destination", id.index()),
            Self::Asymmetric(a, b) => write!(
                f,
                "portal {} links to portal {}, which does not link back",
                a.index(),
                b.index()
            ),
        }
    }
}

impl std::error::Error for PairingError {}

/// Scene-owned arena of portals. Pairing is a symmetric relation the scene
/// maintains; [`PortalSet::validate_pairs`] checks it once at load time.
#[derive(Debug, Default)]
pub struct PortalSet {
    portals: Vec<Portal>,
}

impl PortalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, portal: Portal) -> PortalId {
        let id = PortalId(self.portals.len());
        self.portals.push(portal);
        id
    }

    /// Links two portals as each other's destination.
    pub fn link_pair(&mut self, a: PortalId, b: PortalId) {
        self.portals[a.0].set_destination(b);
        self.portals[b.0].set_destination(a);
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    pub fn get(&self, id: PortalId) -> &Portal {
        &self.portals[id.0]
    }

    pub fn get_mut(&mut self, id: PortalId) -> &mut Portal {
        &mut self.portals[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = PortalId> {
        (0..self.portals.len()).map(PortalId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.portals.iter().enumerate().map(|(i, p)| (PortalId(i), p))
    }

    /// A portal without a destination cannot produce a virtual view; hitting
    /// one during rendering is a configuration bug, not a recoverable state.
    pub fn destination_of(&self, id: PortalId) -> PortalId {
        match self.portals[id.0].destination() {
            Some(dest) => dest,
            None => panic!("portal {} has no destination", id.0),
        }
    }

    pub fn validate_pairs(&self) -> Result<(), PairingError> {
        for (id, portal) in self.iter() {
            let dest = portal.destination().ok_or(PairingError::Unpaired(id))?;
            if self.portals[dest.0].destination() != Some(id) {
                return Err(PairingError::Asymmetric(id, dest));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::scene::{MaterialId, MeshId};

    use super::{PairingError, Portal, PortalEnd, PortalSet};

    fn test_portal(end: PortalEnd) -> Portal {
        Portal::new(MeshId(0), MaterialId(0), end, Vec3::new(0.0, 0.0, 1.0))
    }

    #[test]
    fn linked_pair_is_symmetric() {
        let mut portals = PortalSet::new();
        let a = portals.add(test_portal(PortalEnd::A));
        let b = portals.add(test_portal(PortalEnd::B));
        portals.link_pair(a, b);

        assert_eq!(portals.destination_of(portals.destination_of(a)), a);
        assert_eq!(portals.destination_of(portals.destination_of(b)), b);
        assert!(portals.validate_pairs().is_ok());
    }

    #[test]
    fn validation_reports_unpaired_portal() {
        let mut portals = PortalSet::new();
        let a = portals.add(test_portal(PortalEnd::A));
        assert_eq!(portals.validate_pairs(), Err(PairingError::Unpaired(a)));
    }

    #[test]
    fn validation_reports_asymmetric_pairing() {
        let mut portals = PortalSet::new();
        let a = portals.add(test_portal(PortalEnd::A));
        let b = portals.add(test_portal(PortalEnd::B));
        let c = portals.add(test_portal(PortalEnd::A));
        portals.link_pair(b, c);
        portals.get_mut(a).set_destination(b);

        assert_eq!(
            portals.validate_pairs(),
            Err(PairingError::Asymmetric(a, b))
        );
    }

    #[test]
    #[should_panic(expected = "has no destination")]
    fn missing_destination_is_fatal() {
        let mut portals = PortalSet::new();
        let a = portals.add(test_portal(PortalEnd::A));
        portals.destination_of(a);
    }

    #[test]
    fn portal_ends_alternate() {
        assert_eq!(PortalEnd::A.other(), PortalEnd::B);
        assert_eq!(PortalEnd::B.other().index(), 0);
    }
}
