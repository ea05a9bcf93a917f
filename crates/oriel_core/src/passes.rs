use glam::{Mat4, Vec3};

use crate::portal::{PortalId, PortalSet};
use crate::view::{clipped_projection, portal_view_matrix, virtual_camera_position, RenderOptions};

/// The fixed depth/stencil configurations the portal walk switches between.
/// Each is built once at startup by the GPU layer and selected by recursion
/// level; none is ever mutated at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthStencilMode {
    /// Depth off; increment stencil where it equals the reference. Marks the
    /// inner-portal pixels for the current level.
    StencilWrite,
    /// Depth test on; draw only where stencil equals the reference. The
    /// innermost virtual scene renders under this.
    InnerScene,
    /// Depth on, writes off; decrement stencil where it equals the
    /// reference. Reverses [`DepthStencilMode::StencilWrite`].
    StencilUndo,
    /// Stencil off, depth always-pass with writes. Stamps portal surfaces
    /// into the depth buffer so later geometry occludes correctly.
    PortalDepth,
    /// Depth less-equal; draw where stencil is at least the reference.
    PortalBorder,
    /// Depth test on; draw where stencil is at least the reference. Keeps
    /// the outer scene off inner-portal pixels.
    SceneStencilGe,
}

/// View/projection/eye for one draw. Derived frames are recomputed from the
/// parent every frame because they depend on the live camera pose.
#[derive(Debug, Clone, Copy)]
pub struct ViewFrame {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_pos: Vec3,
}

/// One step of the portal pass plan. `frame` indexes [`PassPlan::frames`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassCmd {
    SetDepthStencil { mode: DepthStencilMode, reference: u32 },
    ClearDepth,
    /// Draw a portal quad with fragment output suppressed; only the depth
    /// and stencil buffers are touched.
    DrawPortalMask { portal: PortalId, frame: usize },
    DrawPortalBorder { portal: PortalId, frame: usize, recursive: bool },
    /// Draw every visible non-portal entity.
    DrawScene { frame: usize },
}

/// Ordered command list for one frame's portal rendering. The GPU layer
/// executes it verbatim; tests inspect it directly.
#[derive(Debug, Default)]
pub struct PassPlan {
    pub frames: Vec<ViewFrame>,
    pub cmds: Vec<PassCmd>,
}

impl PassPlan {
    fn push_frame(&mut self, frame: ViewFrame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }
}

/// Builds the full recursive portal pass plan for one frame, mirroring the
/// depth-first walk described in the module docs: per portal a stencil
/// increment, a recursion (or base-case scene draw) inside that mask, and a
/// matching stencil undo; then portal depth, borders, and the outer scene
/// for the level. Stencil increments and undos pair up on every path, so
/// the stencil buffer drains back to zero by the end of the plan.
pub fn plan_portal_passes(
    portals: &mut PortalSet,
    root: ViewFrame,
    options: &RenderOptions,
) -> PassPlan {
    assert!(options.max_recursion >= 1, "max_recursion must be at least 1");
    let mut plan = PassPlan::default();
    let root_index = plan.push_frame(root);
    walk(portals, &mut plan, root_index, options, 0);
    plan
}

fn walk(
    portals: &mut PortalSet,
    plan: &mut PassPlan,
    frame: usize,
    options: &RenderOptions,
    level: u32,
) {
    let ids: Vec<PortalId> = portals.ids().collect();

    for &id in &ids {
        // Mark this portal's pixels: stencil goes from `level` to `level+1`
        // inside the quad.
        plan.cmds.push(PassCmd::SetDepthStencil {
            mode: DepthStencilMode::StencilWrite,
            reference: level,
        });
        plan.cmds.push(PassCmd::DrawPortalMask { portal: id, frame });

        let parent = plan.frames[frame];
        let derived = derive_frame(portals, id, parent, options);
        let derived_index = plan.push_frame(derived);

        if level == options.max_recursion {
            // Base case: the world seen through this portal, constrained to
            // the pixels the increment pass just marked.
            plan.cmds.push(PassCmd::SetDepthStencil {
                mode: DepthStencilMode::InnerScene,
                reference: level + 1,
            });
            plan.cmds.push(PassCmd::ClearDepth);
            plan.cmds.push(PassCmd::DrawScene {
                frame: derived_index,
            });
            plan.cmds.push(PassCmd::DrawPortalBorder {
                portal: id,
                frame: derived_index,
                recursive: false,
            });
        } else {
            walk(portals, plan, derived_index, options, level + 1);
        }

        // Undo the increment so sibling portals start from a clean mask.
        plan.cmds.push(PassCmd::SetDepthStencil {
            mode: DepthStencilMode::StencilUndo,
            reference: level + 1,
        });
        plan.cmds.push(PassCmd::ClearDepth);
        plan.cmds.push(PassCmd::DrawPortalMask { portal: id, frame });
    }

    plan.cmds.push(PassCmd::ClearDepth);

    // Portal surfaces into the depth buffer so the outer scene cannot draw
    // over what is visible through them.
    plan.cmds.push(PassCmd::SetDepthStencil {
        mode: DepthStencilMode::PortalDepth,
        reference: 0,
    });
    for &id in &ids {
        plan.cmds.push(PassCmd::DrawPortalMask { portal: id, frame });
    }

    plan.cmds.push(PassCmd::SetDepthStencil {
        mode: DepthStencilMode::PortalBorder,
        reference: level,
    });
    for &id in &ids {
        plan.cmds.push(PassCmd::DrawPortalBorder {
            portal: id,
            frame,
            recursive: true,
        });
    }

    // Outer scene for this level, kept off inner-portal pixels.
    plan.cmds.push(PassCmd::SetDepthStencil {
        mode: DepthStencilMode::SceneStencilGe,
        reference: level,
    });
    plan.cmds.push(PassCmd::DrawScene { frame });
}

fn derive_frame(
    portals: &mut PortalSet,
    entry: PortalId,
    parent: ViewFrame,
    options: &RenderOptions,
) -> ViewFrame {
    let dest = portals.destination_of(entry);
    let entry_world = portals.get_mut(entry).transform_mut().world_matrix();
    let dest_world = portals.get_mut(dest).transform_mut().world_matrix();

    let view = portal_view_matrix(entry_world, dest_world, parent.view);
    let camera_pos = virtual_camera_position(
        portals.get(entry).transform(),
        portals.get(dest).transform(),
        parent.camera_pos,
    );
    let projection = if options.oblique_clip {
        clipped_projection(portals.get_mut(dest).transform_mut(), view, parent.projection)
    } else {
        parent.projection
    };

    ViewFrame {
        view,
        projection,
        camera_pos,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use glam::{Mat4, Vec3};

    use crate::portal::{Portal, PortalEnd, PortalId, PortalSet};
    use crate::scene::{MaterialId, MeshId};
    use crate::view::RenderOptions;

    use super::{plan_portal_passes, DepthStencilMode, PassCmd, ViewFrame};

    fn root_frame() -> ViewFrame {
        ViewFrame {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_lh(0.8, 16.0 / 9.0, 0.01, 100.0),
            camera_pos: Vec3::ZERO,
        }
    }

    fn portal_pair(portals: &mut PortalSet, x: f32) -> (PortalId, PortalId) {
        let mut a = Portal::new(MeshId(0), MaterialId(0), PortalEnd::A, Vec3::Z);
        a.transform_mut().set_position(Vec3::new(x, 2.0, 10.0));
        let mut b = Portal::new(MeshId(0), MaterialId(0), PortalEnd::B, Vec3::Z);
        b.transform_mut().set_position(Vec3::new(x + 10.0, 2.0, 10.0));
        let a = portals.add(a);
        let b = portals.add(b);
        portals.link_pair(a, b);
        (a, b)
    }

    /// Replays the plan's stencil effect per portal: increments where the
    /// mode says increment, decrements where it says decrement. Net must be
    /// zero for every portal regardless of depth or portal count.
    fn stencil_balance(portals: &mut PortalSet, options: &RenderOptions) -> HashMap<usize, i32> {
        let plan = plan_portal_passes(portals, root_frame(), options);
        let mut mode = None;
        let mut balance: HashMap<usize, i32> = HashMap::new();
        for cmd in &plan.cmds {
            match *cmd {
                PassCmd::SetDepthStencil { mode: m, .. } => mode = Some(m),
                PassCmd::DrawPortalMask { portal, .. } => match mode {
                    Some(DepthStencilMode::StencilWrite) => {
                        *balance.entry(portal.index()).or_default() += 1;
                    }
                    Some(DepthStencilMode::StencilUndo) => {
                        *balance.entry(portal.index()).or_default() -= 1;
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        balance
    }

    #[test]
    fn stencil_increments_and_undos_cancel_per_portal() {
        for pairs in 1..=3 {
            for max_recursion in 1..=3 {
                let mut portals = PortalSet::new();
                for i in 0..pairs {
                    portal_pair(&mut portals, i as f32 * 30.0);
                }
                let options = RenderOptions {
                    max_recursion,
                    oblique_clip: false,
                };
                let balance = stencil_balance(&mut portals, &options);
                for (portal, net) in balance {
                    assert_eq!(net, 0, "portal {portal} drifted at depth {max_recursion}");
                }
            }
        }
    }

    #[test]
    fn plan_work_scales_with_portal_count_per_level() {
        let mut portals = PortalSet::new();
        portal_pair(&mut portals, 0.0);
        let options = RenderOptions {
            max_recursion: 2,
            oblique_clip: false,
        };
        let plan = plan_portal_passes(&mut portals, root_frame(), &options);

        // One derived frame per portal per visited level: 2 + 4 + 8, plus
        // the root.
        assert_eq!(plan.frames.len(), 1 + 2 + 4 + 8);

        let scene_draws = plan
            .cmds
            .iter()
            .filter(|cmd| matches!(cmd, PassCmd::DrawScene { .. }))
            .count();
        // Base-case scene per innermost portal plus one outer scene per
        // visited walk: 8 + (1 + 2 + 4).
        assert_eq!(scene_draws, 15);
    }

    #[test]
    fn every_stencil_write_is_followed_by_matching_undo_reference() {
        let mut portals = PortalSet::new();
        portal_pair(&mut portals, 0.0);
        let options = RenderOptions::default();
        let plan = plan_portal_passes(&mut portals, root_frame(), &options);

        let mut pending: Vec<u32> = Vec::new();
        for cmd in &plan.cmds {
            if let PassCmd::SetDepthStencil { mode, reference } = cmd {
                match mode {
                    DepthStencilMode::StencilWrite => pending.push(*reference),
                    DepthStencilMode::StencilUndo => {
                        let opened = pending.pop().expect("undo without a matching write");
                        assert_eq!(opened + 1, *reference);
                    }
                    _ => {}
                }
            }
        }
        assert!(pending.is_empty(), "unbalanced stencil writes: {pending:?}");
    }

    #[test]
    fn base_case_draws_inside_the_incremented_mask() {
        let mut portals = PortalSet::new();
        portal_pair(&mut portals, 0.0);
        let options = RenderOptions {
            max_recursion: 1,
            oblique_clip: false,
        };
        let plan = plan_portal_passes(&mut portals, root_frame(), &options);

        // The innermost scene draw must run with stencil == level + 1.
        let mut current = None;
        let mut inner_scene_refs = Vec::new();
        for cmd in &plan.cmds {
            match cmd {
                PassCmd::SetDepthStencil { mode, reference } => current = Some((*mode, *reference)),
                PassCmd::DrawScene { .. } => {
                    if let Some((DepthStencilMode::InnerScene, reference)) = current {
                        inner_scene_refs.push(reference);
                    }
                }
                _ => {}
            }
        }
        assert!(!inner_scene_refs.is_empty());
        assert!(inner_scene_refs.iter().all(|&r| r == 2));
    }

    #[test]
    #[should_panic(expected = "has no destination")]
    fn unpaired_portal_fails_fast() {
        let mut portals = PortalSet::new();
        portals.add(Portal::new(MeshId(0), MaterialId(0), PortalEnd::A, Vec3::Z));
        plan_portal_passes(&mut portals, root_frame(), &RenderOptions::default());
    }

    #[test]
    #[should_panic(expected = "max_recursion")]
    fn zero_recursion_depth_is_rejected() {
        let mut portals = PortalSet::new();
        portal_pair(&mut portals, 0.0);
        let options = RenderOptions {
            max_recursion: 0,
            oblique_clip: false,
        };
        plan_portal_passes(&mut portals, root_frame(), &options);
    }
}
