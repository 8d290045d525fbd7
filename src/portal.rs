//! Portals: the convex windings connecting adjacent leaves.
//!
//! The head node starts out with six portals facing the outside leaf on
//! the faces of its (padded) bounding box. Descending the tree, each node
//! adds a portal on its own plane, clipped by the portals it already has,
//! and hands its portals down to its children, cutting any that straddle
//! its plane. What the leaves end up holding tiles their boundaries.

use crate::aabb::Aabb;
use crate::bsp::{NodeId, NodeKind, Tree};
use crate::errors::CompileError;
use crate::float_types::{Real, SIDESPACE};
use crate::plane::{Plane, PlaneTable};
use crate::winding::Winding;
use log::info;
use nalgebra::Vector3;

/// Largest vector area a leaf's portals may leave open, relative to their
/// total area.
const CLOSURE_EPSILON: Real = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub usize);

#[derive(Debug, Clone)]
pub struct Portal {
    /// `nodes[0]` lies in front of this plane, `nodes[1]` behind it
    pub plane: Plane,
    pub nodes: [NodeId; 2],
    pub winding: Winding,
}

impl Portal {
    /// The node on the other side from `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }

    /// Plane oriented so that `node` lies behind it.
    pub fn plane_facing_away_from(&self, node: NodeId) -> Plane {
        if self.nodes[0] == node {
            self.plane.flipped()
        } else {
            self.plane
        }
    }
}

/// Portals of one tree and the portal list of every node.
#[derive(Debug, Clone, Default)]
pub struct PortalGraph {
    pub portals: Vec<Portal>,
    node_portals: Vec<Vec<PortalId>>,
}

impl PortalGraph {
    pub fn portal(&self, id: PortalId) -> &Portal {
        &self.portals[id.0]
    }

    /// Portals bounding `node`; empty for internal nodes once built.
    pub fn node_portals(&self, node: NodeId) -> &[PortalId] {
        self.node_portals
            .get(node.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    fn add(&mut self, portal: Portal) -> PortalId {
        let id = PortalId(self.portals.len());
        let [front, back] = portal.nodes;
        self.portals.push(portal);
        self.node_portals[front.0].push(id);
        self.node_portals[back.0].push(id);
        id
    }

    fn relink(&mut self, id: PortalId, nodes: [NodeId; 2]) {
        self.portals[id.0].nodes = nodes;
        self.node_portals[nodes[0].0].push(id);
        self.node_portals[nodes[1].0].push(id);
    }

    fn unlink(&mut self, id: PortalId) {
        let [a, b] = self.portals[id.0].nodes;
        self.node_portals[a.0].retain(|&p| p != id);
        self.node_portals[b.0].retain(|&p| p != id);
    }

    /// Total winding area of the portals around `node`.
    pub fn boundary_area(&self, node: NodeId) -> Real {
        self.node_portals(node)
            .iter()
            .map(|id| self.portals[id.0].winding.area())
            .sum()
    }
}

/// Bounds the portal graph is built inside: the tree's head node box
/// padded once more, so no leaf touching it has zero volume.
pub fn portal_bounds(tree: &Tree) -> Aabb {
    tree.node(tree.root).bounds.expanded(SIDESPACE)
}

fn make_headnode_portals(tree: &Tree, graph: &mut PortalGraph, eps: Real, extent: Real) {
    let bounds = portal_bounds(tree);
    let mut planes = Vec::with_capacity(6);
    for axis in 0..3 {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        // inward facing, so the head node is in front
        planes.push(Plane {
            normal,
            dist: bounds.mins[axis],
        });
        planes.push(Plane {
            normal: -normal,
            dist: -bounds.maxs[axis],
        });
    }

    for (i, plane) in planes.iter().enumerate() {
        let mut winding = Some(Winding::base_for_plane(plane, extent));
        for (j, other) in planes.iter().enumerate() {
            if i == j {
                continue;
            }
            winding = winding.and_then(|w| w.chop_keep_on(other, eps));
        }
        if let Some(winding) = winding {
            graph.add(Portal {
                plane: *plane,
                nodes: [tree.root, tree.outside],
                winding,
            });
        }
    }
}

fn cut_node_portals(
    tree: &Tree,
    node: NodeId,
    planes: &PlaneTable,
    graph: &mut PortalGraph,
    eps: Real,
    extent: Real,
) -> Result<(), CompileError> {
    let NodeKind::Internal(internal) = &tree.node(node).kind else {
        return Ok(());
    };
    let plane = planes.get(internal.plane);
    let [front, back] = internal.children;

    // new portal on the node plane, bounded by the node's existing portals
    let mut winding = Winding::base_for_plane(&plane, extent);
    for id in graph.node_portals(node).to_vec() {
        let clip = graph.portal(id).plane_facing_away_from(node).flipped();
        winding = winding.chop_keep_on(&clip, eps).ok_or_else(|| {
            CompileError::invariant_on(
                format!("entity {}: new node portal was clipped away", tree.entity),
                internal.plane,
            )
        })?;
    }
    graph.add(Portal {
        plane,
        nodes: [front, back],
        winding,
    });

    // hand the node's portals down to whichever children they touch
    for id in graph.node_portals(node).to_vec() {
        let portal = graph.portal(id).clone();
        let side = if portal.nodes[0] == node { 0 } else { 1 };
        let other = portal.nodes[1 - side];
        graph.unlink(id);

        let link = |child: NodeId| -> [NodeId; 2] {
            if side == 0 { [child, other] } else { [other, child] }
        };
        match portal.winding.clip(&plane, eps, true) {
            (Some(_), None) => graph.relink(id, link(front)),
            (None, Some(_)) => graph.relink(id, link(back)),
            (Some(front_winding), Some(back_winding)) => {
                graph.portals[id.0].winding = front_winding;
                graph.relink(id, link(front));
                graph.add(Portal {
                    plane: portal.plane,
                    nodes: link(back),
                    winding: back_winding,
                });
            }
            (None, None) => {}
        }
    }

    cut_node_portals(tree, front, planes, graph, eps, extent)?;
    cut_node_portals(tree, back, planes, graph, eps, extent)
}

/// A leaf's portals enclose it only if their outward area vectors cancel.
fn check_closure(tree: &Tree, graph: &PortalGraph) -> Result<(), CompileError> {
    for leaf in tree.leaves() {
        if leaf == tree.outside {
            continue;
        }
        let mut open: Vector3<Real> = Vector3::zeros();
        let mut total: Real = 0.0;
        for id in graph.node_portals(leaf) {
            let portal = graph.portal(*id);
            let area = portal.winding.area();
            open += portal.plane_facing_away_from(leaf).normal * area;
            total += area;
        }
        if open.norm() > CLOSURE_EPSILON * total.max(1.0) {
            return Err(CompileError::invariant(format!(
                "entity {}: portals of leaf {} leave {} units open",
                tree.entity,
                leaf.0,
                open.norm()
            )));
        }
    }
    Ok(())
}

/// Builds the portal graph of `tree`.
///
/// Fails with [`CompileError::Invariant`] when a node's portal is clipped
/// away or a leaf ends up without a closed boundary.
pub fn portalize(
    tree: &Tree,
    planes: &PlaneTable,
    eps: Real,
    extent: Real,
) -> Result<PortalGraph, CompileError> {
    let mut graph = PortalGraph {
        portals: Vec::new(),
        node_portals: vec![Vec::new(); tree.nodes.len()],
    };
    make_headnode_portals(tree, &mut graph, eps, extent);
    cut_node_portals(tree, tree.root, planes, &mut graph, eps, extent)?;
    check_closure(tree, &graph)?;

    info!(
        "entity {}: {} portals",
        tree.entity,
        graph.portals.len()
    );
    Ok(graph)
}
