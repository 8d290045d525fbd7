//! Solid BSP trees.
//!
//! Trees are built recursively as owned nodes (so front and back subtrees
//! can be built on different threads) and then flattened into an arena
//! where every reference is a [`NodeId`] or a [`FaceKey`].

pub mod build;
pub mod traits;

#[cfg(not(feature = "parallel"))]
pub mod serial;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use build::{BspStats, build_tree};
pub use traits::{BspOps, GoodTreeStrategy, MidSplitStrategy, SplitStrategy};

#[cfg(not(feature = "parallel"))]
pub use serial::SerialBspOps;

#[cfg(feature = "parallel")]
pub use parallel::ParallelBspOps;

use crate::aabb::Aabb;
use crate::contents::Contents;
use crate::face::{Face, FaceKey};
use crate::float_types::{NORMAL_EPSILON, Real};
use crate::map::EntityId;
use crate::plane::{Plane, PlaneId, PlaneTable};
use nalgebra::Point3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct InternalNode {
    pub plane: PlaneId,
    /// Front, back
    pub children: [NodeId; 2],
    /// Faces lying on this node's plane, written with the node
    pub faces: Vec<FaceKey>,
    /// Split by a detail-only surface; every leaf below shares one
    /// visibility cluster with its siblings
    pub detail_separator: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LeafData {
    pub contents: Contents,
    /// Node faces visible from inside this leaf
    pub markfaces: Vec<FaceKey>,
    pub cluster: Option<usize>,
    /// Portal hops from the void, `None` when unreachable
    pub outside_distance: Option<usize>,
    /// Entity whose origin lies in this leaf
    pub occupant: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Internal(InternalNode),
    Leaf(LeafData),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub bounds: Aabb,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub const fn leaf(&self) -> Option<&LeafData> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub const fn internal(&self) -> Option<&InternalNode> {
        match &self.kind {
            NodeKind::Internal(node) => Some(node),
            NodeKind::Leaf(_) => None,
        }
    }
}

/// A finished tree for one model and hull.
#[derive(Debug, Clone)]
pub struct Tree {
    pub entity: EntityId,
    pub nodes: Vec<Node>,
    pub root: NodeId,
    /// Leaf standing for everything outside the head node's box; not
    /// reachable from `root`
    pub outside: NodeId,
    /// Node faces, indexed by [`FaceKey`]
    pub faces: Vec<Face>,
    /// Bounds of the model's geometry
    pub bounds: Aabb,
}

impl Tree {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn leaf(&self, id: NodeId) -> Option<&LeafData> {
        self.nodes[id.0].leaf()
    }

    pub fn leaf_mut(&mut self, id: NodeId) -> Option<&mut LeafData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn face(&self, key: FaceKey) -> &Face {
        &self.faces[key.0]
    }

    /// Leaves reachable from the root, in depth-first order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0].kind {
                NodeKind::Leaf(_) => out.push(id),
                NodeKind::Internal(n) => {
                    stack.push(n.children[1]);
                    stack.push(n.children[0]);
                }
            }
        }
        out
    }

    /// Internal nodes reachable from the root, in depth-first order.
    pub fn internal_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let NodeKind::Internal(n) = &self.nodes[id.0].kind {
                out.push(id);
                stack.push(n.children[1]);
                stack.push(n.children[0]);
            }
        }
        out
    }

    pub fn contents(&self, id: NodeId) -> Option<Contents> {
        self.leaf(id).map(|l| l.contents)
    }

    /// Leaf containing `p`; points on a plane go to the front.
    pub fn point_in_leaf(&self, p: &Point3<Real>, planes: &PlaneTable) -> NodeId {
        let mut id = self.root;
        while let NodeKind::Internal(n) = &self.nodes[id.0].kind {
            let d = planes.get(n.plane).distance_to(p);
            id = n.children[if d >= 0.0 { 0 } else { 1 }];
        }
        id
    }

    /// Half-spaces bounding `leaf`, each oriented with the leaf behind it.
    pub fn path_planes(&self, leaf: NodeId, planes: &PlaneTable) -> Vec<Plane> {
        let mut out = Vec::new();
        let mut child = leaf;
        while let Some(parent) = self.nodes[child.0].parent {
            if let NodeKind::Internal(n) = &self.nodes[parent.0].kind {
                let plane = planes.get(n.plane);
                out.push(if n.children[0] == child {
                    plane.flipped()
                } else {
                    plane
                });
            }
            child = parent;
        }
        out
    }

    /// Gives every leaf a visibility cluster. Leaves below the topmost
    /// detail separator of a subtree share that separator's cluster; every
    /// other leaf is its own cluster. Returns the cluster count.
    pub fn assign_clusters(&mut self) -> usize {
        let mut next = 0;
        let mut stack = vec![(self.root, None::<usize>)];
        while let Some((id, shared)) = stack.pop() {
            match &mut self.nodes[id.0].kind {
                NodeKind::Leaf(leaf) => {
                    leaf.cluster = Some(shared.unwrap_or_else(|| {
                        next += 1;
                        next - 1
                    }));
                }
                NodeKind::Internal(n) => {
                    let shared = match shared {
                        None if n.detail_separator => {
                            next += 1;
                            Some(next - 1)
                        }
                        other => other,
                    };
                    let children = n.children;
                    stack.push((children[1], shared));
                    stack.push((children[0], shared));
                }
            }
        }
        next
    }

    pub fn has_detail_separators(&self) -> bool {
        self.internal_nodes().iter().any(|id| {
            self.nodes[id.0]
                .internal()
                .is_some_and(|n| n.detail_separator)
        })
    }
}

/// Splits `bounds` by `plane` into front and back boxes. Axial planes cut
/// exactly; sloped planes shrink each box to the extent of the plane's
/// intersection with the original box on each axis.
pub fn divide_bounds(bounds: &Aabb, plane: &Plane) -> (Aabb, Aabb) {
    let mut front = *bounds;
    let mut back = *bounds;
    let plane_type = plane.plane_type();
    if plane_type.is_axial() {
        let axis = plane_type.axis();
        // canonical axial planes face the positive axis
        let dist = plane.dist * plane.normal[axis];
        if plane.normal[axis] > 0.0 {
            front.mins[axis] = dist;
            back.maxs[axis] = dist;
        } else {
            front.maxs[axis] = dist;
            back.mins[axis] = dist;
        }
        return (front, back);
    }

    let (mins, maxs) = (bounds.mins, bounds.maxs);
    let corners = [mins, maxs];
    for a in 0..3 {
        if plane.normal[a].abs() < NORMAL_EPSILON {
            continue;
        }
        let b = (a + 1) % 3;
        let c = (a + 2) % 3;
        let mut split_mins = maxs[a];
        let mut split_maxs = mins[a];
        for i in 0..2 {
            for j in 0..2 {
                let mut corner = Point3::origin();
                corner[b] = corners[i][b];
                corner[c] = corners[j][c];
                corner[a] = mins[a];
                let d1 = plane.distance_to(&corner);
                corner[a] = maxs[a];
                let d2 = plane.distance_to(&corner);
                let mid = mins[a] + (maxs[a] - mins[a]) * (d1 / (d1 - d2));
                split_mins = mid.min(split_mins).max(mins[a]);
                split_maxs = mid.max(split_maxs).min(maxs[a]);
            }
        }
        if plane.normal[a] > 0.0 {
            front.mins[a] = split_mins;
            back.maxs[a] = split_maxs;
        } else {
            back.mins[a] = split_mins;
            front.maxs[a] = split_maxs;
        }
    }
    (front, back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn divide_bounds_axial_and_sloped() {
        let b = Aabb::new(Point3::new(-8.0, -8.0, -8.0), Point3::new(8.0, 8.0, 8.0));
        let (front, back) = divide_bounds(&b, &Plane::new(Vector3::x(), 2.0));
        assert_eq!(front.mins.x, 2.0);
        assert_eq!(back.maxs.x, 2.0);

        let (front, back) = divide_bounds(&b, &Plane::new(Vector3::new(1.0, 1.0, 0.0), 0.0));
        // the diagonal reaches every x in the box, so x is not shrunk
        assert_eq!(front.mins.x, -8.0);
        assert_eq!(back.maxs.x, 8.0);
        assert_eq!(front.maxs.z, 8.0);
        assert_eq!(back.mins.z, -8.0);
    }
}
