//! Leak detection and outside filling.
//!
//! A breadth-first flood from the outside leaf through every leaf that does
//! not block it gives each reachable leaf its distance from the void. An
//! occupied leaf with a distance is a leak. Without a leak, everything the
//! occupants cannot reach is outside the playable space and gets filled.

use crate::bsp::{NodeId, Tree};
use crate::contents::Contents;
use crate::face::FaceKey;
use crate::float_types::Real;
use crate::map::EntityId;
use crate::plane::PlaneTable;
use crate::portal::PortalGraph;
use hashbrown::HashSet;
use log::{info, warn};
use nalgebra::Point3;
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Shortest route from an occupant to the void.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakReport {
    pub hull: usize,
    pub occupant: EntityId,
    pub origin: Point3<Real>,
    pub leaf: NodeId,
    /// Portal hops between the occupied leaf and the void
    pub distance: usize,
    /// From the occupant's origin through each portal crossed, ending on
    /// the boundary of the void
    pub points: Vec<Point3<Real>>,
}

impl LeakReport {
    /// Point file text, one `x y z` line per point.
    pub fn to_pts(&self) -> String {
        let mut out = String::new();
        for p in &self.points {
            let _ = writeln!(out, "{} {} {}", p.x, p.y, p.z);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutsideStats {
    pub occupied_leaves: usize,
    /// Leaves reachable from the void
    pub outside_leaves: usize,
    /// Leaves turned solid by the fill
    pub filled_leaves: usize,
}

fn passable(tree: &Tree, leaf: NodeId) -> bool {
    leaf == tree.outside || tree.leaf(leaf).is_some_and(|l| !l.contents.is_opaque())
}

/// Records which leaf each occupant stands in. Occupants inside opaque
/// leaves are reported and ignored. Returns the number of occupied leaves.
pub fn mark_occupants(
    tree: &mut Tree,
    planes: &PlaneTable,
    occupants: &[(EntityId, Point3<Real>)],
) -> usize {
    let mut occupied = 0;
    for (entity, origin) in occupants {
        let leaf = tree.point_in_leaf(origin, planes);
        let Some(data) = tree.leaf_mut(leaf) else {
            continue;
        };
        if data.contents.is_opaque() {
            warn!("entity {entity} at {origin} is inside {}", data.contents);
            continue;
        }
        if data.occupant.is_none() {
            data.occupant = Some(*entity);
            occupied += 1;
        }
    }
    occupied
}

/// Flood from the void; sets `outside_distance` on every leaf it reaches.
/// Leaves touching the void are at distance 0.
pub fn flood_outside(tree: &mut Tree, graph: &PortalGraph) -> usize {
    for id in tree.leaves() {
        if let Some(leaf) = tree.leaf_mut(id) {
            leaf.outside_distance = None;
        }
    }

    let mut queue = VecDeque::new();
    for pid in graph.node_portals(tree.outside) {
        let next = graph.portal(*pid).other(tree.outside);
        if !passable(tree, next) {
            continue;
        }
        if let Some(leaf) = tree.leaf_mut(next) {
            if leaf.outside_distance.is_none() {
                leaf.outside_distance = Some(0);
                queue.push_back(next);
            }
        }
    }

    let mut reached = 0;
    while let Some(id) = queue.pop_front() {
        reached += 1;
        let dist = tree.leaf(id).and_then(|l| l.outside_distance).unwrap_or(0);
        for pid in graph.node_portals(id) {
            let next = graph.portal(*pid).other(id);
            if next == tree.outside || !passable(tree, next) {
                continue;
            }
            if let Some(leaf) = tree.leaf_mut(next) {
                if leaf.outside_distance.is_none() {
                    leaf.outside_distance = Some(dist + 1);
                    queue.push_back(next);
                }
            }
        }
    }
    reached
}

/// Points every `spacing` units along `points`, keeping the originals.
fn resample(points: &[Point3<Real>], spacing: Real) -> Vec<Point3<Real>> {
    if spacing <= 0.0 || points.len() < 2 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for pair in points.windows(2) {
        let dir = pair[1] - pair[0];
        let len = dir.norm();
        let steps = (len / spacing).floor() as usize;
        for i in 1..=steps {
            let t = i as Real * spacing / len;
            if t < 1.0 {
                out.push(pair[0] + dir * t);
            }
        }
        out.push(pair[1]);
    }
    out
}

/// Finds the occupied leaf closest to the void and traces its way out.
/// Requires [`flood_outside`] to have run.
pub fn find_leak(
    tree: &Tree,
    graph: &PortalGraph,
    hull: usize,
    occupants: &[(EntityId, Point3<Real>)],
    leak_dist: Real,
) -> Option<LeakReport> {
    let (leaf, occupant, distance) = tree
        .leaves()
        .into_iter()
        .filter_map(|id| {
            let data = tree.leaf(id)?;
            Some((id, data.occupant?, data.outside_distance?))
        })
        .min_by_key(|&(_, _, d)| d)?;
    let origin = occupants
        .iter()
        .find(|(e, _)| *e == occupant)
        .map(|(_, o)| *o)?;

    let mut points = vec![origin];
    let mut current = leaf;
    let mut dist = distance;
    loop {
        let step = graph.node_portals(current).iter().find_map(|pid| {
            let portal = graph.portal(*pid);
            let next = portal.other(current);
            if next == tree.outside {
                return (dist == 0).then_some((next, portal));
            }
            let next_dist = tree.leaf(next)?.outside_distance?;
            (dist > 0 && next_dist + 1 == dist).then_some((next, portal))
        });
        let Some((next, portal)) = step else {
            break;
        };
        points.push(portal.winding.center());
        if next == tree.outside {
            break;
        }
        current = next;
        dist -= 1;
    }

    let points = resample(&points, leak_dist);
    warn!(
        "hull {hull}: leak from entity {occupant} at {origin}, {} portals to the void",
        distance + 1
    );
    Some(LeakReport {
        hull,
        occupant,
        origin,
        leaf,
        distance,
        points,
    })
}

/// Fills every passable leaf the occupants cannot reach and returns the
/// node faces still visible from some unfilled leaf.
pub fn fill_outside(tree: &mut Tree, graph: &PortalGraph) -> (HashSet<FaceKey>, usize) {
    let mut reached: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = tree
        .leaves()
        .into_iter()
        .filter(|id| tree.leaf(*id).is_some_and(|l| l.occupant.is_some()))
        .collect();
    reached.extend(queue.iter().copied());

    while let Some(id) = queue.pop_front() {
        for pid in graph.node_portals(id) {
            let next = graph.portal(*pid).other(id);
            if next == tree.outside || !passable(tree, next) || reached.contains(&next) {
                continue;
            }
            reached.insert(next);
            queue.push_back(next);
        }
    }

    let mut filled = 0;
    for id in tree.leaves() {
        if reached.contains(&id) {
            continue;
        }
        if let Some(leaf) = tree.leaf_mut(id) {
            if !leaf.contents.is_opaque() {
                leaf.contents = Contents::SOLID;
                filled += 1;
            }
        }
    }

    let mut visible = HashSet::new();
    for id in tree.leaves() {
        if let Some(leaf) = tree.leaf(id) {
            if leaf.contents != Contents::SOLID {
                visible.extend(leaf.markfaces.iter().copied());
            }
        }
    }
    info!(
        "entity {}: {filled} leaves filled, {} of {} node faces kept",
        tree.entity,
        visible.len(),
        tree.faces.len()
    );
    (visible, filled)
}
