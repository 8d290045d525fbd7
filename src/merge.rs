//! Coalescing coplanar faces that share an edge.

use crate::bsp::build::needs_subdivision;
use crate::bsp::{NodeKind, Tree};
use crate::face::{Face, FaceKey};
use crate::float_types::{CONTINUOUS_EPSILON, EQUAL_EPSILON, MAX_EDGES, Real};
use crate::surface::Surface;
use crate::texinfo::TexInfo;
use crate::winding::Winding;
use hashbrown::HashMap;
use log::debug;
use nalgebra::Point3;

/// Joins `f1` and `f2` across a shared edge if the result is still convex.
///
/// Both faces must agree on everything that reaches the output. Vertices
/// of the shared edge that end up between two colinear edges are dropped.
pub fn try_merge(f1: &Face, f2: &Face) -> Option<Face> {
    if f1.plane != f2.plane
        || f1.texinfo != f2.texinfo
        || f1.contents != f2.contents
        || f1.lmshift != f2.lmshift
        || f1.winding.len() < 3
        || f2.winding.len() < 3
    {
        return None;
    }

    let w1 = &f1.winding.points;
    let w2 = &f2.winding.points;
    let (n1, n2) = (w1.len(), w2.len());
    let same = |a: &Point3<Real>, b: &Point3<Real>| {
        (0..3).all(|k| (a[k] - b[k]).abs() <= EQUAL_EPSILON)
    };

    // a common edge runs in opposite directions on the two faces
    let (i, j) = (0..n1).find_map(|i| {
        let p1 = &w1[i];
        let p2 = &w1[(i + 1) % n1];
        (0..n2)
            .find(|&j| same(p1, &w2[(j + 1) % n2]) && same(p2, &w2[j]))
            .map(|j| (i, j))
    })?;
    let p1 = w1[i];
    let p2 = w1[(i + 1) % n1];

    let normal = f1.winding.plane()?.normal;

    // convexity where the edge starts
    let back = w1[(i + n1 - 1) % n1];
    let edge_normal = normal.cross(&(p1 - back)).normalize();
    let dot = (w2[(j + 2) % n2] - p1).dot(&edge_normal);
    if dot > CONTINUOUS_EPSILON {
        return None;
    }
    let keep1 = dot < -CONTINUOUS_EPSILON;

    // and where it ends
    let edge_normal = normal.cross(&(w1[(i + 2) % n1] - p2)).normalize();
    let dot = (w2[(j + n2 - 1) % n2] - p2).dot(&edge_normal);
    if dot > CONTINUOUS_EPSILON {
        return None;
    }
    let keep2 = dot < -CONTINUOUS_EPSILON;

    let mut points = Vec::with_capacity(n1 + n2);
    let mut k = (i + 1) % n1;
    while k != i {
        if k != (i + 1) % n1 || keep2 {
            points.push(w1[k]);
        }
        k = (k + 1) % n1;
    }
    let mut l = (j + 1) % n2;
    while l != j {
        if l != (j + 1) % n2 || keep1 {
            points.push(w2[l]);
        }
        l = (l + 1) % n2;
    }
    if points.len() > MAX_EDGES {
        return None;
    }

    Some(f1.with_winding(Winding::new(points)))
}

/// Merges each face into `list`, restarting against the whole list every
/// time a merge succeeds. `origins` track which input faces went into each
/// output face.
fn merge_into(
    list: &mut Vec<Option<(Face, Vec<usize>)>>,
    face: Face,
    origins: Vec<usize>,
    accept: &impl Fn(&Face) -> bool,
) {
    let mut face = face;
    let mut origins = origins;
    'restart: loop {
        for slot in list.iter_mut() {
            let Some((other, other_origins)) = slot else {
                continue;
            };
            if let Some(merged) = try_merge(&face, other).filter(|m| accept(m)) {
                origins.append(other_origins);
                *slot = None;
                face = merged;
                continue 'restart;
            }
        }
        list.push(Some((face, origins)));
        return;
    }
}

/// Merges `faces` greedily, keeping only merged faces `accept` agrees to.
/// Returns the merged faces and, for each, the indices of the input faces
/// it replaces.
pub fn merge_tracked(faces: Vec<Face>, accept: impl Fn(&Face) -> bool) -> Vec<(Face, Vec<usize>)> {
    let mut list = Vec::with_capacity(faces.len());
    for (i, face) in faces.into_iter().enumerate() {
        merge_into(&mut list, face, vec![i], &accept);
    }
    list.into_iter().flatten().collect()
}

pub fn merge_faces(faces: Vec<Face>) -> Vec<Face> {
    merge_tracked(faces, |_| true)
        .into_iter()
        .map(|(f, _)| f)
        .collect()
}

/// Merges the faces of every surface; returns the face count removed.
pub fn merge_surfaces(surfaces: &mut [Surface]) -> usize {
    let mut removed = 0;
    for surface in surfaces.iter_mut() {
        let before = surface.faces.len();
        surface.faces = merge_faces(std::mem::take(&mut surface.faces));
        removed += before - surface.faces.len();
        surface.calculate_info();
    }
    debug!("merge: {removed} faces removed");
    removed
}

/// Merges the faces stored on each node of `tree` and repoints every
/// leaf's mark-face list at the merged faces. Merges that would undo face
/// subdivision are refused. Returns the face count removed.
pub fn merge_tree_faces(tree: &mut Tree, texinfo: &[TexInfo], subdivide_size: Real) -> usize {
    let before = tree.faces.len();
    let mut old_faces: Vec<Option<Face>> = std::mem::take(&mut tree.faces)
        .into_iter()
        .map(Some)
        .collect();
    let mut new_faces = Vec::with_capacity(before);
    let mut remap: HashMap<FaceKey, FaceKey> = HashMap::new();

    for id in tree.internal_nodes() {
        let NodeKind::Internal(node) = &mut tree.nodes[id.0].kind else {
            continue;
        };
        let keys = std::mem::take(&mut node.faces);
        let faces: Vec<Face> = keys
            .iter()
            .filter_map(|k| old_faces[k.0].take())
            .collect();
        let mut merged_keys = Vec::new();
        let merged = merge_tracked(faces, |f| !needs_subdivision(f, texinfo, subdivide_size));
        for (face, origins) in merged {
            let key = FaceKey(new_faces.len());
            new_faces.push(face);
            for o in origins {
                remap.insert(keys[o], key);
            }
            merged_keys.push(key);
        }
        node.faces = merged_keys;
    }

    for id in tree.leaves() {
        if let Some(leaf) = tree.leaf_mut(id) {
            let mut marks: Vec<FaceKey> = Vec::with_capacity(leaf.markfaces.len());
            for key in leaf.markfaces.iter().filter_map(|k| remap.get(k)) {
                if !marks.contains(key) {
                    marks.push(*key);
                }
            }
            leaf.markfaces = marks;
        }
    }

    tree.faces = new_faces;
    let removed = before - tree.faces.len();
    debug!("entity {}: merged away {removed} node faces", tree.entity);
    removed
}
