//! Portal files for the visibility stage.
//!
//! `PRT1` lists leaf-to-leaf portals. Trees split by detail surfaces write
//! `PRT2` instead, where portals connect clusters and each cluster's
//! leaves are listed after the portals, each list ending in `-1`.

use crate::bsp::{NodeId, Tree};
use crate::float_types::ANGLE_EPSILON;
use crate::portal::{Portal, PortalGraph};
use crate::writer::{VisLeaves, vis_leaves};
use log::info;
use std::fmt::Write as _;

/// Portals vis cares about: both sides written leaves that can be seen
/// through, and with clusters, in different clusters.
fn vis_portals<'g>(
    tree: &Tree,
    graph: &'g PortalGraph,
    vis: &VisLeaves,
    clusters: bool,
) -> Vec<&'g Portal> {
    graph
        .portals
        .iter()
        .filter(|portal| {
            let [a, b] = portal.nodes;
            let open = |id: NodeId| {
                vis.index.contains_key(&id)
                    && tree.leaf(id).is_some_and(|l| !l.contents.is_opaque())
            };
            if !open(a) || !open(b) {
                return false;
            }
            !clusters || vis.cluster.get(&a) != vis.cluster.get(&b)
        })
        .collect()
}

fn write_portal(out: &mut String, portal: &Portal, ids: [usize; 2]) {
    // the winding decides which side vis sees as front
    let flip = portal
        .winding
        .plane()
        .is_some_and(|p| p.normal.dot(&portal.plane.normal) < 1.0 - ANGLE_EPSILON);
    let [a, b] = if flip { [ids[1], ids[0]] } else { ids };
    let _ = write!(out, "{} {} {} ", portal.winding.len(), a, b);
    for p in &portal.winding.points {
        let _ = write!(out, "({:.6} {:.6} {:.6} ) ", p.x, p.y, p.z);
    }
    out.push('\n');
}

/// Portal file text for the world's draw hull.
pub fn write_portal_file(tree: &Tree, graph: &PortalGraph) -> String {
    let vis = vis_leaves(tree);
    let clusters = tree.has_detail_separators();
    let portals = vis_portals(tree, graph, &vis, clusters);
    let mut out = String::new();

    if clusters {
        let _ = writeln!(out, "PRT2");
        let _ = writeln!(out, "{}", vis.order.len());
        let _ = writeln!(out, "{}", vis.num_clusters);
        let _ = writeln!(out, "{}", portals.len());
        for portal in &portals {
            let ids = portal.nodes.map(|n| vis.cluster[&n]);
            write_portal(&mut out, portal, ids);
        }
        let mut members = vec![Vec::new(); vis.num_clusters];
        for id in &vis.order {
            members[vis.cluster[id]].push(vis.index[id]);
        }
        for leaves in members {
            for leaf in leaves {
                let _ = write!(out, "{leaf} ");
            }
            out.push_str("-1\n");
        }
    } else {
        let _ = writeln!(out, "PRT1");
        let _ = writeln!(out, "{}", vis.order.len());
        let _ = writeln!(out, "{}", portals.len());
        for portal in &portals {
            let ids = portal.nodes.map(|n| vis.index[&n]);
            write_portal(&mut out, portal, ids);
        }
    }

    info!(
        "portal file: {} leaves, {} clusters, {} portals",
        vis.order.len(),
        vis.num_clusters,
        portals.len()
    );
    out
}
