//! Flattening compiled trees into the index based tables of a BSP file.
//!
//! Everything in [`BspData`] refers to other tables by integer index.
//! Planes, texinfo and miptex entries are numbered on first use while the
//! models are walked in order, so the tables only depend on the trees and
//! never on which compile job happened to touch a shared table first.

pub mod bsp29;
pub mod prt;

pub use bsp29::Bsp29Writer;
pub use prt::write_portal_file;

use crate::bsp::{NodeId, NodeKind, Tree};
use crate::compile::CompiledModel;
use crate::errors::CompileError;
use crate::face::{Face, FaceKey};
use crate::float_types::{POINT_EPSILON, Real};
use crate::map::{EntityId, MapEntity};
use crate::options::{Limits, Options};
use crate::plane::{PlaneId, PlaneTable, PlaneType};
use crate::texinfo::{TEX_SPECIAL, TexInfoId, TexInfoTable};
use hashbrown::HashMap;
use log::{debug, info};
use nalgebra::Point3;
use std::fmt::Write as _;

/// Highest hull count a model header can describe.
pub const MAX_MAP_HULLS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    /// 0..2 axial X/Y/Z, 3..5 nearest to X/Y/Z
    pub kind: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipTexHeader {
    pub name: String,
    /// Unknown until the texture is loaded from a wad; 0 for external textures
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub miptex: u32,
    pub flags: u32,
}

/// Child references: `>= 0` is a node index, `< 0` is `-(leaf + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DNode {
    pub plane: u32,
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u32,
    pub num_faces: u32,
}

/// Child references: `>= 0` is a clip node index, `< 0` a content code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DClipNode {
    pub plane: u32,
    pub children: [i32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DLeaf {
    pub contents: i32,
    /// Visibility cluster, -1 for the shared solid leaf
    pub cluster: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_marksurface: u32,
    pub num_marksurfaces: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DFace {
    pub plane: u32,
    /// 1 when the face points opposite to its plane
    pub side: u16,
    pub first_edge: u32,
    pub num_edges: u32,
    pub texinfo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    /// Node index for hull 0, clip node index (or content code) for the rest
    pub headnode: [i32; MAX_MAP_HULLS],
    pub visleafs: u32,
    pub first_face: u32,
    pub num_faces: u32,
}

/// The logical content of a compiled map, every reference an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BspData {
    pub entities: String,
    pub planes: Vec<DPlane>,
    pub textures: Vec<MipTexHeader>,
    pub vertices: Vec<[f32; 3]>,
    pub nodes: Vec<DNode>,
    pub texinfo: Vec<DTexInfo>,
    pub faces: Vec<DFace>,
    pub clipnodes: Vec<DClipNode>,
    pub leafs: Vec<DLeaf>,
    pub marksurfaces: Vec<u32>,
    /// Vertex pairs; edge 0 is unused so that every edge can be signed
    pub edges: Vec<[u32; 2]>,
    pub surfedges: Vec<i32>,
    pub models: Vec<DModel>,
}

impl BspData {
    /// Checks every table against `limits`, blaming `entity`.
    pub fn check_limits(&self, limits: &Limits, entity: EntityId) -> Result<(), CompileError> {
        let tables = [
            ("nodes", self.nodes.len(), limits.nodes),
            ("leafs", self.leafs.len(), limits.leafs),
            ("clipnodes", self.clipnodes.len(), limits.clipnodes),
            ("faces", self.faces.len(), limits.faces),
            ("marksurfaces", self.marksurfaces.len(), limits.marksurfaces),
            ("edges", self.edges.len(), limits.edges),
            ("vertexes", self.vertices.len(), limits.vertices),
            ("planes", self.planes.len(), limits.planes),
            ("texinfo", self.texinfo.len(), limits.texinfo),
        ];
        for (what, count, limit) in tables {
            if count > limit {
                return Err(CompileError::LimitExceeded {
                    what,
                    count,
                    limit,
                    entity,
                });
            }
        }
        Ok(())
    }
}

/// Leaves that get their own leaf record, numbered the way they are written
/// (the shared solid leaf 0 not counted), and their compacted clusters.
#[derive(Debug, Clone, Default)]
pub struct VisLeaves {
    pub index: HashMap<NodeId, usize>,
    pub cluster: HashMap<NodeId, usize>,
    pub order: Vec<NodeId>,
    pub num_clusters: usize,
}

/// Structural solid leaves all share leaf 0 and are not numbered. Leaves
/// without a cluster get one of their own.
pub fn vis_leaves(tree: &Tree) -> VisLeaves {
    let mut vis = VisLeaves::default();
    let mut cluster_ids: HashMap<usize, usize> = HashMap::new();
    for id in tree.leaves() {
        let Some(leaf) = tree.leaf(id) else {
            continue;
        };
        if leaf.contents.is_structural_solid() {
            continue;
        }
        vis.index.insert(id, vis.order.len());
        vis.order.push(id);
        let cluster = match leaf.cluster {
            Some(raw) => {
                let next = vis.num_clusters;
                *cluster_ids.entry(raw).or_insert(next)
            }
            None => vis.num_clusters,
        };
        if cluster == vis.num_clusters {
            vis.num_clusters += 1;
        }
        vis.cluster.insert(id, cluster);
    }
    vis
}

fn bound_i16(v: Real, round_up: bool) -> i16 {
    let v = if round_up { v.ceil() } else { v.floor() };
    v.clamp(i16::MIN as Real, i16::MAX as Real) as i16
}

fn bounds_i16(b: &crate::aabb::Aabb) -> ([i16; 3], [i16; 3]) {
    if b.is_empty() {
        return ([0; 3], [0; 3]);
    }
    (
        [0, 1, 2].map(|i| bound_i16(b.mins[i], false)),
        [0, 1, 2].map(|i| bound_i16(b.maxs[i], true)),
    )
}

fn to_f32(p: &Point3<Real>) -> [f32; 3] {
    [p.x as f32, p.y as f32, p.z as f32]
}

/// Welds vertices closer than [`POINT_EPSILON`] through a hash grid.
#[derive(Default)]
struct VertexWelder {
    grid: HashMap<[i64; 3], Vec<u32>>,
    points: Vec<Point3<Real>>,
}

impl VertexWelder {
    fn cell(v: Real) -> i64 {
        v.floor() as i64
    }

    fn weld(&mut self, p: &Point3<Real>, out: &mut Vec<[f32; 3]>) -> u32 {
        let lo = [0, 1, 2].map(|i| Self::cell(p[i] - POINT_EPSILON));
        let hi = [0, 1, 2].map(|i| Self::cell(p[i] + POINT_EPSILON));
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    let Some(ids) = self.grid.get(&[x, y, z]) else {
                        continue;
                    };
                    for &id in ids {
                        let q = &self.points[id as usize];
                        if (0..3).all(|i| (q[i] - p[i]).abs() <= POINT_EPSILON) {
                            return id;
                        }
                    }
                }
            }
        }
        let id = out.len() as u32;
        out.push(to_f32(p));
        self.points.push(*p);
        self.grid
            .entry([0, 1, 2].map(|i| Self::cell(p[i])))
            .or_default()
            .push(id);
        id
    }
}

/// Edge table under construction. An edge written by one face can be
/// reused, reversed, by exactly one other face of the same model.
struct EdgeBuilder {
    open: HashMap<[u32; 2], Vec<u32>>,
}

impl EdgeBuilder {
    fn new() -> Self {
        Self {
            open: HashMap::new(),
        }
    }

    fn edge(&mut self, v1: u32, v2: u32, edges: &mut Vec<[u32; 2]>) -> i32 {
        if let Some(list) = self.open.get_mut(&[v2, v1]) {
            if let Some(index) = list.pop() {
                return -(index as i32);
            }
        }
        let index = edges.len() as u32;
        edges.push([v1, v2]);
        self.open.entry([v1, v2]).or_default().push(index);
        index as i32
    }
}

/// Running state of one export.
struct Exporter<'a> {
    data: BspData,
    planes: &'a PlaneTable,
    texinfo: &'a TexInfoTable,
    options: &'a Options,
    plane_map: HashMap<PlaneId, u32>,
    texinfo_map: HashMap<TexInfoId, u32>,
    miptex_map: HashMap<String, u32>,
    welder: VertexWelder,
}

impl<'a> Exporter<'a> {
    fn plane(&mut self, id: PlaneId) -> u32 {
        if let Some(&index) = self.plane_map.get(&id) {
            return index;
        }
        let plane = self.planes.get(id);
        let kind = match plane.plane_type() {
            PlaneType::X => 0,
            PlaneType::Y => 1,
            PlaneType::Z => 2,
            PlaneType::AnyX => 3,
            PlaneType::AnyY => 4,
            PlaneType::AnyZ => 5,
        };
        let index = self.data.planes.len() as u32;
        self.data.planes.push(DPlane {
            normal: [
                plane.normal.x as f32,
                plane.normal.y as f32,
                plane.normal.z as f32,
            ],
            dist: plane.dist as f32,
            kind,
        });
        self.plane_map.insert(id, index);
        index
    }

    fn texinfo(&mut self, id: TexInfoId) -> u32 {
        if let Some(&index) = self.texinfo_map.get(&id) {
            return index;
        }
        let info = self.texinfo.get(id);
        let miptex = match self.miptex_map.get(&info.miptex) {
            Some(&m) => m,
            None => {
                let m = self.data.textures.len() as u32;
                self.data.textures.push(MipTexHeader {
                    name: info.miptex.clone(),
                    width: 0,
                    height: 0,
                });
                self.miptex_map.insert(info.miptex.clone(), m);
                m
            }
        };
        let index = self.data.texinfo.len() as u32;
        self.data.texinfo.push(DTexInfo {
            vecs: info.vecs.map(|row| row.map(|v| v as f32)),
            miptex,
            flags: info.flags & TEX_SPECIAL,
        });
        self.texinfo_map.insert(id, index);
        index
    }

    /// Whether a node face ends up in the face table.
    fn writes_face(&self, face: &Face) -> bool {
        if face.contents.front.is_opaque() {
            return false;
        }
        let Some(id) = face.texinfo else {
            return false;
        };
        let info = self.texinfo.get(id);
        !info.is_skip() || self.options.no_skip
    }

    /// Emits `face` with its edges; `None` if welding collapsed it.
    fn face(&mut self, face: &Face, edges: &mut EdgeBuilder) -> Option<u32> {
        let mut verts: Vec<u32> = Vec::with_capacity(face.winding.len());
        for p in &face.winding.points {
            let v = self.welder.weld(p, &mut self.data.vertices);
            if verts.last() != Some(&v) {
                verts.push(v);
            }
        }
        while verts.len() > 1 && verts.first() == verts.last() {
            verts.pop();
        }
        if verts.len() < 3 {
            debug!("face near {} collapsed while welding", face.winding.center());
            return None;
        }

        let first_edge = self.data.surfedges.len() as u32;
        for i in 0..verts.len() {
            let e = edges.edge(verts[i], verts[(i + 1) % verts.len()], &mut self.data.edges);
            self.data.surfedges.push(e);
        }
        let plane = self.plane(face.plane.id);
        let texinfo = face.texinfo.map(|t| self.texinfo(t)).unwrap_or(0);
        let index = self.data.faces.len() as u32;
        self.data.faces.push(DFace {
            plane,
            side: face.plane.side() as u16,
            first_edge,
            num_edges: verts.len() as u32,
            texinfo,
        });
        Some(index)
    }

    /// Writes the draw hull: faces node by node, then nodes and leaves in
    /// depth-first order. Returns the head node reference.
    fn draw_hull(&mut self, tree: &Tree) -> i32 {
        let mut edges = EdgeBuilder::new();
        let mut face_index: HashMap<FaceKey, u32> = HashMap::new();
        let mut node_faces: HashMap<NodeId, (u32, u32)> = HashMap::new();
        for id in tree.internal_nodes() {
            let first = self.data.faces.len() as u32;
            if let Some(node) = tree.node(id).internal() {
                for key in &node.faces {
                    let face = tree.face(*key);
                    if !self.writes_face(face) {
                        continue;
                    }
                    if let Some(index) = self.face(face, &mut edges) {
                        face_index.insert(*key, index);
                    }
                }
            }
            node_faces.insert(id, (first, self.data.faces.len() as u32 - first));
        }
        let vis = vis_leaves(tree);
        self.draw_node(tree, tree.root, &vis, &face_index, &node_faces)
    }

    fn draw_node(
        &mut self,
        tree: &Tree,
        id: NodeId,
        vis: &VisLeaves,
        face_index: &HashMap<FaceKey, u32>,
        node_faces: &HashMap<NodeId, (u32, u32)>,
    ) -> i32 {
        let node = tree.node(id);
        match &node.kind {
            NodeKind::Leaf(leaf) => {
                if leaf.contents.is_structural_solid() {
                    return -1;
                }
                let first_marksurface = self.data.marksurfaces.len() as u32;
                self.data.marksurfaces.extend(
                    leaf.markfaces
                        .iter()
                        .filter_map(|key| face_index.get(key).copied()),
                );
                let (mins, maxs) = bounds_i16(&node.bounds);
                let index = self.data.leafs.len() as i32;
                self.data.leafs.push(DLeaf {
                    contents: leaf.contents.output_code(),
                    cluster: vis.cluster.get(&id).map_or(-1, |&c| c as i32),
                    mins,
                    maxs,
                    first_marksurface,
                    num_marksurfaces: self.data.marksurfaces.len() as u32 - first_marksurface,
                });
                -(index + 1)
            }
            NodeKind::Internal(internal) => {
                let index = self.data.nodes.len();
                let (first_face, num_faces) = node_faces.get(&id).copied().unwrap_or((0, 0));
                let (mins, maxs) = bounds_i16(&node.bounds);
                let plane = self.plane(internal.plane);
                self.data.nodes.push(DNode {
                    plane,
                    children: [0, 0],
                    mins,
                    maxs,
                    first_face,
                    num_faces,
                });
                let front = self.draw_node(tree, internal.children[0], vis, face_index, node_faces);
                let back = self.draw_node(tree, internal.children[1], vis, face_index, node_faces);
                self.data.nodes[index].children = [front, back];
                index as i32
            }
        }
    }

    fn clip_node(&mut self, tree: &Tree, id: NodeId) -> i32 {
        match &tree.node(id).kind {
            NodeKind::Leaf(leaf) => leaf.contents.output_code(),
            NodeKind::Internal(internal) => {
                let index = self.data.clipnodes.len();
                let plane = self.plane(internal.plane);
                self.data.clipnodes.push(DClipNode {
                    plane,
                    children: [0, 0],
                });
                let front = self.clip_node(tree, internal.children[0]);
                let back = self.clip_node(tree, internal.children[1]);
                self.data.clipnodes[index].children = [front, back];
                index as i32
            }
        }
    }
}

fn entity_text(entities: &[MapEntity]) -> String {
    let mut out = String::new();
    let mut model = 0;
    for (i, entity) in entities.iter().enumerate() {
        let id = EntityId(i);
        out.push_str("{\n");
        let _ = writeln!(out, "\"classname\" \"{}\"", entity.classname);
        if entity.is_model(id) {
            if id != EntityId::WORLD {
                let _ = writeln!(out, "\"model\" \"*{model}\"");
            }
            model += 1;
        }
        if let Some(origin) = entity.origin {
            let _ = writeln!(out, "\"origin\" \"{} {} {}\"", origin.x, origin.y, origin.z);
        }
        out.push_str("}\n");
    }
    out
}

/// Flattens every compiled model into one set of BSP tables.
///
/// The shared solid leaf is written first. Each model then contributes its
/// draw hull (faces, nodes, leaves) followed by its clip hulls.
pub fn export(
    models: &[CompiledModel],
    entities: &[MapEntity],
    planes: &PlaneTable,
    texinfo: &TexInfoTable,
    options: &Options,
) -> Result<BspData, CompileError> {
    let mut exporter = Exporter {
        data: BspData {
            entities: entity_text(entities),
            edges: vec![[0, 0]],
            leafs: vec![DLeaf {
                contents: crate::contents::CONTENTS_SOLID,
                cluster: -1,
                mins: [0; 3],
                maxs: [0; 3],
                first_marksurface: 0,
                num_marksurfaces: 0,
            }],
            ..BspData::default()
        },
        planes,
        texinfo,
        options,
        plane_map: HashMap::new(),
        texinfo_map: HashMap::new(),
        miptex_map: HashMap::new(),
        welder: VertexWelder::default(),
    };

    for model in models {
        let mut headnode = [0; MAX_MAP_HULLS];
        let first_face = exporter.data.faces.len() as u32;
        let first_leaf = exporter.data.leafs.len();
        let mut bounds = crate::aabb::Aabb::empty();

        for result in &model.hulls {
            if result.hull >= MAX_MAP_HULLS {
                return Err(CompileError::LimitExceeded {
                    what: "hulls",
                    count: result.hull + 1,
                    limit: MAX_MAP_HULLS,
                    entity: model.entity,
                });
            }
            if result.hull == 0 {
                bounds = result.tree.bounds;
                headnode[0] = exporter.draw_hull(&result.tree);
            } else {
                headnode[result.hull] = exporter.clip_node(&result.tree, result.tree.root);
            }
        }

        let (mins, maxs) = if bounds.is_empty() {
            ([0.0; 3], [0.0; 3])
        } else {
            let b = bounds.expanded(1.0);
            (to_f32(&b.mins), to_f32(&b.maxs))
        };
        exporter.data.models.push(DModel {
            mins,
            maxs,
            origin: [0.0; 3],
            headnode,
            visleafs: (exporter.data.leafs.len() - first_leaf) as u32,
            first_face,
            num_faces: exporter.data.faces.len() as u32 - first_face,
        });
        exporter.data.check_limits(&options.limits, model.entity)?;
    }

    let data = exporter.data;
    info!(
        "{} planes, {} nodes, {} leafs, {} faces, {} clipnodes, {} edges, {} vertexes",
        data.planes.len(),
        data.nodes.len(),
        data.leafs.len(),
        data.faces.len(),
        data.clipnodes.len(),
        data.edges.len(),
        data.vertices.len()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welder_merges_close_points() {
        let mut welder = VertexWelder::default();
        let mut out = Vec::new();
        let a = welder.weld(&Point3::new(1.0, 2.0, 3.0), &mut out);
        let b = welder.weld(&Point3::new(1.00001, 2.0, 2.99999), &mut out);
        let c = welder.weld(&Point3::new(1.0, 2.5, 3.0), &mut out);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn reversed_edges_are_shared_once() {
        let mut builder = EdgeBuilder::new();
        let mut edges = vec![[0, 0]];
        assert_eq!(builder.edge(1, 2, &mut edges), 1);
        assert_eq!(builder.edge(2, 1, &mut edges), -1);
        // a third face on the same edge gets its own
        assert_eq!(builder.edge(2, 1, &mut edges), 2);
        assert_eq!(edges.len(), 3);
    }
}
