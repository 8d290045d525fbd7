//! Recursive solid BSP construction.
//!
//! Each node chooses a splitting surface, copies that surface's faces onto
//! itself and divides every remaining surface into the two half-spaces.
//! A node with no unused surface left is a leaf; its contents are what the
//! faces bounding it say lies in front of them.

use crate::aabb::Aabb;
use crate::bsp::traits::{BspOps, GoodTreeStrategy, MidSplitStrategy, SplitStrategy};
use crate::bsp::{InternalNode, LeafData, Node, NodeId, NodeKind, Tree, divide_bounds};
use crate::contents::Contents;
use crate::errors::CompileError;
use crate::face::{Face, FaceKey};
use crate::float_types::{Real, SIDESPACE};
use crate::map::EntityId;
use crate::options::Options;
use crate::plane::{Plane, PlaneId, PlaneTable};
use crate::surface::Surface;
use crate::texinfo::{TexInfo, TexInfoTable};
use hashbrown::HashMap;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Read-only state shared by every node of one build.
pub struct BuildContext<'a> {
    pub planes: Vec<Plane>,
    pub texinfo: Vec<TexInfo>,
    pub options: &'a Options,
    /// Use the midpoint heuristic everywhere (collision hulls, first world pass)
    pub midsplit: bool,
    /// Surface count of the whole model
    pub total_surfaces: usize,
    next_face: AtomicUsize,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        planes: &PlaneTable,
        texinfo: &TexInfoTable,
        options: &'a Options,
        midsplit: bool,
        total_surfaces: usize,
    ) -> Self {
        Self {
            planes: planes.snapshot(),
            texinfo: texinfo.snapshot(),
            options,
            midsplit,
            total_surfaces,
            next_face: AtomicUsize::new(0),
        }
    }

    fn next_face_key(&self) -> FaceKey {
        FaceKey(self.next_face.fetch_add(1, Ordering::Relaxed))
    }
}

/// Owned node produced by the recursion, flattened into a [`Tree`] at the end.
pub struct BuildNode {
    pub bounds: Aabb,
    pub kind: BuildKind,
}

pub enum BuildKind {
    Internal {
        plane: PlaneId,
        children: Box<[BuildNode; 2]>,
        faces: Vec<(FaceKey, Face)>,
        detail_separator: bool,
    },
    Leaf {
        contents: Contents,
        faces: Vec<Face>,
    },
}

/// Result of one node's worth of work, before its children exist.
pub enum Step {
    Leaf(BuildNode),
    Split(Split),
}

pub struct Split {
    pub bounds: Aabb,
    pub plane: PlaneId,
    pub faces: Vec<(FaceKey, Face)>,
    pub detail_separator: bool,
    pub front: (Vec<Surface>, Aabb),
    pub back: (Vec<Surface>, Aabb),
}

impl Split {
    pub fn into_node(self, front: BuildNode, back: BuildNode) -> BuildNode {
        BuildNode {
            bounds: self.bounds,
            kind: BuildKind::Internal {
                plane: self.plane,
                children: Box::new([front, back]),
                faces: self.faces,
                detail_separator: self.detail_separator,
            },
        }
    }
}

pub fn face_count(surfaces: &[Surface]) -> usize {
    surfaces.iter().map(|s| s.faces.len()).sum()
}

fn select_partition(ctx: &BuildContext<'_>, surfaces: &[Surface]) -> Option<usize> {
    let mut candidates = surfaces.iter().enumerate().filter(|(_, s)| !s.onnode);
    let first = candidates.next()?.0;
    if candidates.next().is_none() {
        return Some(first);
    }

    let bounds = surfaces
        .iter()
        .fold(Aabb::empty(), |acc, s| acc.union(&s.bounds));
    let options = ctx.options;
    let large_node = if options.midsplit_surf_fraction > 0.0 {
        surfaces.len() as Real > options.midsplit_surf_fraction * ctx.total_surfaces as Real
    } else if options.max_node_size > 0.0 {
        let size = bounds.size();
        (0..3).any(|i| size[i] > options.max_node_size - options.on_epsilon)
    } else {
        false
    };

    let eps = options.on_epsilon;
    if !options.force_good_tree && (ctx.midsplit || large_node) {
        MidSplitStrategy.choose(surfaces, &bounds, &ctx.planes, eps)
    } else {
        GoodTreeStrategy.choose(surfaces, &bounds, &ctx.planes, eps)
    }
}

/// Texture of `face` and the texel span it may cover, `None` when the face
/// is never subdivided.
fn subdivide_limit<'t>(
    face: &Face,
    texinfo: &'t [TexInfo],
    subdivide_size: Real,
) -> Option<(&'t TexInfo, Real)> {
    let tex = texinfo.get(face.texinfo?.0)?;
    if subdivide_size <= 0.0 || tex.is_special() {
        return None;
    }
    Some((tex, subdivide_size * (1u32 << face.lmshift.min(16)) as Real / 16.0))
}

fn texel_range(face: &Face, dir: &nalgebra::Vector3<Real>) -> (Real, Real) {
    face.winding
        .points
        .iter()
        .map(|p| dir.dot(&p.coords))
        .fold((Real::MAX, Real::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// True when `face` is larger along a texture axis than subdivision allows.
pub(crate) fn needs_subdivision(face: &Face, texinfo: &[TexInfo], subdivide_size: Real) -> bool {
    let Some((tex, limit)) = subdivide_limit(face, texinfo, subdivide_size) else {
        return false;
    };
    (0..2).any(|axis| {
        let (mins, maxs) = texel_range(face, &tex.axis(axis));
        maxs - mins > limit
    })
}

/// Cuts `face` along its texture axes until no piece spans more than the
/// subdivision size in texels.
fn subdivide_face(ctx: &BuildContext<'_>, face: Face, out: &mut Vec<Face>) {
    let Some((tex, subdivide)) = subdivide_limit(&face, &ctx.texinfo, ctx.options.subdivide_size)
    else {
        out.push(face);
        return;
    };

    for axis in 0..2 {
        let dir = tex.axis(axis);
        let len = dir.norm();
        if len == 0.0 {
            continue;
        }
        let (mins, maxs) = texel_range(&face, &dir);
        if maxs - mins <= subdivide {
            continue;
        }

        // a texel short of the limit, but never outside the face at small
        // lightmap scales
        let split = (mins + subdivide - 16.0).max(mins + subdivide * 0.5);
        let plane = Plane {
            normal: dir / len,
            dist: split / len,
        };
        match face.split(&plane, ctx.options.on_epsilon) {
            (Some(front), Some(back)) => {
                subdivide_face(ctx, back, out);
                subdivide_face(ctx, front, out);
                return;
            }
            _ => {
                warn!("subdivision did not split a face near {}", face.winding.center());
                break;
            }
        }
    }
    out.push(face);
}

/// Subdivides the splitter's faces and copies them onto the node. The
/// faces left in the surface point back at their node copy.
fn link_node_faces(ctx: &BuildContext<'_>, surface: &mut Surface) -> Vec<(FaceKey, Face)> {
    let mut subdivided = Vec::with_capacity(surface.faces.len());
    for face in std::mem::take(&mut surface.faces) {
        subdivide_face(ctx, face, &mut subdivided);
    }
    let copies = subdivided
        .iter_mut()
        .map(|face| {
            let key = ctx.next_face_key();
            face.original = Some(key);
            let mut copy = face.clone();
            copy.original = None;
            (key, copy)
        })
        .collect();
    surface.faces = subdivided;
    copies
}

/// Sends every surface to the side(s) of the splitter it lies on.
fn divide_surfaces(
    ctx: &BuildContext<'_>,
    surfaces: Vec<Surface>,
    split_plane: PlaneId,
) -> (Vec<Surface>, Vec<Surface>) {
    let plane = ctx.planes[split_plane.0];
    let eps = ctx.options.on_epsilon;
    let mut front = Vec::with_capacity(surfaces.len());
    let mut back = Vec::with_capacity(surfaces.len());

    for surface in surfaces {
        let (f, b): (Vec<Face>, Vec<Face>) = if surface.plane == split_plane {
            // on the splitter: each face goes to the side it faces
            surface.faces.into_iter().partition(|face| !face.plane.flipped)
        } else {
            let mut f = Vec::new();
            let mut b = Vec::new();
            for face in surface.faces {
                let (ff, bb) = face.split(&plane, eps);
                f.extend(ff);
                b.extend(bb);
            }
            (f, b)
        };

        let onnode = surface.onnode || surface.plane == split_plane;
        for (faces, side) in [(f, &mut front), (b, &mut back)] {
            if !faces.is_empty() {
                let mut s = Surface::new(surface.plane, faces);
                s.onnode = onnode;
                side.push(s);
            }
        }
    }
    (front, back)
}

/// Leaf contents from the faces bounding it; a leaf no face looks into is solid.
fn link_convex_faces(surfaces: Vec<Surface>, bounds: Aabb) -> Result<BuildNode, CompileError> {
    let mut contents: Option<Contents> = None;
    let mut faces = Vec::new();
    for surface in surfaces {
        for face in surface.faces {
            match contents {
                None => contents = Some(face.contents.front),
                Some(c) if c != face.contents.front => {
                    return Err(CompileError::MixedLeafContents {
                        near: face.winding.center(),
                        first: c,
                        second: face.contents.front,
                    });
                }
                Some(_) => {}
            }
            faces.push(face);
        }
    }
    Ok(BuildNode {
        bounds,
        kind: BuildKind::Leaf {
            contents: contents.unwrap_or(Contents::SOLID),
            faces,
        },
    })
}

/// Chooses a splitter for the node holding `surfaces`, or finishes it as a leaf.
pub fn partition_step(
    ctx: &BuildContext<'_>,
    mut surfaces: Vec<Surface>,
    bounds: Aabb,
) -> Result<Step, CompileError> {
    let Some(split_index) = select_partition(ctx, &surfaces) else {
        return link_convex_faces(surfaces, bounds).map(Step::Leaf);
    };

    let split_plane = surfaces[split_index].plane;
    let detail_separator = !surfaces[split_index].has_struct;
    let faces = link_node_faces(ctx, &mut surfaces[split_index]);
    trace!(
        "split on plane {} ({} node faces, detail {})",
        split_plane.0,
        faces.len(),
        detail_separator
    );

    let plane = ctx.planes[split_plane.0];
    let (front_bounds, back_bounds) = divide_bounds(&bounds, &plane);
    let (front, back) = divide_surfaces(ctx, surfaces, split_plane);
    Ok(Step::Split(Split {
        bounds,
        plane: split_plane,
        faces,
        detail_separator,
        front: (front, front_bounds),
        back: (back, back_bounds),
    }))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BspStats {
    pub nodes: usize,
    pub leaves: usize,
    pub node_faces: usize,
}

struct Flattener {
    nodes: Vec<Node>,
    faces: Vec<Face>,
    keys: HashMap<FaceKey, FaceKey>,
}

impl Flattener {
    /// Depth-first, front before back. Ancestors are visited before the
    /// leaves whose faces point at them, so every key a leaf needs is mapped.
    fn push(&mut self, node: BuildNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        match node.kind {
            BuildKind::Leaf { contents, faces } => {
                let mut markfaces: Vec<FaceKey> = Vec::new();
                for key in faces.iter().filter_map(|f| f.original) {
                    if let Some(&mapped) = self.keys.get(&key) {
                        if !markfaces.contains(&mapped) {
                            markfaces.push(mapped);
                        }
                    }
                }
                self.nodes.push(Node {
                    bounds: node.bounds,
                    parent,
                    kind: NodeKind::Leaf(LeafData {
                        contents,
                        markfaces,
                        ..LeafData::default()
                    }),
                });
            }
            BuildKind::Internal {
                plane,
                children,
                faces,
                detail_separator,
            } => {
                let keys = faces
                    .into_iter()
                    .map(|(old, face)| {
                        let new = FaceKey(self.faces.len());
                        self.faces.push(face);
                        self.keys.insert(old, new);
                        new
                    })
                    .collect();
                // children are patched in once they have ids
                self.nodes.push(Node {
                    bounds: node.bounds,
                    parent,
                    kind: NodeKind::Internal(InternalNode {
                        plane,
                        children: [id, id],
                        faces: keys,
                        detail_separator,
                    }),
                });
                let [front, back] = *children;
                let front = self.push(front, Some(id));
                let back = self.push(back, Some(id));
                if let NodeKind::Internal(n) = &mut self.nodes[id.0].kind {
                    n.children = [front, back];
                }
            }
        }
        id
    }
}

/// Builds the solid BSP tree of one model hull from its surfaces.
///
/// `midsplit` selects the cheap midpoint heuristic for every node; otherwise
/// it only kicks in for nodes that are too large (see [`Options`]).
pub fn build_tree(
    entity: EntityId,
    surfaces: Vec<Surface>,
    planes: &PlaneTable,
    texinfo: &TexInfoTable,
    options: &Options,
    midsplit: bool,
) -> Result<(Tree, BspStats), CompileError> {
    let bounds = surfaces
        .iter()
        .fold(Aabb::empty(), |acc, s| acc.union(&s.bounds));
    let head_bounds = if bounds.is_empty() {
        Aabb::new(nalgebra::Point3::origin(), nalgebra::Point3::origin()).expanded(SIDESPACE)
    } else {
        bounds.expanded(SIDESPACE)
    };

    debug!(
        "entity {entity}: building tree from {} surfaces, {} faces",
        surfaces.len(),
        face_count(&surfaces)
    );
    let no_geometry = surfaces.is_empty();
    let ctx = BuildContext::new(planes, texinfo, options, midsplit, surfaces.len());

    #[cfg(feature = "parallel")]
    let ops = crate::bsp::ParallelBspOps::new();
    #[cfg(not(feature = "parallel"))]
    let ops = crate::bsp::SerialBspOps::new();

    let root = ops.partition(&ctx, surfaces, head_bounds)?;

    let mut flat = Flattener {
        nodes: Vec::new(),
        faces: Vec::new(),
        keys: HashMap::new(),
    };
    let root = flat.push(root, None);
    let outside = NodeId(flat.nodes.len());
    flat.nodes.push(Node {
        bounds: Aabb::empty(),
        parent: None,
        kind: NodeKind::Leaf(LeafData {
            contents: Contents::EMPTY,
            ..LeafData::default()
        }),
    });

    // nothing ever bounded the root, so it is void rather than solid
    if no_geometry {
        if let NodeKind::Leaf(leaf) = &mut flat.nodes[root.0].kind {
            leaf.contents = Contents::EMPTY;
        }
    }

    let tree = Tree {
        entity,
        nodes: flat.nodes,
        root,
        outside,
        faces: flat.faces,
        bounds: if bounds.is_empty() { head_bounds } else { bounds },
    };
    let leaves = tree.leaves().len();
    let stats = BspStats {
        nodes: tree.nodes.len() - 1 - leaves,
        leaves,
        node_faces: tree.faces.len(),
    };
    info!(
        "entity {entity}: {} nodes, {} leaves, {} node faces",
        stats.nodes, stats.leaves, stats.node_faces
    );
    Ok((tree, stats))
}
