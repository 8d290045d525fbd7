//! Test support library
//! Provides brush builders and small pipeline drivers shared by the tests.
#![allow(dead_code)]

use brushbsp::brush::{brush_from_planes, load_brushes, polyhedron_volume};
use brushbsp::bsp::{NodeId, Tree, build_tree};
use brushbsp::contents::Contents;
use brushbsp::csg::{CsgStats, csg_faces};
use brushbsp::face::Face;
use brushbsp::float_types::Real;
use brushbsp::map::{EntityId, MapBrush, MapEntity};
use brushbsp::options::Options;
use brushbsp::plane::{Plane, PlaneTable};
use brushbsp::surface::build_surfaces;
use brushbsp::texinfo::TexInfoTable;
use nalgebra::{Point3, Vector3};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn cube(mins: [Real; 3], maxs: [Real; 3], contents: Contents) -> MapBrush {
    MapBrush::from_box(Point3::from(mins), Point3::from(maxs), contents, "base")
}

/// Six wall brushes `wall` thick enclosing the box from `mins` to `maxs`,
/// ordered -x, +x, -y, +y, -z (floor), +z (ceiling).
pub fn hollow_room(mins: [Real; 3], maxs: [Real; 3], wall: Real) -> Vec<MapBrush> {
    let (mins, maxs) = (Point3::from(mins), Point3::from(maxs));
    let pad = Vector3::repeat(wall);
    let mut brushes = Vec::new();
    for axis in 0..3 {
        let mut lo_max = maxs + pad;
        lo_max[axis] = mins[axis];
        brushes.push(MapBrush::from_box(mins - pad, lo_max, Contents::SOLID, "wall"));

        let mut hi_min = mins - pad;
        hi_min[axis] = maxs[axis];
        brushes.push(MapBrush::from_box(hi_min, maxs + pad, Contents::SOLID, "wall"));
    }
    brushes
}

/// A 256 x 256 x 128 room with a player start in the middle.
pub fn room_entities() -> Vec<MapEntity> {
    vec![
        MapEntity::world(hollow_room([0.0, 0.0, 0.0], [256.0, 256.0, 128.0], 16.0)),
        MapEntity::point("info_player_start", Point3::new(128.0, 128.0, 48.0)),
    ]
}

/// Everything one model's draw hull goes through before portals.
pub struct Built {
    pub planes: PlaneTable,
    pub texinfo: TexInfoTable,
    pub faces: Vec<Face>,
    pub csg: CsgStats,
    pub tree: Tree,
}

pub fn build_world(brushes: &[MapBrush], options: &Options, midsplit: bool) -> Built {
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let loaded = load_brushes(EntityId::WORLD, brushes, 0, options, &planes, &texinfo)
        .expect("brushes load");
    let (faces, csg) = csg_faces(&loaded, &planes, options);
    let surfaces = build_surfaces(faces.clone());
    let (tree, _) = build_tree(EntityId::WORLD, surfaces, &planes, &texinfo, options, midsplit)
        .expect("tree builds");
    Built {
        planes,
        texinfo,
        faces,
        csg,
        tree,
    }
}

/// Volume of the convex cell of `leaf`, optionally closed off by `bounds`
/// for leaves that reach the edge of the tree.
pub fn leaf_volume(tree: &Tree, leaf: NodeId, planes: &PlaneTable, extra: &[Plane]) -> Real {
    let mut cell = tree.path_planes(leaf, planes);
    cell.extend_from_slice(extra);
    let windings = brush_from_planes(&cell, 0.0001, 65536.0);
    polyhedron_volume(windings.iter().flatten())
}

/// Outward facing planes of an axis aligned box.
pub fn box_planes(mins: Point3<Real>, maxs: Point3<Real>) -> Vec<Plane> {
    (0..3)
        .flat_map(|axis| {
            let mut n = Vector3::zeros();
            n[axis] = 1.0;
            [Plane::new(n, maxs[axis]), Plane::new(-n, -mins[axis])]
        })
        .collect()
}
