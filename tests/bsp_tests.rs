mod support;

use brushbsp::brush::brush_from_planes;
use brushbsp::bsp::{NodeId, Tree, build_tree};
use brushbsp::contents::{Contents, FaceContents};
use brushbsp::errors::CompileError;
use brushbsp::face::Face;
use brushbsp::float_types::Real;
use brushbsp::map::{EntityId, MapBrush};
use brushbsp::merge::merge_surfaces;
use brushbsp::options::Options;
use brushbsp::plane::{Plane, PlaneRef, PlaneTable};
use brushbsp::surface::build_surfaces;
use brushbsp::texinfo::{TexInfo, TexInfoId, TexInfoTable};
use brushbsp::winding::Winding;
use nalgebra::{Point3, Vector3};
use support::{approx_eq, box_planes, build_world, cube, leaf_volume};

fn two_cubes(second: Contents) -> Vec<MapBrush> {
    vec![
        cube([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], Contents::SOLID),
        cube([0.5, 0.0, 0.0], [1.5, 1.0, 1.0], second),
    ]
}

/// Volume of every leaf's cell, closed off by the head node box.
fn volumes(tree: &Tree, planes: &PlaneTable) -> Vec<(NodeId, Contents, Real)> {
    let head = tree.node(tree.root).bounds;
    let walls = box_planes(head.mins, head.maxs);
    tree.leaves()
        .into_iter()
        .map(|leaf| {
            let contents = tree.contents(leaf).expect("leaf");
            (leaf, contents, leaf_volume(tree, leaf, planes, &walls))
        })
        .collect()
}

fn volume_of(volumes: &[(NodeId, Contents, Real)], contents: Contents) -> Real {
    volumes
        .iter()
        .filter(|(_, c, _)| *c == contents)
        .map(|(_, _, v)| v)
        .sum()
}

/// Vertex average of a leaf cell, strictly inside it.
fn cell_center(tree: &Tree, leaf: NodeId, planes: &PlaneTable) -> Point3<Real> {
    let head = tree.node(tree.root).bounds;
    let mut cell = tree.path_planes(leaf, planes);
    cell.extend(box_planes(head.mins, head.maxs));
    let windings: Vec<_> = brush_from_planes(&cell, 0.0001, 65536.0)
        .into_iter()
        .flatten()
        .collect();
    let points: Vec<_> = windings.iter().flat_map(|w| w.points.iter()).collect();
    let sum = points
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as Real)
}

#[test]
fn leaf_volumes_add_up_to_the_head_box() {
    for midsplit in [false, true] {
        let built = build_world(&two_cubes(Contents::SOLID), &Options::default(), midsplit);
        let vols = volumes(&built.tree, &built.planes);
        let head = built.tree.node(built.tree.root).bounds;
        let size = head.size();
        let total: Real = vols.iter().map(|(_, _, v)| v).sum();
        assert!(approx_eq(total, size.x * size.y * size.z, 1e-6));
        assert!(approx_eq(volume_of(&vols, Contents::SOLID), 1.5, 1e-9));
    }
}

#[test]
fn solid_and_water_keep_their_volumes() {
    let built = build_world(&two_cubes(Contents::WATER), &Options::default(), false);
    let vols = volumes(&built.tree, &built.planes);
    assert!(approx_eq(volume_of(&vols, Contents::SOLID), 1.0, 1e-9));
    assert!(approx_eq(volume_of(&vols, Contents::WATER), 0.5, 1e-9));
}

#[test]
fn every_leaf_is_convex_and_homogeneous() {
    let built = build_world(&two_cubes(Contents::WATER), &Options::default(), true);
    let tree = &built.tree;
    for leaf in tree.leaves() {
        let center = cell_center(tree, leaf, &built.planes);
        // the cell lies on the inside of every plane above it
        for plane in tree.path_planes(leaf, &built.planes) {
            assert!(plane.distance_to(&center) < 0.0);
        }
        assert_eq!(tree.point_in_leaf(&center, &built.planes), leaf);
        assert!(tree.node(leaf).bounds.contains(&center, 1e-9));

        let inside = |lo: Real, hi: Real| {
            center.x > lo && center.x < hi && (0..3).skip(1).all(|i| center[i] > 0.0 && center[i] < 1.0)
        };
        let expected = if inside(0.0, 1.0) {
            Contents::SOLID
        } else if inside(1.0, 1.5) {
            Contents::WATER
        } else {
            Contents::EMPTY
        };
        assert_eq!(tree.contents(leaf), Some(expected), "leaf at {center}");
    }
}

#[test]
fn merged_surfaces_give_six_node_faces() {
    let options = Options::default();
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let loaded = brushbsp::brush::load_brushes(
        EntityId::WORLD,
        &two_cubes(Contents::SOLID),
        0,
        &options,
        &planes,
        &texinfo,
    )
    .expect("brushes load");
    let (faces, _) = brushbsp::csg::csg_faces(&loaded, &planes, &options);
    assert_eq!(faces.len(), 10);

    let mut surfaces = build_surfaces(faces);
    let removed = merge_surfaces(&mut surfaces);
    assert_eq!(removed, 4);
    assert_eq!(surfaces.iter().map(|s| s.faces.len()).sum::<usize>(), 6);

    let (tree, stats) =
        build_tree(EntityId::WORLD, surfaces, &planes, &texinfo, &options, false).expect("tree");
    assert_eq!(stats.node_faces, 6);
    let vols = volumes(&tree, &planes);
    assert!(approx_eq(volume_of(&vols, Contents::SOLID), 1.5, 1e-9));
}

#[test]
fn model_without_brushes_is_one_empty_leaf() {
    let options = Options::default();
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let (tree, stats) =
        build_tree(EntityId(3), Vec::new(), &planes, &texinfo, &options, false).expect("tree");
    assert!(tree.node(tree.root).is_leaf());
    assert_eq!(tree.contents(tree.root), Some(Contents::EMPTY));
    assert_eq!(stats.nodes, 0);
    assert_eq!(stats.leaves, 1);
}

#[test]
fn leaf_markfaces_point_at_node_faces_on_its_boundary() {
    let built = build_world(&two_cubes(Contents::SOLID), &Options::default(), false);
    let tree = &built.tree;
    for leaf in tree.leaves() {
        let data = tree.leaf(leaf).expect("leaf");
        let path = tree.path_planes(leaf, &built.planes);
        for key in &data.markfaces {
            let face = tree.face(*key);
            let plane = built.planes.get(face.plane.id);
            assert!(
                path.iter().any(|p| p.equals(&plane, 1e-6, 1e-6)
                    || p.flipped().equals(&plane, 1e-6, 1e-6))
            );
        }
        if data.contents == Contents::EMPTY {
            assert!(!data.markfaces.is_empty() || leaf == tree.root);
        }
    }
}

#[test]
fn detail_splits_share_a_cluster() {
    let brushes = vec![
        cube([0.0, 0.0, 0.0], [64.0, 64.0, 64.0], Contents::SOLID),
        cube([128.0, 0.0, 0.0], [192.0, 64.0, 64.0], Contents::DETAIL),
    ];
    let mut built = build_world(&brushes, &Options::default(), false);
    let tree = &mut built.tree;
    assert!(tree.has_detail_separators());

    let clusters = tree.assign_clusters();
    let leaves = tree.leaves();
    assert!(clusters < leaves.len());

    for id in tree.internal_nodes() {
        let node = tree.node(id).internal().expect("internal").clone();
        if !node.detail_separator {
            continue;
        }
        let mut below = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            match tree.node(n).internal() {
                Some(i) => stack.extend(i.children),
                None => below.push(tree.leaf(n).and_then(|l| l.cluster)),
            }
        }
        assert!(below.windows(2).all(|w| w[0] == w[1]));
        assert!(below[0].is_some());
    }

    // the inside of the detail brush keeps its detail contents
    let inside = tree.point_in_leaf(&Point3::new(160.0, 32.0, 32.0), &built.planes);
    assert_eq!(tree.contents(inside), Some(Contents::DETAIL));
}

/// Horizontal square face at height `z` spanning `size` units from the origin.
fn square(
    plane: PlaneRef,
    z: Real,
    size: Real,
    front: Contents,
    texinfo: Option<TexInfoId>,
) -> Face {
    let mut points: Vec<Point3<Real>> = [(0.0, 0.0), (0.0, size), (size, size), (size, 0.0)]
        .iter()
        .map(|&(x, y)| Point3::new(x, y, z))
        .collect();
    if plane.flipped {
        points.reverse();
    }
    Face {
        plane,
        winding: Winding::new(points),
        contents: FaceContents::new(front, Contents::SOLID),
        texinfo,
        lmshift: 4,
        entity: EntityId::WORLD,
        brush: 0,
        original: None,
    }
}

#[test]
fn leaf_bounded_by_different_contents_is_rejected() {
    let planes = PlaneTable::new();
    let floor = planes.find_or_insert(&Plane::new(Vector3::z(), 0.0));
    let ceiling = planes.find_or_insert(&Plane::new(-Vector3::z(), -64.0));
    let surfaces = build_surfaces(vec![
        square(floor, 0.0, 64.0, Contents::EMPTY, None),
        square(ceiling, 64.0, 64.0, Contents::WATER, None),
    ]);

    let result = build_tree(
        EntityId::WORLD,
        surfaces,
        &planes,
        &TexInfoTable::new(),
        &Options::default(),
        false,
    );
    match result {
        Err(CompileError::MixedLeafContents { first, second, near }) => {
            let mut seen = [first, second];
            seen.sort_by_key(|c| c.priority());
            assert_eq!(seen, [Contents::EMPTY, Contents::WATER]);
            assert!(near.z == 0.0 || near.z == 64.0);
        }
        other => panic!("expected mixed leaf contents, got {other:?}"),
    }
}

#[test]
fn fine_lightmaps_still_subdivide() {
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let floor = planes.find_or_insert(&Plane::new(Vector3::z(), 0.0));
    let fine =
        texinfo.find_or_insert(&TexInfo::world_aligned("floor", &Vector3::z()).with_lmshift(0));
    let mut face = square(floor, 0.0, 64.0, Contents::EMPTY, Some(fine));
    face.lmshift = 0;

    let options = Options::default();
    let (tree, _) = build_tree(
        EntityId::WORLD,
        build_surfaces(vec![face]),
        &planes,
        &texinfo,
        &options,
        false,
    )
    .expect("tree");

    // 240 texels at lightmap shift 4 are 15 units at shift 0
    let limit = options.subdivide_size / 16.0;
    assert!(tree.faces.len() > 1);
    for face in &tree.faces {
        let bounds = face.winding.bounds();
        assert!(bounds.maxs.x - bounds.mins.x <= limit + 1e-6);
        assert!(bounds.maxs.y - bounds.mins.y <= limit + 1e-6);
    }
    let area: Real = tree.faces.iter().map(|f| f.winding.area()).sum();
    assert!(approx_eq(area, 64.0 * 64.0, 1e-3));
}
