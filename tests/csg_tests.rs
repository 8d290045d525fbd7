mod support;

use brushbsp::brush::load_brushes;
use brushbsp::contents::{ContentKind, Contents, DetailKind};
use brushbsp::csg::{CsgStats, csg_faces};
use brushbsp::errors::CompileError;
use brushbsp::face::Face;
use brushbsp::float_types::Real;
use brushbsp::map::{EntityId, MapBrush};
use brushbsp::options::Options;
use brushbsp::plane::PlaneTable;
use brushbsp::texinfo::TexInfoTable;
use support::{approx_eq, cube};

fn run_csg(brushes: &[MapBrush]) -> (Vec<Face>, CsgStats, PlaneTable) {
    let options = Options::default();
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let loaded = load_brushes(EntityId::WORLD, brushes, 0, &options, &planes, &texinfo)
        .expect("brushes load");
    let (faces, stats) = csg_faces(&loaded, &planes, &options);
    (faces, stats, planes)
}

fn overlapping(second: Contents) -> Vec<MapBrush> {
    vec![
        cube([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], Contents::SOLID),
        cube([0.5, 0.0, 0.0], [1.5, 1.0, 1.0], second),
    ]
}

fn total_area(faces: &[Face]) -> Real {
    faces.iter().map(|f| f.winding.area()).sum()
}

#[test]
fn overlapping_solids_leave_the_outer_shell() {
    let (faces, stats, planes) = run_csg(&overlapping(Contents::SOLID));

    assert_eq!(faces.len(), 10);
    assert_eq!(stats.faces, 10);
    assert_eq!(stats.mirrored, 0);
    assert_eq!(stats.brush_faces, 12);
    // surface of the 1.5 x 1 x 1 union
    assert!(approx_eq(total_area(&faces), 8.0, 1e-9));

    for face in &faces {
        assert_eq!(face.contents.front, Contents::EMPTY);
        assert_eq!(face.contents.back, Contents::SOLID);
        let plane = planes.oriented(face.plane);
        if plane.normal.x.abs() > 0.5 {
            continue;
        }
        // faces on the y and z planes are cut where the brushes meet
        let b = face.winding.bounds();
        let cut_low = approx_eq(b.mins.x, 0.0, 1e-9) && approx_eq(b.maxs.x, 0.5, 1e-9);
        let cut_high = approx_eq(b.mins.x, 0.5, 1e-9) && approx_eq(b.maxs.x, 1.5, 1e-9);
        assert!(cut_low || cut_high, "unexpected x span {:?}", b);
    }
}

#[test]
fn fragments_on_one_plane_do_not_overlap() {
    let (faces, _, planes) = run_csg(&overlapping(Contents::SOLID));
    for (i, a) in faces.iter().enumerate() {
        for b in &faces[i + 1..] {
            if a.plane != b.plane {
                continue;
            }
            let normal = planes.oriented(a.plane).normal;
            let (ba, bb) = (a.winding.bounds(), b.winding.bounds());
            // overlap along the two in-plane axes
            let overlap: Real = (0..3)
                .filter(|&axis| normal[axis].abs() < 0.5)
                .map(|axis| {
                    (ba.maxs[axis].min(bb.maxs[axis]) - ba.mins[axis].max(bb.mins[axis])).max(0.0)
                })
                .product();
            assert!(overlap < 1e-9);
        }
    }
}

#[test]
fn solid_wins_over_water_and_relabels_the_boundary() {
    let (faces, stats, planes) = run_csg(&overlapping(Contents::WATER));

    // water keeps only the part outside the solid, mirrored inward
    assert_eq!(stats.mirrored, 5);
    let water_inside: Vec<_> = faces
        .iter()
        .filter(|f| f.contents.front == Contents::WATER && f.contents.back == Contents::EMPTY)
        .collect();
    assert_eq!(water_inside.len(), 5);
    assert!(approx_eq(
        water_inside.iter().map(|f| f.winding.area()).sum::<Real>(),
        3.0,
        1e-9
    ));

    // the solid's +x side now faces water
    let boundary: Vec<_> = faces
        .iter()
        .filter(|f| f.contents.front == Contents::WATER && f.contents.back == Contents::SOLID)
        .collect();
    assert_eq!(boundary.len(), 1);
    let plane = planes.oriented(boundary[0].plane);
    assert!(approx_eq(plane.normal.x, 1.0, 1e-9));
    assert!(approx_eq(plane.dist, 1.0, 1e-9));
    assert!(approx_eq(boundary[0].winding.area(), 1.0, 1e-9));

    // nothing of the water brush survives inside the solid
    for face in &faces {
        if face.contents.back == Contents::WATER {
            assert!(face.winding.bounds().mins.x >= 1.0 - 1e-9);
        }
    }
}

#[test]
fn result_does_not_depend_on_brush_order() {
    let forward = overlapping(Contents::WATER);
    let mut backward = forward.clone();
    backward.reverse();

    let (a, _, _) = run_csg(&forward);
    let (b, _, _) = run_csg(&backward);
    assert_eq!(a.len(), b.len());

    let area_of = |faces: &[Face], front: Contents, back: Contents| -> Real {
        faces
            .iter()
            .filter(|f| f.contents.front == front && f.contents.back == back)
            .map(|f| f.winding.area())
            .sum()
    };
    for (front, back) in [
        (Contents::EMPTY, Contents::SOLID),
        (Contents::WATER, Contents::SOLID),
        (Contents::EMPTY, Contents::WATER),
        (Contents::WATER, Contents::EMPTY),
    ] {
        assert!(approx_eq(area_of(&a, front, back), area_of(&b, front, back), 1e-9));
    }
}

#[test]
fn lone_liquid_brush_is_mirrored() {
    let (faces, stats, _) = run_csg(&[cube([0.0, 0.0, 0.0], [2.0, 2.0, 2.0], Contents::LAVA)]);
    assert_eq!(faces.len(), 12);
    assert_eq!(stats.mirrored, 6);
    for pair in faces.chunks(2) {
        assert_eq!(pair[0].plane.reversed(), pair[1].plane);
        assert_eq!(pair[0].contents.swapped(), pair[1].contents);
        assert!(approx_eq(pair[0].winding.area(), pair[1].winding.area(), 1e-9));
    }
}

#[test]
fn invalid_contents_are_rejected() {
    let bad = Contents {
        kind: ContentKind::Water,
        detail: Some(DetailKind::Detail),
    };
    let options = Options::default();
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let brushes = vec![
        cube([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], Contents::SOLID),
        cube([2.0, 0.0, 0.0], [3.0, 1.0, 1.0], bad),
    ];
    let err = load_brushes(EntityId::WORLD, &brushes, 0, &options, &planes, &texinfo)
        .expect_err("water detail is not representable");
    match err {
        CompileError::ContentConflict { brush, .. } => assert_eq!(brush, 1),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn clip_brushes_only_exist_in_collision_hulls() {
    let options = Options::default();
    let planes = PlaneTable::new();
    let texinfo = TexInfoTable::new();
    let brushes = vec![cube([0.0, 0.0, 0.0], [64.0, 64.0, 64.0], Contents::CLIP)];

    let point = load_brushes(EntityId::WORLD, &brushes, 0, &options, &planes, &texinfo)
        .expect("brushes load");
    assert!(point.is_empty());

    let hull1 = load_brushes(EntityId::WORLD, &brushes, 1, &options, &planes, &texinfo)
        .expect("brushes load");
    assert_eq!(hull1.len(), 1);
    assert_eq!(hull1[0].contents, Contents::SOLID);
    // expanded by the 32 x 32 x 56 player box
    assert!(approx_eq(hull1[0].volume(), 96.0 * 96.0 * 120.0, 1e-6));
    assert!(hull1[0].faces.iter().all(|f| f.texinfo.is_none()));
}
