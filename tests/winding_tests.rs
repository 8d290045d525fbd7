mod support;

use brushbsp::float_types::Real;
use brushbsp::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use brushbsp::winding::Winding;
use nalgebra::{Point3, Vector3};
use support::approx_eq;

const EPS: Real = 0.0001;

/// 2 x 2 square on z = 0, facing +z.
fn square() -> Winding {
    Winding::new(vec![
        Point3::new(-1.0, -1.0, 0.0),
        Point3::new(-1.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(1.0, -1.0, 0.0),
    ])
}

#[test]
fn base_winding_lies_on_plane_and_faces_it() {
    let plane = Plane::new(Vector3::new(1.0, 2.0, 3.0), 10.0);
    let w = Winding::base_for_plane(&plane, 4096.0);
    assert_eq!(w.len(), 4);
    for p in &w.points {
        assert!(plane.distance_to(p).abs() < 1e-6);
    }
    let wp = w.plane().expect("base winding has a plane");
    assert!(wp.normal.dot(&plane.normal) > 0.999);
}

#[test]
fn classify_against_planes() {
    let w = square();
    assert_eq!(w.classify(&Plane::new(Vector3::z(), -1.0), EPS), FRONT);
    assert_eq!(w.classify(&Plane::new(Vector3::z(), 1.0), EPS), BACK);
    assert_eq!(w.classify(&Plane::new(Vector3::z(), 0.0), EPS), COPLANAR);
    assert_eq!(w.classify(&Plane::new(Vector3::x(), 0.0), EPS), SPANNING);
}

#[test]
fn clip_splits_area_exactly() {
    let w = square();
    let (front, back) = w.clip(&Plane::new(Vector3::x(), 0.5), EPS, false);
    let front = front.expect("front part");
    let back = back.expect("back part");
    assert!(approx_eq(front.area(), 1.0, 1e-9));
    assert!(approx_eq(back.area(), 3.0, 1e-9));
    // axial cuts land exactly on the plane
    assert!(front.points.iter().all(|p| p.x >= 0.5));
    assert!(back.points.iter().any(|p| p.x == 0.5));
    assert!(front.is_convex(EPS));
    assert!(back.is_convex(EPS));
}

#[test]
fn coplanar_winding_goes_to_the_side_it_faces() {
    let w = square();
    let up = Plane::new(Vector3::z(), 0.0);
    let (front, back) = w.clip(&up, EPS, true);
    assert!(front.is_some() && back.is_none());

    let (front, back) = w.clip(&up.flipped(), EPS, true);
    assert!(front.is_none() && back.is_some());

    let (front, back) = w.clip(&up, EPS, false);
    assert!(front.is_none() && back.is_none());
}

#[test]
fn sliver_parts_are_dropped() {
    let w = square();
    // the right edge is within the on-plane band, so nothing is in front
    let (front, back) = w.clip(&Plane::new(Vector3::x(), 0.99999), EPS, false);
    assert!(front.is_none());
    assert!(back.is_some());
}

#[test]
fn chop_keeps_front_only() {
    let w = square();
    let kept = w
        .chop(&Plane::new(-Vector3::y(), 0.0), EPS)
        .expect("half survives");
    assert!(approx_eq(kept.area(), 2.0, 1e-9));
    assert!(kept.points.iter().all(|p| p.y <= 0.0));
    assert!(w.chop(&Plane::new(Vector3::z(), 1.0), EPS).is_none());
}

#[test]
fn reversed_winding_flips_normal() {
    let w = square();
    let n = w.plane().expect("plane").normal;
    let r = w.reversed().plane().expect("plane").normal;
    assert!((n + r).norm() < 1e-9);
    assert!(approx_eq(w.center().x, 0.0, 1e-12));
}

#[test]
fn concave_polygon_is_not_convex() {
    let w = Winding::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ]);
    assert!(!w.is_convex(EPS));
    assert!(square().is_convex(EPS));
}
