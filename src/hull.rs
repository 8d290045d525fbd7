//! Expansion of brushes into collision hulls.
//!
//! A point moving through an expanded brush collides exactly where a box of
//! the hull's size would collide with the original brush. Offsetting every
//! plane by the box corner is only exact on the planes themselves, so axial
//! and edge bevel planes are added to clip off the corners the offset planes
//! leave sticking out.

use crate::aabb::Aabb;
use crate::float_types::{ANGLE_EPSILON, DIST_EPSILON, NORMAL_EPSILON, ON_EPSILON, Real};
use crate::options::HullSize;
use crate::plane::Plane;
use crate::winding::Winding;
use log::trace;
use nalgebra::{Point3, Vector3};

struct HullBrush<'a> {
    hull: &'a HullSize,
    planes: Vec<Plane>,
    /// Original brush vertices
    points: Vec<Point3<Real>>,
    /// Every brush vertex moved to every hull box corner
    corners: Vec<Point3<Real>>,
    edges: Vec<(usize, usize)>,
}

impl<'a> HullBrush<'a> {
    fn new(hull: &'a HullSize) -> Self {
        Self {
            hull,
            planes: Vec::new(),
            points: Vec::new(),
            corners: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn add_plane(&mut self, plane: Plane) {
        if self
            .planes
            .iter()
            .any(|p| p.equals(&plane, NORMAL_EPSILON, DIST_EPSILON))
        {
            return;
        }
        self.planes.push(plane);
    }

    fn add_point(&mut self, p: &Point3<Real>) -> usize {
        if let Some(i) = self
            .points
            .iter()
            .position(|q| (0..3).all(|k| (q[k] - p[k]).abs() < ON_EPSILON))
        {
            return i;
        }
        self.points.push(*p);
        let mins = self.hull.mins();
        let maxs = self.hull.maxs();
        for corner in 0..8 {
            let mut c = *p;
            for k in 0..3 {
                c[k] += if corner & (1 << k) != 0 { maxs[k] } else { mins[k] };
            }
            self.corners.push(c);
        }
        self.points.len() - 1
    }

    /// Adds `plane` (or its flip) if every hull corner lies on one side of it.
    fn test_add_plane(&mut self, mut plane: Plane) {
        if self.planes.iter().any(|p| {
            p.equals(&plane, NORMAL_EPSILON, DIST_EPSILON)
                || p.equals(&plane.flipped(), NORMAL_EPSILON, DIST_EPSILON)
        }) {
            return;
        }

        let mut front = false;
        let mut back = false;
        for corner in &self.corners {
            let d = plane.distance_to(corner);
            if d < -ON_EPSILON {
                if front {
                    return;
                }
                back = true;
            } else if d > ON_EPSILON {
                if back {
                    return;
                }
                front = true;
            }
        }

        // it separates the hull from the outside; it must face outward
        if front {
            plane.flip();
        }
        trace!("edge bevel {:?} {}", plane.normal, plane.dist);
        self.planes.push(plane);
    }

    fn add_edge(&mut self, p1: &Point3<Real>, p2: &Point3<Real>) {
        let a = self.add_point(p1);
        let b = self.add_point(p2);
        if self
            .edges
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
        {
            return;
        }
        self.edges.push((a, b));

        let edge_dir = p1 - p2;
        let len = edge_dir.norm();
        if len < ON_EPSILON {
            return;
        }
        let edge_dir = edge_dir / len;
        let mins = self.hull.mins();
        let maxs = self.hull.maxs();

        for axis in 0..3 {
            let b = (axis + 1) % 3;
            let c = (axis + 2) % 3;
            let mut axis_vec = Vector3::zeros();
            axis_vec[axis] = 1.0;
            let normal = axis_vec.cross(&edge_dir);
            let length = normal.norm();
            // edge nearly parallel to this axis
            if length < ANGLE_EPSILON {
                continue;
            }
            let normal = normal / length;
            for d in [mins[b], maxs[b]] {
                for e in [mins[c], maxs[c]] {
                    let mut org = *p1;
                    org[b] += d;
                    org[c] += e;
                    self.test_add_plane(Plane {
                        normal,
                        dist: normal.dot(&org.coords),
                    });
                }
            }
        }
    }
}

/// Bounding planes of `planes`/`windings` grown by `hull`.
///
/// `planes[i]` bounds the brush with outward normal and `windings` are the
/// surviving faces of the unexpanded brush.
pub fn expand_brush(planes: &[Plane], windings: &[Winding], bounds: &Aabb, hull: &HullSize) -> Vec<Plane> {
    let mut hb = HullBrush::new(hull);
    let mins = hull.mins();
    let maxs = hull.maxs();

    for w in windings {
        for p in &w.points {
            hb.add_point(p);
        }
    }

    // push every plane out by the hull corner that touches it first
    for plane in planes {
        let corner = Vector3::from_fn(|k, _| {
            if plane.normal[k] > 0.0 {
                maxs[k]
            } else if plane.normal[k] < 0.0 {
                mins[k]
            } else {
                0.0
            }
        });
        hb.add_plane(Plane {
            normal: plane.normal,
            dist: plane.dist + corner.dot(&plane.normal),
        });
    }

    // axial bevels
    for axis in 0..3 {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        hb.add_plane(Plane {
            normal,
            dist: bounds.maxs[axis] + maxs[axis],
        });
        hb.add_plane(Plane {
            normal: -normal,
            dist: -(bounds.mins[axis] + mins[axis]),
        });
    }

    // edge bevels
    for w in windings {
        let n = w.points.len();
        for i in 0..n {
            hb.add_edge(&w.points[i], &w.points[(i + 1) % n]);
        }
    }

    hb.planes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::brush_from_planes;

    fn cube_planes(half: Real) -> Vec<Plane> {
        (0..3)
            .flat_map(|axis| {
                let mut n = Vector3::zeros();
                n[axis] = 1.0;
                [Plane::new(n, half), Plane::new(-n, half)]
            })
            .collect()
    }

    #[test]
    fn axial_box_grows_by_hull_extents() {
        let planes = cube_planes(8.0);
        let windings: Vec<Winding> = brush_from_planes(&planes, ON_EPSILON, 65536.0)
            .into_iter()
            .flatten()
            .collect();
        let bounds = Aabb::new(Point3::new(-8.0, -8.0, -8.0), Point3::new(8.0, 8.0, 8.0));
        let hull = HullSize::new([-16.0, -16.0, -24.0], [16.0, 16.0, 32.0]);
        let expanded = expand_brush(&planes, &windings, &bounds, &hull);

        // a box needs no bevels beyond its own six planes
        assert_eq!(expanded.len(), 6);
        let top = expanded
            .iter()
            .find(|p| p.normal == Vector3::z())
            .expect("top plane");
        assert_eq!(top.dist, 40.0);
        let bottom = expanded
            .iter()
            .find(|p| p.normal == -Vector3::z())
            .expect("bottom plane");
        assert_eq!(bottom.dist, 32.0);
    }
}
