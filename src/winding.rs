//! Convex polygon windings and the plane clipping primitive everything
//! else is built on.

use crate::aabb::Aabb;
use crate::float_types::{EQUAL_EPSILON, MIN_WINDING_AREA, Real};
use crate::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use nalgebra::{Point3, Vector3};

/// Ordered points of one convex, planar polygon. Points wind clockwise when
/// viewed from the front of the polygon's plane (the Quake convention), so
/// the normal is `(p0 - p1) × (p2 - p1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Winding {
    pub points: Vec<Point3<Real>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PointSide {
    Front,
    Back,
    On,
}

impl Winding {
    pub const fn new(points: Vec<Point3<Real>>) -> Self {
        Self { points }
    }

    /// A square on `plane` large enough to cover the whole world box.
    pub fn base_for_plane(plane: &Plane, extent: Real) -> Self {
        let axis = plane.plane_type().axis();
        let up = if axis == 2 {
            Vector3::x()
        } else {
            Vector3::z()
        };

        // project up onto the plane
        let up = (up - plane.normal * up.dot(&plane.normal)).normalize();
        let right = up.cross(&plane.normal);
        let org = Point3::from(plane.normal * plane.dist);

        let up = up * extent * 2.0;
        let right = right * extent * 2.0;
        Winding::new(vec![
            org - right + up,
            org + right + up,
            org + right - up,
            org - right - up,
        ])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area(&self) -> Real {
        if self.points.len() < 3 {
            return 0.0;
        }
        let p0 = self.points[0];
        self.points
            .windows(2)
            .skip(1)
            .map(|w| (w[0] - p0).cross(&(w[1] - p0)).norm())
            .sum::<Real>()
            * 0.5
    }

    pub fn center(&self) -> Point3<Real> {
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.points.len().max(1) as Real)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }

    /// Plane the points lie on, following the winding order.
    pub fn plane(&self) -> Option<Plane> {
        let n = self.points.len();
        if n < 3 {
            return None;
        }
        // Newell's method tolerates slightly non-planar or collinear runs
        let normal = (0..n).fold(Vector3::zeros(), |acc, i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            acc + Vector3::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            )
        });
        let len = normal.norm();
        if len == 0.0 {
            return None;
        }
        // Newell gives the counter-clockwise normal
        let normal = -normal / len;
        Some(Plane {
            normal,
            dist: normal.dot(&self.center().coords),
        })
    }

    pub fn reversed(&self) -> Self {
        Winding::new(self.points.iter().rev().copied().collect())
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Too small or too thin to survive as geometry.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.area() < MIN_WINDING_AREA
    }

    fn classify_points(&self, plane: &Plane, eps: Real) -> (Vec<Real>, Vec<PointSide>, [usize; 3]) {
        let mut counts = [0usize; 3];
        let mut dists = Vec::with_capacity(self.points.len());
        let mut sides = Vec::with_capacity(self.points.len());
        for p in &self.points {
            let d = plane.distance_to(p);
            let side = if d > eps {
                PointSide::Front
            } else if d < -eps {
                PointSide::Back
            } else {
                PointSide::On
            };
            counts[side as usize] += 1;
            dists.push(d);
            sides.push(side);
        }
        (dists, sides, counts)
    }

    /// [`FRONT`], [`BACK`], [`COPLANAR`] or [`SPANNING`] relative to `plane`.
    pub fn classify(&self, plane: &Plane, eps: Real) -> i8 {
        let (_, _, counts) = self.classify_points(plane, eps);
        match (counts[PointSide::Front as usize], counts[PointSide::Back as usize]) {
            (0, 0) => COPLANAR,
            (_, 0) => FRONT,
            (0, _) => BACK,
            _ => SPANNING,
        }
    }

    /// Splits the winding by `plane` into its front and back parts.
    ///
    /// Points within `eps` of the plane go to both parts. A winding lying
    /// entirely on the plane is returned whole on the side its own normal
    /// faces when `keep_on` is set, and dropped otherwise. Parts that end up
    /// degenerate are dropped.
    pub fn clip(
        &self,
        plane: &Plane,
        eps: Real,
        keep_on: bool,
    ) -> (Option<Winding>, Option<Winding>) {
        let (dists, sides, counts) = self.classify_points(plane, eps);
        let num_front = counts[PointSide::Front as usize];
        let num_back = counts[PointSide::Back as usize];

        if num_front == 0 && num_back == 0 {
            if !keep_on {
                return (None, None);
            }
            let facing = self
                .plane()
                .map(|p| p.normal.dot(&plane.normal))
                .unwrap_or(0.0);
            return if facing > 0.0 {
                (Some(self.clone()), None)
            } else {
                (None, Some(self.clone()))
            };
        }
        if num_back == 0 {
            return (Some(self.clone()), None);
        }
        if num_front == 0 {
            return (None, Some(self.clone()));
        }

        let n = self.points.len();
        let mut front = Vec::with_capacity(n + 4);
        let mut back = Vec::with_capacity(n + 4);
        for i in 0..n {
            let p1 = self.points[i];
            match sides[i] {
                PointSide::On => {
                    front.push(p1);
                    back.push(p1);
                    continue;
                }
                PointSide::Front => front.push(p1),
                PointSide::Back => back.push(p1),
            }

            let j = (i + 1) % n;
            if sides[j] == PointSide::On || sides[j] == sides[i] {
                continue;
            }

            let p2 = self.points[j];
            let t = dists[i] / (dists[i] - dists[j]);
            let mut mid = p1 + (p2 - p1) * t;
            // exact coordinates on axial planes keep splits from drifting
            for k in 0..3 {
                if plane.normal[k] == 1.0 {
                    mid[k] = plane.dist;
                } else if plane.normal[k] == -1.0 {
                    mid[k] = -plane.dist;
                }
            }
            front.push(mid);
            back.push(mid);
        }

        let keep = |points: Vec<Point3<Real>>| {
            let w = Winding::new(points);
            (!w.is_degenerate()).then_some(w)
        };
        (keep(front), keep(back))
    }

    /// Keeps only the part in front of `plane`.
    pub fn chop(&self, plane: &Plane, eps: Real) -> Option<Winding> {
        let (_, _, counts) = self.classify_points(plane, eps);
        if counts[PointSide::Back as usize] == 0 {
            return if counts[PointSide::Front as usize] == 0 {
                None
            } else {
                Some(self.clone())
            };
        }
        self.clip(plane, eps, false).0
    }

    /// Keeps the part in front of `plane`; a winding lying on the plane
    /// survives whole.
    pub fn chop_keep_on(&self, plane: &Plane, eps: Real) -> Option<Winding> {
        let (_, _, counts) = self.classify_points(plane, eps);
        if counts[PointSide::Back as usize] == 0 {
            return Some(self.clone());
        }
        self.clip(plane, eps, false).0
    }

    /// Every interior angle turns the same way and no edge is degenerate.
    pub fn is_convex(&self, eps: Real) -> bool {
        let Some(plane) = self.plane() else {
            return false;
        };
        let n = self.points.len();
        (0..n).all(|i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let c = self.points[(i + 2) % n];
            if (b - a).norm() < EQUAL_EPSILON {
                return false;
            }
            // edge normal pointing out of the polygon
            let edge_normal = plane.normal.cross(&(b - a)).normalize();
            edge_normal.dot(&(c - a)) <= eps
        })
    }

    /// Drops points that lie on the line through their neighbours.
    pub fn remove_colinear_points(&mut self, eps: Real) {
        let n = self.points.len();
        if n < 3 {
            return;
        }
        let kept: Vec<Point3<Real>> = (0..n)
            .filter(|&i| {
                let prev = self.points[(i + n - 1) % n];
                let cur = self.points[i];
                let next = self.points[(i + 1) % n];
                let v1 = cur - prev;
                let v2 = next - cur;
                let (l1, l2) = (v1.norm(), v2.norm());
                if l1 < EQUAL_EPSILON || l2 < EQUAL_EPSILON {
                    return false;
                }
                v1.dot(&v2) / (l1 * l2) < 1.0 - eps
            })
            .map(|i| self.points[i])
            .collect();
        if kept.len() >= 3 {
            self.points = kept;
        }
    }
}
