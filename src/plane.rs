//! Planes and the shared plane table.

use crate::float_types::{DIST_EPSILON, NORMAL_EPSILON, Real};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use parking_lot::RwLock;

// Classification of a polygon against a plane
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// Which axis a plane's normal follows; axial planes make cheaper splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneType {
    X,
    Y,
    Z,
    AnyX,
    AnyY,
    AnyZ,
}

impl PlaneType {
    pub const fn is_axial(self) -> bool {
        matches!(self, PlaneType::X | PlaneType::Y | PlaneType::Z)
    }

    /// Dominant axis index.
    pub const fn axis(self) -> usize {
        match self {
            PlaneType::X | PlaneType::AnyX => 0,
            PlaneType::Y | PlaneType::AnyY => 1,
            PlaneType::Z | PlaneType::AnyZ => 2,
        }
    }
}

/// `normal · p = dist`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub dist: Real,
}

impl Plane {
    pub fn new(normal: Vector3<Real>, dist: Real) -> Self {
        let len = normal.norm();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                dist: dist / len,
            }
        } else {
            Plane { normal, dist }
        }
    }

    /// Plane through three points, normal by the right-hand rule on
    /// `(b - a) × (c - a)`. `None` if the points are collinear.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let len = normal.norm();
        if len < NORMAL_EPSILON {
            return None;
        }
        let normal = normal / len;
        Some(Plane {
            normal,
            dist: normal.dot(&a.coords),
        })
    }

    #[inline]
    pub fn distance_to(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.dist
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.dist = -self.dist;
    }

    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            dist: -self.dist,
        }
    }

    pub fn plane_type(&self) -> PlaneType {
        let n = &self.normal;
        if n.x.abs() == 1.0 {
            return PlaneType::X;
        }
        if n.y.abs() == 1.0 {
            return PlaneType::Y;
        }
        if n.z.abs() == 1.0 {
            return PlaneType::Z;
        }
        let (ax, ay, az) = (n.x.abs(), n.y.abs(), n.z.abs());
        if ax >= ay && ax >= az {
            PlaneType::AnyX
        } else if ay >= az {
            PlaneType::AnyY
        } else {
            PlaneType::AnyZ
        }
    }

    /// Canonical orientation of this plane and whether it had to be flipped
    /// to get there. Axial planes face the positive axis; other planes face
    /// positive along their dominant component.
    pub fn canonical(&self) -> (Plane, bool) {
        let mut plane = *self;
        // snap normals that are axial within tolerance
        for i in 0..3 {
            if (plane.normal[i].abs() - 1.0).abs() < NORMAL_EPSILON {
                let sign = plane.normal[i].signum();
                plane.normal = Vector3::zeros();
                plane.normal[i] = sign;
                break;
            }
        }
        let axis = plane.plane_type().axis();
        if plane.normal[axis] < 0.0 {
            (plane.flipped(), true)
        } else {
            (plane, false)
        }
    }

    pub fn equals(&self, other: &Plane, normal_eps: Real, dist_eps: Real) -> bool {
        (self.dist - other.dist).abs() < dist_eps
            && (0..3).all(|i| (self.normal[i] - other.normal[i]).abs() < normal_eps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub usize);

/// A reference to a stored plane, possibly facing the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneRef {
    pub id: PlaneId,
    /// `true` when facing opposite to the stored orientation
    pub flipped: bool,
}

impl PlaneRef {
    pub const fn new(id: PlaneId, flipped: bool) -> Self {
        Self { id, flipped }
    }

    pub const fn reversed(self) -> Self {
        Self {
            id: self.id,
            flipped: !self.flipped,
        }
    }

    pub const fn side(self) -> usize {
        self.flipped as usize
    }
}

#[derive(Debug, Default)]
struct PlaneStore {
    planes: Vec<Plane>,
    buckets: HashMap<i64, Vec<PlaneId>>,
}

impl PlaneStore {
    fn lookup(&self, plane: &Plane) -> Option<PlaneId> {
        let key = bucket_key(plane.dist);
        (key - 1..=key + 1)
            .filter_map(|k| self.buckets.get(&k))
            .flatten()
            .copied()
            .find(|id| {
                self.planes[id.0].equals(plane, NORMAL_EPSILON, DIST_EPSILON)
            })
    }
}

#[inline]
fn bucket_key(dist: Real) -> i64 {
    dist.round() as i64
}

/// Deduplicating plane store shared by every compile job.
///
/// Planes are stored once, in canonical orientation. A lookup racing an
/// insert of the same plane from another thread always resolves to the one
/// id that won the write lock.
#[derive(Debug, Default)]
pub struct PlaneTable {
    store: RwLock<PlaneStore>,
}

impl PlaneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `plane` and whether `plane` faces opposite to it.
    pub fn find_or_insert(&self, plane: &Plane) -> PlaneRef {
        let (canonical, flipped) = plane.canonical();
        if let Some(id) = self.store.read().lookup(&canonical) {
            return PlaneRef::new(id, flipped);
        }

        let mut store = self.store.write();
        if let Some(id) = store.lookup(&canonical) {
            return PlaneRef::new(id, flipped);
        }
        let id = PlaneId(store.planes.len());
        store.planes.push(canonical);
        store
            .buckets
            .entry(bucket_key(canonical.dist))
            .or_default()
            .push(id);
        PlaneRef::new(id, flipped)
    }

    /// Stored (canonical) plane.
    pub fn get(&self, id: PlaneId) -> Plane {
        self.store.read().planes[id.0]
    }

    /// The plane as seen from `plane_ref`'s side.
    pub fn oriented(&self, plane_ref: PlaneRef) -> Plane {
        let plane = self.get(plane_ref.id);
        if plane_ref.flipped {
            plane.flipped()
        } else {
            plane
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored plane, indexed by `PlaneId`.
    pub fn snapshot(&self) -> Vec<Plane> {
        self.store.read().planes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_faces_positive_axis() {
        let (p, flipped) = Plane::new(-Vector3::x(), -8.0).canonical();
        assert!(flipped);
        assert_eq!(p.normal, Vector3::x());
        assert_eq!(p.dist, 8.0);
        assert_eq!(p.plane_type(), PlaneType::X);

        let (p, flipped) = Plane::new(Vector3::new(-1.0, 2.0, 0.5), 3.0).canonical();
        assert!(!flipped);
        assert_eq!(p.plane_type(), PlaneType::AnyY);
    }
}
