use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub mins: Point3<Real>,
    pub maxs: Point3<Real>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    #[inline]
    pub const fn new(mins: Point3<Real>, maxs: Point3<Real>) -> Self {
        Self { mins, maxs }
    }

    /// Inverted box that any `add_point` turns into a valid one.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            mins: Point3::new(Real::MAX, Real::MAX, Real::MAX),
            maxs: Point3::new(Real::MIN, Real::MIN, Real::MIN),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<Real>>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.add_point(p);
        }
        aabb
    }

    #[inline]
    pub fn add_point(&mut self, p: &Point3<Real>) {
        self.mins = self.mins.inf(p);
        self.maxs = self.maxs.sup(p);
    }

    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.maxs.x >= other.mins.x
            && self.mins.x <= other.maxs.x
            && self.maxs.y >= other.mins.y
            && self.mins.y <= other.maxs.y
            && self.maxs.z >= other.mins.z
            && self.mins.z <= other.maxs.z
    }

    /// Overlap test that ignores boxes merely touching within `eps`.
    #[inline]
    pub fn overlaps_strictly(&self, other: &Self, eps: Real) -> bool {
        (0..3).all(|i| self.maxs[i] > other.mins[i] + eps && self.mins[i] < other.maxs[i] - eps)
    }

    #[inline]
    pub fn contains(&self, p: &Point3<Real>, eps: Real) -> bool {
        (0..3).all(|i| p[i] >= self.mins[i] - eps && p[i] <= self.maxs[i] + eps)
    }

    #[inline]
    pub fn center(&self) -> Point3<Real> {
        nalgebra::center(&self.mins, &self.maxs)
    }

    #[inline]
    pub fn size(&self) -> Vector3<Real> {
        self.maxs - self.mins
    }

    #[inline]
    pub fn expanded(&self, amount: Real) -> Self {
        let pad = Vector3::repeat(amount);
        Self {
            mins: self.mins - pad,
            maxs: self.maxs + pad,
        }
    }

    /// The eight corners, bit `i` of the index selecting maxs on axis `i`.
    pub fn corners(&self) -> [Point3<Real>; 8] {
        std::array::from_fn(|i| {
            Point3::new(
                if i & 1 != 0 { self.maxs.x } else { self.mins.x },
                if i & 2 != 0 { self.maxs.y } else { self.mins.y },
                if i & 4 != 0 { self.maxs.z } else { self.mins.z },
            )
        })
    }
}
