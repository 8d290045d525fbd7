//! Resolved compiler configuration.
//!
//! Every stage receives an `&Options`; nothing in the crate reads process
//! arguments or environment variables. Command line front ends build one of
//! these (or deserialize it with the `serde` feature) and hand it over.

use crate::float_types::Real;
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned box that a clipping hull expands every brush by.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HullSize {
    pub mins: [Real; 3],
    pub maxs: [Real; 3],
}

impl HullSize {
    pub const fn new(mins: [Real; 3], maxs: [Real; 3]) -> Self {
        Self { mins, maxs }
    }

    pub fn mins(&self) -> Point3<Real> {
        Point3::from(self.mins)
    }

    pub fn maxs(&self) -> Point3<Real> {
        Point3::from(self.maxs)
    }
}

/// Table size ceilings of the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Limits {
    pub nodes: usize,
    pub leafs: usize,
    pub clipnodes: usize,
    pub faces: usize,
    pub marksurfaces: usize,
    pub edges: usize,
    pub vertices: usize,
    pub planes: usize,
    pub texinfo: usize,
}

impl Limits {
    /// Ceilings of the 16-bit BSP29 format.
    pub const BSP29: Limits = Limits {
        nodes: 32767,
        leafs: 32767,
        clipnodes: 0xfff0,
        faces: 65535,
        marksurfaces: 65535,
        edges: 65535,
        vertices: 65535,
        planes: 32767,
        texinfo: 32767,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Limits::BSP29
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Distance band around a plane inside which a point counts as on it
    pub on_epsilon: Real,
    /// Nodes whose bounds exceed this on any axis are split at their midpoint
    pub max_node_size: Real,
    /// When positive, nodes holding more than this fraction of the model's
    /// surfaces use the midpoint heuristic instead of `max_node_size`
    pub midsplit_surf_fraction: Real,
    /// Largest face extent in texels; 0 disables subdivision
    pub subdivide_size: Real,
    /// Half extent of the world box the base windings are built in
    pub world_extent: Real,
    /// Spacing of the points written along a leak trail; 0 writes portal centres only
    pub leak_dist: Real,
    pub no_fill: bool,
    pub no_clip: bool,
    pub no_skip: bool,
    pub no_detail: bool,
    pub omit_detail: bool,
    pub omit_detail_illusionary: bool,
    pub omit_detail_fence: bool,
    /// A leak aborts the compile
    pub leak_test: bool,
    /// Use the split-minimising heuristic everywhere, ignoring node size
    pub force_good_tree: bool,
    /// Run every job on a single worker thread
    pub no_threads: bool,
    /// Face count below which the BSP recursion stays on the current thread
    pub parallel_threshold: usize,
    /// Clipping hulls 1.., hull 0 is always the point hull
    pub clip_hulls: Vec<HullSize>,
    pub limits: Limits,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            on_epsilon: 0.0001,
            max_node_size: 1024.0,
            midsplit_surf_fraction: 0.0,
            subdivide_size: 240.0,
            world_extent: 65536.0,
            leak_dist: 2.0,
            no_fill: false,
            no_clip: false,
            no_skip: false,
            no_detail: false,
            omit_detail: false,
            omit_detail_illusionary: false,
            omit_detail_fence: false,
            leak_test: false,
            force_good_tree: false,
            no_threads: false,
            parallel_threshold: 512,
            clip_hulls: vec![
                HullSize::new([-16.0, -16.0, -24.0], [16.0, 16.0, 32.0]),
                HullSize::new([-32.0, -32.0, -24.0], [32.0, 32.0, 64.0]),
            ],
            limits: Limits::BSP29,
        }
    }
}

impl Options {
    /// Number of hulls compiled per model, counting the point hull.
    pub fn num_hulls(&self) -> usize {
        if self.no_clip {
            1
        } else {
            1 + self.clip_hulls.len()
        }
    }

    /// Expansion box for `hull`, `None` for the point hull.
    pub fn hull_size(&self, hull: usize) -> Option<HullSize> {
        match hull {
            0 => None,
            n => self.clip_hulls.get(n - 1).copied(),
        }
    }

    pub const fn with_on_epsilon(mut self, on_epsilon: Real) -> Self {
        self.on_epsilon = on_epsilon;
        self
    }

    pub const fn with_max_node_size(mut self, max_node_size: Real) -> Self {
        self.max_node_size = max_node_size;
        self
    }

    pub const fn with_midsplit_surf_fraction(mut self, fraction: Real) -> Self {
        self.midsplit_surf_fraction = fraction;
        self
    }

    pub const fn with_subdivide_size(mut self, subdivide_size: Real) -> Self {
        self.subdivide_size = subdivide_size;
        self
    }

    pub const fn with_leak_dist(mut self, leak_dist: Real) -> Self {
        self.leak_dist = leak_dist;
        self
    }

    pub const fn with_no_fill(mut self, no_fill: bool) -> Self {
        self.no_fill = no_fill;
        self
    }

    pub const fn with_no_clip(mut self, no_clip: bool) -> Self {
        self.no_clip = no_clip;
        self
    }

    pub const fn with_no_skip(mut self, no_skip: bool) -> Self {
        self.no_skip = no_skip;
        self
    }

    pub const fn with_no_detail(mut self, no_detail: bool) -> Self {
        self.no_detail = no_detail;
        self
    }

    pub const fn with_omit_detail(mut self, omit_detail: bool) -> Self {
        self.omit_detail = omit_detail;
        self
    }

    pub const fn with_leak_test(mut self, leak_test: bool) -> Self {
        self.leak_test = leak_test;
        self
    }

    pub const fn with_force_good_tree(mut self, force_good_tree: bool) -> Self {
        self.force_good_tree = force_good_tree;
        self
    }

    pub const fn with_no_threads(mut self, no_threads: bool) -> Self {
        self.no_threads = no_threads;
        self
    }

    pub const fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_clip_hulls(mut self, clip_hulls: Vec<HullSize>) -> Self {
        self.clip_hulls = clip_hulls;
        self
    }

    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
