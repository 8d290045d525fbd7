//! Traits defining BSP tree operations for dependency inversion

use crate::aabb::Aabb;
use crate::bsp::build::{BuildContext, BuildNode};
use crate::bsp::divide_bounds;
use crate::errors::CompileError;
use crate::float_types::Real;
use crate::plane::{Plane, SPANNING};
use crate::surface::Surface;

/// Tree construction; serial and parallel implementations differ only in
/// how the two children of a node get built.
pub trait BspOps: Sync {
    /// Builds the subtree for `surfaces` inside `bounds`.
    fn partition(
        &self,
        ctx: &BuildContext<'_>,
        surfaces: Vec<Surface>,
        bounds: Aabb,
    ) -> Result<BuildNode, CompileError>;
}

/// Picks the surface a node splits on.
pub trait SplitStrategy {
    /// Index into `surfaces` of the chosen splitter, `None` if no surface
    /// that is not already on a node is left.
    fn choose(&self, surfaces: &[Surface], bounds: &Aabb, planes: &[Plane], eps: Real)
    -> Option<usize>;
}

/// How evenly `plane` would halve `bounds`; smaller is better.
pub fn split_plane_metric(plane: &Plane, bounds: &Aabb) -> Real {
    let plane_type = plane.plane_type();
    if plane_type.is_axial() {
        let axis = plane_type.axis();
        let dist = plane.dist * plane.normal[axis];
        return (0..3)
            .map(|i| {
                let extent = bounds.maxs[i] - bounds.mins[i];
                if i == axis {
                    (bounds.maxs[i] - dist).powi(2) + (dist - bounds.mins[i]).powi(2)
                } else {
                    2.0 * extent * extent
                }
            })
            .sum();
    }

    let (front, back) = divide_bounds(bounds, plane);
    (0..3)
        .map(|i| (front.maxs[i] - front.mins[i]).powi(2) + (back.maxs[i] - back.mins[i]).powi(2))
        .sum()
}

/// Structural surfaces are tried first; detail surfaces only when no
/// structural candidate is left.
fn in_pass(surface: &Surface, pass: usize) -> bool {
    !surface.onnode && (surface.has_struct == (pass == 0))
}

/// Minimises the number of faces cut, preferring axial planes and then the
/// most even split on ties. Used for the draw hull, where every cut face is
/// an extra polygon to render.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodTreeStrategy;

impl SplitStrategy for GoodTreeStrategy {
    fn choose(
        &self,
        surfaces: &[Surface],
        bounds: &Aabb,
        planes: &[Plane],
        eps: Real,
    ) -> Option<usize> {
        let mut best = None;
        let mut min_splits = usize::MAX;
        let mut best_distribution = Real::MAX;

        for pass in 0..2 {
            for (i, surface) in surfaces.iter().enumerate() {
                if !in_pass(surface, pass) {
                    continue;
                }
                let plane = &planes[surface.plane.0];
                let plane_type = plane.plane_type();

                let mut splits = 0;
                'count: for (j, other) in surfaces.iter().enumerate() {
                    if j == i || other.onnode {
                        continue;
                    }
                    let other_type = planes[other.plane.0].plane_type();
                    // parallel axial planes never cut each other
                    if plane_type.is_axial() && plane_type == other_type {
                        continue;
                    }
                    for face in &other.faces {
                        if face.winding.classify(plane, eps) == SPANNING {
                            splits += 1;
                            if splits > min_splits {
                                break 'count;
                            }
                        }
                    }
                }
                if splits > min_splits {
                    continue;
                }

                if splits < min_splits || plane_type.is_axial() {
                    if plane_type.is_axial() {
                        let distribution = split_plane_metric(plane, bounds);
                        if splits == min_splits && distribution >= best_distribution {
                            continue;
                        }
                        best_distribution = distribution;
                    } else {
                        best_distribution = Real::MAX;
                    }
                    min_splits = splits;
                    best = Some(i);
                }
            }
            if best.is_some() {
                break;
            }
        }
        best
    }
}

/// Splits on the axial plane closest to the middle of the node, falling
/// back to [`GoodTreeStrategy`] when no axial candidate exists. Cheap, and
/// keeps large or elongated nodes from producing deep trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidSplitStrategy;

impl SplitStrategy for MidSplitStrategy {
    fn choose(
        &self,
        surfaces: &[Surface],
        bounds: &Aabb,
        planes: &[Plane],
        eps: Real,
    ) -> Option<usize> {
        for pass in 0..2 {
            let mut best = None;
            let mut best_value = Real::MAX;
            for (i, surface) in surfaces.iter().enumerate() {
                if !in_pass(surface, pass) {
                    continue;
                }
                let plane = &planes[surface.plane.0];
                if !plane.plane_type().is_axial() {
                    continue;
                }
                let value = split_plane_metric(plane, bounds);
                if value < best_value {
                    best_value = value;
                    best = Some(i);
                }
            }
            if best.is_some() {
                return best;
            }
        }
        GoodTreeStrategy.choose(surfaces, bounds, planes, eps)
    }
}
