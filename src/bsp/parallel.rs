//! Parallel implementation of BSP operations

use crate::aabb::Aabb;
use crate::bsp::build::{BuildContext, BuildNode, Step, face_count, partition_step};
use crate::bsp::traits::BspOps;
use crate::errors::CompileError;
use crate::surface::Surface;

/// Builds the two children of a node with `rayon::join` while the node
/// still holds at least `Options::parallel_threshold` faces, and on the
/// current thread below that.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBspOps;

#[cfg(feature = "parallel")]
impl ParallelBspOps {
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(feature = "parallel")]
impl BspOps for ParallelBspOps {
    fn partition(
        &self,
        ctx: &BuildContext<'_>,
        surfaces: Vec<Surface>,
        bounds: Aabb,
    ) -> Result<BuildNode, CompileError> {
        let parallel = face_count(&surfaces) >= ctx.options.parallel_threshold;
        match partition_step(ctx, surfaces, bounds)? {
            Step::Leaf(leaf) => Ok(leaf),
            Step::Split(mut split) => {
                let (front, front_bounds) = std::mem::take(&mut split.front);
                let (back, back_bounds) = std::mem::take(&mut split.back);
                let (front, back) = if parallel {
                    rayon::join(
                        || self.partition(ctx, front, front_bounds),
                        || self.partition(ctx, back, back_bounds),
                    )
                } else {
                    (
                        self.partition(ctx, front, front_bounds),
                        self.partition(ctx, back, back_bounds),
                    )
                };
                Ok(split.into_node(front?, back?))
            }
        }
    }
}
