//! Serial implementation of BSP operations

use crate::aabb::Aabb;
use crate::bsp::build::{BuildContext, BuildNode, Step, partition_step};
use crate::bsp::traits::BspOps;
use crate::errors::CompileError;
use crate::surface::Surface;

/// Serial implementation of BSP operations
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBspOps;

impl SerialBspOps {
    pub const fn new() -> Self {
        Self
    }
}

impl BspOps for SerialBspOps {
    fn partition(
        &self,
        ctx: &BuildContext<'_>,
        surfaces: Vec<Surface>,
        bounds: Aabb,
    ) -> Result<BuildNode, CompileError> {
        match partition_step(ctx, surfaces, bounds)? {
            Step::Leaf(leaf) => Ok(leaf),
            Step::Split(mut split) => {
                let (front, front_bounds) = std::mem::take(&mut split.front);
                let (back, back_bounds) = std::mem::take(&mut split.back);
                let front = self.partition(ctx, front, front_bounds)?;
                let back = self.partition(ctx, back, back_bounds)?;
                Ok(split.into_node(front, back))
            }
        }
    }
}
