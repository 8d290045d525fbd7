//! Input model handed over by the map parser.

use crate::contents::Contents;
use crate::float_types::Real;
use crate::plane::Plane;
use crate::texinfo::TexInfo;
use nalgebra::{Point3, Vector3};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub usize);

impl EntityId {
    pub const WORLD: EntityId = EntityId(0);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One bounding half-space of a brush. The normal points out of the brush.
#[derive(Debug, Clone, PartialEq)]
pub struct MapBrushSide {
    pub plane: Plane,
    pub texinfo: TexInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapBrush {
    pub sides: Vec<MapBrushSide>,
    pub contents: Contents,
}

impl MapBrush {
    pub fn new(sides: Vec<MapBrushSide>, contents: Contents) -> Self {
        Self { sides, contents }
    }

    /// Axis-aligned box brush with world-aligned texturing on every side.
    pub fn from_box(
        mins: Point3<Real>,
        maxs: Point3<Real>,
        contents: Contents,
        miptex: &str,
    ) -> Self {
        let sides = (0..3)
            .flat_map(|axis| {
                let mut normal = Vector3::zeros();
                normal[axis] = 1.0;
                [
                    MapBrushSide {
                        plane: Plane::new(normal, maxs[axis]),
                        texinfo: TexInfo::world_aligned(miptex, &normal),
                    },
                    MapBrushSide {
                        plane: Plane::new(-normal, -mins[axis]),
                        texinfo: TexInfo::world_aligned(miptex, &normal),
                    },
                ]
            })
            .collect();
        Self::new(sides, contents)
    }

    /// Same brush with `flags` set on every side's texinfo.
    pub fn with_tex_flags(mut self, flags: u32) -> Self {
        for side in &mut self.sides {
            side.texinfo.flags |= flags;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapEntity {
    pub classname: String,
    pub origin: Option<Point3<Real>>,
    pub brushes: Vec<MapBrush>,
}

impl MapEntity {
    pub fn world(brushes: Vec<MapBrush>) -> Self {
        Self {
            classname: "worldspawn".to_string(),
            origin: None,
            brushes,
        }
    }

    /// Brush-less entity placed at `origin`.
    pub fn point(classname: impl Into<String>, origin: Point3<Real>) -> Self {
        Self {
            classname: classname.into(),
            origin: Some(origin),
            brushes: Vec::new(),
        }
    }

    pub fn brush_model(classname: impl Into<String>, brushes: Vec<MapBrush>) -> Self {
        Self {
            classname: classname.into(),
            origin: None,
            brushes,
        }
    }

    /// Entities with brushes compile into their own model; the world always does.
    pub fn is_model(&self, id: EntityId) -> bool {
        id == EntityId::WORLD || !self.brushes.is_empty()
    }

    /// Point entities mark space that must be enclosed by the world.
    pub fn occupant_origin(&self, id: EntityId) -> Option<Point3<Real>> {
        if id == EntityId::WORLD || !self.brushes.is_empty() {
            return None;
        }
        self.origin
    }
}
