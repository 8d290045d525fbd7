//! Loading map brushes into convex solids with face windings.

use crate::aabb::Aabb;
use crate::contents::{Contents, DetailKind};
use crate::errors::CompileError;
use crate::float_types::{DIST_EPSILON, NORMAL_EPSILON, Real};
use crate::hull::expand_brush;
use crate::map::{EntityId, MapBrush};
use crate::options::Options;
use crate::plane::{Plane, PlaneRef, PlaneTable};
use crate::texinfo::{TexInfo, TexInfoId, TexInfoTable};
use crate::winding::Winding;
use log::warn;

/// One bounding face of a loaded brush; the plane faces out of the brush.
#[derive(Debug, Clone)]
pub struct BrushFace {
    pub plane: PlaneRef,
    pub winding: Winding,
    /// `None` on collision hulls, which never emit faces
    pub texinfo: Option<TexInfoId>,
    pub lmshift: u8,
}

#[derive(Debug, Clone)]
pub struct Brush {
    pub entity: EntityId,
    /// Position in the model's brush list, the final tie-break between
    /// overlapping brushes of equal priority
    pub index: usize,
    pub contents: Contents,
    pub faces: Vec<BrushFace>,
    pub bounds: Aabb,
}

impl Brush {
    /// `self` wins wherever it overlaps `other`.
    pub fn overrides(&self, other: &Brush) -> bool {
        let (a, b) = (self.contents.priority(), other.contents.priority());
        a > b || (a == b && self.index > other.index)
    }

    /// Volume of the solid, for diagnostics and tests.
    pub fn volume(&self) -> Real {
        polyhedron_volume(self.faces.iter().map(|f| &f.winding))
    }
}

/// Windings of the convex solid bounded by `planes`, one per plane.
///
/// Each plane's winding starts as a world-sized square and is chopped by
/// every other plane. A plane whose winding is chopped away entirely does
/// not contribute to the solid and yields `None`.
pub fn brush_from_planes(planes: &[Plane], eps: Real, extent: Real) -> Vec<Option<Winding>> {
    planes
        .iter()
        .enumerate()
        .map(|(i, plane)| {
            let mut winding = Some(Winding::base_for_plane(plane, extent));
            for (j, other) in planes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(w) = winding.take() else { break };
                winding = w.chop(&other.flipped(), eps);
            }
            winding
        })
        .collect()
}

/// Volume enclosed by outward facing convex windings.
pub fn polyhedron_volume<'a>(windings: impl IntoIterator<Item = &'a Winding>) -> Real {
    let windings: Vec<&Winding> = windings.into_iter().collect();
    let Some(first) = windings.iter().find(|w| !w.is_empty()) else {
        return 0.0;
    };
    let apex = first.points[0];
    windings
        .iter()
        .filter_map(|w| w.plane().map(|p| (p, w.area())))
        .map(|(plane, area)| plane.distance_to(&apex).abs() * area / 3.0)
        .sum()
}

/// Converts the map brushes of one model into solids for `hull`.
///
/// Degenerate brushes and redundant sides are logged and dropped; contents
/// the output format cannot represent are fatal.
pub fn load_brushes(
    entity: EntityId,
    brushes: &[MapBrush],
    hull: usize,
    options: &Options,
    planes: &PlaneTable,
    texinfo: &TexInfoTable,
) -> Result<Vec<Brush>, CompileError> {
    let mut out = Vec::with_capacity(brushes.len());
    for (index, map_brush) in brushes.iter().enumerate() {
        if !map_brush.contents.is_valid() {
            return Err(CompileError::ContentConflict {
                entity,
                brush: index,
                contents: map_brush.contents,
            });
        }

        let contents = match map_brush.contents.detail {
            Some(DetailKind::Detail) if options.omit_detail => continue,
            Some(DetailKind::Illusionary) if options.omit_detail_illusionary => continue,
            Some(DetailKind::Fence) if options.omit_detail_fence => continue,
            Some(_) if options.no_detail => map_brush.contents.structural(),
            _ => map_brush.contents,
        };
        let Some(contents) = contents.for_hull(hull) else {
            continue;
        };

        if let Some(brush) =
            load_brush(entity, index, map_brush, contents, hull, options, planes, texinfo)
        {
            out.push(brush);
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn load_brush(
    entity: EntityId,
    index: usize,
    map_brush: &MapBrush,
    contents: Contents,
    hull: usize,
    options: &Options,
    planes: &PlaneTable,
    texinfo: &TexInfoTable,
) -> Option<Brush> {
    let mut sides: Vec<(Plane, &TexInfo)> = Vec::with_capacity(map_brush.sides.len());
    for side in &map_brush.sides {
        if sides
            .iter()
            .any(|(p, _)| p.equals(&side.plane, NORMAL_EPSILON, DIST_EPSILON))
        {
            warn!("entity {entity}, brush {index}: duplicate plane, side skipped");
            continue;
        }
        sides.push((side.plane, &side.texinfo));
    }

    let side_planes: Vec<Plane> = sides.iter().map(|(p, _)| *p).collect();
    let windings = brush_from_planes(&side_planes, options.on_epsilon, options.world_extent);

    let (face_planes, face_tex): (Vec<Plane>, Vec<_>) = match options.hull_size(hull) {
        None => sides
            .iter()
            .zip(&windings)
            .filter(|(_, w)| w.is_some())
            .map(|((p, t), _)| (*p, Some(*t)))
            .unzip(),
        Some(size) => {
            let survivors: Vec<Winding> = windings.iter().flatten().cloned().collect();
            let bounds = survivors
                .iter()
                .fold(Aabb::empty(), |acc, w| acc.union(&w.bounds()));
            let used: Vec<Plane> = side_planes
                .iter()
                .zip(&windings)
                .filter(|(_, w)| w.is_some())
                .map(|(p, _)| *p)
                .collect();
            if survivors.len() < 4 {
                warn!("entity {entity}, brush {index}: no volume, skipped");
                return None;
            }
            let expanded = expand_brush(&used, &survivors, &bounds, &size);
            let tex = vec![None; expanded.len()];
            (expanded, tex)
        }
    };

    // build the final windings from the shared planes so faces lie exactly
    // on the planes the tree will split with
    let refs: Vec<PlaneRef> = face_planes.iter().map(|p| planes.find_or_insert(p)).collect();
    let oriented: Vec<Plane> = refs.iter().map(|r| planes.oriented(*r)).collect();
    let windings = brush_from_planes(&oriented, options.on_epsilon, options.world_extent);

    let mut faces = Vec::with_capacity(refs.len());
    let mut bounds = Aabb::empty();
    for ((plane, winding), tex) in refs.iter().zip(windings).zip(face_tex) {
        let Some(winding) = winding else {
            continue;
        };
        bounds = bounds.union(&winding.bounds());
        let (texinfo, lmshift) = match tex {
            Some(info) => (Some(texinfo.find_or_insert(info)), info.lmshift),
            None => (None, 4),
        };
        faces.push(BrushFace {
            plane: *plane,
            winding,
            texinfo,
            lmshift,
        });
    }

    if faces.len() < 4 {
        warn!("entity {entity}, brush {index}: no volume, skipped");
        return None;
    }
    if (0..3).any(|k| bounds.mins[k] <= -options.world_extent || bounds.maxs[k] >= options.world_extent) {
        warn!("entity {entity}, brush {index}: outside the world extent, skipped");
        return None;
    }

    Some(Brush {
        entity,
        index,
        contents,
        faces,
        bounds,
    })
}
