//! Resolving brush overlaps into non-overlapping, two-sided face fragments.
//!
//! Every face of every brush is clipped against each other brush it
//! touches. Fragments buried inside a brush that wins the overlap vanish;
//! fragments buried inside a brush that loses it survive as the boundary
//! between the two volumes, with their front relabelled to the loser's
//! contents. Which brush wins is decided by [`Brush::overrides`] alone, so the
//! result does not depend on the order brushes are visited in.

use crate::brush::Brush;
use crate::contents::{Contents, FaceContents};
use crate::face::Face;
use crate::float_types::Real;
use crate::options::Options;
use crate::plane::{COPLANAR, Plane, PlaneRef, PlaneTable};
use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsgStats {
    pub brush_faces: usize,
    /// Fragments kept, mirrors included
    pub faces: usize,
    pub mirrored: usize,
    /// Fragments buried inside a winning brush or separating equal volumes
    pub discarded: usize,
}

struct Fragment {
    face: Face,
    /// Brush whose contents the front of the fragment currently carries
    front_owner: Option<usize>,
}

fn oriented(planes: &[Plane], plane: PlaneRef) -> Plane {
    let p = planes[plane.id.0];
    if plane.flipped { p.flipped() } else { p }
}

/// Splits `inside` by every bounding plane of `clip`. Fragments (or parts of
/// them) outside `clip` are appended to `outside`; the rest is returned.
fn clip_inside(
    inside: Vec<Fragment>,
    clip: &Brush,
    clip_wins: bool,
    planes: &[Plane],
    eps: Real,
    outside: &mut Vec<Fragment>,
) -> Vec<Fragment> {
    let mut inside = inside;
    for clip_face in &clip.faces {
        let split = oriented(planes, clip_face.plane);
        let mut still_inside = Vec::with_capacity(inside.len());
        for frag in inside {
            let on_plane = frag.face.plane.id == clip_face.plane.id
                || frag.face.winding.classify(&split, eps) == COPLANAR;
            if on_plane {
                let same_facing = if frag.face.plane.id == clip_face.plane.id {
                    frag.face.plane.flipped == clip_face.plane.flipped
                } else {
                    oriented(planes, frag.face.plane).normal.dot(&split.normal) > 0.0
                };
                // opposite facing faces are always buried; coincident ones
                // only when the clipping brush takes precedence
                if !same_facing || clip_wins {
                    still_inside.push(frag);
                } else {
                    outside.push(frag);
                }
                continue;
            }

            let (front, back) = frag.face.winding.clip(&split, eps, false);
            if let Some(w) = front {
                outside.push(Fragment {
                    face: frag.face.with_winding(w),
                    front_owner: frag.front_owner,
                });
            }
            if let Some(w) = back {
                still_inside.push(Fragment {
                    face: frag.face.with_winding(w),
                    front_owner: frag.front_owner,
                });
            }
        }
        inside = still_inside;
        if inside.is_empty() {
            break;
        }
    }
    inside
}

fn clip_brush(
    index: usize,
    brushes: &[Brush],
    planes: &[Plane],
    eps: Real,
) -> (Vec<Fragment>, usize) {
    let brush = &brushes[index];
    let mut outside: Vec<Fragment> = brush
        .faces
        .iter()
        .map(|bf| Fragment {
            face: Face {
                plane: bf.plane,
                winding: bf.winding.clone(),
                contents: FaceContents::new(Contents::EMPTY, brush.contents),
                texinfo: bf.texinfo,
                lmshift: bf.lmshift,
                entity: brush.entity,
                brush: brush.index,
                original: None,
            },
            front_owner: None,
        })
        .collect();
    let mut discarded = 0;

    for (ci, clip) in brushes.iter().enumerate() {
        if ci == index || clip.contents.is_empty() || !brush.bounds.intersects(&clip.bounds) {
            continue;
        }
        let clip_wins = clip.overrides(brush);
        let candidates = std::mem::take(&mut outside);
        let inside = clip_inside(candidates, clip, clip_wins, planes, eps, &mut outside);

        if clip_wins {
            discarded += inside.len();
            continue;
        }
        for mut frag in inside {
            let relabel = frag
                .front_owner
                .is_none_or(|owner| clip.overrides(&brushes[owner]));
            if relabel {
                frag.face.contents.front = clip.contents;
                frag.front_owner = Some(ci);
            }
            outside.push(frag);
        }
    }
    (outside, discarded)
}

/// Clips every brush of one model against the others.
///
/// Returned faces come in brush order, each immediately followed by its
/// mirror when it has one. A face is mirrored unless structural solid lies
/// behind it, so every non-solid volume is bounded by faces pointing into it.
pub fn csg_faces(
    brushes: &[Brush],
    planes: &PlaneTable,
    options: &Options,
) -> (Vec<Face>, CsgStats) {
    let plane_list = planes.snapshot();
    let eps = options.on_epsilon;

    #[cfg(feature = "parallel")]
    let clipped: Vec<(Vec<Fragment>, usize)> = (0..brushes.len())
        .into_par_iter()
        .map(|i| clip_brush(i, brushes, &plane_list, eps))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let clipped: Vec<(Vec<Fragment>, usize)> = (0..brushes.len())
        .map(|i| clip_brush(i, brushes, &plane_list, eps))
        .collect();

    let mut stats = CsgStats {
        brush_faces: brushes.iter().map(|b| b.faces.len()).sum(),
        ..CsgStats::default()
    };
    let mut faces = Vec::new();
    for (fragments, discarded) in clipped {
        stats.discarded += discarded;
        for frag in fragments {
            let face = frag.face;
            if face.contents.is_redundant() {
                stats.discarded += 1;
                continue;
            }
            let mirror = (!face.contents.back.is_structural_solid()).then(|| face.mirrored());
            faces.push(face);
            if let Some(m) = mirror {
                stats.mirrored += 1;
                faces.push(m);
            }
        }
    }
    stats.faces = faces.len();

    debug!(
        "csg: {} brushes, {} discarded fragments",
        brushes.len(),
        stats.discarded
    );
    info!(
        "csg: {} brush faces -> {} faces ({} mirrored)",
        stats.brush_faces, stats.faces, stats.mirrored
    );
    (faces, stats)
}
