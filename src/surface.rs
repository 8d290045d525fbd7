//! Grouping faces by plane into splitting candidates.

use crate::aabb::Aabb;
use crate::face::Face;
use crate::plane::PlaneId;
use hashbrown::HashMap;
use log::debug;

/// All faces on one plane, both orientations.
#[derive(Debug, Clone)]
pub struct Surface {
    pub plane: PlaneId,
    pub faces: Vec<Face>,
    pub bounds: Aabb,
    /// Some face touches no detail volume on either side
    pub has_struct: bool,
    pub lmshift: u8,
    /// Already used as a splitter above the current node
    pub onnode: bool,
}

impl Surface {
    pub fn new(plane: PlaneId, faces: Vec<Face>) -> Self {
        let mut surface = Surface {
            plane,
            faces,
            bounds: Aabb::empty(),
            has_struct: false,
            lmshift: u8::MAX,
            onnode: false,
        };
        surface.calculate_info();
        surface
    }

    /// Recomputes bounds, structural flag and minimum lightmap shift.
    pub fn calculate_info(&mut self) {
        self.bounds = Aabb::empty();
        self.has_struct = false;
        self.lmshift = u8::MAX;
        for face in &self.faces {
            self.bounds = self.bounds.union(&face.winding.bounds());
            self.has_struct |= !face.is_detail();
            self.lmshift = self.lmshift.min(face.lmshift);
        }
    }
}

/// Groups `faces` into one surface per plane.
///
/// Surfaces are ordered by the first face that lands on their plane, so the
/// order only depends on the face order. No face is ever dropped.
pub fn build_surfaces(faces: Vec<Face>) -> Vec<Surface> {
    let mut index: HashMap<PlaneId, usize> = HashMap::new();
    let mut groups: Vec<(PlaneId, Vec<Face>)> = Vec::new();
    for face in faces {
        let slot = *index.entry(face.plane.id).or_insert_with(|| {
            groups.push((face.plane.id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(face);
    }
    let surfaces: Vec<Surface> = groups
        .into_iter()
        .map(|(plane, faces)| Surface::new(plane, faces))
        .collect();
    debug!("{} surfaces", surfaces.len());
    surfaces
}
