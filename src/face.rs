//! Face fragments flowing from CSG through tree building to output.

use crate::contents::FaceContents;
use crate::float_types::Real;
use crate::map::EntityId;
use crate::plane::{Plane, PlaneRef};
use crate::texinfo::TexInfoId;
use crate::winding::Winding;

/// Identity of a face copied onto a tree node, shared by every leaf
/// fragment cut from the same surface face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Plane the face lies on, oriented the way the face points
    pub plane: PlaneRef,
    pub winding: Winding,
    pub contents: FaceContents,
    pub texinfo: Option<TexInfoId>,
    pub lmshift: u8,
    pub entity: EntityId,
    /// Brush the face was cut from
    pub brush: usize,
    /// Node face this fragment belongs to, set once its surface has been
    /// used as a splitter
    pub original: Option<FaceKey>,
}

impl Face {
    /// Same face seen from behind: reversed winding, swapped contents.
    pub fn mirrored(&self) -> Face {
        Face {
            plane: self.plane.reversed(),
            winding: self.winding.reversed(),
            contents: self.contents.swapped(),
            ..self.clone()
        }
    }

    /// Touches detail on either side.
    pub fn is_detail(&self) -> bool {
        self.contents.front.is_detail() || self.contents.back.is_detail()
    }

    pub fn with_winding(&self, winding: Winding) -> Face {
        Face {
            winding,
            ..self.clone()
        }
    }

    /// Cuts the face by `plane`, both halves keeping every property.
    ///
    /// A face lying on `plane` goes to the side it faces.
    pub fn split(&self, plane: &Plane, eps: Real) -> (Option<Face>, Option<Face>) {
        let (front, back) = self.winding.clip(plane, eps, true);
        (
            front.map(|w| self.with_winding(w)),
            back.map(|w| self.with_winding(w)),
        )
    }
}
