//! Compile errors

use crate::contents::Contents;
use crate::float_types::Real;
use crate::map::EntityId;
use crate::plane::PlaneId;
use nalgebra::Point3;

/// Every fatal condition the compiler can report.
///
/// Geometric degeneracies (tiny windings, brushes with no volume, redundant
/// planes) never show up here; they are dropped where they occur and logged.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A face or brush carries contents the target game cannot represent
    #[error("bad contents {contents} on entity {entity}, brush {brush}")]
    ContentConflict {
        entity: EntityId,
        brush: usize,
        contents: Contents,
    },

    /// The faces bounding one leaf disagree on what is inside it
    #[error("mixed face contents in leaf near {near}: {first} vs {second}")]
    MixedLeafContents {
        near: Point3<Real>,
        first: Contents,
        second: Contents,
    },

    /// A table outgrew what the output format can address
    #[error("{what} count exceeds the output limit ({count} > {limit}) in entity {entity}")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
        entity: EntityId,
    },

    /// An occupant can reach the void and leak testing is a hard gate
    #[error("leak in hull {hull}: entity {occupant} at {origin} reaches the void")]
    Leak {
        hull: usize,
        occupant: EntityId,
        origin: Point3<Real>,
    },

    /// Something the algorithms guarantee did not hold; this is a compiler defect
    #[error("internal error: {message}{}", plane_suffix(.plane))]
    Invariant {
        message: String,
        plane: Option<PlaneId>,
    },

    /// Writing an output stream failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn plane_suffix(plane: &Option<PlaneId>) -> String {
    match plane {
        Some(plane) => format!(" (plane {})", plane.0),
        None => String::new(),
    }
}

impl CompileError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        CompileError::Invariant {
            message: message.into(),
            plane: None,
        }
    }

    pub(crate) fn invariant_on(message: impl Into<String>, plane: PlaneId) -> Self {
        CompileError::Invariant {
            message: message.into(),
            plane: Some(plane),
        }
    }
}
