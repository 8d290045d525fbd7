//! Volume contents and the precedence rules between them.

use std::fmt;

/// What a brush fills its volume with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    Empty,
    Water,
    Slime,
    Lava,
    Sky,
    Solid,
    /// Solid for collision hulls only, absent from the point hull
    Clip,
}

/// Detail variants of a solid brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetailKind {
    /// Solid, but never chosen as a structural splitter
    Detail,
    /// Visible faces only; the volume is passable
    Illusionary,
    /// See-through solid; does not seal the map
    Fence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contents {
    pub kind: ContentKind,
    pub detail: Option<DetailKind>,
}

// BSP29 leaf content codes
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

impl Contents {
    pub const EMPTY: Contents = Contents::new(ContentKind::Empty);
    pub const SOLID: Contents = Contents::new(ContentKind::Solid);
    pub const WATER: Contents = Contents::new(ContentKind::Water);
    pub const SLIME: Contents = Contents::new(ContentKind::Slime);
    pub const LAVA: Contents = Contents::new(ContentKind::Lava);
    pub const SKY: Contents = Contents::new(ContentKind::Sky);
    pub const CLIP: Contents = Contents::new(ContentKind::Clip);
    pub const DETAIL: Contents = Contents::detail(DetailKind::Detail);
    pub const ILLUSIONARY: Contents = Contents::detail(DetailKind::Illusionary);
    pub const FENCE: Contents = Contents::detail(DetailKind::Fence);

    pub const fn new(kind: ContentKind) -> Self {
        Self { kind, detail: None }
    }

    pub const fn detail(detail: DetailKind) -> Self {
        Self {
            kind: ContentKind::Solid,
            detail: Some(detail),
        }
    }

    /// Detail variants only make sense on solid brushes.
    pub fn is_valid(&self) -> bool {
        self.detail.is_none() || self.kind == ContentKind::Solid
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ContentKind::Empty
    }

    /// Structural solid, the only contents that make up the shared solid leaf.
    pub fn is_structural_solid(&self) -> bool {
        matches!(self.kind, ContentKind::Solid | ContentKind::Clip) && self.detail.is_none()
    }

    /// Blocks the outside flood and hides the faces behind it.
    pub fn is_opaque(&self) -> bool {
        match self.kind {
            ContentKind::Sky => true,
            ContentKind::Solid | ContentKind::Clip => {
                matches!(self.detail, None | Some(DetailKind::Detail))
            }
            _ => false,
        }
    }

    pub fn is_detail(&self) -> bool {
        self.detail.is_some()
    }

    pub fn is_liquid(&self) -> bool {
        matches!(
            self.kind,
            ContentKind::Water | ContentKind::Slime | ContentKind::Lava
        )
    }

    /// Higher priority contents win where brushes overlap.
    pub fn priority(&self) -> u8 {
        match (self.kind, self.detail) {
            (ContentKind::Solid | ContentKind::Clip, None) => 7,
            (ContentKind::Sky, _) => 6,
            (_, Some(DetailKind::Detail)) => 5,
            (ContentKind::Water | ContentKind::Slime | ContentKind::Lava, _) => 4,
            (_, Some(DetailKind::Fence)) => 3,
            (_, Some(DetailKind::Illusionary)) => 2,
            (ContentKind::Empty, _) => 0,
        }
    }

    /// Turns detail into plain solid, used when detail is disabled.
    pub fn structural(self) -> Self {
        match self.detail {
            Some(DetailKind::Detail) | Some(DetailKind::Fence) => Contents::SOLID,
            _ => self,
        }
    }

    /// Contents a brush contributes to `hull`; `None` when the hull ignores it.
    ///
    /// Collision hulls only care whether a volume blocks movement, so every
    /// blocking brush becomes plain solid there and the rest vanish.
    pub fn for_hull(self, hull: usize) -> Option<Self> {
        if hull == 0 {
            return match self.kind {
                ContentKind::Clip => None,
                _ => Some(self),
            };
        }
        match (self.kind, self.detail) {
            (ContentKind::Solid, Some(DetailKind::Illusionary)) => None,
            (ContentKind::Solid | ContentKind::Clip | ContentKind::Sky, _) => {
                Some(Contents::SOLID)
            }
            _ => None,
        }
    }

    /// Leaf content code in the BSP29 format.
    pub fn output_code(&self) -> i32 {
        match (self.kind, self.detail) {
            (_, Some(DetailKind::Illusionary)) => CONTENTS_EMPTY,
            (ContentKind::Empty, _) => CONTENTS_EMPTY,
            (ContentKind::Solid | ContentKind::Clip, _) => CONTENTS_SOLID,
            (ContentKind::Water, _) => CONTENTS_WATER,
            (ContentKind::Slime, _) => CONTENTS_SLIME,
            (ContentKind::Lava, _) => CONTENTS_LAVA,
            (ContentKind::Sky, _) => CONTENTS_SKY,
        }
    }
}

impl Default for Contents {
    fn default() -> Self {
        Contents::EMPTY
    }
}

impl fmt::Display for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(detail) => write!(f, "{:?}({:?})", detail, self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

/// Contents on both sides of a face, in the face's own orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceContents {
    /// The volume the face normal points into
    pub front: Contents,
    /// The volume behind the face
    pub back: Contents,
}

impl FaceContents {
    pub const fn new(front: Contents, back: Contents) -> Self {
        Self { front, back }
    }

    pub const fn swapped(self) -> Self {
        Self {
            front: self.back,
            back: self.front,
        }
    }

    /// A face between identical volumes separates nothing.
    pub fn is_redundant(&self) -> bool {
        self.front == self.back
    }
}
