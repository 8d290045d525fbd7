//! Texture projections and their deduplicating table.

use crate::float_types::Real;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use parking_lot::RwLock;

/// No lightmap; subdivision is skipped (sky, liquids).
pub const TEX_SPECIAL: u32 = 1 << 0;
/// Face is used for classification but never emitted.
pub const TEX_SKIP: u32 = 1 << 1;

/// Texture projection of one brush side.
#[derive(Debug, Clone, PartialEq)]
pub struct TexInfo {
    /// `s = vecs[0].xyz · p + vecs[0].w`, same for `t` with `vecs[1]`
    pub vecs: [[Real; 4]; 2],
    pub miptex: String,
    pub flags: u32,
    /// log2 of the lightmap sample spacing
    pub lmshift: u8,
}

impl Default for TexInfo {
    fn default() -> Self {
        Self {
            vecs: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
            miptex: String::new(),
            flags: 0,
            lmshift: 4,
        }
    }
}

impl TexInfo {
    pub fn new(miptex: impl Into<String>) -> Self {
        Self {
            miptex: miptex.into(),
            ..Self::default()
        }
    }

    /// Projection aligned to the world axis closest to `normal`, the way
    /// editors texture a brush side by default.
    pub fn world_aligned(miptex: impl Into<String>, normal: &Vector3<Real>) -> Self {
        let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
        let (s, t) = if az >= ax && az >= ay {
            ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0])
        } else if ax >= ay {
            ([0.0, 1.0, 0.0], [0.0, 0.0, -1.0])
        } else {
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0])
        };
        Self {
            vecs: [[s[0], s[1], s[2], 0.0], [t[0], t[1], t[2], 0.0]],
            ..Self::new(miptex)
        }
    }

    pub const fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub const fn with_lmshift(mut self, lmshift: u8) -> Self {
        self.lmshift = lmshift;
        self
    }

    pub const fn is_special(&self) -> bool {
        self.flags & TEX_SPECIAL != 0
    }

    pub const fn is_skip(&self) -> bool {
        self.flags & TEX_SKIP != 0
    }

    /// Texture axis `i` (0 = s, 1 = t) without its offset.
    pub fn axis(&self, i: usize) -> Vector3<Real> {
        Vector3::new(self.vecs[i][0], self.vecs[i][1], self.vecs[i][2])
    }

    /// Texel coordinate of `p` along axis `i`.
    pub fn coord(&self, i: usize, p: &Point3<Real>) -> Real {
        self.axis(i).dot(&p.coords) + self.vecs[i][3]
    }

    fn key(&self) -> TexKey {
        let mut vecs = [0u64; 8];
        for (i, v) in self.vecs.iter().flatten().enumerate() {
            vecs[i] = (*v as f64).to_bits();
        }
        TexKey {
            vecs,
            miptex: self.miptex.clone(),
            flags: self.flags,
            lmshift: self.lmshift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TexInfoId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TexKey {
    vecs: [u64; 8],
    miptex: String,
    flags: u32,
    lmshift: u8,
}

#[derive(Debug, Default)]
struct TexStore {
    infos: Vec<TexInfo>,
    lookup: HashMap<TexKey, TexInfoId>,
}

/// Shared, append-only texinfo table.
#[derive(Debug, Default)]
pub struct TexInfoTable {
    store: RwLock<TexStore>,
}

impl TexInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_or_insert(&self, info: &TexInfo) -> TexInfoId {
        let key = info.key();
        if let Some(id) = self.store.read().lookup.get(&key) {
            return *id;
        }
        let mut store = self.store.write();
        if let Some(id) = store.lookup.get(&key) {
            return *id;
        }
        let id = TexInfoId(store.infos.len());
        store.infos.push(info.clone());
        store.lookup.insert(key, id);
        id
    }

    pub fn get(&self, id: TexInfoId) -> TexInfo {
        self.store.read().infos[id.0].clone()
    }

    pub fn len(&self) -> usize {
        self.store.read().infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<TexInfo> {
        self.store.read().infos.clone()
    }
}
