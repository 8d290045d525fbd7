//! BSP version 29 serialisation.
//!
//! ```text
//! offset  field
//! ------  ---------------------------------------------
//!  0-3    version (i32, 29)
//!  4-123  15 lump directory entries (i32 offset, i32 length)
//! 124-    lump bodies, each padded to 4 bytes
//! ```
//!
//! Lumps, in directory order: entities, planes, textures, vertexes,
//! visibility, nodes, texinfo, faces, lighting, clipnodes, leafs,
//! marksurfaces, edges, surfedges, models. All values little-endian.

use crate::writer::BspData;
use byteorder::{LE, WriteBytesExt};
use std::io::{self, Write};

pub const BSP_VERSION: i32 = 29;
pub const NUM_LUMPS: usize = 15;
const HEADER_SIZE: usize = 4 + NUM_LUMPS * 8;

/// Writes a [`BspData`] as a BSP29 file.
pub struct Bsp29Writer<'a> {
    data: &'a BspData,
}

fn write_name16(out: &mut Vec<u8>, name: &str) {
    let mut bytes = [0u8; 16];
    for (dst, src) in bytes.iter_mut().zip(name.bytes().take(15)) {
        *dst = src;
    }
    out.extend_from_slice(&bytes);
}

impl<'a> Bsp29Writer<'a> {
    pub fn new(data: &'a BspData) -> Self {
        Self { data }
    }

    fn entities(&self) -> Vec<u8> {
        let mut out = self.data.entities.as_bytes().to_vec();
        out.push(0);
        out
    }

    fn planes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.planes.len() * 20);
        for plane in &self.data.planes {
            for v in plane.normal {
                out.write_f32::<LE>(v)?;
            }
            out.write_f32::<LE>(plane.dist)?;
            out.write_i32::<LE>(plane.kind)?;
        }
        Ok(out)
    }

    /// Miptex lump with header-only entries; pixel data lives in external wads.
    fn textures(&self) -> io::Result<Vec<u8>> {
        let textures = &self.data.textures;
        let mut out = Vec::new();
        if textures.is_empty() {
            return Ok(out);
        }
        out.write_i32::<LE>(textures.len() as i32)?;
        let table = 4 + 4 * textures.len();
        for i in 0..textures.len() {
            out.write_i32::<LE>((table + i * 40) as i32)?;
        }
        for tex in textures {
            write_name16(&mut out, &tex.name);
            out.write_u32::<LE>(tex.width)?;
            out.write_u32::<LE>(tex.height)?;
            for _ in 0..4 {
                out.write_u32::<LE>(0)?;
            }
        }
        Ok(out)
    }

    fn vertexes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.vertices.len() * 12);
        for v in &self.data.vertices {
            for c in v {
                out.write_f32::<LE>(*c)?;
            }
        }
        Ok(out)
    }

    fn nodes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.nodes.len() * 24);
        for node in &self.data.nodes {
            out.write_i32::<LE>(node.plane as i32)?;
            for child in node.children {
                out.write_i16::<LE>(child as i16)?;
            }
            for v in node.mins.iter().chain(&node.maxs) {
                out.write_i16::<LE>(*v)?;
            }
            out.write_u16::<LE>(node.first_face as u16)?;
            out.write_u16::<LE>(node.num_faces as u16)?;
        }
        Ok(out)
    }

    fn texinfo(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.texinfo.len() * 40);
        for info in &self.data.texinfo {
            for v in info.vecs.iter().flatten() {
                out.write_f32::<LE>(*v)?;
            }
            out.write_i32::<LE>(info.miptex as i32)?;
            out.write_i32::<LE>(info.flags as i32)?;
        }
        Ok(out)
    }

    fn faces(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.faces.len() * 20);
        for face in &self.data.faces {
            out.write_i16::<LE>(face.plane as i16)?;
            out.write_i16::<LE>(face.side as i16)?;
            out.write_i32::<LE>(face.first_edge as i32)?;
            out.write_i16::<LE>(face.num_edges as i16)?;
            out.write_i16::<LE>(face.texinfo as i16)?;
            // no lightmap styles until the light stage runs
            out.write_all(&[255; 4])?;
            out.write_i32::<LE>(-1)?;
        }
        Ok(out)
    }

    fn clipnodes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.clipnodes.len() * 8);
        for node in &self.data.clipnodes {
            out.write_i32::<LE>(node.plane as i32)?;
            for child in node.children {
                out.write_i16::<LE>(child as i16)?;
            }
        }
        Ok(out)
    }

    fn leafs(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.leafs.len() * 28);
        for leaf in &self.data.leafs {
            out.write_i32::<LE>(leaf.contents)?;
            out.write_i32::<LE>(-1)?;
            for v in leaf.mins.iter().chain(&leaf.maxs) {
                out.write_i16::<LE>(*v)?;
            }
            out.write_u16::<LE>(leaf.first_marksurface as u16)?;
            out.write_u16::<LE>(leaf.num_marksurfaces as u16)?;
            out.write_all(&[0; 4])?;
        }
        Ok(out)
    }

    fn marksurfaces(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.marksurfaces.len() * 2);
        for m in &self.data.marksurfaces {
            out.write_u16::<LE>(*m as u16)?;
        }
        Ok(out)
    }

    fn edges(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.edges.len() * 4);
        for edge in &self.data.edges {
            out.write_u16::<LE>(edge[0] as u16)?;
            out.write_u16::<LE>(edge[1] as u16)?;
        }
        Ok(out)
    }

    fn surfedges(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.surfedges.len() * 4);
        for e in &self.data.surfedges {
            out.write_i32::<LE>(*e)?;
        }
        Ok(out)
    }

    fn models(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.models.len() * 64);
        for model in &self.data.models {
            for v in model.mins.iter().chain(&model.maxs).chain(&model.origin) {
                out.write_f32::<LE>(*v)?;
            }
            for h in model.headnode {
                out.write_i32::<LE>(h)?;
            }
            out.write_i32::<LE>(model.visleafs as i32)?;
            out.write_i32::<LE>(model.first_face as i32)?;
            out.write_i32::<LE>(model.num_faces as i32)?;
        }
        Ok(out)
    }

    /// Lump bodies in directory order.
    fn lumps(&self) -> io::Result<[Vec<u8>; NUM_LUMPS]> {
        Ok([
            self.entities(),
            self.planes()?,
            self.textures()?,
            self.vertexes()?,
            Vec::new(),
            self.nodes()?,
            self.texinfo()?,
            self.faces()?,
            Vec::new(),
            self.clipnodes()?,
            self.leafs()?,
            self.marksurfaces()?,
            self.edges()?,
            self.surfedges()?,
            self.models()?,
        ])
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let lumps = self.lumps()?;
        let mut header = Vec::with_capacity(HEADER_SIZE);
        let mut body = Vec::new();
        header.write_i32::<LE>(BSP_VERSION)?;
        for lump in &lumps {
            header.write_i32::<LE>((HEADER_SIZE + body.len()) as i32)?;
            header.write_i32::<LE>(lump.len() as i32)?;
            body.extend_from_slice(lump);
            while body.len() % 4 != 0 {
                body.push(0);
            }
        }
        header.extend_from_slice(&body);
        Ok(header)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes()?)
    }
}
