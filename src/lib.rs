//! A multithreaded **brush compiler**: convex brushes in, a solid [BSP](bsp)
//! tree with portals, leak diagnostics and BSP29 tables out.
//!
//! The pipeline per model and hull is
//! [load brushes](brush::load_brushes) → [CSG](csg::csg_faces) →
//! [surfaces](surface::build_surfaces) → [solid BSP](bsp::build_tree) →
//! [portals](portal::portalize) → [leak check and fill](outside) →
//! [merge](merge) → [export](writer::export), all driven by
//! [`compile`](compile::compile).
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//! - **parallel**: use rayon for multithreading (models and hulls in
//!   parallel, front and back subtrees with `rayon::join`)
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **serde**: derive `Serialize`/`Deserialize` on [`Options`]

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod brush;
pub mod bsp;
pub mod compile;
pub mod contents;
pub mod csg;
pub mod errors;
pub mod face;
pub mod float_types;
pub mod hull;
pub mod map;
pub mod merge;
pub mod options;
pub mod outside;
pub mod plane;
pub mod portal;
pub mod surface;
pub mod texinfo;
pub mod winding;
pub mod writer;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use compile::{CompiledMap, compile};
pub use contents::Contents;
pub use errors::CompileError;
pub use map::{EntityId, MapBrush, MapEntity};
pub use options::Options;
